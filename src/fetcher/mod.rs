//! Rendered-page acquisition
//!
//! [`StealthFetcher`] drives a single-use headless Chromium session:
//! launch, fingerprint evasion, navigation, optional selector wait,
//! optional scroll-to-bottom, settle delay, capture. The browser is torn
//! down on every exit path before any error propagates.

mod stealth;

pub use stealth::USER_AGENTS;

use async_trait::async_trait;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::browser::{FetchError, FetchResult, launch_browser};

/// Sub-timeout for the optional selector wait, deliberately shorter than
/// any sane navigation ceiling.
const SELECTOR_TIMEOUT: Duration = Duration::from_secs(10);

/// Scroll increment and cadence for scroll-to-bottom.
const SCROLL_STEP_PX: u64 = 100;
const SCROLL_TICK: Duration = Duration::from_millis(100);

const SCROLL_TICK_JS: &str = "(() => { \
    window.scrollBy(0, 100); \
    return Math.max(document.body ? document.body.scrollHeight : 0, document.documentElement.scrollHeight); \
})()";

/// Options controlling one fetch invocation.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Unconditional settle delay after all interaction, before capture.
    pub wait_millis: u64,
    /// Hard ceiling on navigation.
    pub timeout_millis: u64,
    pub headless: bool,
    /// CSS selector that must appear before the page counts as ready.
    pub wait_for_selector: Option<String>,
    /// Scroll in increments to trigger lazy-loaded content.
    pub scroll_to_bottom: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            wait_millis: 3000,
            timeout_millis: 30_000,
            headless: true,
            wait_for_selector: None,
            scroll_to_bottom: false,
        }
    }
}

/// Fully rendered page markup together with the URL it came from.
///
/// Produced once per fetch and consumed by extraction.
#[derive(Debug, Clone)]
pub struct RawPage {
    pub html: String,
    pub url: String,
}

/// Acquisition seam: the orchestrator only depends on this trait, so
/// tests can substitute a fetcher that never launches a browser.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> FetchResult<RawPage>;
}

/// Headless-browser fetcher with fingerprint evasion.
///
/// Each call to [`PageFetcher::fetch`] launches its own browser process
/// and releases it before returning; nothing is shared between calls.
pub struct StealthFetcher {
    seed: Option<u64>,
}

impl StealthFetcher {
    pub fn new() -> Self {
        Self { seed: None }
    }

    /// Pin the user-agent selection to a seed for reproducible sessions.
    pub fn with_seed(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }
}

impl Default for StealthFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageFetcher for StealthFetcher {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> FetchResult<RawPage> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let user_agent = stealth::pick_user_agent(&mut rng);

        info!(%url, user_agent, headless = options.headless, "launching browser session");
        let wrapper = launch_browser(options.headless).await?;

        // Teardown is unconditional: the session is released before the
        // outcome, success or failure, leaves this function.
        let result = drive_page(&wrapper, url, user_agent, options).await;
        wrapper.shutdown().await;
        result
    }
}

/// Run the post-launch pipeline. Any error here still routes through the
/// caller's `shutdown()`.
async fn drive_page(
    wrapper: &crate::browser::BrowserWrapper,
    url: &str,
    user_agent: &str,
    options: &FetchOptions,
) -> FetchResult<RawPage> {
    let page = wrapper.blank_page().await?;
    stealth::apply_session_profile(&page, user_agent).await?;

    let timeout = Duration::from_millis(options.timeout_millis);
    let navigation = async {
        page.goto(url).await?;
        page.wait_for_navigation().await?;
        Ok::<(), CdpError>(())
    };
    tokio::time::timeout(timeout, navigation)
        .await
        .map_err(|_| FetchError::NavigationTimeout {
            url: url.to_string(),
            timeout_ms: options.timeout_millis,
        })?
        .map_err(|e| FetchError::NavigationFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    if let Some(selector) = &options.wait_for_selector {
        debug!(selector, "waiting for selector");
        wait_for_element(&page, selector).await?;
    }

    if options.scroll_to_bottom {
        scroll_to_bottom(&page).await?;
    }

    debug!(wait_millis = options.wait_millis, "settling before capture");
    tokio::time::sleep(Duration::from_millis(options.wait_millis)).await;

    let html = page
        .content()
        .await
        .map_err(|e| FetchError::CaptureFailed(e.to_string()))?;
    debug!(chars = html.len(), "captured rendered document");

    Ok(RawPage {
        html,
        url: url.to_string(),
    })
}

/// Poll for an element with exponential backoff, bounded by the fixed
/// selector sub-timeout. SPAs render selectors well after `load` fires,
/// so a single lookup is not enough.
async fn wait_for_element(page: &Page, selector: &str) -> FetchResult<()> {
    let start = Instant::now();
    let mut poll_interval = Duration::from_millis(100);
    let max_interval = Duration::from_secs(1);

    loop {
        if page.find_element(selector).await.is_ok() {
            return Ok(());
        }

        if start.elapsed() >= SELECTOR_TIMEOUT {
            return Err(FetchError::SelectorTimeout {
                selector: selector.to_string(),
                timeout_ms: SELECTOR_TIMEOUT.as_millis() as u64,
            });
        }

        tokio::time::sleep(poll_interval).await;
        poll_interval = (poll_interval * 2).min(max_interval);
    }
}

/// Scroll downward in fixed increments until the document stops growing.
async fn scroll_to_bottom(page: &Page) -> FetchResult<()> {
    let mut progress = ScrollProgress::new();

    loop {
        let height: f64 = page
            .evaluate(SCROLL_TICK_JS)
            .await
            .map_err(|e| FetchError::Other(format!("Scroll evaluation failed: {e}")))?
            .into_value()
            .map_err(|e| FetchError::Other(format!("Scroll height was not numeric: {e}")))?;

        if !progress.advance(height.max(0.0) as u64) {
            break;
        }
        tokio::time::sleep(SCROLL_TICK).await;
    }

    debug!(
        ticks = progress.ticks,
        scrolled_px = progress.total_scrolled,
        "scroll loop finished"
    );
    Ok(())
}

/// Termination logic for the scroll loop, kept free of browser calls.
///
/// The loop ends when the accumulated distance reaches the document
/// height, when the height has not grown for [`Self::MAX_STALE_TICKS`]
/// consecutive ticks, or at the absolute tick cap. The cap guarantees
/// termination on pages whose height grows in step with scrolling
/// forever (infinite scroll feeds).
struct ScrollProgress {
    total_scrolled: u64,
    last_height: u64,
    stale_ticks: u32,
    ticks: u32,
}

impl ScrollProgress {
    const MAX_TICKS: u32 = 600;
    const MAX_STALE_TICKS: u32 = 50;

    fn new() -> Self {
        Self {
            total_scrolled: 0,
            last_height: 0,
            stale_ticks: 0,
            ticks: 0,
        }
    }

    /// Record one tick's observed scroll height; returns `true` while the
    /// loop should keep scrolling.
    fn advance(&mut self, height: u64) -> bool {
        self.ticks += 1;
        self.total_scrolled += SCROLL_STEP_PX;

        if height > self.last_height {
            self.last_height = height;
            self.stale_ticks = 0;
        } else {
            self.stale_ticks += 1;
        }

        if self.total_scrolled >= self.last_height {
            return false;
        }
        if self.stale_ticks >= Self::MAX_STALE_TICKS {
            return false;
        }
        self.ticks < Self::MAX_TICKS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_match_contract() {
        let options = FetchOptions::default();
        assert_eq!(options.wait_millis, 3000);
        assert_eq!(options.timeout_millis, 30_000);
        assert!(options.headless);
        assert!(options.wait_for_selector.is_none());
        assert!(!options.scroll_to_bottom);
    }

    #[test]
    fn scroll_stops_when_distance_reaches_height() {
        let mut progress = ScrollProgress::new();
        // Height stable at 500px: five 100px ticks cover it.
        for _ in 0..4 {
            assert!(progress.advance(500));
        }
        assert!(!progress.advance(500));
        assert_eq!(progress.ticks, 5);
    }

    #[test]
    fn scroll_follows_growing_height_until_stable() {
        let mut progress = ScrollProgress::new();
        let mut height = 300;
        let mut ticks = 0;
        loop {
            ticks += 1;
            // Lazy loading: the document grows for the first six ticks,
            // then stabilizes.
            if ticks <= 6 {
                height += 200;
            }
            if !progress.advance(height) {
                break;
            }
            assert!(ticks < 100, "loop failed to terminate");
        }
        // 6 growth ticks to 1500px, caught up after 15 ticks total.
        assert_eq!(ticks, 15);
    }

    #[test]
    fn scroll_breaks_on_stale_height() {
        let mut progress = ScrollProgress::new();
        let mut ticks = 0;
        // Enormous static page: the no-growth break fires long before the
        // accumulated distance would reach the height.
        while progress.advance(1_000_000) {
            ticks += 1;
            assert!(ticks <= ScrollProgress::MAX_STALE_TICKS, "stale break missed");
        }
    }

    #[test]
    fn scroll_cap_bounds_perpetual_growth() {
        let mut progress = ScrollProgress::new();
        let mut height = 0;
        let mut ticks: u32 = 0;
        loop {
            ticks += 1;
            // Pathological feed: height always stays one step ahead.
            height += 2 * SCROLL_STEP_PX;
            if !progress.advance(height) {
                break;
            }
            assert!(ticks <= ScrollProgress::MAX_TICKS + 1, "cap missed");
        }
        assert_eq!(ticks, ScrollProgress::MAX_TICKS);
    }
}
