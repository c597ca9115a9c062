//! Chromium discovery and launch
//!
//! Finds a system Chrome/Chromium (env override, well-known paths, `which`),
//! falling back to a managed download, then launches it with the stealth
//! flag set and a per-invocation profile directory.

use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use futures::StreamExt;
use std::path::PathBuf;
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::{self, JoinHandle};
use tracing::{debug, info, warn};

use crate::browser::{BrowserWrapper, FetchError, FetchResult};

/// Viewport matching the advertised desktop session profile.
pub const VIEWPORT_WIDTH: u32 = 1920;
pub const VIEWPORT_HEIGHT: u32 = 1080;

/// Distinguishes profile directories of concurrent fetches in one process.
static PROFILE_SEQ: AtomicU64 = AtomicU64::new(0);

/// RAII guard for the profile directory.
///
/// Removes the directory on drop unless consumed by `into_path()`, so a
/// launch failure never leaves a stray profile behind.
struct TempDirGuard {
    path: PathBuf,
    keep: bool,
}

impl TempDirGuard {
    fn new(path: PathBuf) -> FetchResult<Self> {
        std::fs::create_dir_all(&path)
            .map_err(|e| FetchError::LaunchFailed(format!("Failed to create profile dir: {e}")))?;
        Ok(Self { path, keep: false })
    }

    /// Consume the guard, transferring directory ownership to the caller.
    fn into_path(mut self) -> PathBuf {
        self.keep = true;
        self.path.clone()
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        if !self.keep
            && let Err(e) = std::fs::remove_dir_all(&self.path)
        {
            warn!("Failed to clean up profile dir {}: {}", self.path.display(), e);
        }
    }
}

/// Find a Chrome/Chromium executable on the system.
///
/// `CHROMIUM_PATH` overrides all other discovery methods.
pub async fn find_browser_executable() -> FetchResult<PathBuf> {
    if let Ok(path) = std::env::var("CHROMIUM_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            info!("Using browser from CHROMIUM_PATH: {}", path.display());
            return Ok(path);
        }
        warn!(
            "CHROMIUM_PATH points to non-existent file: {}",
            path.display()
        );
    }

    let paths: Vec<&str> = if cfg!(target_os = "windows") {
        vec![
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\Chromium\Application\chrome.exe",
        ]
    } else if cfg!(target_os = "macos") {
        vec![
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/opt/homebrew/bin/chromium",
        ]
    } else {
        vec![
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
            "/opt/google/chrome/chrome",
        ]
    };

    for path_str in paths {
        let path = PathBuf::from(path_str);
        if path.exists() {
            debug!("Found browser at: {}", path.display());
            return Ok(path);
        }
    }

    if !cfg!(target_os = "windows") {
        for cmd in &["chromium", "chromium-browser", "google-chrome", "chrome"] {
            if let Ok(output) = Command::new("which").arg(cmd).output()
                && output.status.success()
            {
                let path_str = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path_str.is_empty() {
                    debug!("Found browser via 'which': {path_str}");
                    return Ok(PathBuf::from(path_str));
                }
            }
        }
    }

    Err(FetchError::LaunchFailed(
        "Chrome/Chromium executable not found".into(),
    ))
}

/// Download a managed Chromium build into the user cache directory.
pub async fn download_managed_browser() -> FetchResult<PathBuf> {
    info!("No system browser found, downloading managed Chromium...");

    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(|| std::env::temp_dir().join(".cache"))
        .join("pagesift/chromium");

    std::fs::create_dir_all(&cache_dir)
        .map_err(|e| FetchError::LaunchFailed(format!("Failed to create cache dir: {e}")))?;

    let fetcher = BrowserFetcher::new(
        BrowserFetcherOptions::builder()
            .with_path(&cache_dir)
            .build()
            .map_err(|e| FetchError::LaunchFailed(format!("Failed to build fetcher options: {e}")))?,
    );

    let revision_info = fetcher
        .fetch()
        .await
        .map_err(|e| FetchError::LaunchFailed(format!("Failed to download browser: {e}")))?;

    info!("Downloaded Chromium to: {}", revision_info.folder_path.display());
    Ok(revision_info.executable_path)
}

/// Launch a browser with the stealth flag set and a fresh profile.
///
/// The user agent is applied per page via CDP, not here, so the launch
/// configuration stays identical across sessions while the advertised
/// agent varies.
pub async fn launch_browser(headless: bool) -> FetchResult<BrowserWrapper> {
    let chrome_path = match find_browser_executable().await {
        Ok(path) => path,
        Err(_) => download_managed_browser().await?,
    };

    // Unique per invocation: concurrent fetches must never share a profile.
    let user_data_dir = std::env::temp_dir().join(format!(
        "pagesift_profile_{}_{}",
        std::process::id(),
        PROFILE_SEQ.fetch_add(1, Ordering::Relaxed)
    ));
    let temp_guard = TempDirGuard::new(user_data_dir)?;

    let mut config_builder = BrowserConfigBuilder::default()
        .request_timeout(Duration::from_secs(30))
        .window_size(VIEWPORT_WIDTH, VIEWPORT_HEIGHT)
        .user_data_dir(temp_guard.path.clone())
        .chrome_executable(chrome_path);

    if headless {
        config_builder = config_builder.headless_mode(HeadlessMode::default());
    } else {
        config_builder = config_builder.with_head();
    }

    config_builder = config_builder
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--disable-infobars")
        .arg("--disable-notifications")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-accelerated-2d-canvas")
        .arg("--disable-gpu")
        .arg("--disable-extensions")
        .arg("--disable-popup-blocking")
        .arg("--disable-background-networking")
        .arg("--disable-background-timer-throttling")
        .arg("--disable-breakpad")
        .arg("--disable-hang-monitor")
        .arg("--disable-prompt-on-repost")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--metrics-recording-only")
        .arg("--password-store=basic")
        .arg("--use-mock-keychain")
        .arg("--mute-audio");

    // Sandboxing cannot work without setuid inside containers.
    if should_disable_sandbox() {
        info!("Detected containerized environment, disabling sandbox");
        config_builder = config_builder
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox");
    }

    let browser_config = config_builder
        .build()
        .map_err(|e| FetchError::LaunchFailed(format!("Failed to build browser config: {e}")))?;

    debug!("Launching browser with config: {:?}", browser_config);
    let (browser, mut handler) = Browser::launch(browser_config)
        .await
        .map_err(|e| FetchError::LaunchFailed(e.to_string()))?;

    let handler_task: JoinHandle<()> = task::spawn(async move {
        while let Some(h) = handler.next().await {
            if let Err(e) = h {
                let msg = e.to_string();
                // Chrome emits CDP events chromiumoxide does not model; those
                // deserialization failures are noise, not faults.
                let benign = msg.contains("data did not match any variant of untagged enum Message")
                    || msg.contains("Failed to deserialize WS response");
                if !benign {
                    warn!("Browser handler error: {msg}");
                }
            }
        }
        debug!("Browser handler task completed");
    });

    let user_data_dir = temp_guard.into_path();
    Ok(BrowserWrapper::new(browser, handler_task, user_data_dir))
}

fn should_disable_sandbox() -> bool {
    std::path::Path::new("/.dockerenv").exists()
        || std::env::var("container").is_ok()
        || std::env::var("KUBERNETES_SERVICE_HOST").is_ok()
}
