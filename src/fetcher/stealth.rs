//! Fingerprint evasion for headless sessions
//!
//! Overrides the script-observable signals a page's anti-bot checks look
//! at: the automation flag, the permissions-query API, the plugin list,
//! and the language list. The overrides are installed via
//! `Page.addScriptToEvaluateOnNewDocument` so they are in place before
//! any site script runs.

use chromiumoxide::cdp::browser_protocol::emulation::{
    SetTimezoneOverrideParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, Headers, SetExtraHttpHeadersParams,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::Page;
use rand::Rng;
use rand::rngs::StdRng;
use serde_json::json;
use tracing::debug;

use crate::browser::{FetchError, FetchResult};

/// Fixed pool of current desktop user agents; one is picked per session.
pub const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:134.0) Gecko/20100101 Firefox/134.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.2 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36",
];

/// Locale the whole session profile is kept consistent with.
pub const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";
pub const TIMEZONE: &str = "America/New_York";

/// Installed before any page script executes. Keeps `navigator` looking
/// like an ordinary desktop browser: no webdriver flag, a permissions
/// query that answers for notifications, a non-empty plugin list, and a
/// language list matching the Accept-Language header.
const EVASION_SCRIPT: &str = r#"
delete Object.getPrototypeOf(navigator).webdriver;
Object.defineProperty(navigator, 'webdriver', { get: () => undefined, configurable: true });

const originalQuery = window.navigator.permissions && window.navigator.permissions.query;
if (originalQuery) {
    window.navigator.permissions.query = (parameters) => (
        parameters.name === 'notifications'
            ? Promise.resolve({ state: Notification.permission })
            : originalQuery(parameters)
    );
}

Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5], configurable: true });
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'], configurable: true });
"#;

/// Pick one user agent from the pool.
///
/// The generator is supplied by the caller so tests (and callers that
/// need reproducible sessions) can seed it.
pub(crate) fn pick_user_agent(rng: &mut StdRng) -> &'static str {
    USER_AGENTS[rng.random_range(0..USER_AGENTS.len())]
}

fn extra_headers() -> Headers {
    Headers::new(json!({
        "Accept": "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        "Accept-Language": ACCEPT_LANGUAGE,
        "DNT": "1",
        "Sec-Fetch-Dest": "document",
        "Sec-Fetch-Mode": "navigate",
        "Sec-Fetch-Site": "none",
        "Sec-Fetch-User": "?1",
        "Upgrade-Insecure-Requests": "1",
    }))
}

fn platform_for(user_agent: &str) -> &'static str {
    if user_agent.contains("Macintosh") {
        "MacIntel"
    } else if user_agent.contains("X11") {
        "Linux x86_64"
    } else {
        "Win32"
    }
}

/// Apply the full session profile to a still-blank page.
///
/// Must run before navigation: the init script only covers documents
/// created after it is registered.
pub(crate) async fn apply_session_profile(page: &Page, user_agent: &str) -> FetchResult<()> {
    page.execute(AddScriptToEvaluateOnNewDocumentParams::new(EVASION_SCRIPT))
        .await
        .map_err(|e| FetchError::Other(format!("Failed to install evasion script: {e}")))?;

    let ua_override = SetUserAgentOverrideParams::builder()
        .user_agent(user_agent)
        .accept_language(ACCEPT_LANGUAGE)
        .platform(platform_for(user_agent))
        .build()
        .map_err(FetchError::Other)?;
    page.execute(ua_override)
        .await
        .map_err(|e| FetchError::Other(format!("Failed to override user agent: {e}")))?;

    page.execute(SetTimezoneOverrideParams::new(TIMEZONE))
        .await
        .map_err(|e| FetchError::Other(format!("Failed to override timezone: {e}")))?;

    // Extra headers only take effect with the network domain enabled.
    page.execute(EnableParams::default())
        .await
        .map_err(|e| FetchError::Other(format!("Failed to enable network domain: {e}")))?;
    page.execute(SetExtraHttpHeadersParams::new(extra_headers()))
        .await
        .map_err(|e| FetchError::Other(format!("Failed to set extra headers: {e}")))?;

    debug!(user_agent, "session profile applied");
    Ok(())
}
