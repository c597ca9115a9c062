//! Browser infrastructure for launching and tearing down Chrome instances
//!
//! Every fetch gets its own browser process with an isolated profile
//! directory. Nothing is pooled; teardown is unconditional.

mod wrapper;

pub use crate::browser_setup::{download_managed_browser, find_browser_executable, launch_browser};
pub use wrapper::BrowserWrapper;

use thiserror::Error;

/// Errors surfaced by the acquisition stage.
///
/// All variants are fatal for the invocation that raised them; the browser
/// session is torn down before any of these propagate.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Navigation timeout after {timeout_ms}ms for URL: {url}")]
    NavigationTimeout { url: String, timeout_ms: u64 },

    #[error("Navigation failed for URL {url}: {reason}")]
    NavigationFailed { url: String, reason: String },

    #[error("Selector '{selector}' did not appear within {timeout_ms}ms")]
    SelectorTimeout { selector: String, timeout_ms: u64 },

    #[error("Failed to capture page content: {0}")]
    CaptureFailed(String),

    #[error("Fetch failed: {0}")]
    Other(String),
}

pub type FetchResult<T> = Result<T, FetchError>;
