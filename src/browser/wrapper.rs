//! Browser lifecycle management
//!
//! Owns a chromiumoxide browser instance together with its CDP event
//! handler task and the temporary profile directory backing it. The
//! handler MUST be aborted once the browser is gone or it runs forever.

use chromiumoxide::browser::Browser;
use chromiumoxide::page::Page;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{FetchError, FetchResult};

/// Wrapper for a Browser, its event handler task, and its profile dir.
///
/// The wrapper is exclusive to one fetch invocation. Call
/// [`BrowserWrapper::shutdown`] on every exit path, success or failure;
/// `Drop` only aborts the handler as a last resort and will leave the
/// profile directory orphaned.
pub struct BrowserWrapper {
    browser: Browser,
    handler: JoinHandle<()>,
    user_data_dir: Option<PathBuf>,
}

impl BrowserWrapper {
    pub(crate) fn new(browser: Browser, handler: JoinHandle<()>, user_data_dir: PathBuf) -> Self {
        Self {
            browser,
            handler,
            user_data_dir: Some(user_data_dir),
        }
    }

    /// Open a blank page for pre-navigation setup.
    ///
    /// Fingerprint overrides must be installed on a page that has not yet
    /// run any site script, so navigation always starts from `about:blank`.
    pub async fn blank_page(&self) -> FetchResult<Page> {
        self.browser
            .new_page("about:blank")
            .await
            .map_err(|e| FetchError::Other(format!("Failed to create page: {e}")))
    }

    /// Close the browser, reap the Chrome process, and remove the profile.
    ///
    /// Errors during close are logged and swallowed: by the time shutdown
    /// runs the fetch outcome is already decided, and a half-dead browser
    /// must not mask it. Profile removal happens only after `wait()` so
    /// Chrome has released its file handles.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Error closing browser: {e}");
        }
        if let Err(e) = self.browser.wait().await {
            warn!("Error waiting for browser exit: {e}");
        }
        self.handler.abort();

        if let Some(path) = self.user_data_dir.take() {
            debug!("Removing profile directory: {}", path.display());
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!(
                    "Failed to remove profile directory {}: {}. Manual cleanup may be required.",
                    path.display(),
                    e
                );
            }
        }
    }
}

impl Drop for BrowserWrapper {
    fn drop(&mut self) {
        // Browser::drop kills the Chrome process; the handler has nothing
        // left to poll and must not outlive it.
        self.handler.abort();

        if let Some(path) = &self.user_data_dir {
            warn!(
                "BrowserWrapper dropped without shutdown(); profile directory orphaned: {}",
                path.display()
            );
        }
    }
}
