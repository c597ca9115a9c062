//! Stealth page acquisition and readable-content extraction
//!
//! Drives a single-use headless Chromium session via chromiumoxide to
//! render script-heavy pages, then isolates the primary article content
//! from navigation, ads, and boilerplate with a readability-style
//! heuristic. [`scrape`] composes the two behind a result envelope that
//! never fails.

pub mod browser;
pub mod browser_setup;
pub mod fetcher;
pub mod readability;
pub mod scrape;

pub use browser::{BrowserWrapper, FetchError, FetchResult};
pub use fetcher::{FetchOptions, PageFetcher, RawPage, StealthFetcher};
pub use readability::{
    Article, ContentExtractor, ExtractError, ExtractionOptions, OutputFormat,
};
pub use scrape::{SCRAPE_METHOD, ScrapeOptions, ScrapeResult, scrape};
