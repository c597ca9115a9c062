//! Scrape orchestration
//!
//! Composes acquisition and extraction behind one call that never fails:
//! [`scrape`] validates the URL, fetches the rendered page, runs the
//! extractor, and folds both success and failure into a uniform
//! [`ScrapeResult`] envelope.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::browser::FetchError;
use crate::fetcher::{FetchOptions, PageFetcher};
use crate::readability::{Article, ContentExtractor, ExtractError, ExtractionOptions};

/// Constant tag identifying the acquisition strategy.
pub const SCRAPE_METHOD: &str = "chromium";

/// Combined options for one scrape invocation.
#[derive(Debug, Clone, Default)]
pub struct ScrapeOptions {
    pub fetch: FetchOptions,
    pub extraction: ExtractionOptions,
}

/// Uniform result envelope. Exactly one of {article fields} or
/// {empty-defaulted fields plus `error`} is populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResult {
    pub url: String,
    pub method: String,
    pub title: String,
    pub excerpt: String,
    pub length: usize,
    pub site_name: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScrapeResult {
    fn completed(url: &str, article: Article) -> Self {
        Self {
            url: url.to_string(),
            method: SCRAPE_METHOD.to_string(),
            title: article.title,
            excerpt: article.excerpt,
            length: article.length,
            site_name: article.site_name,
            content: article.content,
            text_content: article.text_content,
            success: true,
            error: None,
        }
    }

    fn failed(url: &str, error: String) -> Self {
        Self {
            url: url.to_string(),
            method: SCRAPE_METHOD.to_string(),
            title: String::new(),
            excerpt: String::new(),
            length: 0,
            site_name: String::new(),
            content: String::new(),
            text_content: None,
            success: false,
            error: Some(error),
        }
    }
}

/// Internal error taxonomy; converted to the envelope inside [`scrape`]
/// and never exposed to its callers.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extract(#[from] ExtractError),
}

/// Acquire and extract one page. Never fails; every error is captured in
/// the returned envelope. No retries anywhere: retry policy belongs to
/// the caller.
pub async fn scrape<F: PageFetcher>(
    fetcher: &F,
    url: &str,
    options: &ScrapeOptions,
) -> ScrapeResult {
    match run(fetcher, url, options).await {
        Ok(article) => {
            info!(%url, length = article.length, "scrape completed");
            ScrapeResult::completed(url, article)
        }
        Err(e) => {
            warn!(%url, error = %e, "scrape failed");
            ScrapeResult::failed(url, e.to_string())
        }
    }
}

async fn run<F: PageFetcher>(
    fetcher: &F,
    url: &str,
    options: &ScrapeOptions,
) -> Result<Article, ScrapeError> {
    // Syntactic validation rejects bad input before any browser launches.
    validate_url(url)?;
    let page = fetcher.fetch(url, &options.fetch).await?;
    let article = ContentExtractor::extract(&page.html, &page.url, &options.extraction)?;
    Ok(article)
}

fn validate_url(url: &str) -> Result<(), ScrapeError> {
    let parsed = Url::parse(url).map_err(|e| ScrapeError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ScrapeError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme '{scheme}'"),
        }),
    }
}
