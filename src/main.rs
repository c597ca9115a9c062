//! Command-line harness: scrape one URL and print the result as JSON.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pagesift::{
    ExtractionOptions, FetchOptions, OutputFormat, ScrapeOptions, StealthFetcher, scrape,
};

#[derive(Parser, Debug)]
#[command(
    name = "pagesift",
    version,
    about = "Render a page in headless Chromium and extract its readable content"
)]
struct Cli {
    /// URL to scrape
    url: String,

    /// Scroll to the bottom to trigger lazy-loaded content
    #[arg(long)]
    scroll: bool,

    /// Run with a visible browser window
    #[arg(long = "show-browser")]
    show_browser: bool,

    /// Headed browser, verbose logging, and a longer settle delay
    #[arg(long)]
    debug: bool,

    /// Settle delay in milliseconds before capture
    #[arg(long, value_name = "ms")]
    wait: Option<u64>,

    /// Navigation timeout in milliseconds
    #[arg(long, value_name = "ms")]
    timeout: Option<u64>,

    /// CSS selector that must appear before capture
    #[arg(long, value_name = "css")]
    selector: Option<String>,

    /// Emit extracted content as plain text instead of markup
    #[arg(long)]
    text: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "pagesift=debug" } else { "pagesift=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut fetch = FetchOptions {
        scroll_to_bottom: cli.scroll,
        headless: !cli.show_browser && !cli.debug,
        wait_for_selector: cli.selector.clone(),
        ..FetchOptions::default()
    };
    if let Some(wait) = cli.wait {
        fetch.wait_millis = wait;
    } else if cli.debug {
        fetch.wait_millis = 10_000;
    }
    if let Some(timeout) = cli.timeout {
        fetch.timeout_millis = timeout;
    }

    let options = ScrapeOptions {
        fetch,
        extraction: ExtractionOptions {
            output_format: if cli.text {
                OutputFormat::Text
            } else {
                OutputFormat::Html
            },
        },
    };

    let fetcher = StealthFetcher::new();
    let result = scrape(&fetcher, &cli.url, &options).await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}
