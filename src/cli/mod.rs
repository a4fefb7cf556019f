//! CLI for one-shot page fetches.

use std::path::PathBuf;

use clap::Parser;

use crate::config::Settings;
use crate::extract::PageRecord;
use crate::models::FetchOptions;
use crate::PageFetcher;

#[derive(Parser)]
#[command(name = "pagefetch")]
#[command(about = "Resilient page acquisition with browser rendering and raw HTTP fallback")]
#[command(version)]
pub struct Cli {
    /// Target URL
    url: String,

    /// Navigation timeout in milliseconds
    #[arg(long, env = "PAGEFETCH_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Wait for this CSS selector before considering the page settled
    #[arg(long)]
    wait_for: Option<String>,

    /// Capture intercepted API responses
    #[arg(long)]
    capture: bool,

    /// Path to a JSON cookie file injected before navigation
    #[arg(long)]
    cookies: Option<PathBuf>,

    /// Proxy server address (e.g. "socks5://127.0.0.1:1080")
    #[arg(long, env = "PAGEFETCH_PROXY")]
    proxy: Option<String>,

    /// Keep image/font/media sub-resources loading
    #[arg(long)]
    no_block_resources: bool,

    /// Skip browser rendering and use raw HTTP only
    #[arg(long)]
    http_only: bool,

    /// Extract title/description/links/images from the final markup
    #[arg(long)]
    extract: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

/// Parse arguments, run one fetch, and print the outcome as JSON.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::from_env();
    settings.http_only = settings.http_only || cli.http_only;
    if let Some(proxy) = cli.proxy.clone() {
        settings.proxy = Some(proxy);
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        settings.timeout_ms = timeout_ms;
    }

    let options = FetchOptions {
        timeout_ms: settings.timeout_ms,
        wait_for_selector: cli.wait_for.clone(),
        capture_api_responses: cli.capture,
        block_resources: !cli.no_block_resources,
        proxy: settings.proxy.clone(),
        cookie_file: cli.cookies.clone(),
    };

    let fetcher = PageFetcher::new(&settings)?;
    let result = fetcher.fetch(&cli.url, options).await?;

    if cli.extract {
        let record = result
            .html()
            .map(|html| PageRecord::from_html(html, result.url().unwrap_or(&cli.url)));
        let report = serde_json::json!({ "outcome": &result, "record": record });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    if !result.success() {
        std::process::exit(1);
    }
    Ok(())
}
