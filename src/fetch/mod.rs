//! Fetch resilience layer: tiered acquisition of rendered page markup.
//!
//! The render tier drives a shared headless browser; the HTTP tier performs a
//! single browser-like GET. The orchestrator exhausts the render tier before
//! falling back, and the mirrored-archive fallback chain walks URL variants
//! across alternate origins.

pub mod browser;
mod fallback;
mod http;
mod orchestrator;
mod protection;
mod retry;

pub use fallback::{ChainOutcome, FallbackChainWalker, FallbackStage, MirrorSet};
pub use http::HttpFetcher;
pub use orchestrator::FetchOrchestrator;
pub use protection::ProtectionDetector;
pub use retry::RetryPolicy;

use async_trait::async_trait;

use crate::models::{CapturedResponse, FetchRequest};

/// Errors raised inside the fetch layer.
///
/// Tiers catch these locally and record them in the attempt trail; only input
/// contract violations propagate to the caller as errors.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP status {status}")]
    Http { status: u16 },

    #[error("empty response body")]
    EmptyBody,

    #[error("protection page detected")]
    Blocked,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("navigation timed out after {0}ms")]
    NavigationTimeout(u64),

    #[error("render failed: {0}")]
    Render(String),

    #[error("browser unavailable: {0}")]
    BrowserUnavailable(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("cookie file: {0}")]
    CookieFile(String),
}

/// Markup produced by a successful render.
#[derive(Debug, Clone)]
pub struct Rendered {
    /// Fully rendered page markup.
    pub html: String,
    /// URL the page ended up on after redirects.
    pub final_url: String,
    /// Captured API responses, when capture was requested.
    pub captured: Vec<CapturedResponse>,
}

/// Browser-rendering tier contract.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Render the requested page to markup, or fail with a renderer-tier error.
    /// Implementations never fall back to HTTP themselves.
    async fn render(&self, request: &FetchRequest) -> Result<Rendered, FetchError>;
}

/// Raw HTTP tier contract: one network round trip per call.
#[async_trait]
pub trait RawFetcher: Send + Sync {
    /// Perform a single GET and return non-empty body text.
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}
