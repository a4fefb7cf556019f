//! pagefetch - resilient page acquisition.
//!
//! Acquires the rendered HTML of a URL under adversarial conditions: anti-bot
//! interstitials, transient network failures, missing or crashed browser
//! binaries, and mirrored origins. A browser-rendering tier is tried first and
//! a raw HTTP tier on exhaustion; for known mirrored site families an ordered
//! chain of URL variants is walked until content is obtained.
//!
//! Ordinary fetch failure is always returned as data with a full attempt
//! trail; errors are reserved for caller mistakes such as an empty URL.

pub mod cli;
pub mod config;
pub mod extract;
pub mod fetch;
pub mod models;
pub mod providers;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use config::Settings;
use fetch::browser::{BrowserRenderer, BrowserSession};
use fetch::{
    ChainOutcome, FallbackChainWalker, FetchOrchestrator, HttpFetcher, PageRenderer,
    ProtectionDetector, RawFetcher,
};
use models::{FetchOptions, FetchOutcome, FetchRequest};
use providers::ProviderRegistry;

pub use fetch::FetchError;

/// Result of a fetch: a direct orchestration outcome for arbitrary sites, or
/// a fallback chain outcome for mirrored site families.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PageResult {
    Direct(FetchOutcome),
    Chain(ChainOutcome),
}

impl PageResult {
    pub fn success(&self) -> bool {
        match self {
            Self::Direct(outcome) => outcome.success,
            Self::Chain(outcome) => outcome.success,
        }
    }

    pub fn html(&self) -> Option<&str> {
        match self {
            Self::Direct(outcome) => outcome.html.as_deref(),
            Self::Chain(outcome) => outcome.html.as_deref(),
        }
    }

    /// The URL that finally produced content, if any.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Direct(outcome) => outcome.final_url.as_deref(),
            Self::Chain(outcome) => outcome.url.as_deref(),
        }
    }
}

/// Entry point tying the registry, orchestrator, and fallback chain together.
///
/// Holds the process-wide browser session and HTTP connection pool; build one
/// and reuse it across fetches.
pub struct PageFetcher {
    registry: ProviderRegistry,
    orchestrator: Arc<FetchOrchestrator>,
    walker: FallbackChainWalker,
}

impl PageFetcher {
    pub fn new(settings: &Settings) -> Result<Self, FetchError> {
        let detector = ProtectionDetector::with_min_length(settings.min_body_length);

        let session = Arc::new(BrowserSession::new(
            settings.browser_executable.clone(),
            settings.proxy.clone(),
        ));
        let renderer: Arc<dyn PageRenderer> = Arc::new(BrowserRenderer::new(session));
        let http: Arc<dyn RawFetcher> = Arc::new(HttpFetcher::new(
            Duration::from_millis(settings.timeout_ms),
            settings.proxy.as_deref(),
            detector,
        )?);

        let orchestrator = Arc::new(
            FetchOrchestrator::new(renderer, Arc::clone(&http))
                .with_detector(detector)
                .http_only(settings.http_only),
        );
        let walker = FallbackChainWalker::new(Arc::clone(&orchestrator), http);

        Ok(Self {
            registry: ProviderRegistry::default(),
            orchestrator,
            walker,
        })
    }

    /// Fetch one page through the policy its provider selects.
    ///
    /// Returns an error only for an empty URL; every fetch failure is data in
    /// the returned outcome.
    pub async fn fetch(
        &self,
        url: &str,
        mut options: FetchOptions,
    ) -> Result<PageResult, FetchError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(FetchError::InvalidUrl("url must not be empty".into()));
        }

        let provider = self.registry.resolve(url);
        if options.wait_for_selector.is_none() {
            options.wait_for_selector = provider.wait_for_selector.map(str::to_string);
        }
        let request = FetchRequest::with_options(url, options);

        if provider.mirror_fallback {
            Ok(PageResult::Chain(self.walker.walk(&request).await?))
        } else {
            Ok(PageResult::Direct(self.orchestrator.orchestrate(&request).await))
        }
    }
}
