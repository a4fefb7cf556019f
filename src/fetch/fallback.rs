//! Ordered fallback chain for mirrored site families.
//!
//! Content for some archives survives across several domains; when the
//! caller-supplied URL fails, an ordered sequence of URL-shape and
//! origin-mirror variants is walked until content is obtained or every state
//! is exhausted.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::{Position, Url};

use crate::models::{CapturedResponse, FetchAttempt, FetchRequest, Payload, Tier};

use super::{FetchError, FetchOrchestrator, RawFetcher, RetryPolicy};

/// Static ordered list of alternate origins hosting equivalent content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorSet {
    origins: Vec<String>,
}

impl Default for MirrorSet {
    fn default() -> Self {
        Self::new(vec![
            "https://annas-archive.org".to_string(),
            "https://annas-archive.se".to_string(),
            "https://annas-archive.li".to_string(),
        ])
    }
}

impl MirrorSet {
    pub fn new(origins: Vec<String>) -> Self {
        Self { origins }
    }

    pub fn origins(&self) -> &[String] {
        &self.origins
    }
}

/// State of the fallback chain, attempted strictly in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStage {
    /// The exact caller-supplied URL.
    Original,
    /// Same host/path/query with http and https swapped.
    ProtocolSwap,
    /// Trailing slash added if absent, removed if present.
    TrailingSlash,
    /// Original path/query/fragment re-based onto a configured mirror origin.
    Mirror,
    /// Direct raw-HTTP call bypassing the renderer entirely.
    RawHttp,
}

impl std::fmt::Display for FallbackStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Original => write!(f, "original"),
            Self::ProtocolSwap => write!(f, "protocol-swap"),
            Self::TrailingSlash => write!(f, "trailing-slash"),
            Self::Mirror => write!(f, "mirror"),
            Self::RawHttp => write!(f, "raw-http"),
        }
    }
}

/// Terminal result of a fallback chain walk.
///
/// Ordinary fetch failure is reported as `success = false`; an error return is
/// reserved for caller mistakes such as an empty URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainOutcome {
    pub success: bool,
    /// Which state produced the content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<FallbackStage>,
    /// The URL variant that succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    pub html_length: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub captured: Vec<CapturedResponse>,
    /// Full ordered attempt trail across all states, not just the winning one.
    pub attempts: Vec<FetchAttempt>,
    pub elapsed_ms: u64,
    pub fetched_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChainOutcome {
    fn succeeded(
        stage: FallbackStage,
        url: String,
        html: String,
        captured: Vec<CapturedResponse>,
        attempts: Vec<FetchAttempt>,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            success: true,
            stage: Some(stage),
            url: Some(url),
            html_length: html.len(),
            html: Some(html),
            captured,
            attempts,
            elapsed_ms,
            fetched_at: Utc::now(),
            error: None,
        }
    }

    fn exhausted(attempts: Vec<FetchAttempt>, error: Option<String>, elapsed_ms: u64) -> Self {
        Self {
            success: false,
            stage: None,
            url: None,
            html: None,
            html_length: 0,
            captured: Vec::new(),
            attempts,
            elapsed_ms,
            fetched_at: Utc::now(),
            error,
        }
    }
}

/// Walks the ordered fallback states, delegating each to the orchestrator and
/// stopping at the first success.
pub struct FallbackChainWalker {
    orchestrator: Arc<FetchOrchestrator>,
    http: Arc<dyn RawFetcher>,
    mirrors: MirrorSet,
    stage_policy: RetryPolicy,
}

impl FallbackChainWalker {
    pub fn new(orchestrator: Arc<FetchOrchestrator>, http: Arc<dyn RawFetcher>) -> Self {
        Self {
            orchestrator,
            http,
            mirrors: MirrorSet::default(),
            stage_policy: RetryPolicy::fallback_stage(),
        }
    }

    /// Override the configured mirror origins.
    pub fn with_mirrors(mut self, mirrors: MirrorSet) -> Self {
        self.mirrors = mirrors;
        self
    }

    /// Walk the chain for one request.
    pub async fn walk(&self, request: &FetchRequest) -> Result<ChainOutcome, FetchError> {
        let url = request.url.trim();
        if url.is_empty() {
            return Err(FetchError::InvalidUrl("url must not be empty".into()));
        }

        let started = Instant::now();
        let mut attempts: Vec<FetchAttempt> = Vec::new();
        let mut last_error: Option<String> = None;

        let shaped_stages = [
            (FallbackStage::Original, Some(url.to_string())),
            (FallbackStage::ProtocolSwap, swap_protocol(url)),
            (FallbackStage::TrailingSlash, toggle_trailing_slash(url)),
        ];

        for (stage, candidate) in shaped_stages {
            let Some(candidate) = candidate else {
                continue;
            };
            if stage != FallbackStage::Original && candidate == url {
                continue;
            }
            debug!("fallback stage {} -> {}", stage, candidate);

            for attempt in 1..=self.stage_policy.max_attempts() {
                let outcome = self
                    .orchestrator
                    .orchestrate(&request.retargeted(candidate.as_str()))
                    .await;
                let succeeded = outcome.success;
                if let Some(e) = &outcome.error {
                    last_error = Some(e.clone());
                }
                let (html, captured) = (outcome.html, outcome.captured);
                attempts.extend(outcome.attempts);

                if succeeded {
                    info!("fallback chain resolved {} at stage {}", url, stage);
                    return Ok(ChainOutcome::succeeded(
                        stage,
                        candidate,
                        html.unwrap_or_default(),
                        captured,
                        attempts,
                        elapsed_ms(started),
                    ));
                }
                if self.stage_policy.should_retry(attempt) {
                    tokio::time::sleep(self.stage_policy.delay_for(attempt)).await;
                }
            }
        }

        for origin in self.mirrors.origins() {
            let candidate = rebase_onto_origin(url, origin);
            if candidate == url {
                continue;
            }
            debug!("fallback stage mirror -> {}", candidate);

            let outcome = self
                .orchestrator
                .orchestrate(&request.retargeted(candidate.as_str()))
                .await;
            let succeeded = outcome.success;
            if let Some(e) = &outcome.error {
                last_error = Some(e.clone());
            }
            let (html, captured) = (outcome.html, outcome.captured);
            attempts.extend(outcome.attempts);

            if succeeded {
                info!("fallback chain resolved {} via mirror {}", url, origin);
                return Ok(ChainOutcome::succeeded(
                    FallbackStage::Mirror,
                    candidate,
                    html.unwrap_or_default(),
                    captured,
                    attempts,
                    elapsed_ms(started),
                ));
            }
        }

        // Last resort: hit the raw HTTP tier directly in case the renderer
        // layer is down hard enough to poison the orchestrator path.
        debug!("fallback stage raw-http -> {}", url);
        match self.http.fetch(url).await {
            Ok(body) => {
                attempts.push(FetchAttempt::succeeded(url, Tier::Http, Payload::Markup));
                info!("fallback chain resolved {} via raw http", url);
                Ok(ChainOutcome::succeeded(
                    FallbackStage::RawHttp,
                    url.to_string(),
                    body,
                    Vec::new(),
                    attempts,
                    elapsed_ms(started),
                ))
            }
            Err(e) => {
                let message = e.to_string();
                attempts.push(FetchAttempt::failed(url, Tier::Http, &message));
                last_error = Some(message);
                warn!("fallback chain exhausted for {}", url);
                Ok(ChainOutcome::exhausted(
                    attempts,
                    last_error,
                    elapsed_ms(started),
                ))
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Swap http and https on a URL string. None when the scheme is neither.
fn swap_protocol(url: &str) -> Option<String> {
    if let Some(rest) = url.strip_prefix("https://") {
        Some(format!("http://{rest}"))
    } else {
        url.strip_prefix("http://")
            .map(|rest| format!("https://{rest}"))
    }
}

/// Toggle the trailing slash on the path, preserving query and fragment.
fn toggle_trailing_slash(url: &str) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;
    let path = parsed.path().to_string();
    let toggled = if path.ends_with('/') && path.len() > 1 {
        path.trim_end_matches('/').to_string()
    } else {
        format!("{path}/")
    };
    parsed.set_path(&toggled);
    Some(parsed.to_string())
}

/// Re-base path/query/fragment onto an alternate origin. An unparsable URL
/// gets the origin prefixed onto the raw string rather than failing early.
fn rebase_onto_origin(url: &str, origin: &str) -> String {
    let origin = origin.trim_end_matches('/');
    match Url::parse(url) {
        Ok(parsed) => format!("{}{}", origin, &parsed[Position::BeforePath..]),
        Err(_) => format!("{origin}{url}"),
    }
}
