//! Top-level tier orchestration: render first, raw HTTP on exhaustion.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::models::{FetchAttempt, FetchOutcome, FetchRequest, Payload, Tier};

use super::{FetchError, PageRenderer, ProtectionDetector, RawFetcher, RetryPolicy};

/// Drives the render tier to exhaustion, then the HTTP tier; short-circuits on
/// the first success at either tier. Tiers are never interleaved so a transient
/// render issue is not masked by a structurally different non-rendered response.
pub struct FetchOrchestrator {
    renderer: Arc<dyn PageRenderer>,
    http: Arc<dyn RawFetcher>,
    detector: ProtectionDetector,
    render_policy: RetryPolicy,
    http_policy: RetryPolicy,
    http_only: bool,
}

impl FetchOrchestrator {
    pub fn new(renderer: Arc<dyn PageRenderer>, http: Arc<dyn RawFetcher>) -> Self {
        Self {
            renderer,
            http,
            detector: ProtectionDetector::default(),
            render_policy: RetryPolicy::render_tier(),
            http_policy: RetryPolicy::http_tier(),
            http_only: false,
        }
    }

    /// Override the protection detector.
    pub fn with_detector(mut self, detector: ProtectionDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Skip the render tier entirely.
    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Override retry budgets.
    pub fn with_policies(mut self, render: RetryPolicy, http: RetryPolicy) -> Self {
        self.render_policy = render;
        self.http_policy = http;
        self
    }

    /// Run the full tier sequence for one request.
    ///
    /// Exactly one successful attempt terminates a successful run; all prior
    /// attempts remain in the trail. Failure is returned as data.
    pub async fn orchestrate(&self, request: &FetchRequest) -> FetchOutcome {
        let started = Instant::now();
        let mut attempts: Vec<FetchAttempt> = Vec::new();
        let mut last_error: Option<String> = None;

        if !self.http_only {
            if let Some(outcome) = self
                .render_tier(request, started, &mut attempts, &mut last_error)
                .await
            {
                return outcome;
            }
        }

        if let Some(outcome) = self
            .http_tier(request, started, &mut attempts, &mut last_error)
            .await
        {
            return outcome;
        }

        warn!("all tiers exhausted for {}", request.url);
        FetchOutcome::exhausted(attempts, last_error, elapsed_ms(started))
    }

    async fn render_tier(
        &self,
        request: &FetchRequest,
        started: Instant,
        attempts: &mut Vec<FetchAttempt>,
        last_error: &mut Option<String>,
    ) -> Option<FetchOutcome> {
        let payload = if request.options.capture_api_responses {
            Payload::Capture
        } else {
            Payload::Markup
        };

        for attempt in 1..=self.render_policy.max_attempts() {
            debug!("render attempt {} for {}", attempt, request.url);
            match self.renderer.render(request).await {
                Ok(rendered) if self.detector.has_signature(&rendered.html) => {
                    let message = FetchError::Blocked.to_string();
                    attempts.push(FetchAttempt::failed(&request.url, Tier::Render, &message));
                    *last_error = Some(message);
                }
                Ok(rendered) => {
                    info!("render succeeded for {}", request.url);
                    let mut trail = std::mem::take(attempts);
                    trail.push(FetchAttempt::succeeded(&request.url, Tier::Render, payload));
                    return Some(FetchOutcome::succeeded(
                        rendered.html,
                        rendered.captured,
                        rendered.final_url,
                        trail,
                        elapsed_ms(started),
                    ));
                }
                Err(e) => {
                    let message = e.to_string();
                    debug!("render attempt {} failed: {}", attempt, message);
                    attempts.push(FetchAttempt::failed(&request.url, Tier::Render, &message));
                    *last_error = Some(message);
                }
            }
            if self.render_policy.should_retry(attempt) {
                tokio::time::sleep(self.render_policy.delay_for(attempt)).await;
            }
        }
        None
    }

    async fn http_tier(
        &self,
        request: &FetchRequest,
        started: Instant,
        attempts: &mut Vec<FetchAttempt>,
        last_error: &mut Option<String>,
    ) -> Option<FetchOutcome> {
        for attempt in 1..=self.http_policy.max_attempts() {
            debug!("http attempt {} for {}", attempt, request.url);
            match self.http.fetch(&request.url).await {
                Ok(body) => {
                    info!("http fallback succeeded for {}", request.url);
                    let mut trail = std::mem::take(attempts);
                    trail.push(FetchAttempt::succeeded(
                        &request.url,
                        Tier::Http,
                        Payload::Markup,
                    ));
                    return Some(FetchOutcome::succeeded(
                        body,
                        Vec::new(),
                        request.url.clone(),
                        trail,
                        elapsed_ms(started),
                    ));
                }
                Err(e) => {
                    let message = e.to_string();
                    debug!("http attempt {} failed: {}", attempt, message);
                    attempts.push(FetchAttempt::failed(&request.url, Tier::Http, &message));
                    *last_error = Some(message);
                }
            }
            if self.http_policy.should_retry(attempt) {
                tokio::time::sleep(self.http_policy.delay_for(attempt)).await;
            }
        }
        None
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
