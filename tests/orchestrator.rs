//! Tier orchestration and fallback chain behavior over scripted tiers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use pagefetch::fetch::{
    FallbackChainWalker, FallbackStage, FetchOrchestrator, PageRenderer, RawFetcher, Rendered,
    RetryPolicy,
};
use pagefetch::models::{FetchOptions, FetchRequest, Tier};
use pagefetch::{FetchError, PageFetcher};

const LONG_BODY_LEN: usize = 5000;

fn long_html() -> String {
    format!("<html><body>{}</body></html>", "content ".repeat(LONG_BODY_LEN / 8))
}

/// Renderer scripted to succeed with fixed markup or always fail.
struct ScriptedRenderer {
    html: Option<String>,
    urls: Mutex<Vec<String>>,
}

impl ScriptedRenderer {
    fn succeeding(html: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            html: Some(html.into()),
            urls: Mutex::new(Vec::new()),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            html: None,
            urls: Mutex::new(Vec::new()),
        })
    }

    fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageRenderer for ScriptedRenderer {
    async fn render(&self, request: &FetchRequest) -> Result<Rendered, FetchError> {
        self.urls.lock().unwrap().push(request.url.clone());
        match &self.html {
            Some(html) => Ok(Rendered {
                html: html.clone(),
                final_url: request.url.clone(),
                captured: Vec::new(),
            }),
            None => Err(FetchError::Render("renderer down".into())),
        }
    }
}

/// Raw fetcher scripted to fail a fixed number of calls before succeeding.
struct ScriptedFetcher {
    body: Option<String>,
    fail_calls: usize,
    calls: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    fn succeeding(body: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            body: Some(body.into()),
            fail_calls: 0,
            calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            body: None,
            fail_calls: usize::MAX,
            calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        })
    }

    fn succeeding_after(fail_calls: usize, body: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            body: Some(body.into()),
            fail_calls,
            calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        })
    }

    fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RawFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.urls.lock().unwrap().push(url.to_string());
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.body {
            Some(body) if call >= self.fail_calls => Ok(body.clone()),
            _ => Err(FetchError::Http { status: 503 }),
        }
    }
}

fn request(url: &str) -> FetchRequest {
    FetchRequest::with_options(url, FetchOptions::default())
}

fn dedup_consecutive(urls: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for url in urls {
        if out.last() != Some(url) {
            out.push(url.clone());
        }
    }
    out
}

#[tokio::test]
async fn render_exhaustion_falls_back_to_http() {
    let renderer = ScriptedRenderer::failing();
    let fetcher = ScriptedFetcher::succeeding(long_html());
    let orchestrator =
        FetchOrchestrator::new(renderer.clone(), fetcher.clone());

    let outcome = orchestrator.orchestrate(&request("https://example.com/page")).await;

    assert!(outcome.success);
    // Render budget fully spent, then exactly one successful HTTP attempt.
    assert_eq!(outcome.attempts.len(), 3);
    for attempt in &outcome.attempts[..2] {
        assert_eq!(attempt.tier, Tier::Render);
        assert!(!attempt.success);
        assert!(attempt.error.is_some());
    }
    let last = outcome.attempts.last().unwrap();
    assert_eq!(last.tier, Tier::Http);
    assert!(last.success);
}

#[tokio::test]
async fn renderer_success_short_circuits() {
    let renderer = ScriptedRenderer::succeeding("<html><body>ok</body></html>");
    let fetcher = ScriptedFetcher::failing();
    let orchestrator =
        FetchOrchestrator::new(renderer.clone(), fetcher.clone());

    let outcome = orchestrator.orchestrate(&request("https://example.com")).await;

    assert!(outcome.success);
    assert_eq!(outcome.attempts.len(), 1);
    assert_eq!(outcome.attempts[0].tier, Tier::Render);
    assert_eq!(outcome.html_length(), 28);
    assert_eq!(outcome.final_url.as_deref(), Some("https://example.com"));
    // HTTP tier never consulted.
    assert!(fetcher.urls().is_empty());
}

#[tokio::test]
async fn exhausted_tiers_return_failure_as_data() {
    let renderer = ScriptedRenderer::failing();
    let fetcher = ScriptedFetcher::failing();
    let orchestrator =
        FetchOrchestrator::new(renderer.clone(), fetcher.clone())
            .with_policies(
                RetryPolicy::new(2, Duration::ZERO),
                RetryPolicy::new(3, Duration::ZERO),
            );

    let outcome = orchestrator.orchestrate(&request("https://example.com/page")).await;

    assert!(!outcome.success);
    assert!(outcome.html.is_none());
    assert_eq!(outcome.attempts.len(), 5);
    assert!(outcome.attempts.iter().all(|a| !a.success));
    assert_eq!(outcome.error.as_deref(), Some("HTTP status 503"));
}

#[tokio::test]
async fn http_only_mode_skips_render_tier() {
    let renderer = ScriptedRenderer::succeeding(long_html());
    let fetcher = ScriptedFetcher::succeeding(long_html());
    let orchestrator =
        FetchOrchestrator::new(renderer.clone(), fetcher.clone())
            .http_only(true);

    let outcome = orchestrator.orchestrate(&request("https://example.com")).await;

    assert!(outcome.success);
    assert_eq!(outcome.attempts.len(), 1);
    assert_eq!(outcome.attempts[0].tier, Tier::Http);
    assert!(renderer.urls().is_empty());
}

fn fast_walker(
    renderer: Arc<ScriptedRenderer>,
    fetcher: Arc<ScriptedFetcher>,
) -> FallbackChainWalker {
    let orchestrator = Arc::new(
        FetchOrchestrator::new(renderer, fetcher.clone()).with_policies(
            RetryPolicy::new(1, Duration::ZERO),
            RetryPolicy::new(1, Duration::ZERO),
        ),
    );
    FallbackChainWalker::new(orchestrator, fetcher)
}

#[tokio::test]
async fn walker_attempts_states_in_order() {
    let renderer = ScriptedRenderer::failing();
    let fetcher = ScriptedFetcher::failing();
    let walker = fast_walker(Arc::clone(&renderer), Arc::clone(&fetcher));

    let outcome = walker
        .walk(&request("https://annas-archive.org/md5/xyz"))
        .await
        .unwrap();

    assert!(!outcome.success);
    assert!(outcome.stage.is_none());
    assert!(outcome.error.is_some());

    // Candidate order across states, with the path preserved verbatim.
    let candidates = dedup_consecutive(&renderer.urls());
    assert_eq!(
        candidates,
        vec![
            "https://annas-archive.org/md5/xyz".to_string(),
            "http://annas-archive.org/md5/xyz".to_string(),
            "https://annas-archive.org/md5/xyz/".to_string(),
            "https://annas-archive.se/md5/xyz".to_string(),
            "https://annas-archive.li/md5/xyz".to_string(),
        ]
    );

    // The raw-HTTP last resort hits the original URL directly.
    let http_urls = fetcher.urls();
    assert_eq!(
        http_urls.last().map(String::as_str),
        Some("https://annas-archive.org/md5/xyz")
    );

    // The cross-state trail records every physical try.
    let last = outcome.attempts.last().unwrap();
    assert_eq!(last.tier, Tier::Http);
    assert!(!last.success);
}

#[tokio::test]
async fn walker_selects_original_state_when_renderer_succeeds() {
    let renderer = ScriptedRenderer::succeeding(long_html());
    let fetcher = ScriptedFetcher::failing();
    let walker = fast_walker(Arc::clone(&renderer), Arc::clone(&fetcher));

    for _ in 0..2 {
        let outcome = walker
            .walk(&request("https://annas-archive.org/md5/xyz"))
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.stage, Some(FallbackStage::Original));
        assert_eq!(outcome.url.as_deref(), Some("https://annas-archive.org/md5/xyz"));
        assert_eq!(outcome.html_length, long_html().len());
        assert_eq!(outcome.attempts.len(), 1);
    }

    // Mirrors were never consulted on either walk.
    assert!(renderer
        .urls()
        .iter()
        .all(|url| url == "https://annas-archive.org/md5/xyz"));
}

#[tokio::test]
async fn walker_raw_http_last_resort() {
    let renderer = ScriptedRenderer::failing();
    // Eight orchestrated calls fail (2+2+2 shaped states, 2 mirrors); the
    // ninth call is the direct raw-HTTP last resort.
    let fetcher = ScriptedFetcher::succeeding_after(8, long_html());
    let walker = fast_walker(Arc::clone(&renderer), Arc::clone(&fetcher));

    let outcome = walker
        .walk(&request("https://annas-archive.org/md5/xyz"))
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.stage, Some(FallbackStage::RawHttp));
    assert_eq!(outcome.url.as_deref(), Some("https://annas-archive.org/md5/xyz"));
    let last = outcome.attempts.last().unwrap();
    assert!(last.success);
    assert_eq!(last.tier, Tier::Http);
}

#[tokio::test]
async fn walker_rejects_empty_url() {
    let renderer = ScriptedRenderer::failing();
    let fetcher = ScriptedFetcher::failing();
    let walker = fast_walker(renderer, fetcher);

    let err = walker.walk(&request("  ")).await.unwrap_err();
    assert!(matches!(err, FetchError::InvalidUrl(_)));
}

#[tokio::test]
async fn page_fetcher_rejects_empty_url() {
    let fetcher = PageFetcher::new(&pagefetch::config::Settings::default()).unwrap();
    let err = fetcher
        .fetch("", FetchOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::InvalidUrl(_)));
}
