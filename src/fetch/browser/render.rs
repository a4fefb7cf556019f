//! Per-request rendering on a shared browser session.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventResponseReceived, GetResponseBodyParams, SetBlockedUrLsParams,
    SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::models::{CapturedBody, CapturedResponse, FetchRequest};

use super::super::http::BROWSER_USER_AGENT;
use super::super::{FetchError, PageRenderer, Rendered};
use super::{cookies, stealth, BrowserSession};

/// Fixed delay after navigation for client-side hydration.
const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Deadline for site-specific content markers; deliberately shorter than the
/// navigation timeout since these waits are best-effort.
const SITE_MARKER_TIMEOUT_MS: u64 = 5_000;

/// JavaScript to wait for page ready state. DOMContentLoaded is the readiness
/// signal; network-idle would never fire on pages with background polling.
const WAIT_FOR_READY_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete' || document.readyState === 'interactive') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
"#;

/// URL patterns aborted when resource blocking is on.
const BLOCKED_RESOURCE_PATTERNS: &[&str] = &[
    "*.png", "*.jpg", "*.jpeg", "*.gif", "*.webp", "*.avif", "*.svg", "*.ico", "*.woff",
    "*.woff2", "*.ttf", "*.otf", "*.mp3", "*.mp4", "*.webm", "*.ogg",
];

/// Browser-rendering tier over a shared [`BrowserSession`].
pub struct BrowserRenderer {
    session: Arc<BrowserSession>,
}

impl BrowserRenderer {
    pub fn new(session: Arc<BrowserSession>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl PageRenderer for BrowserRenderer {
    async fn render(&self, request: &FetchRequest) -> Result<Rendered, FetchError> {
        let page = self.session.acquire_page().await?;

        // Inner function so the page is closed on every exit path.
        let result = render_on_page(&page, request).await;
        let _ = page.close().await;
        result
    }
}

async fn render_on_page(page: &Page, request: &FetchRequest) -> Result<Rendered, FetchError> {
    let target = Url::parse(&request.url)
        .map_err(|e| FetchError::InvalidUrl(format!("{}: {e}", request.url)))?;

    page.execute(SetUserAgentOverrideParams::new(
        BROWSER_USER_AGENT.to_string(),
    ))
    .await
    .map_err(render_err)?;

    if request.options.block_resources {
        let patterns: Vec<String> = BLOCKED_RESOURCE_PATTERNS
            .iter()
            .map(|p| (*p).to_string())
            .collect();
        page.execute(SetBlockedUrLsParams::new(patterns))
            .await
            .map_err(render_err)?;
    }

    if let Some(cookie_file) = &request.options.cookie_file {
        let records = cookies::load_cookie_records(cookie_file)?;
        let normalized: Vec<_> = records
            .iter()
            .filter_map(|record| cookies::normalize_cookie(record, &target))
            .collect();
        cookies::inject_cookies(page, &normalized).await;
    }

    let capture = if request.options.capture_api_responses {
        Some(CaptureHandle::start(page).await?)
    } else {
        None
    };

    navigate(page, &request.url, request.options.timeout_ms).await?;
    wait_for_page_ready(page, request.options.timeout_ms).await;
    tokio::time::sleep(SETTLE_DELAY).await;

    stealth::apply_stealth(page).await;

    if let Some(selector) = &request.options.wait_for_selector {
        wait_for_selector(page, selector, request.options.timeout_ms).await;
    }
    if let Some(selector) = site_content_selector(&target) {
        wait_for_selector(page, selector, SITE_MARKER_TIMEOUT_MS).await;
    }

    let final_url = page
        .url()
        .await
        .map_err(render_err)?
        .map(|u| u.to_string())
        .unwrap_or_else(|| request.url.clone());
    let html = page.content().await.map_err(render_err)?;

    let captured = match capture {
        Some(handle) => handle.finish().await,
        None => Vec::new(),
    };

    Ok(Rendered {
        html,
        final_url,
        captured,
    })
}

fn render_err(e: impl std::fmt::Display) -> FetchError {
    FetchError::Render(e.to_string())
}

async fn navigate(page: &Page, url: &str, timeout_ms: u64) -> Result<(), FetchError> {
    info!("navigating to {}", url);
    let params = NavigateParams::builder()
        .url(url)
        .build()
        .map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;

    tokio::time::timeout(Duration::from_millis(timeout_ms), page.execute(params))
        .await
        .map_err(|_| FetchError::NavigationTimeout(timeout_ms))?
        .map_err(|e| FetchError::Render(format!("navigation failed for {url}: {e}")))?;

    Ok(())
}

/// Wait for the page to reach a ready state. Tolerates failure: a non-HTML
/// response cannot run the script and still has retrievable content.
async fn wait_for_page_ready(page: &Page, timeout_ms: u64) {
    match tokio::time::timeout(
        Duration::from_millis(timeout_ms),
        page.evaluate(WAIT_FOR_READY_SCRIPT.to_string()),
    )
    .await
    {
        Ok(Ok(result)) => {
            let state: String = result
                .into_value()
                .unwrap_or_else(|_| "unknown".to_string());
            debug!("page ready state: {}", state);
        }
        Ok(Err(e)) => {
            debug!("could not check ready state (possibly non-HTML page): {}", e);
        }
        Err(_) => {
            warn!("timeout waiting for page ready state");
        }
    }
}

/// Best-effort wait for a readiness selector; timeouts are tolerated.
async fn wait_for_selector(page: &Page, selector: &str, timeout_ms: u64) {
    debug!("waiting for selector: {}", selector);
    match tokio::time::timeout(
        Duration::from_millis(timeout_ms),
        page.find_element(selector),
    )
    .await
    {
        Ok(Ok(_)) => debug!("selector found"),
        Ok(Err(e)) => warn!("selector not found: {}", e),
        Err(_) => warn!("timeout waiting for selector"),
    }
}

/// Extra readiness marker for recognized site path shapes.
fn site_content_selector(url: &Url) -> Option<&'static str> {
    let host = url.host_str()?;
    if host.contains("annas-archive") && url.path().starts_with("/search") {
        return Some(r#"a[href*="/md5/"]"#);
    }
    None
}

/// Heuristic for API/data endpoints worth capturing.
fn looks_like_data_endpoint(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    let path = lower.split(['?', '#']).next().unwrap_or_default();
    path.contains("/api/") || path.ends_with(".json") || lower.contains("graphql")
}

/// Background collector for intercepted API responses.
struct CaptureHandle {
    task: tokio::task::JoinHandle<()>,
    store: Arc<Mutex<Vec<CapturedResponse>>>,
}

impl CaptureHandle {
    async fn start(page: &Page) -> Result<Self, FetchError> {
        page.execute(EnableParams::default())
            .await
            .map_err(render_err)?;
        let mut events = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(render_err)?;

        let store = Arc::new(Mutex::new(Vec::new()));
        let collector = Arc::clone(&store);
        let capture_page = page.clone();

        let task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let url = event.response.url.clone();
                if !looks_like_data_endpoint(&url) {
                    continue;
                }
                let body = match capture_page
                    .execute(GetResponseBodyParams::new(event.request_id.clone()))
                    .await
                {
                    Ok(response) => {
                        if response.result.base64_encoded {
                            continue;
                        }
                        response.result.body.clone()
                    }
                    // Body evicted or still streaming; skip rather than stall.
                    Err(_) => continue,
                };

                let captured = match serde_json::from_str::<serde_json::Value>(&body) {
                    Ok(value) => CapturedBody::Json(value),
                    Err(_) => CapturedBody::Text(body),
                };
                collector
                    .lock()
                    .await
                    .push(CapturedResponse { url, body: captured });
            }
        });

        Ok(Self { task, store })
    }

    async fn finish(self) -> Vec<CapturedResponse> {
        self.task.abort();
        let mut store = self.store.lock().await;
        std::mem::take(&mut *store)
    }
}
