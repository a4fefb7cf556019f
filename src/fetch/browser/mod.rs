//! Browser-rendering tier.
//!
//! Keeps one process-wide chromium instance warm behind an explicit
//! Uninitialized -> Ready -> Failed lifecycle; pages are created per request
//! and closed on every exit path. Launch failures demote to the next ranked
//! backend once; exhaustion reports the render tier unavailable and leaves
//! the fallback decision to the orchestrator.

mod backend;
mod cookies;
#[cfg(feature = "browser")]
mod render;
#[cfg(feature = "browser")]
mod stealth;

pub use backend::{BackendKind, RendererBackend};
pub use cookies::{load_cookie_records, normalize_cookie, CookieRecord, NormalizedCookie, SameSitePolicy};

use std::path::PathBuf;

#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;
#[cfg(feature = "browser")]
use tokio::sync::Mutex;
#[cfg(feature = "browser")]
use tracing::{info, warn};

use super::FetchError;

/// Chrome arguments applied to every launch.
#[cfg(feature = "browser")]
const LAUNCH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-dev-shm-usage",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-background-networking",
    "--disable-sync",
    "--disable-translate",
    "--metrics-recording-only",
    "--safebrowsing-disable-auto-update",
    "--no-sandbox",
    "--disable-gpu",
    "--disable-software-rasterizer",
];

#[cfg(feature = "browser")]
enum SessionState {
    Uninitialized,
    Ready(BrowserHandle),
    Failed,
}

#[cfg(feature = "browser")]
struct BrowserHandle {
    browser: Browser,
    handler_task: tokio::task::JoinHandle<()>,
}

#[cfg(feature = "browser")]
impl Drop for BrowserHandle {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

/// Process-wide, lazily-initialized handle to the rendering engine.
///
/// Shared across concurrent fetches; each fetch gets its own page. The session
/// itself is only replaced after a launch or page-creation failure.
pub struct BrowserSession {
    #[cfg(feature = "browser")]
    state: Mutex<SessionState>,
    backends: Vec<RendererBackend>,
    proxy: Option<String>,
}

impl BrowserSession {
    /// Probe the ranked backends eagerly and start uninitialized.
    pub fn new(executable_override: Option<PathBuf>, proxy: Option<String>) -> Self {
        let backends = RendererBackend::ranked(executable_override.as_deref());
        Self {
            #[cfg(feature = "browser")]
            state: Mutex::new(SessionState::Uninitialized),
            backends,
            proxy,
        }
    }

    /// The ranked backends this session will try, in order.
    pub fn backends(&self) -> &[RendererBackend] {
        &self.backends
    }
}

#[cfg(feature = "browser")]
impl BrowserSession {
    /// Get a fresh page from the live browser, launching it first if needed.
    pub(crate) async fn acquire_page(&self) -> Result<Page, FetchError> {
        let mut state = self.state.lock().await;

        if matches!(*state, SessionState::Failed) {
            *state = SessionState::Uninitialized;
        }
        if matches!(*state, SessionState::Uninitialized) {
            *state = SessionState::Ready(self.launch().await?);
        }

        let page_result = match &*state {
            SessionState::Ready(handle) => handle.browser.new_page("about:blank").await,
            _ => {
                return Err(FetchError::BrowserUnavailable(
                    "session not ready after launch".into(),
                ))
            }
        };

        match page_result {
            Ok(page) => Ok(page),
            Err(e) => {
                // A dead websocket means the browser process is gone; force a
                // relaunch on the next acquisition.
                *state = SessionState::Failed;
                Err(FetchError::BrowserUnavailable(format!(
                    "page creation failed: {e}"
                )))
            }
        }
    }

    async fn launch(&self) -> Result<BrowserHandle, FetchError> {
        let mut last_error: Option<FetchError> = None;

        for backend in self.backends.iter().filter(|b| b.available()) {
            let executable = match backend.resolve_executable().await {
                Ok(path) => path,
                Err(e) => {
                    warn!("backend {} unavailable: {}", backend.kind(), e);
                    last_error = Some(e);
                    continue;
                }
            };
            match launch_with_executable(&executable, self.proxy.as_deref()).await {
                Ok(handle) => {
                    info!(
                        "browser ready via {} backend ({})",
                        backend.kind(),
                        executable.display()
                    );
                    return Ok(handle);
                }
                Err(e) => {
                    warn!("backend {} launch failed: {}", backend.kind(), e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            FetchError::BrowserUnavailable("no renderer backend available".into())
        }))
    }
}

#[cfg(feature = "browser")]
async fn launch_with_executable(
    executable: &std::path::Path,
    proxy: Option<&str>,
) -> Result<BrowserHandle, FetchError> {
    info!("launching browser at {}", executable.display());

    let mut builder = BrowserConfig::builder().chrome_executable(executable.to_path_buf());

    if let Some(proxy) = proxy {
        builder = builder.arg(format!("--proxy-server={proxy}"));
    }
    for arg in LAUNCH_ARGS {
        builder = builder.arg(*arg);
    }

    let config = builder
        .build()
        .map_err(|e| FetchError::BrowserUnavailable(format!("browser config: {e}")))?;

    let (browser, mut handler) = Browser::launch(config)
        .await
        .map_err(|e| FetchError::BrowserUnavailable(format!("launch failed: {e}")))?;

    let handler_task = tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    Ok(BrowserHandle {
        browser,
        handler_task,
    })
}

#[cfg(feature = "browser")]
pub use render::BrowserRenderer;

// Stub for when browser support is disabled at compile time.
#[cfg(not(feature = "browser"))]
pub struct BrowserRenderer;

#[cfg(not(feature = "browser"))]
impl BrowserRenderer {
    pub fn new(_session: std::sync::Arc<BrowserSession>) -> Self {
        Self
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait::async_trait]
impl super::PageRenderer for BrowserRenderer {
    async fn render(
        &self,
        _request: &crate::models::FetchRequest,
    ) -> Result<super::Rendered, FetchError> {
        Err(FetchError::BrowserUnavailable(
            "browser support not compiled. Rebuild with: cargo build --features browser".into(),
        ))
    }
}
