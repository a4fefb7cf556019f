//! Ranked renderer backend strategies.
//!
//! Backend availability is probed eagerly at session construction rather than
//! discovered through launch failures; the session launches the first
//! available backend and demotes down the list when a launch fails.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

#[cfg(feature = "browser")]
use super::super::FetchError;

/// Well-known system browser install locations.
const SYSTEM_BROWSER_PATHS: &[&str] = &[
    // Linux
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    // macOS
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    // Common install locations
    "/opt/google/chrome/google-chrome",
];

/// Commands probed on PATH when no install location matches.
const SYSTEM_BROWSER_COMMANDS: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
];

/// Kind of rendering-engine backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// A locally-installed full browser.
    System,
    /// A minimal pinned chromium downloaded into the cache directory.
    Managed,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Managed => write!(f, "managed"),
        }
    }
}

/// One renderer backend strategy with a uniform availability check.
#[derive(Debug, Clone)]
pub struct RendererBackend {
    kind: BackendKind,
    executable: Option<PathBuf>,
}

impl RendererBackend {
    /// The ranked backend list: system browser first, managed download second.
    /// The system executable is resolved now, not at launch time.
    pub fn ranked(executable_override: Option<&Path>) -> Vec<Self> {
        vec![
            Self {
                kind: BackendKind::System,
                executable: locate_system_browser(executable_override),
            },
            Self {
                kind: BackendKind::Managed,
                executable: None,
            },
        ]
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Whether this backend can be attempted at all.
    pub fn available(&self) -> bool {
        match self.kind {
            BackendKind::System => self.executable.is_some(),
            // The managed backend downloads on demand.
            BackendKind::Managed => true,
        }
    }

    /// Resolve the concrete executable path for a launch attempt.
    #[cfg(feature = "browser")]
    pub(crate) async fn resolve_executable(&self) -> Result<PathBuf, FetchError> {
        match self.kind {
            BackendKind::System => self.executable.clone().ok_or_else(|| {
                FetchError::BrowserUnavailable("no system browser installed".into())
            }),
            BackendKind::Managed => download_managed_browser().await,
        }
    }
}

/// Locate a system browser: explicit override, known paths, then PATH lookup.
fn locate_system_browser(executable_override: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = executable_override {
        if path.exists() {
            info!("using browser executable override: {}", path.display());
            return Some(path.to_path_buf());
        }
        warn!(
            "browser executable override points to a missing file: {}",
            path.display()
        );
    }

    for candidate in SYSTEM_BROWSER_PATHS {
        let path = Path::new(candidate);
        if path.exists() {
            info!("found browser at {}", path.display());
            return Some(path.to_path_buf());
        }
    }

    for command in SYSTEM_BROWSER_COMMANDS {
        if let Ok(path) = which::which(command) {
            info!("found browser on PATH: {}", path.display());
            return Some(path);
        }
    }

    None
}

/// Download (or reuse) the managed minimal chromium and return its executable.
#[cfg(feature = "browser")]
async fn download_managed_browser() -> Result<PathBuf, FetchError> {
    use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};

    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("pagefetch")
        .join("chromium");
    std::fs::create_dir_all(&cache_dir)
        .map_err(|e| FetchError::BrowserUnavailable(format!("cache dir: {e}")))?;

    info!("fetching managed chromium into {}", cache_dir.display());

    let options = BrowserFetcherOptions::builder()
        .with_path(&cache_dir)
        .build()
        .map_err(|e| FetchError::BrowserUnavailable(format!("fetcher options: {e}")))?;

    let revision = BrowserFetcher::new(options)
        .fetch()
        .await
        .map_err(|e| FetchError::BrowserUnavailable(format!("chromium download: {e}")))?;

    Ok(revision.executable_path)
}
