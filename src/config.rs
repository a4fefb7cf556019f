//! Environment-level configuration switches.

use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;

/// Force HTTP-only mode, skipping browser rendering entirely.
pub const ENV_HTTP_ONLY: &str = "PAGEFETCH_HTTP_ONLY";
/// Override path to the rendering-engine executable.
pub const ENV_BROWSER: &str = "PAGEFETCH_BROWSER";
/// Proxy address for both tiers.
pub const ENV_PROXY: &str = "PAGEFETCH_PROXY";
/// Navigation timeout override in milliseconds.
pub const ENV_TIMEOUT_MS: &str = "PAGEFETCH_TIMEOUT_MS";
/// Length floor below which a body is treated as a protection shell page.
pub const ENV_MIN_BODY_LENGTH: &str = "PAGEFETCH_MIN_BODY_LENGTH";

/// Process-level settings consumed by tier construction.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub http_only: bool,

    #[serde(default)]
    pub browser_executable: Option<PathBuf>,

    #[serde(default)]
    pub proxy: Option<String>,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_min_body_length")]
    pub min_body_length: usize,
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_min_body_length() -> usize {
    2_000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            http_only: false,
            browser_executable: None,
            proxy: None,
            timeout_ms: default_timeout_ms(),
            min_body_length: default_min_body_length(),
        }
    }
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self {
            http_only: env_flag(ENV_HTTP_ONLY),
            browser_executable: std::env::var_os(ENV_BROWSER).map(PathBuf::from),
            proxy: std::env::var(ENV_PROXY).ok().filter(|s| !s.is_empty()),
            timeout_ms: env_parse(ENV_TIMEOUT_MS).unwrap_or_else(default_timeout_ms),
            min_body_length: env_parse(ENV_MIN_BODY_LENGTH)
                .unwrap_or_else(default_min_body_length),
        }
    }
}

fn env_flag(name: &str) -> bool {
    matches!(
        std::env::var(name).ok().as_deref(),
        Some("1") | Some("true") | Some("yes")
    )
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
