//! Per-invocation fetch request and its options.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Options recognized by a fetch invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchOptions {
    /// Navigation deadline in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Wait for this CSS selector before considering the page settled.
    #[serde(default)]
    pub wait_for_selector: Option<String>,

    /// Capture bodies of intercepted API/data responses.
    #[serde(default)]
    pub capture_api_responses: bool,

    /// Abort image/font/media sub-resource loads to speed up navigation.
    #[serde(default = "default_block_resources")]
    pub block_resources: bool,

    /// Proxy server address (e.g. "socks5://127.0.0.1:1080").
    #[serde(default)]
    pub proxy: Option<String>,

    /// Path to a JSON cookie file to inject before navigation.
    #[serde(default)]
    pub cookie_file: Option<PathBuf>,
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_block_resources() -> bool {
    true
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            wait_for_selector: None,
            capture_api_responses: false,
            block_resources: default_block_resources(),
            proxy: None,
            cookie_file: None,
        }
    }
}

/// Immutable value describing one fetch invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    /// Absolute target URL.
    pub url: String,
    /// Invocation options.
    #[serde(default)]
    pub options: FetchOptions,
}

impl FetchRequest {
    /// Create a request with default options.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            options: FetchOptions::default(),
        }
    }

    /// Create a request with explicit options.
    pub fn with_options(url: impl Into<String>, options: FetchOptions) -> Self {
        Self {
            url: url.into(),
            options,
        }
    }

    /// The same request re-targeted at a different URL.
    pub fn retargeted(&self, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            options: self.options.clone(),
        }
    }
}
