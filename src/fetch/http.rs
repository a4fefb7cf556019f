//! Raw HTTP fallback tier.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::redirect::Policy;
use reqwest::Client;
use tracing::debug;

use super::{FetchError, ProtectionDetector, RawFetcher};

/// Browser user agent presented on raw HTTP requests.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

const ACCEPT_HEADER: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const ACCEPT_LANGUAGE_HEADER: &str = "en-US,en;q=0.9";

/// Any status at or above this is treated as a failed try.
const ERROR_STATUS_FLOOR: u16 = 400;

const MAX_REDIRECTS: usize = 10;
const MAX_IDLE_CONNECTIONS_PER_HOST: usize = 8;

/// Single-shot raw HTTP GET tier.
///
/// One network round trip per call; the orchestrator applies the retry policy
/// around it. TLS validation is permissive on purpose: mirror infrastructure
/// routinely serves misconfigured certificates.
pub struct HttpFetcher {
    client: Client,
    detector: ProtectionDetector,
}

impl HttpFetcher {
    /// Build the shared client with browser-like headers and keep-alive pools.
    pub fn new(
        timeout: Duration,
        proxy: Option<&str>,
        detector: ProtectionDetector,
    ) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HEADER));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static(ACCEPT_LANGUAGE_HEADER),
        );

        let mut builder = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .danger_accept_invalid_certs(true)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .pool_max_idle_per_host(MAX_IDLE_CONNECTIONS_PER_HOST);

        if let Some(proxy) = proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(Self {
            client: builder.build()?,
            detector,
        })
    }
}

#[async_trait]
impl RawFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        debug!("raw HTTP GET {}", url);
        let response = self.client.get(url).send().await?;

        let status = response.status().as_u16();
        if status >= ERROR_STATUS_FLOOR {
            return Err(FetchError::Http { status });
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(FetchError::EmptyBody);
        }
        if self.detector.is_blocked(&body) {
            return Err(FetchError::Blocked);
        }

        Ok(body)
    }
}
