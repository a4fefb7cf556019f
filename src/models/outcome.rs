//! Fetch attempt trail and terminal outcome types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which fetch strategy produced an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Browser-rendering tier.
    Render,
    /// Raw HTTP tier.
    Http,
}

/// Shape of the payload an attempt produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    /// Page markup text.
    Markup,
    /// Markup plus captured API responses.
    Capture,
}

/// Body of one captured in-page API response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapturedBody {
    /// Body parsed as structured data.
    Json(serde_json::Value),
    /// Raw text fallback when the body is not valid JSON.
    Text(String),
}

/// One in-page network response recorded during rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedResponse {
    /// URL of the intercepted request.
    pub url: String,
    /// Captured body.
    pub body: CapturedBody,
}

/// Record of one physical network try. Append-only; never mutated after append.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchAttempt {
    /// The URL actually used (may differ from the original after a transformation).
    pub url: String,
    /// Tier that produced the attempt.
    pub tier: Tier,
    /// Whether the attempt yielded usable content.
    pub success: bool,
    /// Error message when the attempt failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Shape of the returned payload.
    pub payload: Payload,
}

impl FetchAttempt {
    /// Record a successful try.
    pub fn succeeded(url: impl Into<String>, tier: Tier, payload: Payload) -> Self {
        Self {
            url: url.into(),
            tier,
            success: true,
            error: None,
            payload,
        }
    }

    /// Record a failed try.
    pub fn failed(url: impl Into<String>, tier: Tier, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            tier,
            success: false,
            error: Some(error.into()),
            payload: Payload::Markup,
        }
    }
}

/// Terminal result of one orchestration run.
///
/// Constructed once at the end of the run and returned to the caller; ordinary
/// fetch failure is reported here as data, never as an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchOutcome {
    /// Whether any tier produced usable markup.
    pub success: bool,
    /// Final markup text, when successful.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    /// Captured API responses, when capture was enabled.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub captured: Vec<CapturedResponse>,
    /// Ordered, append-only trail of every physical try.
    pub attempts: Vec<FetchAttempt>,
    /// The URL that finally succeeded, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
    /// Total elapsed wall-clock time in milliseconds.
    pub elapsed_ms: u64,
    /// When the outcome was constructed.
    pub fetched_at: DateTime<Utc>,
    /// Last recorded error message when every tier exhausted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FetchOutcome {
    /// Build a success outcome.
    pub fn succeeded(
        html: String,
        captured: Vec<CapturedResponse>,
        final_url: String,
        attempts: Vec<FetchAttempt>,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            success: true,
            html: Some(html),
            captured,
            attempts,
            final_url: Some(final_url),
            elapsed_ms,
            fetched_at: Utc::now(),
            error: None,
        }
    }

    /// Build a failure outcome carrying the last error and the full trail.
    pub fn exhausted(attempts: Vec<FetchAttempt>, error: Option<String>, elapsed_ms: u64) -> Self {
        Self {
            success: false,
            html: None,
            captured: Vec::new(),
            attempts,
            final_url: None,
            elapsed_ms,
            fetched_at: Utc::now(),
            error,
        }
    }

    /// Length of the final markup, zero when absent.
    pub fn html_length(&self) -> usize {
        self.html.as_deref().map(str::len).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_records_error_only_on_failure() {
        let ok = FetchAttempt::succeeded("https://example.com", Tier::Render, Payload::Markup);
        assert!(ok.success);
        assert!(ok.error.is_none());

        let bad = FetchAttempt::failed("https://example.com", Tier::Http, "connection reset");
        assert!(!bad.success);
        assert_eq!(bad.error.as_deref(), Some("connection reset"));
    }

    #[test]
    fn captured_body_serializes_tagged() {
        let json = CapturedBody::Json(serde_json::json!({"total": 3}));
        let s = serde_json::to_string(&json).unwrap();
        assert!(s.contains("\"json\""));

        let text = CapturedBody::Text("not json".into());
        let s = serde_json::to_string(&text).unwrap();
        assert!(s.contains("\"text\""));
    }

    #[test]
    fn outcome_html_length() {
        let outcome = FetchOutcome::succeeded(
            "<html><body>ok</body></html>".into(),
            Vec::new(),
            "https://example.com".into(),
            vec![FetchAttempt::succeeded(
                "https://example.com",
                Tier::Render,
                Payload::Markup,
            )],
            12,
        );
        assert_eq!(outcome.html_length(), 28);
        assert!(outcome.success);
    }
}
