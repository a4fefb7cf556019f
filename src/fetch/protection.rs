//! Heuristic classification of bot-protection / block pages.

/// Signature substrings served by common anti-bot vendors and block pages.
/// Matched against the lowercased body.
const BLOCK_SIGNATURES: &[&str] = &[
    "just a moment",
    "checking your browser",
    "attention required",
    "cloudflare",
    "ddos-guard",
    "access denied",
    "captcha",
    "verify you are human",
    "are you a robot",
    "enable javascript and cookies",
    "request unsuccessful. incapsula",
    "perimeterx",
];

/// Minimum plausible length for a real content page. Anything shorter is
/// treated as an anti-bot shell page.
const DEFAULT_MIN_BODY_LENGTH: usize = 2000;

/// Classifies response bodies as protection pages.
///
/// Pure function of the body text; false positives on legitimately short pages
/// are accepted as the cost of safety.
#[derive(Debug, Clone, Copy)]
pub struct ProtectionDetector {
    min_body_length: usize,
}

impl Default for ProtectionDetector {
    fn default() -> Self {
        Self {
            min_body_length: DEFAULT_MIN_BODY_LENGTH,
        }
    }
}

impl ProtectionDetector {
    /// Detector with a custom length floor.
    pub fn with_min_length(min_body_length: usize) -> Self {
        Self { min_body_length }
    }

    /// True when the body looks like a block page rather than real content.
    /// Applies both the signature table and the length floor; used for raw
    /// HTTP responses, where a near-empty body is an anti-bot shell page.
    pub fn is_blocked(&self, body: &str) -> bool {
        if body.len() < self.min_body_length {
            return true;
        }
        self.has_signature(body)
    }

    /// Signature-only check, without the length floor. Used for rendered
    /// markup: a serialized DOM is legitimately short for minimal pages.
    pub fn has_signature(&self, body: &str) -> bool {
        let lower = body.to_lowercase();
        BLOCK_SIGNATURES.iter().any(|sig| lower.contains(sig))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padded(content: &str) -> String {
        // Pad past the length floor so only signatures decide.
        format!("{}{}", content, "x".repeat(4000))
    }

    #[test]
    fn flags_every_signature() {
        let detector = ProtectionDetector::default();
        for sig in BLOCK_SIGNATURES {
            assert!(
                detector.is_blocked(&padded(sig)),
                "signature not flagged: {sig}"
            );
        }
    }

    #[test]
    fn flags_mixed_case_signatures() {
        let detector = ProtectionDetector::default();
        assert!(detector.is_blocked(&padded("<title>Just a Moment...</title>")));
        assert!(detector.is_blocked(&padded("ACCESS DENIED")));
    }

    #[test]
    fn clean_long_body_passes() {
        let detector = ProtectionDetector::default();
        let body = "a".repeat(5000);
        assert!(!detector.is_blocked(&body));
    }

    #[test]
    fn short_body_is_blocked_regardless_of_content() {
        let detector = ProtectionDetector::default();
        let body = "b".repeat(100);
        assert!(detector.is_blocked(&body));
    }

    #[test]
    fn signature_check_ignores_length_floor() {
        let detector = ProtectionDetector::default();
        assert!(!detector.has_signature("<html><body>ok</body></html>"));
        assert!(detector.has_signature("<title>Just a moment...</title>"));
    }

    #[test]
    fn length_floor_is_configurable() {
        let detector = ProtectionDetector::with_min_length(10);
        assert!(!detector.is_blocked("plain short page but fine"));
        assert!(detector.is_blocked("tiny"));
    }
}
