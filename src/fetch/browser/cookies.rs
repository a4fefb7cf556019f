//! Cookie file loading and normalization for pre-supplied sessions.

use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use super::super::FetchError;

/// One entry of the JSON cookie file. Everything past name/value is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub expires: Option<f64>,
    #[serde(default)]
    pub http_only: Option<bool>,
    #[serde(default)]
    pub secure: Option<bool>,
    #[serde(default)]
    pub same_site: Option<String>,
}

/// SameSite policy applied to injected cookies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSitePolicy {
    Lax,
    Strict,
    None,
}

impl SameSitePolicy {
    fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "strict" => Self::Strict,
            "none" => Self::None,
            _ => Self::Lax,
        }
    }
}

/// Cookie with every required field filled in, ready for injection.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSitePolicy,
    pub expires: Option<f64>,
}

/// Read and parse a JSON cookie file.
pub fn load_cookie_records(path: &Path) -> Result<Vec<CookieRecord>, FetchError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| FetchError::CookieFile(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&content)
        .map_err(|e| FetchError::CookieFile(format!("{}: {e}", path.display())))
}

/// Fill in defaults from the target URL. Entries without a usable name and
/// value are dropped rather than failing the fetch.
pub fn normalize_cookie(record: &CookieRecord, target: &Url) -> Option<NormalizedCookie> {
    let name = record.name.as_deref()?.trim();
    let value = record.value.as_deref()?;
    if name.is_empty() {
        return None;
    }

    let domain = match record.domain.as_deref().filter(|d| !d.is_empty()) {
        Some(domain) => domain.to_string(),
        None => target.host_str()?.trim_start_matches('.').to_string(),
    };

    let path = record
        .path
        .as_deref()
        .filter(|p| !p.is_empty())
        .unwrap_or("/")
        .to_string();

    Some(NormalizedCookie {
        name: name.to_string(),
        value: value.to_string(),
        domain,
        path,
        secure: record.secure.unwrap_or_else(|| target.scheme() == "https"),
        http_only: record.http_only.unwrap_or(false),
        same_site: record
            .same_site
            .as_deref()
            .map(SameSitePolicy::parse)
            .unwrap_or(SameSitePolicy::Lax),
        expires: record.expires,
    })
}

#[cfg(feature = "browser")]
pub(crate) use inject::inject_cookies;

#[cfg(feature = "browser")]
mod inject {
    use chromiumoxide::cdp::browser_protocol::network::{CookieParam, CookieSameSite};
    use chromiumoxide::Page;
    use tracing::{debug, warn};

    use super::{NormalizedCookie, SameSitePolicy};

    impl SameSitePolicy {
        fn to_cdp(self) -> CookieSameSite {
            match self {
                Self::Lax => CookieSameSite::Lax,
                Self::Strict => CookieSameSite::Strict,
                Self::None => CookieSameSite::None,
            }
        }
    }

    /// Set each cookie on the page before navigation. Individual rejects are
    /// logged and skipped.
    pub(crate) async fn inject_cookies(page: &Page, cookies: &[NormalizedCookie]) {
        debug!("injecting {} cookies", cookies.len());

        for cookie in cookies {
            let param = CookieParam::builder()
                .name(cookie.name.as_str())
                .value(cookie.value.as_str())
                .domain(cookie.domain.as_str())
                .path(cookie.path.as_str())
                .secure(cookie.secure)
                .http_only(cookie.http_only)
                .same_site(cookie.same_site.to_cdp())
                .build();

            match param {
                Ok(param) => {
                    if let Err(e) = page.set_cookie(param).await {
                        warn!("failed to set cookie {}: {}", cookie.name, e);
                    }
                }
                Err(e) => {
                    warn!("failed to build cookie {}: {}", cookie.name, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn target() -> Url {
        Url::parse("https://annas-archive.org/md5/xyz").unwrap()
    }

    fn record(name: &str, value: &str) -> CookieRecord {
        CookieRecord {
            name: Some(name.to_string()),
            value: Some(value.to_string()),
            domain: None,
            path: None,
            expires: None,
            http_only: None,
            secure: None,
            same_site: None,
        }
    }

    #[test]
    fn missing_domain_defaults_to_target_host() {
        let cookie = normalize_cookie(&record("session", "abc"), &target()).unwrap();
        assert_eq!(cookie.domain, "annas-archive.org");
    }

    #[test]
    fn missing_path_defaults_to_root() {
        let cookie = normalize_cookie(&record("session", "abc"), &target()).unwrap();
        assert_eq!(cookie.path, "/");
    }

    #[test]
    fn same_site_defaults_to_lax() {
        let cookie = normalize_cookie(&record("session", "abc"), &target()).unwrap();
        assert_eq!(cookie.same_site, SameSitePolicy::Lax);
    }

    #[test]
    fn secure_follows_target_scheme() {
        let https = normalize_cookie(&record("a", "b"), &target()).unwrap();
        assert!(https.secure);

        let http_target = Url::parse("http://example.com/").unwrap();
        let http = normalize_cookie(&record("a", "b"), &http_target).unwrap();
        assert!(!http.secure);
    }

    #[test]
    fn explicit_fields_are_kept() {
        let mut rec = record("session", "abc");
        rec.domain = Some(".annas-archive.se".to_string());
        rec.path = Some("/md5".to_string());
        rec.same_site = Some("Strict".to_string());
        rec.secure = Some(false);

        let cookie = normalize_cookie(&rec, &target()).unwrap();
        assert_eq!(cookie.domain, ".annas-archive.se");
        assert_eq!(cookie.path, "/md5");
        assert_eq!(cookie.same_site, SameSitePolicy::Strict);
        assert!(!cookie.secure);
    }

    #[test]
    fn entries_without_name_are_dropped() {
        let rec = CookieRecord {
            name: None,
            value: Some("abc".to_string()),
            domain: None,
            path: None,
            expires: None,
            http_only: None,
            secure: None,
            same_site: None,
        };
        assert!(normalize_cookie(&rec, &target()).is_none());
    }

    #[test]
    fn loads_camel_case_cookie_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name":"sid","value":"1","httpOnly":true,"sameSite":"strict"}}]"#
        )
        .unwrap();

        let records = load_cookie_records(file.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].http_only, Some(true));
        assert_eq!(records[0].same_site.as_deref(), Some("strict"));
    }

    #[test]
    fn unreadable_file_is_a_cookie_error() {
        let err = load_cookie_records(Path::new("/nonexistent/cookies.json")).unwrap_err();
        assert!(matches!(err, FetchError::CookieFile(_)));
    }
}
