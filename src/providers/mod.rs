//! URL-to-policy lookup.
//!
//! Maps an incoming URL to the fetch policy that should handle it: the plain
//! orchestrator for arbitrary sites, or the mirror fallback chain for site
//! families known to move between domains.

use url::Url;

/// A named fetch policy for a family of hosts.
#[derive(Debug, Clone)]
pub struct Provider {
    pub name: &'static str,
    hosts: &'static [&'static str],
    /// Route through the mirror fallback chain.
    pub mirror_fallback: bool,
    /// Default readiness selector when the caller supplies none.
    pub wait_for_selector: Option<&'static str>,
}

impl Provider {
    fn matches(&self, host: &str) -> bool {
        self.hosts
            .iter()
            .any(|h| host == *h || host.ends_with(&format!(".{h}")))
    }
}

/// Linear-scan registry of known providers with a generic default.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: Vec<Provider>,
    generic: Provider,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self {
            providers: vec![Provider {
                name: "annas-archive",
                hosts: &["annas-archive.org", "annas-archive.se", "annas-archive.li"],
                mirror_fallback: true,
                wait_for_selector: Some("main"),
            }],
            generic: Provider {
                name: "generic",
                hosts: &[],
                mirror_fallback: false,
                wait_for_selector: None,
            },
        }
    }
}

impl ProviderRegistry {
    /// Resolve the provider for a URL; unknown or unparsable hosts get the
    /// generic policy.
    pub fn resolve(&self, url: &str) -> &Provider {
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_owned));

        match host {
            Some(host) => self
                .providers
                .iter()
                .find(|p| p.matches(&host))
                .unwrap_or(&self.generic),
            None => &self.generic,
        }
    }
}
