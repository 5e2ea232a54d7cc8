// src/checker/normalize.rs
// =============================================================================
// This module turns raw strings (seed lines, extracted links) into
// canonical URLs that can be compared, deduplicated and grouped by domain.
//
// Steps:
// 1. Trim and lower-case the whole string (path and query included)
// 2. Add http:// when no scheme is given
// 3. Reject forbidden ports and blocked domains
// 4. Drop tracking/auth query parameters, keep the rest in order
// 5. Strip trailing slashes from the path
//
// Lower-casing the path can mismatch case-sensitive servers. That is an
// accepted limitation of the scanner, not something to fix here.
// =============================================================================

use crate::error::NormalizeError;
use std::collections::HashSet;
use std::fmt;
use url::Url;

/// Anything that can answer "is this domain blocked?"
pub trait BlockList {
    fn is_blocked(&self, domain: &str) -> bool;
}

impl BlockList for HashSet<String> {
    fn is_blocked(&self, domain: &str) -> bool {
        self.contains(domain)
    }
}

/// A URL in canonical form together with its domain (host[:port]).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedUrl {
    url: String,
    domain: String,
    path: String,
}

impl NormalizedUrl {
    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Path without trailing slashes; empty for the site root
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    forbidden_ports: HashSet<u16>,
    stripped_prefixes: Vec<String>,
}

impl Normalizer {
    pub fn new(forbidden_ports: HashSet<u16>, stripped_prefixes: Vec<String>) -> Self {
        Self {
            forbidden_ports,
            stripped_prefixes,
        }
    }

    pub fn normalize(
        &self,
        raw: &str,
        blocked: &impl BlockList,
    ) -> Result<NormalizedUrl, NormalizeError> {
        let lowered = raw.trim().to_lowercase();
        let candidate = if lowered.starts_with("http://") || lowered.starts_with("https://") {
            lowered
        } else {
            format!("http://{}", lowered)
        };

        let parsed = match Url::parse(&candidate) {
            Ok(url) => url,
            Err(source) => {
                return Err(NormalizeError::Invalid {
                    url: candidate,
                    source,
                })
            }
        };

        let host = match parsed.host_str() {
            Some(host) if !host.is_empty() => host,
            _ => return Err(NormalizeError::MissingHost(candidate)),
        };

        // `port()` is None for the scheme's default port
        let domain = match parsed.port() {
            Some(port) if self.forbidden_ports.contains(&port) => {
                return Err(NormalizeError::ForbiddenPort {
                    url: candidate,
                    port,
                })
            }
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        if blocked.is_blocked(&domain) {
            return Err(NormalizeError::DomainBlocked(domain));
        }

        // The parser percent-encodes with upper-case hex (é -> %C3%A9), so
        // lower-case again after serialization or a second pass differs.
        let path = parsed.path().trim_end_matches('/').to_lowercase();

        let mut url = format!("{}://{}{}", parsed.scheme(), domain, path);
        if let Some(query) = parsed.query().map(|q| self.strip_query(q)) {
            if !query.is_empty() {
                url.push('?');
                url.push_str(&query.to_lowercase());
            }
        }
        if let Some(fragment) = parsed.fragment().filter(|f| !f.is_empty()) {
            url.push('#');
            url.push_str(&fragment.to_lowercase());
        }

        Ok(NormalizedUrl { url, domain, path })
    }

    fn strip_query(&self, query: &str) -> String {
        query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .filter(|pair| {
                let key = pair.split('=').next().unwrap_or_default();
                !self
                    .stripped_prefixes
                    .iter()
                    .any(|prefix| key.starts_with(prefix.as_str()))
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanConfig;

    fn normalizer() -> Normalizer {
        let config = ScanConfig::default();
        Normalizer::new(config.forbidden_ports, config.stripped_query_prefixes)
    }

    fn none() -> HashSet<String> {
        HashSet::new()
    }

    #[test]
    fn test_adds_scheme_and_strips_slash() {
        let url = normalizer().normalize("  A.Example/ ", &none()).unwrap();
        assert_eq!(url.as_str(), "http://a.example");
        assert_eq!(url.domain(), "a.example");
        assert_eq!(url.path(), "");
    }

    #[test]
    fn test_lowercases_path_and_query() {
        let url = normalizer()
            .normalize("https://Host.Example/Docs/Index.HTML?Page=2", &none())
            .unwrap();
        assert_eq!(url.as_str(), "https://host.example/docs/index.html?page=2");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "a.example/",
            "https://b.example:8443/x/y/?q=1&utm_source=x#frag",
            "http://c.example//",
            "d.example/path with space/?a=&b=2",
            "http://[::1]:8080/admin/",
            "http://h.example/café",
            "h.example/Ünïcode/dir/?q=naïve&x=%E2%82%AC",
            "http://h.example/a%2Fb?k=%7B%7D#Résumé",
        ];
        let n = normalizer();
        for input in inputs {
            let once = n.normalize(input, &none()).unwrap();
            let twice = n.normalize(once.as_str(), &none()).unwrap();
            assert_eq!(once, twice, "not idempotent for {}", input);
        }
    }

    #[test]
    fn test_percent_encoding_is_lower_case() {
        let n = normalizer();
        let raw = n.normalize("http://h.example/café?q=é", &none()).unwrap();
        let encoded = n
            .normalize("http://h.example/caf%C3%A9?q=%C3%A9", &none())
            .unwrap();
        assert_eq!(raw.as_str(), "http://h.example/caf%c3%a9?q=%c3%a9");
        assert_eq!(raw, encoded);
        assert_eq!(raw.path(), "/caf%c3%a9");
    }

    #[test]
    fn test_forbidden_ports_always_fail() {
        let n = normalizer();
        for url in [
            "http://h.example:22",
            "https://h.example:3306/some/path?x=1",
            "h.example:3389/backup/db.sql",
            "HTTPS://H.EXAMPLE:22/",
        ] {
            assert!(
                matches!(
                    n.normalize(url, &none()),
                    Err(NormalizeError::ForbiddenPort { .. })
                ),
                "expected forbidden port for {}",
                url
            );
        }
    }

    #[test]
    fn test_keeps_allowed_port_in_domain() {
        let url = normalizer().normalize("h.example:8080/a", &none()).unwrap();
        assert_eq!(url.domain(), "h.example:8080");
        // default port folds into the bare host
        let url = normalizer().normalize("http://h.example:80/a", &none()).unwrap();
        assert_eq!(url.domain(), "h.example");
    }

    #[test]
    fn test_strips_tracking_params_in_any_order() {
        let n = normalizer();
        let url = n
            .normalize("http://h.example/p?utm_source=a&id=7&token_x=1&lang=en&authkey=z", &none())
            .unwrap();
        assert_eq!(url.as_str(), "http://h.example/p?id=7&lang=en");

        let url = n
            .normalize("http://h.example/p?lang=en&auth=z&id=7&utm_medium=b", &none())
            .unwrap();
        assert_eq!(url.as_str(), "http://h.example/p?lang=en&id=7");

        let url = n.normalize("http://h.example/p?utm_a=1&token=2", &none()).unwrap();
        assert_eq!(url.as_str(), "http://h.example/p");
    }

    #[test]
    fn test_blocked_domain_rejected() {
        let blocked: HashSet<String> = ["a.example".to_string()].into_iter().collect();
        let result = normalizer().normalize("http://a.example/page", &blocked);
        assert!(matches!(result, Err(NormalizeError::DomainBlocked(d)) if d == "a.example"));
    }

    #[test]
    fn test_invalid_url() {
        let result = normalizer().normalize("http://exa mple.com/", &none());
        assert!(matches!(result, Err(NormalizeError::Invalid { .. })));
    }
}
