// src/checker/classify.rs
// =============================================================================
// Decides whether a normalized URL points at an exposed sensitive resource.
//
// Rules, first match wins:
// 1. Compound archive suffix (tar.gz, tar.bz2, tar.xz)
// 2. Sensitive final extension (configs, backups, databases, keys, images)
// 3. Sensitive path pattern (backup/archive dirs, VCS metadata)
//
// A match is what triggers the domain block in the crawler.
// =============================================================================

use super::normalize::NormalizedUrl;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    CompoundArchive,
    Extension,
    PathPattern,
}

/// Why a URL was flagged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SensitiveMatch {
    pub rule: MatchRule,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct Classifier {
    compound_suffixes: HashSet<String>,
    extensions: HashSet<String>,
    patterns: Vec<Regex>,
}

impl Classifier {
    pub fn new(
        compound_suffixes: HashSet<String>,
        extensions: HashSet<String>,
        patterns: Vec<Regex>,
    ) -> Self {
        Self {
            compound_suffixes,
            extensions,
            patterns,
        }
    }

    pub fn classify(&self, url: &NormalizedUrl) -> Option<SensitiveMatch> {
        let path = url.path().to_lowercase();
        let file_name = path.rsplit('/').next().unwrap_or_default();

        if file_name.contains('.') {
            let mut parts = file_name.rsplit('.');
            let last = parts.next().unwrap_or_default();
            if let Some(second) = parts.next() {
                let compound = format!("{}.{}", second, last);
                if self.compound_suffixes.contains(&compound) {
                    return Some(SensitiveMatch {
                        rule: MatchRule::CompoundArchive,
                        reason: format!("compound archive format: {}", compound),
                    });
                }
            }

            if self.extensions.contains(last) {
                return Some(SensitiveMatch {
                    rule: MatchRule::Extension,
                    reason: format!("sensitive extension: {}", last),
                });
            }
        }

        self.patterns
            .iter()
            .find(|pattern| pattern.is_match(&path))
            .map(|pattern| SensitiveMatch {
                rule: MatchRule::PathPattern,
                reason: format!("path pattern: {}", pattern.as_str()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::Normalizer;
    use crate::config::ScanConfig;

    fn classify(raw: &str) -> Option<SensitiveMatch> {
        let config = ScanConfig::default();
        let normalizer = Normalizer::new(
            config.forbidden_ports.clone(),
            config.stripped_query_prefixes.clone(),
        );
        let classifier = Classifier::new(
            config.compound_suffixes.clone(),
            config.sensitive_extensions.clone(),
            config.compile_patterns().unwrap(),
        );
        let url = normalizer.normalize(raw, &HashSet::new()).unwrap();
        classifier.classify(&url)
    }

    #[test]
    fn test_extension_wins_over_path() {
        let found = classify("http://h/backup/site.zip").unwrap();
        assert_eq!(found.rule, MatchRule::Extension);
        assert!(found.reason.contains("zip"));
    }

    #[test]
    fn test_compound_before_extension() {
        let found = classify("http://h/archive.tar.gz").unwrap();
        assert_eq!(found.rule, MatchRule::CompoundArchive);
        assert!(found.reason.contains("tar.gz"));
    }

    #[test]
    fn test_git_metadata_by_pattern() {
        let found = classify("http://h/.git/config").unwrap();
        assert_eq!(found.rule, MatchRule::PathPattern);
        assert!(found.reason.contains("git|svn"));
    }

    #[test]
    fn test_backup_directory_by_pattern() {
        let found = classify("http://h/backup/index").unwrap();
        assert_eq!(found.rule, MatchRule::PathPattern);
    }

    #[test]
    fn test_plain_page_not_sensitive() {
        assert_eq!(classify("http://h/page.html"), None);
        assert_eq!(classify("http://h/"), None);
        assert_eq!(classify("http://h/docs/readme"), None);
    }

    #[test]
    fn test_dot_in_directory_is_not_an_extension() {
        assert_eq!(classify("http://h/v1.sql/items"), None);
    }

    #[test]
    fn test_query_does_not_count() {
        assert_eq!(classify("http://h/download?file=db.sql"), None);
    }
}
