// src/config.rs
// =============================================================================
// Scan configuration.
//
// The command line only exposes the knobs an operator tunes per run
// (concurrency, timeouts, output). The detection lists live here with
// their defaults, and everything is validated once before crawling starts.
// =============================================================================

use crate::error::ConfigError;
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36";

const SENSITIVE_EXTENSIONS: &[&str] = &[
    "config", "ini", "env", "zip", "rar", "7z", "tar", "gz", "bz2", "xz", "bak", "key", "conf",
    "properties", "sql", "db", "dbf", "pem", "crt", "jks", "p12", "audit", "dmg", "iso", "img",
    "vmdk", "apk", "jar",
];

const COMPOUND_SUFFIXES: &[&str] = &["tar.gz", "tar.bz2", "tar.xz"];

const SENSITIVE_PATHS: &[&str] = &[r"/(backup|archive)/", r"\.(git|svn)/"];

const IGNORED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// Everything one scan run needs to know.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Global cap on fetches in flight
    pub concurrency: usize,
    /// Cap on simultaneous connections to one host
    pub per_host: usize,
    pub request_timeout: Duration,
    /// A scheduling batch waits at most this many request timeouts
    pub batch_wait_factor: u32,
    pub run_deadline: Duration,

    pub forbidden_ports: HashSet<u16>,
    /// Query keys starting with one of these are removed during normalization
    pub stripped_query_prefixes: Vec<String>,

    pub compound_suffixes: HashSet<String>,
    pub sensitive_extensions: HashSet<String>,
    pub sensitive_paths: Vec<String>,
    /// Links with these extensions are never expanded from a root page
    pub ignored_extensions: HashSet<String>,

    pub filter_capacity: usize,
    pub filter_error_rate: f64,

    pub cascade_wait_per_task: Duration,
    pub cascade_wait_cap: Duration,
    pub drain_wait_per_task: Duration,
    pub drain_wait_cap: Duration,

    pub user_agent: String,
    pub verify_tls: bool,

    pub output_dir: PathBuf,
    /// Print the live progress line
    pub progress: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: 200,
            per_host: 20,
            request_timeout: Duration::from_secs(35),
            batch_wait_factor: 2,
            run_deadline: Duration::from_secs(3600),
            forbidden_ports: [22, 3306, 3389].into_iter().collect(),
            stripped_query_prefixes: ["utm_", "token", "auth"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            compound_suffixes: to_set(COMPOUND_SUFFIXES),
            sensitive_extensions: to_set(SENSITIVE_EXTENSIONS),
            sensitive_paths: SENSITIVE_PATHS.iter().map(|p| p.to_string()).collect(),
            ignored_extensions: to_set(IGNORED_EXTENSIONS),
            filter_capacity: 100_000,
            filter_error_rate: 0.001,
            cascade_wait_per_task: Duration::from_millis(10),
            cascade_wait_cap: Duration::from_millis(500),
            drain_wait_per_task: Duration::from_millis(10),
            drain_wait_cap: Duration::from_secs(2),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            verify_tls: false,
            output_dir: PathBuf::from("."),
            progress: true,
        }
    }
}

impl ScanConfig {
    /// Checks limits and compiles the sensitive path patterns.
    pub fn validate(&self) -> Result<Vec<Regex>, ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroLimit { name: "concurrency" });
        }
        if self.per_host == 0 {
            return Err(ConfigError::ZeroLimit { name: "per-host" });
        }
        if self.batch_wait_factor == 0 {
            return Err(ConfigError::ZeroLimit { name: "batch wait factor" });
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration { name: "request timeout" });
        }
        if self.run_deadline.is_zero() {
            return Err(ConfigError::ZeroDuration { name: "run deadline" });
        }
        if self.filter_capacity == 0 {
            return Err(ConfigError::ZeroLimit { name: "filter capacity" });
        }
        if !(self.filter_error_rate > 0.0 && self.filter_error_rate < 1.0) {
            return Err(ConfigError::ErrorRate(self.filter_error_rate));
        }
        self.compile_patterns()
    }

    pub fn compile_patterns(&self) -> Result<Vec<Regex>, ConfigError> {
        self.sensitive_paths
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| ConfigError::Pattern {
                        pattern: pattern.clone(),
                        source,
                    })
            })
            .collect()
    }

    /// How long one scheduling batch may wait for its tasks.
    pub fn batch_deadline(&self) -> Duration {
        self.request_timeout.saturating_mul(self.batch_wait_factor)
    }
}

/// Wait budget proportional to task count, capped.
pub fn bounded_wait(per_task: Duration, cap: Duration, tasks: usize) -> Duration {
    let tasks = u32::try_from(tasks).unwrap_or(u32::MAX);
    per_task.saturating_mul(tasks).min(cap)
}

fn to_set(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}
