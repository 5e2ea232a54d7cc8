// src/error.rs
// =============================================================================
// Error types for every failure category the scanner knows about.
//
// Each category has its own handling policy:
// - NormalizeError: the URL is unschedulable, never a crawl failure
// - FetchError: recovered inside the single fetch and turned into statistics
// - ScanError / SeedError: structural, these stop the run before crawling
// - ReportError: logged, the run result is still returned
//
// Rust concepts:
// - thiserror: derive std::error::Error + Display from attributes
// - #[from]: automatic conversion so `?` works across error types
// =============================================================================

use std::path::PathBuf;
use thiserror::Error;

/// Why a raw string could not become a schedulable URL.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("port {port} is forbidden: {url}")]
    ForbiddenPort { url: String, port: u16 },

    #[error("domain is blocked: {0}")]
    DomainBlocked(String),

    #[error("invalid url '{url}': {source}")]
    Invalid {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("url has no host: {0}")]
    MissingHost(String),
}

/// Failure of a single fetch. Only `Cancelled` leaves the worker as-is.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection refused/reset, timeout, TLS failure, broken body
    #[error("transport error: {0}")]
    Transport(reqwest::Error),

    #[error("task cancelled")]
    Cancelled,

    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_builder() || error.is_decode() {
            FetchError::Unexpected(error.to_string())
        } else {
            FetchError::Transport(error)
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be at least 1")]
    ZeroLimit { name: &'static str },

    #[error("{name} must be greater than zero")]
    ZeroDuration { name: &'static str },

    #[error("filter error rate must be between 0 and 1, got {0}")]
    ErrorRate(f64),

    #[error("invalid sensitive path pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Fatal failures that stop a scan before any crawling happens.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("could not open http session: {0}")]
    Session(#[from] reqwest::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("cannot read targets file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read targets file path from stdin: {0}")]
    Prompt(#[source] std::io::Error),

    #[error("targets file {} contains no targets", .0.display())]
    Empty(PathBuf),
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("report csv error: {0}")]
    Csv(#[from] csv::Error),
}
