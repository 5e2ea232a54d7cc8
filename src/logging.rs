// src/logging.rs
// =============================================================================
// Tracing setup.
//
// Two outputs:
// - stderr, compact, for the operator watching the scan
// - an append-only log file (no ANSI colors), written off the hot path
//   through tracing-appender's non-blocking writer
//
// RUST_LOG overrides the level; otherwise `info`, or `debug` with -v.
// =============================================================================

use std::fs::OpenOptions;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Installs the global subscriber.
///
/// The returned guard flushes the log file when dropped, so keep it alive
/// until the program exits.
pub fn init(verbose: bool, log_file: Option<&Path>) -> std::io::Result<Option<WorkerGuard>> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(filter());

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    // Ignore "already initialized" (tests, repeated calls)
    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.log");
        let guard = init(false, Some(&path)).unwrap();
        assert!(guard.is_some());
        assert!(path.exists());
    }

    #[test]
    fn test_unwritable_log_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing/dir/scan.log");
        assert!(init(false, Some(&path)).is_err());
    }
}
