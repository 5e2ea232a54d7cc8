// src/report/progress.rs
// =============================================================================
// The live progress line.
//
// Rewrites a single stdout line (carriage return, no newline) every 500ms
// with request, in-flight, blocked-domain and finding counts plus elapsed time.
// =============================================================================

use crate::crawl::Crawler;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

const REFRESH: Duration = Duration::from_millis(500);

pub async fn run(crawler: Arc<Crawler>, stop: CancellationToken, started: Instant) {
    let mut ticker = tokio::time::interval(REFRESH);
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => print_line(&crawler, started),
        }
    }
    print_line(&crawler, started);
    println!();
}

fn print_line(crawler: &Crawler, started: Instant) {
    let line = format_line(
        crawler.stats().attempted(),
        crawler.stats().in_flight(),
        crawler.ledger().blocked_count(),
        crawler.findings().len(),
        started.elapsed(),
    );
    let mut stdout = io::stdout().lock();
    let _ = write!(stdout, "\r{}", line);
    let _ = stdout.flush();
}

fn format_line(
    attempted: u64,
    in_flight: usize,
    blocked: usize,
    findings: usize,
    elapsed: Duration,
) -> String {
    format!(
        "🚀 scanning | requests: {} | in flight: {} | blocked: {} | findings: {} | elapsed: {:.1}s",
        attempted,
        in_flight,
        blocked,
        findings,
        elapsed.as_secs_f64()
    )
}
