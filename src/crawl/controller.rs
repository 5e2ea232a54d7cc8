// src/crawl/controller.rs
// =============================================================================
// Drives one scan from seeds to report.
//
// Sequence:
// 1. Open the HTTP session (the only fatal step)
// 2. Start the progress line and the root scheduling call side by side
// 3. Wait for the root call, the run deadline, or an interrupt
// 4. Cancel and drain whatever is still in flight, with a short bounded wait
// 5. Stop the progress line, close the session
// 6. Always write the report from the findings collected so far
// =============================================================================

use super::crawler::Crawler;
use super::ledger::drain;
use super::stats::{Finding, StatsSnapshot};
use crate::config::{bounded_wait, ScanConfig};
use crate::error::ScanError;
use crate::report;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Completed,
    TimedOut,
    Interrupted,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub termination: Termination,
    pub stats: StatsSnapshot,
    pub findings: Vec<Finding>,
    pub blocked_domains: usize,
    pub visited_domains: usize,
    /// Absolute path of the CSV report, if it could be written
    pub report_path: Option<PathBuf>,
    pub elapsed_secs: f64,
}

pub struct RunController {
    config: ScanConfig,
    shutdown: CancellationToken,
}

impl RunController {
    /// `shutdown` is the interrupt token; cancelling it stops the run.
    pub fn new(config: ScanConfig, shutdown: CancellationToken) -> Self {
        Self { config, shutdown }
    }

    pub async fn run(self, seeds: Vec<String>) -> Result<RunSummary, ScanError> {
        let started = Instant::now();
        // Child token: finishing this run never cancels the caller's token
        let run_token = self.shutdown.child_token();
        let crawler = Arc::new(Crawler::new(self.config.clone(), run_token.clone())?);

        // Separate token: the progress line outlives the crawl by one drain
        let progress_stop = CancellationToken::new();
        let progress = self.config.progress.then(|| {
            tokio::spawn(report::progress::run(
                Arc::clone(&crawler),
                progress_stop.clone(),
                started,
            ))
        });

        // Depth 0: every seed is dispatched before any child link exists
        let mut root = tokio::spawn(crawler.schedule(seeds, 0));

        let termination = tokio::select! {
            biased;
            _ = run_token.cancelled() => Termination::Interrupted,
            joined = tokio::time::timeout(self.config.run_deadline, &mut root) => match joined {
                Ok(Ok(batch)) => {
                    info!(
                        dispatched = batch.dispatched,
                        rejected = batch.rejected,
                        failed = batch.failed,
                        timed_out = batch.timed_out,
                        "root batch finished"
                    );
                    if batch.interrupted {
                        Termination::Interrupted
                    } else if batch.timed_out {
                        // stopped waiting on work that was still running
                        Termination::TimedOut
                    } else {
                        Termination::Completed
                    }
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "root scheduling task ended abnormally");
                    Termination::Interrupted
                }
                Err(_) => Termination::TimedOut,
            },
        };

        if termination != Termination::Completed {
            warn!(
                ?termination,
                in_flight = crawler.ledger().total_in_flight(),
                "stopping scan, cancelling in-flight work"
            );
        }
        run_token.cancel();
        root.abort();

        // Collect every task still registered, on any domain
        let leftovers = crawler.ledger().take_all();
        if !leftovers.is_empty() {
            let count = leftovers.len();
            let budget = bounded_wait(
                self.config.drain_wait_per_task,
                self.config.drain_wait_cap,
                count,
            );
            let drained = drain(leftovers, budget).await;
            info!(
                tasks = count,
                cancelled = drained.cancelled,
                aborted = drained.aborted,
                "drained in-flight tasks"
            );
        }

        progress_stop.cancel();
        if let Some(progress) = progress {
            let _ = progress.await;
        }

        {
            let filter = crawler.filter.lock();
            debug!(
                queued = filter.len(),
                layers = filter.layer_count(),
                host_gates = crawler.host_gates.tracked_hosts(),
                "crawl state at end of run"
            );
        }

        // The report is written however the run ended
        let findings = crawler.findings().snapshot();
        let report_path = match report::write_report(&self.config.output_dir, &findings) {
            Ok(path) => {
                info!(path = %path.display(), "report written");
                Some(path)
            }
            Err(e) => {
                error!(error = %e, "failed to write report");
                None
            }
        };

        Ok(RunSummary {
            termination,
            stats: crawler.stats().snapshot(),
            blocked_domains: crawler.ledger().blocked_count(),
            visited_domains: crawler.ledger().visited_count(),
            findings,
            report_path,
            elapsed_secs: started.elapsed().as_secs_f64(),
        })
    }
}
