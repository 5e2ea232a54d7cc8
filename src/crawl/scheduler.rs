// src/crawl/scheduler.rs
// =============================================================================
// Turns a batch of candidate URLs into concurrent fetch tasks.
//
// For each batch:
// 1. Deduplicate the raw strings
// 2. Normalize (drops forbidden ports, blocked domains, garbage)
// 3. Skip anything the membership filter has already seen, mark the rest
// 4. Spawn one task per URL, registered in the ledger under its domain
// 5. Wait for the batch, bounded by a deadline, without cancelling anyone
//
// A failing task never aborts its siblings: each one reports a TaskOutcome
// over its own oneshot channel and the batch just tallies them.
//
// Rust concepts:
// - BoxFuture: a recursive async call needs a boxed, nameable future type
// - oneshot: one outcome per task; a dropped sender means the task died
// =============================================================================

use super::crawler::Crawler;
use super::ledger::TaskGuard;
use super::worker::TaskOutcome;
use crate::checker::NormalizedUrl;
use futures::future::{self, BoxFuture, FutureExt};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub dispatched: usize,
    /// Unschedulable: forbidden port, blocked domain, invalid URL
    pub rejected: usize,
    pub duplicates: usize,
    pub completed: usize,
    pub found: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// The batch deadline passed before every task reported
    pub timed_out: bool,
    /// The run was shut down while waiting
    pub interrupted: bool,
}

impl BatchSummary {
    fn tally(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Completed => self.completed += 1,
            TaskOutcome::Found => self.found += 1,
            TaskOutcome::Skipped => self.skipped += 1,
            TaskOutcome::Failed => self.failed += 1,
            TaskOutcome::Cancelled => self.cancelled += 1,
        }
    }
}

impl Crawler {
    /// Schedules `urls` at `depth` and waits for the batch.
    ///
    /// Boxed because fetch tasks call back into the scheduler for the
    /// links they find.
    pub fn schedule(self: &Arc<Self>, urls: Vec<String>, depth: u8) -> BoxFuture<'static, BatchSummary> {
        let crawler = Arc::clone(self);
        async move { crawler.schedule_batch(urls, depth).await }.boxed()
    }

    async fn schedule_batch(self: Arc<Self>, urls: Vec<String>, depth: u8) -> BatchSummary {
        let mut summary = BatchSummary::default();

        // Exact duplicates inside one batch collapse here; order does not matter
        let unique: HashSet<String> = urls
            .into_iter()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .collect();

        let mut pending = Vec::with_capacity(unique.len());
        for raw in unique {
            // Stop handing out work once the run is shutting down
            if self.shutdown.is_cancelled() {
                summary.interrupted = true;
                break;
            }

            // The ledger doubles as the block list
            let url = match self.normalizer.normalize(&raw, self.ledger.as_ref()) {
                Ok(url) => url,
                Err(e) => {
                    debug!(url = %raw, reason = %e, "url not schedulable");
                    summary.rejected += 1;
                    continue;
                }
            };

            // Mark as seen before dispatch so the same target never runs twice
            if !self.filter.lock().insert(url.as_str()) {
                summary.duplicates += 1;
                continue;
            }

            // None: the domain got blocked between normalize and register
            match self.dispatch(url, depth) {
                Some(receiver) => {
                    pending.push(receiver);
                    summary.dispatched += 1;
                }
                None => summary.rejected += 1,
            }
        }

        if pending.is_empty() {
            return summary;
        }

        // Wait for every outcome, but no longer than the batch deadline.
        // Leaving this select! drops the receivers, never the tasks.
        let deadline = self.config.batch_deadline();
        tokio::select! {
            waited = tokio::time::timeout(deadline, future::join_all(pending)) => match waited {
                Ok(outcomes) => {
                    for outcome in outcomes {
                        // A dropped sender means the task was aborted
                        summary.tally(outcome.unwrap_or(TaskOutcome::Cancelled));
                    }
                }
                Err(_) => {
                    debug!(depth, dispatched = summary.dispatched, "batch deadline passed");
                    summary.timed_out = true;
                }
            },
            _ = self.shutdown.cancelled() => {
                summary.interrupted = true;
            }
        }

        summary
    }

    fn dispatch(self: &Arc<Self>, url: NormalizedUrl, depth: u8) -> Option<oneshot::Receiver<TaskOutcome>> {
        let id = self.ledger.next_task_id();
        let domain = url.domain().to_string();

        // Child token: cancelled by its own cascade or by the run shutdown
        let cancel = self.shutdown.child_token();
        let token = cancel.clone();
        let (sender, receiver) = oneshot::channel();
        // The guard moves into the task and removes it from the ledger on exit
        let guard = TaskGuard::new(Arc::clone(&self.ledger), domain.clone(), id);
        let crawler = Arc::clone(self);

        let accepted = self.ledger.register(&domain, id, cancel, move || {
            tokio::spawn(async move {
                let _guard = guard;
                let outcome = crawler.run_task(id, url, depth, token).await;
                let _ = sender.send(outcome);
            })
        });

        accepted.then_some(receiver)
    }
}
