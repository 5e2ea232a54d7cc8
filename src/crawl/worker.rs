// src/crawl/worker.rs
// =============================================================================
// The fetch worker: one bounded HTTP GET per scheduled URL.
//
// What a task does, in order:
// 1. Bail out if the run or the task was cancelled, or the domain got blocked
// 2. Classify the URL; a sensitive match blocks the domain and cancels its
//    in-flight work without ever sending the request
// 3. Take a per-host slot, then a global slot, then send the GET
// 4. For a depth-0 HTML page, extract links and schedule them at depth 1
//
// Every await point is raced against the task's cancellation token, so a
// cancelled task stops at its next suspension point and reports Cancelled.
// Slots are RAII permits: they are released on success, failure and
// cancellation alike.
//
// Rust concepts:
// - OwnedSemaphorePermit: a slot that frees itself when dropped
// - tokio::select! with `biased;`: poll the cancel branch first
// - `??`: the outer `?` is cancellation, the inner one the reqwest error
// =============================================================================

use super::crawler::Crawler;
use super::ledger::TaskId;
use super::stats::Finding;
use crate::checker::{extract_links, BlockList, NormalizedUrl};
use crate::error::FetchError;
use parking_lot::Mutex;
use reqwest::header::CONTENT_TYPE;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

/// How a single task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Response received (any status)
    Completed,
    /// Sensitive URL; this task blocked the domain
    Found,
    /// Domain was already blocked when the task ran
    Skipped,
    /// Transport or unexpected failure, already counted
    Failed,
    Cancelled,
}

/// Caps simultaneous connections per host, independent of the global gate.
///
/// A host's semaphore lives only while someone holds or waits for one of
/// its permits, so the map does not grow with every domain ever seen.
#[derive(Debug)]
pub struct HostGates {
    per_host: usize,
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
}

/// A held per-host permit. Dropping it prunes the host's gate once idle.
pub struct HostSlot<'a> {
    gates: &'a HostGates,
    domain: String,
    permit: Option<OwnedSemaphorePermit>,
}

impl Drop for HostSlot<'_> {
    fn drop(&mut self) {
        // release first so the gate can be seen as idle
        self.permit.take();
        self.gates.prune(&self.domain);
    }
}

impl HostGates {
    pub fn new(per_host: usize) -> Self {
        Self {
            per_host,
            gates: Mutex::new(HashMap::new()),
        }
    }

    fn gate(&self, domain: &str) -> Arc<Semaphore> {
        let mut gates = self.gates.lock();
        Arc::clone(
            gates
                .entry(domain.to_string())
                .or_insert_with(|| Arc::new(Semaphore::new(self.per_host))),
        )
    }

    async fn acquire(&self, domain: &str, cancel: &CancellationToken) -> Result<HostSlot<'_>, FetchError> {
        match acquire(cancel, self.gate(domain)).await {
            Ok(permit) => Ok(HostSlot {
                gates: self,
                domain: domain.to_string(),
                permit: Some(permit),
            }),
            Err(e) => {
                // a cancelled waiter dropped its clone of the gate
                self.prune(domain);
                Err(e)
            }
        }
    }

    // Every holder and waiter owns a clone of the Arc, so a count of one
    // means only the map is left.
    fn prune(&self, domain: &str) {
        let mut gates = self.gates.lock();
        if gates.get(domain).is_some_and(|gate| Arc::strong_count(gate) == 1) {
            gates.remove(domain);
        }
    }

    /// Hosts with a live gate right now
    pub fn tracked_hosts(&self) -> usize {
        self.gates.lock().len()
    }
}

impl Crawler {
    pub(super) async fn run_task(
        self: Arc<Self>,
        id: TaskId,
        url: NormalizedUrl,
        depth: u8,
        cancel: CancellationToken,
    ) -> TaskOutcome {
        // Each error category has exactly one handling policy
        match self.fetch(id, &url, depth, &cancel).await {
            Ok(outcome) => outcome,
            Err(FetchError::Cancelled) => {
                trace!(url = %url, "task cancelled");
                TaskOutcome::Cancelled
            }
            // Connection errors and timeouts are expected noise
            Err(FetchError::Transport(e)) => {
                self.stats.record_failure();
                debug!(url = %url, error = %e, "request failed");
                TaskOutcome::Failed
            }
            Err(FetchError::Unexpected(message)) => {
                self.stats.record_failure();
                error!(url = %url, error = %message, "unexpected fetch failure");
                TaskOutcome::Failed
            }
        }
    }

    async fn fetch(
        self: &Arc<Self>,
        id: TaskId,
        url: &NormalizedUrl,
        depth: u8,
        cancel: &CancellationToken,
    ) -> Result<TaskOutcome, FetchError> {
        // Cancelled while still queued behind the spawn
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        // The domain may have been blocked since this URL was scheduled
        let domain = url.domain();
        if self.ledger.is_blocked(domain) {
            return Ok(TaskOutcome::Skipped);
        }
        self.ledger.mark_visited(domain);

        // A sensitive URL is never requested, only reported
        if let Some(found) = self.classifier.classify(url) {
            // Only the task that actually blocks the domain records the finding
            if !self.ledger.block(domain) {
                return Ok(TaskOutcome::Skipped);
            }
            self.findings.push(Finding {
                url: url.as_str().to_string(),
                domain: domain.to_string(),
                reason: found.reason.clone(),
            });
            warn!(
                domain,
                url = %url,
                reason = %found.reason,
                in_flight = self.ledger.in_flight_count(domain),
                "🚨 sensitive resource found, blocking domain"
            );
            // Cancel every sibling still running for this domain
            self.ledger
                .cascade(
                    domain,
                    Some(id),
                    self.config.cascade_wait_per_task,
                    self.config.cascade_wait_cap,
                )
                .await;
            return Ok(TaskOutcome::Found);
        }

        // Per-host slot first, so one busy host cannot hoard global slots
        let host_slot = self.host_gates.acquire(domain, cancel).await?;
        let global_slot = acquire(cancel, Arc::clone(&self.gate)).await?;
        let in_flight = self.stats.enter_flight();

        // Counted before sending, whatever the outcome
        self.stats.record_attempt();
        let response = cancellable(cancel, self.client.get(url.as_str()).send()).await??;
        self.stats.record_completion();

        // Only HTML pages carry links worth following
        let is_html = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.to_ascii_lowercase().contains("text/html"));

        // One-hop crawl: only root pages expand
        if depth > 0 || !is_html {
            return Ok(TaskOutcome::Completed);
        }

        let body = cancellable(cancel, response.text()).await??;

        // Children need slots of their own
        drop(in_flight);
        drop(global_slot);
        drop(host_slot);

        let links = extract_links(&body, url.as_str(), &self.config.ignored_extensions);
        debug!(url = %url, links = links.len(), "expanding root page");

        if !links.is_empty() {
            cancellable(cancel, self.schedule(links, depth + 1)).await?;
        }
        Ok(TaskOutcome::Completed)
    }
}

async fn acquire(
    cancel: &CancellationToken,
    gate: Arc<Semaphore>,
) -> Result<OwnedSemaphorePermit, FetchError> {
    cancellable(cancel, gate.acquire_owned())
        .await?
        .map_err(|e| FetchError::Unexpected(format!("concurrency gate closed: {}", e)))
}

/// Races `future` against cancellation; cancellation wins ties.
async fn cancellable<F>(cancel: &CancellationToken, future: F) -> Result<F::Output, FetchError>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FetchError::Cancelled),
        output = future => Ok(output),
    }
}
