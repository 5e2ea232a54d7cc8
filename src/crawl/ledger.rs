// src/crawl/ledger.rs
// =============================================================================
// The domain ledger: which domains are blocked, and which tasks are still
// running for each domain.
//
// How the cancellation cascade works:
// 1. The first task to confirm a finding calls `block(domain)` and wins
// 2. The winner takes the domain's whole in-flight set out of the ledger
// 3. Every task in it that has not finished gets its token cancelled
// 4. We wait a short, bounded time for them, then abort the stragglers
//
// The global shutdown path (`take_all` + `drain`) reuses steps 3 and 4.
//
// Every mutation happens under one short `parking_lot` lock that is never
// held across an `.await`, so completion callbacks (the `TaskGuard` drop)
// stay synchronous and cheap.
//
// Rust concepts:
// - Drop: `TaskGuard` runs its cleanup however the task ends, abort included
// - JoinHandle::abort: the hard stop after the wait budget
// =============================================================================

use crate::checker::BlockList;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

/// Ownership of one scheduled task: its cancel token and join handle.
#[derive(Debug)]
pub struct TaskHandle {
    id: TaskId,
    cancel: CancellationToken,
    // None only between reservation and spawn
    join: Option<JoinHandle<()>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Tasks whose token was cancelled (they had not finished yet)
    pub cancelled: usize,
    /// Tasks still running when the wait budget ran out
    pub aborted: usize,
}

#[derive(Debug, Default)]
struct LedgerState {
    blocked: HashSet<String>,
    visited: HashSet<String>,
    in_flight: HashMap<String, HashMap<TaskId, TaskHandle>>,
}

#[derive(Debug, Default)]
pub struct DomainLedger {
    state: Mutex<LedgerState>,
    next_id: AtomicU64,
}

impl BlockList for DomainLedger {
    fn is_blocked(&self, domain: &str) -> bool {
        self.state.lock().blocked.contains(domain)
    }
}

impl DomainLedger {
    pub fn next_task_id(&self) -> TaskId {
        TaskId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Blocks `domain`. Returns true only for the call that blocked it.
    pub fn block(&self, domain: &str) -> bool {
        self.state.lock().blocked.insert(domain.to_string())
    }

    pub fn mark_visited(&self, domain: &str) {
        let mut state = self.state.lock();
        if !state.visited.contains(domain) {
            state.visited.insert(domain.to_string());
        }
    }

    pub fn visited_count(&self) -> usize {
        self.state.lock().visited.len()
    }

    pub fn blocked_count(&self) -> usize {
        self.state.lock().blocked.len()
    }

    pub fn in_flight_count(&self, domain: &str) -> usize {
        self.state
            .lock()
            .in_flight
            .get(domain)
            .map_or(0, HashMap::len)
    }

    pub fn total_in_flight(&self) -> usize {
        self.state.lock().in_flight.values().map(HashMap::len).sum()
    }

    /// Registers a task under `domain` and spawns it.
    ///
    /// Returns false without calling `spawn` when the domain is already
    /// blocked. The lock is released while `spawn` runs.
    pub fn register<F>(&self, domain: &str, id: TaskId, cancel: CancellationToken, spawn: F) -> bool
    where
        F: FnOnce() -> JoinHandle<()>,
    {
        // Reserve the entry first, so a cascade that runs before the
        // spawn returns still finds (and cancels) this task's token
        {
            let mut state = self.state.lock();
            if state.blocked.contains(domain) {
                return false;
            }
            state.in_flight.entry(domain.to_string()).or_default().insert(
                id,
                TaskHandle {
                    id,
                    cancel,
                    join: None,
                },
            );
        }

        let join = spawn();

        // The task may already be gone (finished, or taken by a cascade):
        // then dropping `join` just detaches it.
        let mut state = self.state.lock();
        if let Some(handle) = state
            .in_flight
            .get_mut(domain)
            .and_then(|tasks| tasks.get_mut(&id))
        {
            handle.join = Some(join);
        }
        true
    }

    /// Removes a finished task. Absent entries are fine.
    pub fn release(&self, domain: &str, id: TaskId) {
        let mut state = self.state.lock();
        if let Some(tasks) = state.in_flight.get_mut(domain) {
            tasks.remove(&id);
            if tasks.is_empty() {
                state.in_flight.remove(domain);
            }
        }
    }

    pub fn take_tasks(&self, domain: &str) -> Vec<TaskHandle> {
        self.state
            .lock()
            .in_flight
            .remove(domain)
            .map(|tasks| tasks.into_values().collect())
            .unwrap_or_default()
    }

    pub fn take_all(&self) -> Vec<TaskHandle> {
        self.state
            .lock()
            .in_flight
            .drain()
            .flat_map(|(_, tasks)| tasks.into_values())
            .collect()
    }

    /// Cancels everything in flight for a freshly blocked domain.
    ///
    /// `origin` is the task that confirmed the finding; it keeps running
    /// so it can finish its own bookkeeping.
    pub async fn cascade(
        &self,
        domain: &str,
        origin: Option<TaskId>,
        per_task: Duration,
        cap: Duration,
    ) -> DrainReport {
        let tasks: Vec<TaskHandle> = self
            .take_tasks(domain)
            .into_iter()
            .filter(|task| Some(task.id) != origin)
            .collect();

        if tasks.is_empty() {
            return DrainReport::default();
        }

        let count = tasks.len();
        let budget = crate::config::bounded_wait(per_task, cap, count);
        let report = drain(tasks, budget).await;
        info!(
            domain,
            tasks = count,
            cancelled = report.cancelled,
            aborted = report.aborted,
            "🛑 cancelled in-flight tasks for blocked domain"
        );
        report
    }
}

/// Cancel every unfinished task, wait up to `budget`, abort what is left.
pub async fn drain(tasks: Vec<TaskHandle>, budget: Duration) -> DrainReport {
    let mut report = DrainReport::default();
    let mut joins = Vec::with_capacity(tasks.len());

    // Cancel everything that is still running
    for task in tasks {
        if task.join.as_ref().is_some_and(JoinHandle::is_finished) {
            continue;
        }
        task.cancel.cancel();
        report.cancelled += 1;
        if let Some(join) = task.join {
            joins.push(join);
        }
    }

    if joins.is_empty() {
        return report;
    }

    // Best-effort join; `iter_mut` keeps the handles so we can abort below
    if tokio::time::timeout(budget, futures::future::join_all(joins.iter_mut()))
        .await
        .is_err()
    {
        debug!(budget_ms = budget.as_millis() as u64, "drain budget exhausted");
    }

    // Whatever ignored its token gets aborted at its next poll
    for join in &joins {
        if !join.is_finished() {
            join.abort();
            report.aborted += 1;
        }
    }

    report
}

/// Removes its task from the ledger when dropped, however the task ended.
pub struct TaskGuard {
    ledger: Arc<DomainLedger>,
    domain: String,
    id: TaskId,
}

impl TaskGuard {
    pub fn new(ledger: Arc<DomainLedger>, domain: String, id: TaskId) -> Self {
        Self { ledger, domain, id }
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.ledger.release(&self.domain, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Spawns a task that finishes only when its token is cancelled.
    fn spawn_cooperative(ledger: &Arc<DomainLedger>, domain: &str) -> TaskId {
        let id = ledger.next_task_id();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let guard = TaskGuard::new(Arc::clone(ledger), domain.to_string(), id);
        ledger.register(domain, id, cancel, move || {
            tokio::spawn(async move {
                let _guard = guard;
                token.cancelled().await;
            })
        });
        id
    }

    // Spawns a task that ignores its token.
    fn spawn_stubborn(ledger: &Arc<DomainLedger>, domain: &str) -> TaskId {
        let id = ledger.next_task_id();
        let guard = TaskGuard::new(Arc::clone(ledger), domain.to_string(), id);
        ledger.register(domain, id, CancellationToken::new(), move || {
            tokio::spawn(async move {
                let _guard = guard;
                tokio::time::sleep(Duration::from_secs(3600)).await;
            })
        });
        id
    }

    #[test]
    fn test_block_is_idempotent() {
        let ledger = DomainLedger::default();
        assert!(ledger.block("a.example"));
        assert!(!ledger.block("a.example"));
        assert!(ledger.is_blocked("a.example"));
        assert_eq!(ledger.blocked_count(), 1);
    }

    #[test]
    fn test_release_tolerates_missing_entry() {
        let ledger = DomainLedger::default();
        ledger.release("nowhere.example", TaskId(42));
        assert_eq!(ledger.total_in_flight(), 0);
    }

    #[tokio::test]
    async fn test_register_refuses_blocked_domain() {
        let ledger = Arc::new(DomainLedger::default());
        ledger.block("a.example");
        let mut spawned = false;
        let accepted = ledger.register("a.example", ledger.next_task_id(), CancellationToken::new(), || {
            spawned = true;
            tokio::spawn(async {})
        });
        assert!(!accepted);
        assert!(!spawned);
    }

    #[tokio::test]
    async fn test_guard_releases_on_completion() {
        let ledger = Arc::new(DomainLedger::default());
        let id = ledger.next_task_id();
        let guard = TaskGuard::new(Arc::clone(&ledger), "a.example".into(), id);
        ledger.register("a.example", id, CancellationToken::new(), move || {
            tokio::spawn(async move {
                let _guard = guard;
            })
        });
        assert_eq!(ledger.in_flight_count("a.example"), 1);
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(ledger.in_flight_count("a.example"), 0);
    }

    #[tokio::test]
    async fn test_cascade_cancels_only_that_domain() {
        let ledger = Arc::new(DomainLedger::default());
        for _ in 0..5 {
            spawn_cooperative(&ledger, "a.example");
        }
        spawn_cooperative(&ledger, "b.example");

        assert!(ledger.block("a.example"));
        let report = ledger
            .cascade("a.example", None, Duration::from_millis(10), Duration::from_millis(500))
            .await;

        assert_eq!(report.cancelled, 5);
        assert_eq!(report.aborted, 0);
        assert_eq!(ledger.in_flight_count("a.example"), 0);
        assert_eq!(ledger.in_flight_count("b.example"), 1);
    }

    #[tokio::test]
    async fn test_cascade_skips_origin() {
        let ledger = Arc::new(DomainLedger::default());
        let origin = spawn_cooperative(&ledger, "a.example");
        spawn_cooperative(&ledger, "a.example");

        ledger.block("a.example");
        let report = ledger
            .cascade("a.example", Some(origin), Duration::from_millis(10), Duration::from_millis(500))
            .await;
        assert_eq!(report.cancelled, 1);
    }

    #[tokio::test]
    async fn test_drain_aborts_stragglers_within_budget() {
        let ledger = Arc::new(DomainLedger::default());
        spawn_stubborn(&ledger, "a.example");
        spawn_cooperative(&ledger, "b.example");

        let started = std::time::Instant::now();
        let report = drain(ledger.take_all(), Duration::from_millis(50)).await;
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(report.cancelled, 2);
        assert_eq!(report.aborted, 1);
        assert_eq!(ledger.total_in_flight(), 0);
    }

    #[test]
    fn test_visited_counts_distinct_domains() {
        let ledger = DomainLedger::default();
        ledger.mark_visited("a.example");
        ledger.mark_visited("a.example");
        ledger.mark_visited("b.example");
        assert_eq!(ledger.visited_count(), 2);
    }
}
