// src/crawl/stats.rs
// =============================================================================
// Run-scoped counters and the append-only findings log.
//
// Counters are plain atomics: many tasks bump them, nobody needs to lock.
// The in-flight gauge also records its peak so a run can prove the global
// concurrency cap held.
// =============================================================================

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// A confirmed sensitive resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub url: String,
    pub domain: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct RunStats {
    attempted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub attempted: u64,
    /// Requests that got a response back (any status)
    pub completed: u64,
    pub failed: u64,
    pub peak_in_flight: usize,
}

impl RunStats {
    pub fn record_attempt(&self) {
        self.attempted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completion(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Marks one fetch as in flight until the returned guard drops.
    pub fn enter_flight(&self) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight { stats: self }
    }

    pub fn attempted(&self) -> u64 {
        self.attempted.load(Ordering::Relaxed)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            attempted: self.attempted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            peak_in_flight: self.peak_in_flight.load(Ordering::SeqCst),
        }
    }
}

pub struct InFlight<'a> {
    stats: &'a RunStats,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.stats.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
pub struct FindingLog {
    findings: Mutex<Vec<Finding>>,
}

impl FindingLog {
    pub fn push(&self, finding: Finding) {
        self.findings.lock().push(finding);
    }

    pub fn len(&self) -> usize {
        self.findings.lock().len()
    }

    pub fn snapshot(&self) -> Vec<Finding> {
        self.findings.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight_peak() {
        let stats = RunStats::default();
        {
            let _a = stats.enter_flight();
            let _b = stats.enter_flight();
            assert_eq!(stats.in_flight(), 2);
        }
        let _c = stats.enter_flight();
        assert_eq!(stats.in_flight(), 1);
        assert_eq!(stats.snapshot().peak_in_flight, 2);
    }

    #[test]
    fn test_counters() {
        let stats = RunStats::default();
        stats.record_attempt();
        stats.record_attempt();
        stats.record_completion();
        stats.record_failure();
        let snap = stats.snapshot();
        assert_eq!(snap.attempted, 2);
        assert_eq!(snap.completed, 1);
        assert_eq!(snap.failed, 1);
    }

    #[test]
    fn test_findings_append_only() {
        let log = FindingLog::default();
        log.push(Finding {
            url: "http://a.example/db.sql".into(),
            domain: "a.example".into(),
            reason: "sensitive extension: sql".into(),
        });
        assert_eq!(log.len(), 1);
        assert_eq!(log.snapshot()[0].domain, "a.example");
    }
}
