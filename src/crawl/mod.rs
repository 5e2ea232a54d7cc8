// src/crawl/mod.rs
// =============================================================================
// This module handles the crawl-and-cancel engine.
//
// Features:
// - One-hop crawling: seeds at depth 0, their links at depth 1, nothing more
// - Bounded concurrency: a global gate plus a per-host gate
// - Probabilistic "already queued" filter that lives for the whole run
// - Domain blocking: the first sensitive finding on a domain cancels every
//   in-flight task for it
//
// Submodules:
// - crawler: Shared run state (HTTP client, gates, ledger, counters)
// - scheduler: Turns batches of URLs into concurrent tasks
// - worker: Performs one fetch
// - ledger: Blocked domains, in-flight tasks, cancellation cascade
// - filter: Scalable Bloom filter
// - stats: Counters and findings
// - controller: Runs one scan to completion, timeout or interrupt
// =============================================================================

mod controller;
mod crawler;
mod filter;
mod ledger;
mod scheduler;
mod stats;
mod worker;

pub use controller::{RunController, RunSummary};
pub use crawler::Crawler;
pub use stats::Finding;
