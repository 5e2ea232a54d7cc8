// src/crawl/crawler.rs
// =============================================================================
// Shared state for one scan run.
//
// Every spawned fetch task holds an Arc<Crawler>. The fetch logic lives in
// worker.rs and the batch logic in scheduler.rs; both are `impl Crawler`
// blocks over the state defined here.
// =============================================================================

use super::filter::MembershipFilter;
use super::ledger::DomainLedger;
use super::stats::{FindingLog, RunStats};
use super::worker::HostGates;
use crate::checker::{Classifier, Normalizer};
use crate::config::ScanConfig;
use crate::error::{ConfigError, ScanError};
use parking_lot::Mutex;
use reqwest::{redirect, Client};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

pub struct Crawler {
    pub(super) config: ScanConfig,
    pub(super) client: Client,
    pub(super) normalizer: Normalizer,
    pub(super) classifier: Classifier,
    pub(super) filter: Mutex<MembershipFilter>,
    pub(super) ledger: Arc<DomainLedger>,
    /// Global concurrency gate
    pub(super) gate: Arc<Semaphore>,
    pub(super) host_gates: HostGates,
    pub(super) stats: RunStats,
    pub(super) findings: FindingLog,
    pub(super) shutdown: CancellationToken,
}

impl Crawler {
    /// Opens the HTTP session and sets up an empty run.
    pub fn new(config: ScanConfig, shutdown: CancellationToken) -> Result<Self, ScanError> {
        // Validate first so a bad config is reported as such
        config.validate()?;
        let client = build_client(&config)?;
        Ok(Self::with_client(config, client, shutdown)?)
    }

    pub fn with_client(
        config: ScanConfig,
        client: Client,
        shutdown: CancellationToken,
    ) -> Result<Self, ConfigError> {
        let patterns = config.validate()?;
        let normalizer = Normalizer::new(
            config.forbidden_ports.clone(),
            config.stripped_query_prefixes.clone(),
        );
        let classifier = Classifier::new(
            config.compound_suffixes.clone(),
            config.sensitive_extensions.clone(),
            patterns,
        );

        Ok(Self {
            filter: Mutex::new(MembershipFilter::new(
                config.filter_capacity,
                config.filter_error_rate,
            )),
            gate: Arc::new(Semaphore::new(config.concurrency)),
            host_gates: HostGates::new(config.per_host),
            ledger: Arc::new(DomainLedger::default()),
            stats: RunStats::default(),
            findings: FindingLog::default(),
            normalizer,
            classifier,
            client,
            config,
            shutdown,
        })
    }

    pub fn ledger(&self) -> &DomainLedger {
        &self.ledger
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn findings(&self) -> &FindingLog {
        &self.findings
    }
}

// Redirects stay disabled: a 30x is recorded as a response, not followed.
pub fn build_client(config: &ScanConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.request_timeout)
        .redirect(redirect::Policy::none())
        .danger_accept_invalid_certs(!config.verify_tls)
        .pool_max_idle_per_host(config.per_host)
        .build()
}
