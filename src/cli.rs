// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// We use the "derive" API which lets us define the CLI structure using
// Rust structs and attributes (the #[...] things).
//
// Subcommands:
// - scan: crawl the targets file and write a findings report
// - check: classify URLs offline, no network
// =============================================================================

use crate::config::ScanConfig;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "leak-sentinel",
    version = "0.1.0",
    about = "Crawls target hosts one hop deep and reports exposed sensitive files",
    long_about = "leak-sentinel visits every target, follows the links on its front page once, \
                  and flags URLs that look like exposed backups, archives, keys or VCS metadata. \
                  The first finding on a domain blocks that domain for the rest of the run."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log at debug level (RUST_LOG still wins when set)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan every target in a file
    ///
    /// Example: leak-sentinel scan targets.txt --concurrency 100
    Scan(ScanArgs),

    /// Show how URLs are normalized and classified, without fetching them
    ///
    /// Example: leak-sentinel check http://example.com/backup/site.zip
    Check {
        /// URLs or hosts to classify
        #[arg(required = true)]
        urls: Vec<String>,

        /// Output results in JSON format instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Targets file, one host or URL per line (asked for when omitted)
    pub targets_file: Option<PathBuf>,

    /// Maximum fetches in flight across all hosts
    #[arg(long, default_value_t = 200)]
    pub concurrency: usize,

    /// Maximum simultaneous connections to a single host
    #[arg(long, default_value_t = 20)]
    pub per_host: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 35)]
    pub timeout: u64,

    /// Overall run deadline in seconds
    #[arg(long, default_value_t = 3600)]
    pub deadline: u64,

    /// Directory for the CSV report
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Log file (appended to)
    #[arg(long, default_value = "leak-sentinel.log")]
    pub log_file: PathBuf,

    /// Do not write a log file
    #[arg(long)]
    pub no_log_file: bool,

    /// Verify TLS certificates of scanned hosts
    #[arg(long)]
    pub verify_tls: bool,

    /// Hide the live progress line
    #[arg(long)]
    pub quiet: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

impl ScanArgs {
    pub fn to_config(&self) -> ScanConfig {
        ScanConfig {
            concurrency: self.concurrency,
            per_host: self.per_host,
            request_timeout: Duration::from_secs(self.timeout),
            run_deadline: Duration::from_secs(self.deadline),
            output_dir: self.output_dir.clone(),
            verify_tls: self.verify_tls,
            progress: !self.quiet && !self.json,
            ..ScanConfig::default()
        }
    }

    pub fn log_file(&self) -> Option<&std::path::Path> {
        (!self.no_log_file).then_some(self.log_file.as_path())
    }
}
