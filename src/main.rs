// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Dispatch to the appropriate subcommand handler
// 3. Print the results
// 4. Exit with proper code (0 = nothing found, 1 = findings, 2 = error)
//
// The runtime is single-threaded on purpose: one thread multiplexes every
// fetch, and tasks only yield at network I/O and timers.
// =============================================================================

mod checker; // src/checker/ - normalization, classification, link extraction
mod cli; // src/cli.rs - command-line parsing
mod config; // src/config.rs - scan settings and defaults
mod crawl; // src/crawl/ - the crawl-and-cancel engine
mod error; // src/error.rs - error types
mod logging; // src/logging.rs - tracing setup
mod report; // src/report/ - CSV report and progress line
mod seeds; // src/seeds.rs - targets file

use anyhow::{Context, Result};
use checker::{Classifier, MatchRule, Normalizer};
use clap::Parser;
use cli::{Cli, Commands, ScanArgs};
use config::ScanConfig;
use crawl::{RunController, RunSummary};
use serde::Serialize;
use std::collections::HashSet;
use std::io;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan(args) => handle_scan(args, cli.verbose).await,
        Commands::Check { urls, json } => {
            logging::init(cli.verbose, None)?;
            handle_check(&urls, json)
        }
    }
}

// Handles the 'scan' subcommand
async fn handle_scan(args: ScanArgs, verbose: bool) -> Result<i32> {
    let _log_guard = logging::init(verbose, args.log_file())
        .with_context(|| format!("cannot open log file {}", args.log_file.display()))?;

    let targets_path = match &args.targets_file {
        Some(path) => path.clone(),
        None => seeds::prompt_for_path(io::stdin().lock(), io::stdout())?,
    };
    let targets = seeds::read_seeds(&targets_path)?;

    if !args.json {
        println!("🔍 Scanning {} target(s) from {}", targets.len(), targets_path.display());
    }

    let shutdown = CancellationToken::new();
    install_interrupt_handler(shutdown.clone());

    let summary = RunController::new(args.to_config(), shutdown)
        .run(targets)
        .await?;

    print_summary(&summary, args.json)?;

    if summary.findings.is_empty() {
        Ok(0)
    } else {
        Ok(1)
    }
}

// First Ctrl+C starts the bounded shutdown. A second one quits immediately.
fn install_interrupt_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping scan (press Ctrl+C again to force quit)");
            shutdown.cancel();

            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nForce quit requested, exiting immediately...");
                std::process::exit(130);
            }
        }
    });
}

fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!();
    if !summary.findings.is_empty() {
        println!("{:<70} {:<40}", "URL", "BASIS");
        println!("{}", "=".repeat(110));
        for finding in &summary.findings {
            println!("{:<70} {:<40}", truncate(&finding.url, 67), finding.reason);
        }
        println!();
    }

    println!("📊 Summary ({:?}, {:.1}s):", summary.termination, summary.elapsed_secs);
    println!("   🚨 Findings: {}", summary.findings.len());
    println!("   ⛔ Blocked domains: {}", summary.blocked_domains);
    println!("   🌐 Domains visited: {}", summary.visited_domains);
    println!(
        "   📨 Requests: {} ({} answered, {} failed)",
        summary.stats.attempted, summary.stats.completed, summary.stats.failed
    );
    match &summary.report_path {
        Some(path) => println!("   📄 Report: {}", path.display()),
        None => println!("   ⚠️  Report could not be written, see the log"),
    }
    Ok(())
}

// Result of classifying one URL for the 'check' subcommand
#[derive(Debug, Serialize)]
struct CheckResult {
    input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    normalized: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rule: Option<MatchRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl CheckResult {
    fn is_sensitive(&self) -> bool {
        self.rule.is_some()
    }
}

// Handles the 'check' subcommand
fn handle_check(urls: &[String], json: bool) -> Result<i32> {
    let results = check_urls(urls, &ScanConfig::default())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print_check_table(&results);
    }

    if results.iter().any(CheckResult::is_sensitive) {
        Ok(1)
    } else {
        Ok(0)
    }
}

fn check_urls(urls: &[String], config: &ScanConfig) -> Result<Vec<CheckResult>> {
    let normalizer = Normalizer::new(
        config.forbidden_ports.clone(),
        config.stripped_query_prefixes.clone(),
    );
    let classifier = Classifier::new(
        config.compound_suffixes.clone(),
        config.sensitive_extensions.clone(),
        config.compile_patterns()?,
    );
    let nothing_blocked = HashSet::new();

    let results = urls
        .iter()
        .map(|raw| match normalizer.normalize(raw, &nothing_blocked) {
            Ok(url) => {
                let found = classifier.classify(&url);
                CheckResult {
                    input: raw.clone(),
                    normalized: Some(url.to_string()),
                    rule: found.as_ref().map(|m| m.rule),
                    reason: found.map(|m| m.reason),
                    error: None,
                }
            }
            Err(e) => CheckResult {
                input: raw.clone(),
                normalized: None,
                rule: None,
                reason: None,
                error: Some(e.to_string()),
            },
        })
        .collect();

    Ok(results)
}

fn print_check_table(results: &[CheckResult]) {
    println!("{:<60} {:<12} {:<40}", "URL", "VERDICT", "BASIS");
    println!("{}", "=".repeat(112));

    for result in results {
        let shown = result.normalized.as_deref().unwrap_or(&result.input);
        let (verdict, basis) = match (&result.reason, &result.error) {
            (Some(reason), _) => ("🚨 CRITICAL", reason.as_str()),
            (None, Some(error)) => ("⛔ REJECTED", error.as_str()),
            (None, None) => ("✅ CLEAN", ""),
        };
        println!("{:<60} {:<12} {:<40}", truncate(shown, 57), verdict, basis);
    }
}

// Truncates on a char boundary, adding "..." when shortened
fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_urls_verdicts() {
        let urls = vec![
            "h.example/backup/site.zip".to_string(),
            "h.example/page.html".to_string(),
            "h.example:22/".to_string(),
        ];
        let results = check_urls(&urls, &ScanConfig::default()).unwrap();

        assert!(results[0].is_sensitive());
        assert_eq!(results[0].normalized.as_deref(), Some("http://h.example/backup/site.zip"));
        assert!(!results[1].is_sensitive());
        assert!(results[1].error.is_none());
        assert!(results[2].error.as_deref().unwrap().contains("forbidden"));
    }

    #[test]
    fn test_check_result_json_skips_empty_fields() {
        let results = check_urls(&["h.example/".to_string()], &ScanConfig::default()).unwrap();
        let json = serde_json::to_string(&results[0]).unwrap();
        assert_eq!(json, r#"{"input":"h.example/","normalized":"http://h.example"}"#);
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééé", 3), "ééé...");
    }
}
