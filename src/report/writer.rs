// src/report/writer.rs
// =============================================================================
// Writes the findings report.
//
// Format:
// - UTF-8 with a byte-order mark, so spreadsheet tools pick the right encoding
// - Header row: risk level, URL, basis
// - One row per finding, risk level always "critical" (single severity tier)
// - File name carries a local timestamp: scan_report_YYYYMMDD_HHMMSS.csv
// =============================================================================

use crate::crawl::Finding;
use crate::error::ReportError;
use chrono::Local;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

const BOM: &[u8] = b"\xEF\xBB\xBF";
const HEADER: [&str; 3] = ["risk level", "URL", "basis"];
const RISK_LEVEL: &str = "critical";

/// Writes a timestamped report into `dir` and returns its absolute path.
pub fn write_report(dir: &Path, findings: &[Finding]) -> Result<PathBuf, ReportError> {
    let name = format!("scan_report_{}.csv", Local::now().format("%Y%m%d_%H%M%S"));
    fs::create_dir_all(dir)?;
    write_report_to(&dir.join(name), findings)
}

fn write_report_to(path: &Path, findings: &[Finding]) -> Result<PathBuf, ReportError> {
    let mut file = File::create(path)?;
    file.write_all(BOM)?;

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(HEADER)?;
    for finding in findings {
        writer.write_record([RISK_LEVEL, finding.url.as_str(), finding.reason.as_str()])?;
    }
    writer.flush()?;

    Ok(fs::canonicalize(path)?)
}
