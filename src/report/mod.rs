// src/report/mod.rs
// =============================================================================
// Output of a scan run.
//
// Submodules:
// - writer: The timestamped CSV findings report
// - progress: The live single-line progress display
// =============================================================================

pub mod progress;
mod writer;

pub use writer::write_report;
