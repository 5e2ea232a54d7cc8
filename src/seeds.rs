// src/seeds.rs
// =============================================================================
// Reading the list of targets.
//
// The targets file is UTF-8 text, one host or URL per line. Blank lines are
// skipped. When no file is given on the command line we ask for its path.
// =============================================================================

use crate::error::SeedError;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

pub fn read_seeds(path: &Path) -> Result<Vec<String>, SeedError> {
    let content = std::fs::read_to_string(path).map_err(|source| SeedError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let seeds = parse_seeds(&content);
    if seeds.is_empty() {
        return Err(SeedError::Empty(path.to_path_buf()));
    }
    Ok(seeds)
}

fn parse_seeds(content: &str) -> Vec<String> {
    content
        .trim_start_matches('\u{feff}')
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Asks for the targets file path. Quotes pasted from a file manager are stripped.
pub fn prompt_for_path(mut input: impl BufRead, mut output: impl Write) -> Result<PathBuf, SeedError> {
    write!(output, "Targets file path: ").map_err(SeedError::Prompt)?;
    output.flush().map_err(SeedError::Prompt)?;

    let mut line = String::new();
    input.read_line(&mut line).map_err(SeedError::Prompt)?;
    let cleaned = line.trim_matches(|c: char| c.is_whitespace() || c == '"' || c == '\'');
    Ok(PathBuf::from(cleaned))
}
