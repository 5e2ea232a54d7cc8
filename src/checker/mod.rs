// src/checker/mod.rs
// =============================================================================
// This module contains the pure, network-free parts of the scanner.
//
// Submodules:
// - normalize: Canonicalizes raw strings into comparable URLs
// - classify: Flags URLs that point at exposed sensitive resources
// - html: Extracts links from root pages
// =============================================================================

mod classify;
mod html;
mod normalize;

pub use classify::{Classifier, MatchRule};
pub use html::extract_links;
pub use normalize::{BlockList, NormalizedUrl, Normalizer};
