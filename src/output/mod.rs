//! Output module for run summaries
//!
//! This module handles:
//! - Counting what a mirror run queued, downloaded and skipped
//! - Recording admission filter decisions
//! - Printing the end-of-run summary

pub mod stats;

pub use stats::{print_statistics, FilterAnalysis, FilterEntry, FilterLedger, MirrorStats};
