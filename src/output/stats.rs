//! Run statistics and filter analysis
//!
//! This module tracks what a mirror run did and how the admission filter
//! decided, and prints both as a summary.

use crate::url::normalize_url;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Counters for one mirror run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorStats {
    /// Filter verdicts that admitted a URL
    pub allowed: u64,
    /// Filter verdicts that rejected a URL
    pub denied: u64,
    /// Resources added to the queue (seed included)
    pub queued: u64,
    /// Resources whose pipeline succeeded
    pub downloaded: u64,
    /// Downloaded resources whose content matched the existing local copy
    pub unchanged: u64,
    /// Resources whose pipeline failed
    pub skipped: u64,
    /// Bytes written to staging files
    pub bytes: u64,
    /// Sum of the bytes/sec rate of every download
    pub speed_aggregate: u64,
}

impl MirrorStats {
    /// Counts one successful transfer of `bytes` that took `elapsed`
    pub fn record_download(&mut self, bytes: u64, elapsed: Duration) {
        self.downloaded += 1;
        self.bytes += bytes;
        let secs = elapsed.as_secs_f64();
        let rate = if secs > 0.0 { bytes as f64 / secs } else { bytes as f64 };
        self.speed_aggregate += rate as u64;
    }

    /// Mean transfer rate over all downloads in bytes/sec
    pub fn speed(&self) -> u64 {
        self.speed_aggregate.checked_div(self.downloaded).unwrap_or(0)
    }

    /// Resources that reached a terminal status
    pub fn finished(&self) -> u64 {
        self.downloaded + self.skipped
    }
}

/// Admission decisions for one URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterEntry {
    /// Normalized URL
    pub url: String,
    /// How often the filter was asked about this URL
    pub asks: u64,
    /// The filter's last verdict
    pub allowed: bool,
}

/// Filter decisions split by verdict, most asked first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterAnalysis {
    pub allowed: Vec<FilterEntry>,
    pub denied: Vec<FilterEntry>,
}

/// Records every question put to the admission filter
#[derive(Debug, Default)]
pub struct FilterLedger {
    entries: HashMap<String, (u64, bool)>,
}

impl FilterLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, url: &Url, allowed: bool) {
        let entry = self
            .entries
            .entry(normalize_url(url))
            .or_insert((0, allowed));
        entry.0 += 1;
        entry.1 = allowed;
    }

    /// Distinct URLs the filter was asked about
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Splits the recorded URLs by verdict, sorted by ask count descending
    /// and then by URL
    pub fn analysis(&self) -> FilterAnalysis {
        let mut analysis = FilterAnalysis::default();
        for (url, &(asks, allowed)) in &self.entries {
            let entry = FilterEntry {
                url: url.clone(),
                asks,
                allowed,
            };
            if allowed {
                analysis.allowed.push(entry);
            } else {
                analysis.denied.push(entry);
            }
        }
        for list in [&mut analysis.allowed, &mut analysis.denied] {
            list.sort_by(|a, b| b.asks.cmp(&a.asks).then_with(|| a.url.cmp(&b.url)));
        }
        analysis
    }
}

/// Prints run statistics to stdout
///
/// At most `top` entries of each filter list are shown.
pub fn print_statistics(stats: &MirrorStats, analysis: &FilterAnalysis, top: usize) {
    println!("=== Mirror Statistics ===\n");

    println!("Resources:");
    println!("  Queued: {}", stats.queued);
    println!("  Downloaded: {}", stats.downloaded);
    println!("  Unchanged: {}", stats.unchanged);
    println!("  Skipped: {}", stats.skipped);
    println!("  Bytes written: {}", stats.bytes);
    println!("  Average speed: {} bytes/sec", stats.speed());
    println!();

    println!("Admission filter:");
    println!("  Allowed: {}", stats.allowed);
    println!("  Denied: {}", stats.denied);

    if !analysis.denied.is_empty() {
        println!();
        println!("Most requested denied URLs:");
        for entry in analysis.denied.iter().take(top) {
            println!("  {:>5}  {}", entry.asks, entry.url);
        }
    }
}
