//! URL handling module for Site-Mirror
//!
//! This module provides the registry key normalization, host wildcard
//! matching, and the admission filters that decide which URLs get mirrored.

mod matcher;
mod normalize;

use std::sync::Arc;
use url::Url;

// Re-export main functions
pub use matcher::matches_wildcard;
pub use normalize::{normalize_url, parse_http_url};

/// Admission filter deciding whether a URL may be mirrored
///
/// The filter is caller-supplied policy; the mirror treats it as opaque and
/// only ever sees absolute http(s) URLs.
pub type UrlFilter = Arc<dyn Fn(&Url) -> bool + Send + Sync>;

/// Admits only URLs on the same host as `entry`
///
/// # Examples
///
/// ```
/// use site_mirror::url::same_host;
/// use url::Url;
///
/// let filter = same_host(&Url::parse("https://example.com/").unwrap());
/// assert!(filter(&Url::parse("http://example.com/a.css").unwrap()));
/// assert!(!filter(&Url::parse("https://cdn.example.com/a.css").unwrap()));
/// ```
pub fn same_host(entry: &Url) -> UrlFilter {
    let host = entry.host_str().map(str::to_lowercase);
    Arc::new(move |url: &Url| url.host_str().map(str::to_lowercase) == host)
}

/// Admits URLs whose host matches any of the given wildcard patterns
///
/// Patterns use the same syntax as [`matches_wildcard`].
pub fn host_patterns(patterns: Vec<String>) -> UrlFilter {
    Arc::new(move |url: &Url| {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_lowercase();
        patterns
            .iter()
            .any(|pattern| matches_wildcard(pattern, &host))
    })
}

/// Admits every URL
pub fn allow_all() -> UrlFilter {
    Arc::new(|_: &Url| true)
}
