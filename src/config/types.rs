use crate::mirror::{DEFAULT_INDEX, DEFAULT_USER_AGENT};
use serde::Deserialize;

/// Main configuration structure for Site-Mirror
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mirror: MirrorConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub filter: FilterConfig,
}

/// What to mirror and where to put it
#[derive(Debug, Clone, Deserialize)]
pub struct MirrorConfig {
    /// URL the crawl starts from
    pub entry: String,

    /// Mirror root directory
    pub local: String,

    /// Staging directory for in-progress downloads (system temp dir if unset)
    #[serde(rename = "temp-dir", default)]
    pub temp_dir: Option<String>,

    /// Remove the mirror root before starting
    #[serde(rename = "clean-local", default)]
    pub clean_local: bool,

    /// Keep existing files whose content did not change
    #[serde(rename = "skip-existing", default)]
    pub skip_existing: bool,

    /// Symlink redirect and canonical URLs to the stored file
    #[serde(rename = "link-aliases", default = "default_true")]
    pub link_aliases: bool,

    /// File name used for directory-style URLs
    #[serde(rename = "default-index", default = "default_index")]
    pub default_index: String,

    /// Pipelines in flight at once
    #[serde(default = "default_workers")]
    pub workers: usize,
}

/// Per-resource time limits (milliseconds)
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutConfig {
    /// Time allowed until response headers arrive
    #[serde(rename = "headers-ms", default = "default_headers_ms")]
    pub headers_ms: u64,

    /// Time allowed until the body is complete
    #[serde(rename = "body-ms", default = "default_body_ms")]
    pub body_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            headers_ms: default_headers_ms(),
            body_ms: default_body_ms(),
        }
    }
}

/// HTTP client settings
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Idle keep-alive connections kept per host
    #[serde(rename = "max-idle-per-host", default = "default_max_idle_per_host")]
    pub max_idle_per_host: usize,

    /// How long idle connections are kept (milliseconds)
    #[serde(rename = "idle-timeout-ms", default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            max_idle_per_host: default_max_idle_per_host(),
            idle_timeout_ms: default_idle_timeout_ms(),
        }
    }
}

/// Admission filter settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterConfig {
    /// Host patterns (e.g. "example.com" or "*.example.com"); empty admits
    /// only the entry URL's host
    #[serde(default)]
    pub allow: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_index() -> String {
    DEFAULT_INDEX.to_string()
}

fn default_workers() -> usize {
    1
}

fn default_headers_ms() -> u64 {
    10_000
}

fn default_body_ms() -> u64 {
    60_000
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_max_idle_per_host() -> usize {
    256
}

fn default_idle_timeout_ms() -> u64 {
    3000
}
