//! Mirror orchestration
//!
//! This module contains the run-level machinery:
//! - `orchestrator`: the [`Mirror`] that seeds, schedules and finishes a run
//! - `registry`: resource identity, the work queue and URL status sets
//! - `fetcher`: the pooled HTTP transport
//! - `staging`: unique staging file names

pub mod fetcher;
mod orchestrator;
mod registry;
mod staging;

pub use fetcher::{build_http_client, HttpOptions, DEFAULT_USER_AGENT};
pub use orchestrator::{Mirror, MirrorSummary, RunState};
pub use registry::{Registry, ResourceId};
pub use staging::StagingArea;

use crate::config::Config;
use crate::url::{host_patterns, parse_http_url, same_host, UrlFilter};
use crate::ConfigResult;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Default header wait
pub const DEFAULT_HEADER_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Default body wait
pub const DEFAULT_BODY_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Default file name for directory-style URLs
pub const DEFAULT_INDEX: &str = "index.html";

/// Staging directory used when none is configured
pub fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("site-mirror")
}

/// Everything a [`Mirror`] needs to run
#[derive(Clone)]
pub struct MirrorOptions {
    /// Where the crawl starts
    pub entry: Url,
    /// Mirror root directory
    pub local: PathBuf,
    /// Staging directory for in-progress downloads
    pub temp_dir: PathBuf,
    /// Remove the mirror root before starting
    pub clean_local: bool,
    /// Leave an existing local file alone when the new content is identical
    pub skip_existing: bool,
    /// Symlink redirect and canonical paths to the primary file
    pub link_aliases: bool,
    pub default_index: String,
    pub header_timeout: Duration,
    pub body_timeout: Duration,
    /// Pipelines allowed in flight at once
    pub workers: usize,
    pub http: HttpOptions,
    /// Decides which discovered URLs are mirrored
    pub filter: UrlFilter,
}

impl MirrorOptions {
    /// Options with defaults: one worker, alias linking on, and a filter
    /// admitting only the entry URL's host
    pub fn new(entry: Url, local: impl Into<PathBuf>) -> Self {
        let filter = same_host(&entry);
        Self {
            entry,
            local: local.into(),
            temp_dir: default_temp_dir(),
            clean_local: false,
            skip_existing: false,
            link_aliases: true,
            default_index: DEFAULT_INDEX.to_string(),
            header_timeout: DEFAULT_HEADER_TIMEOUT,
            body_timeout: DEFAULT_BODY_TIMEOUT,
            workers: 1,
            http: HttpOptions::default(),
            filter,
        }
    }

    pub fn with_filter(mut self, filter: UrlFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Builds options from a validated configuration file
    pub fn from_config(config: &Config) -> ConfigResult<Self> {
        let mirror = &config.mirror;
        let entry = parse_http_url(&mirror.entry)
            .map_err(|e| crate::ConfigError::InvalidUrl(format!("entry: {}", e)))?;

        let filter = if config.filter.allow.is_empty() {
            same_host(&entry)
        } else {
            host_patterns(
                config
                    .filter
                    .allow
                    .iter()
                    .map(|p| p.to_lowercase())
                    .collect(),
            )
        };

        Ok(Self {
            entry,
            local: PathBuf::from(&mirror.local),
            temp_dir: mirror
                .temp_dir
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or_else(default_temp_dir),
            clean_local: mirror.clean_local,
            skip_existing: mirror.skip_existing,
            link_aliases: mirror.link_aliases,
            default_index: mirror.default_index.clone(),
            header_timeout: Duration::from_millis(config.timeouts.headers_ms),
            body_timeout: Duration::from_millis(config.timeouts.body_ms),
            workers: mirror.workers,
            http: HttpOptions {
                user_agent: config.http.user_agent.clone(),
                max_idle_per_host: config.http.max_idle_per_host,
                idle_timeout: Duration::from_millis(config.http.idle_timeout_ms),
            },
            filter,
        })
    }
}

impl fmt::Debug for MirrorOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MirrorOptions")
            .field("entry", &self.entry.as_str())
            .field("local", &self.local)
            .field("temp_dir", &self.temp_dir)
            .field("clean_local", &self.clean_local)
            .field("skip_existing", &self.skip_existing)
            .field("link_aliases", &self.link_aliases)
            .field("default_index", &self.default_index)
            .field("header_timeout", &self.header_timeout)
            .field("body_timeout", &self.body_timeout)
            .field("workers", &self.workers)
            .field("http", &self.http)
            .finish_non_exhaustive()
    }
}

/// Stops a running mirror from elsewhere (another task, a signal handler)
///
/// Pipelines already in flight finish; nothing new is dequeued.
#[derive(Debug, Clone)]
pub struct StopHandle {
    token: CancellationToken,
}

impl StopHandle {
    pub(crate) fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}
