//! Site-Mirror: an offline website mirror
//!
//! This crate fetches a site starting from one entry URL, rewrites the links
//! inside HTML and CSS so the copy is browsable from disk, and follows the
//! discovered resources until the admission filter stops admitting new ones.

pub mod config;
pub mod mime;
pub mod mirror;
pub mod output;
pub mod resource;
pub mod rewrite;
pub mod state;
pub mod url;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Site-Mirror operations
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Timed out waiting for response headers from {url}")]
    HeaderTimeout { url: String },

    #[error("Timed out waiting for response body from {url}")]
    BodyTimeout { url: String },

    #[error("Rewrite failed for {url}: {source}")]
    Transform {
        url: String,
        source: rewrite::TransformError,
    },

    #[error("Failed to prepare directory {path}: {source}")]
    Prepare {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error at {path}: {source}")]
    FileSystem {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Mirror has already been started")]
    AlreadyStarted,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Site-Mirror operations
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use mirror::{Mirror, MirrorOptions, MirrorSummary, StopHandle};
pub use resource::{local_path_for, relative_local_url, Resource};
pub use state::{ResourceStage, UrlStatus};
pub use crate::url::{normalize_url, UrlFilter};
