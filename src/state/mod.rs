//! State module for tracking mirror progress
//!
//! # Components
//!
//! - `ResourceStage`: where a single resource is inside the fetch/publish pipeline
//! - `UrlStatus`: the crawl-level status of a URL (queued, downloaded, skipped)

mod resource_stage;

pub use resource_stage::{ResourceStage, UrlStatus};
