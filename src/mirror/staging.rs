//! Staging file names

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Hands out unique staging file names inside one directory
///
/// Clones share the same counter, so names never repeat across the
/// resources of a run, however many are in flight.
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
    counter: Arc<AtomicU64>,
}

impl StagingArea {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            counter: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns a staging path no other caller has received
    ///
    /// The process id is part of the name so two mirrors sharing a staging
    /// directory do not collide either.
    pub fn allocate(&self) -> PathBuf {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        self.dir
            .join(format!("site-mirror-{}-{}", std::process::id(), n))
    }
}
