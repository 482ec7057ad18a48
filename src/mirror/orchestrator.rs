//! Mirror orchestrator - seeds, schedules and finishes a run
//!
//! The orchestrator is the only writer of the registry, the queue and the
//! status sets. Pipelines take their resource out of the registry, run to
//! completion, and hand the resource back together with what they found;
//! the orchestrator then applies the outcome:
//! - the URL is marked downloaded or skipped
//! - redirect and canonical aliases are registered under the same resource
//! - discovered children are admitted to the queue

use super::registry::{Registry, ResourceId};
use super::{build_http_client, MirrorOptions, StagingArea, StopHandle};
use crate::mime;
use crate::output::{FilterAnalysis, FilterLedger, MirrorStats};
use crate::resource::{LocalLayout, PipelineContext, Resource, TransferReport};
use crate::state::UrlStatus;
use crate::{MirrorError, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::fs;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Lifecycle of a [`Mirror`]; a mirror runs at most once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Finished,
}

/// What a finished run did
#[derive(Debug, Clone)]
pub struct MirrorSummary {
    pub stats: MirrorStats,
    /// True if the queue was drained, false if the run was stopped
    pub completed: bool,
    pub elapsed: Duration,
}

type FinishCallback = Box<dyn FnOnce(&MirrorSummary) + Send>;

/// A website mirror run
///
/// # Example
///
/// ```no_run
/// use site_mirror::{Mirror, MirrorOptions};
/// use url::Url;
///
/// # async fn run() -> site_mirror::Result<()> {
/// let entry = Url::parse("https://example.com/").unwrap();
/// let mut mirror = Mirror::new(MirrorOptions::new(entry, "./mirror"))?;
/// let summary = mirror.start().await?;
/// println!("{} resources mirrored", summary.stats.downloaded);
/// # Ok(())
/// # }
/// ```
pub struct Mirror {
    entry: Url,
    local: PathBuf,
    clean_local: bool,
    workers: usize,
    context: Arc<PipelineContext>,
    registry: Registry,
    stats: MirrorStats,
    ledger: FilterLedger,
    stop: CancellationToken,
    state: RunState,
    on_finish: Option<FinishCallback>,
}

impl Mirror {
    /// Creates a mirror; nothing touches the network or disk until [`start`](Self::start)
    pub fn new(options: MirrorOptions) -> Result<Self> {
        let client = build_http_client(&options.http).map_err(|source| MirrorError::Http {
            url: options.entry.to_string(),
            source,
        })?;

        let context = PipelineContext {
            layout: LocalLayout::new(&options.local, options.default_index.clone()),
            filter: options.filter.clone(),
            client,
            staging: StagingArea::new(&options.temp_dir),
            header_timeout: options.header_timeout,
            body_timeout: options.body_timeout,
            link_aliases: options.link_aliases,
            skip_existing: options.skip_existing,
        };

        Ok(Self {
            entry: options.entry,
            local: options.local,
            clean_local: options.clean_local,
            workers: options.workers.max(1),
            context: Arc::new(context),
            registry: Registry::new(),
            stats: MirrorStats::default(),
            ledger: FilterLedger::new(),
            stop: CancellationToken::new(),
            state: RunState::Idle,
            on_finish: None,
        })
    }

    /// Registers a callback invoked once the run has finished
    pub fn on_finish(&mut self, callback: impl FnOnce(&MirrorSummary) + Send + 'static) {
        self.on_finish = Some(Box::new(callback));
    }

    /// Runs the mirror until the queue is drained or the run is stopped
    ///
    /// Fails with [`MirrorError::AlreadyStarted`] on a second call, and with
    /// [`MirrorError::Prepare`] if the mirror root or staging directory cannot
    /// be set up; in that case nothing is fetched. Failures of individual
    /// resources never end the run.
    pub async fn start(&mut self) -> Result<MirrorSummary> {
        if self.state != RunState::Idle {
            return Err(MirrorError::AlreadyStarted);
        }
        self.state = RunState::Running;

        if let Err(e) = self.prepare_directories().await {
            tracing::error!("Cannot start mirror: {}", e);
            self.state = RunState::Finished;
            return Err(e);
        }

        self.seed();
        let summary = self.run().await;
        self.state = RunState::Finished;

        if let Some(callback) = self.on_finish.take() {
            callback(&summary);
        }
        Ok(summary)
    }

    /// Stops scheduling; in-flight pipelines finish
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle::new(self.stop.clone())
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn stats(&self) -> &MirrorStats {
        &self.stats
    }

    /// Admission decisions so far, most asked first
    pub fn filter_analysis(&self) -> FilterAnalysis {
        self.ledger.analysis()
    }

    /// A staging file name unique for the life of the process
    pub fn allocate_temp_name(&self) -> PathBuf {
        self.context.staging.allocate()
    }

    pub fn status(&self, url: &Url) -> Option<UrlStatus> {
        self.registry.status(url)
    }

    async fn prepare_directories(&self) -> Result<()> {
        if self.clean_local {
            match fs::remove_dir_all(&self.local).await {
                Ok(()) => tracing::info!("Removed previous mirror at {}", self.local.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(MirrorError::Prepare {
                        path: self.local.clone(),
                        source,
                    })
                }
            }
        }

        for dir in [self.context.staging.dir(), self.local.as_path()] {
            create_dir(dir).await?;
        }
        Ok(())
    }

    fn seed(&mut self) {
        let entry = self.entry.clone();
        let allowed = (self.context.filter)(&entry);
        self.record_decision(&entry, allowed);
        if !allowed {
            tracing::warn!("Entry URL {} is rejected by the admission filter", entry);
            self.registry.mark(&entry, UrlStatus::Skipped);
            self.stats.skipped += 1;
            return;
        }

        let id = self.registry.get_or_create(&entry);
        if let Some(resource) = self.registry.get_mut(id) {
            resource.set_expected_mime(mime::types::HTML);
        }
        self.registry.enqueue(id);
        self.registry.mark(&entry, UrlStatus::Queued);
        self.stats.queued += 1;
    }

    async fn run(&mut self) -> MirrorSummary {
        let started = Instant::now();
        tracing::info!(
            "Mirroring {} into {} ({} worker{})",
            self.entry,
            self.local.display(),
            self.workers,
            if self.workers == 1 { "" } else { "s" }
        );

        let mut in_flight = FuturesUnordered::new();
        let mut finished: u64 = 0;

        loop {
            while in_flight.len() < self.workers && !self.stop.is_cancelled() {
                let Some(id) = self.registry.dequeue() else {
                    break;
                };
                let Some(resource) = self.registry.checkout(id) else {
                    continue;
                };
                if let Some(status) = self.registry.status(resource.linked_url()) {
                    if status.is_terminal() {
                        tracing::debug!("{} already {} under another URL", resource.linked_url(), status);
                        self.registry.checkin(id, resource);
                        continue;
                    }
                }

                tracing::debug!("Processing {}", resource.linked_url());
                let ctx = Arc::clone(&self.context);
                in_flight.push(async move {
                    let mut resource = resource;
                    let result = resource.process(&ctx).await;
                    (id, resource, result)
                });
            }

            let Some((id, resource, result)) = in_flight.next().await else {
                break;
            };
            self.complete(id, resource, result);
            finished += 1;

            if finished % 10 == 0 {
                let rate = finished as f64 / started.elapsed().as_secs_f64();
                tracing::info!(
                    "Progress: {} resources finished, {} queued, {:.2} resources/sec",
                    finished,
                    self.registry.queue_len(),
                    rate
                );
            }
        }

        let stopped = self.stop.is_cancelled();
        let completed = !stopped && self.registry.queue_len() == 0;
        if stopped {
            tracing::info!("Mirror stopped with {} resources still queued", self.registry.queue_len());
        }
        tracing::info!(
            "Mirror finished: {} downloaded, {} skipped in {:?}",
            self.stats.downloaded,
            self.stats.skipped,
            started.elapsed()
        );

        MirrorSummary {
            stats: self.stats.clone(),
            completed,
            elapsed: started.elapsed(),
        }
    }

    /// Applies the outcome of one pipeline run
    fn complete(&mut self, id: ResourceId, mut resource: Resource, result: Result<TransferReport>) {
        for decision in resource.take_filter_log() {
            self.record_decision(&decision.url, decision.allowed);
        }

        let url = resource.linked_url().clone();
        let (status, children) = match result {
            Ok(report) => {
                self.stats.record_download(report.bytes, report.elapsed);
                if report.unchanged {
                    self.stats.unchanged += 1;
                }
                tracing::debug!(
                    "Mirrored {} ({} bytes, {} links)",
                    url,
                    report.bytes,
                    report.children.len()
                );
                (UrlStatus::Downloaded, report.children)
            }
            Err(e) => {
                self.stats.skipped += 1;
                tracing::warn!("Skipped {}: {}", url, e);
                (UrlStatus::Skipped, Vec::new())
            }
        };

        self.registry.mark(&url, status);
        if self.context.link_aliases {
            for alias in resource.alias_urls() {
                if self.registry.alias(&alias, id) {
                    self.registry.mark(&alias, status);
                } else {
                    tracing::debug!("Alias {} of {} is already a known URL", alias, url);
                }
            }
        }
        self.registry.checkin(id, resource);

        let admitted = self.registry.admit(children);
        self.stats.queued += admitted as u64;
    }

    fn record_decision(&mut self, url: &Url, allowed: bool) {
        self.ledger.record(url, allowed);
        if allowed {
            self.stats.allowed += 1;
        } else {
            self.stats.denied += 1;
        }
    }
}

async fn create_dir(dir: &Path) -> Result<()> {
    match fs::create_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(source) => Err(MirrorError::Prepare {
            path: dir.to_path_buf(),
            source,
        }),
    }
}
