//! Per-resource pipeline
//!
//! ```text
//! Queued → HeaderFetch → Transferring → Evaluating → Publishing → Expanding → Done
//!              │              │              │             │
//!              └──────────────┴──────────────┴─────────────┴──→ Skipped
//! ```
//!
//! Each stage is one step function. The step enum carries whatever the next
//! stage needs (the open response, byte counts), so no stage can run without
//! its input. Any error ends the pipeline; the staging file is removed and the
//! resource is marked `Skipped`.

use super::links::LinkResolver;
use super::local_path::{relative_path, LocalLayout};
use super::{ParsedLink, Resource};
use crate::mirror::fetcher::{self, FetchResponse};
use crate::mirror::StagingArea;
use crate::rewrite::{TransformError, Transformer};
use crate::state::ResourceStage;
use crate::url::UrlFilter;
use crate::{MirrorError, Result};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::time::timeout;

/// Everything a pipeline needs from the mirror, shared by all resources
pub struct PipelineContext {
    pub layout: LocalLayout,
    pub filter: UrlFilter,
    pub client: reqwest::Client,
    pub staging: StagingArea,
    /// Bound on the time until response headers arrive
    pub header_timeout: Duration,
    /// Bound on the time until the body has been fully received
    pub body_timeout: Duration,
    pub link_aliases: bool,
    pub skip_existing: bool,
}

/// Outcome of a successful pipeline run
#[derive(Debug, Default)]
pub struct TransferReport {
    /// Children discovered while rewriting, in discovery order
    pub children: Vec<ParsedLink>,
    /// Bytes written to the staging file
    pub bytes: u64,
    /// The content matched the existing local copy and was not republished
    pub unchanged: bool,
    /// Time from sending the request until the body was complete
    pub elapsed: Duration,
}

enum Step {
    Fetch,
    Transfer(FetchResponse),
    Evaluate { bytes: u64 },
    Publish { bytes: u64, unchanged: bool },
    Expand { bytes: u64, unchanged: bool },
    Finished(TransferReport),
}

impl Resource {
    /// Runs the whole pipeline for this resource
    ///
    /// On success the resource ends in [`ResourceStage::Done`], otherwise in
    /// [`ResourceStage::Skipped`]. Either way no staging file is left behind.
    pub async fn process(&mut self, ctx: &PipelineContext) -> Result<TransferReport> {
        let result = self.run_steps(ctx).await;

        if let Some(temp) = self.take_temp_file() {
            remove_quietly(&temp).await;
        }

        match result {
            Ok(report) => {
                self.advance(ResourceStage::Done);
                Ok(report)
            }
            Err(e) => {
                self.advance(ResourceStage::Skipped);
                Err(e)
            }
        }
    }

    async fn run_steps(&mut self, ctx: &PipelineContext) -> Result<TransferReport> {
        let started = Instant::now();
        let mut elapsed = Duration::ZERO;
        let mut step = Step::Fetch;
        loop {
            step = match step {
                Step::Fetch => {
                    self.advance(ResourceStage::HeaderFetch);
                    Step::Transfer(self.fetch_headers(ctx).await?)
                }
                Step::Transfer(response) => {
                    self.advance(ResourceStage::Transferring);
                    let bytes = self.transfer(ctx, response).await?;
                    elapsed = started.elapsed();
                    Step::Evaluate { bytes }
                }
                Step::Evaluate { bytes } => {
                    self.advance(ResourceStage::Evaluating);
                    let unchanged = self.evaluate(ctx).await?;
                    Step::Publish { bytes, unchanged }
                }
                Step::Publish { bytes, unchanged } => {
                    self.advance(ResourceStage::Publishing);
                    self.publish(ctx, unchanged).await?;
                    Step::Expand { bytes, unchanged }
                }
                Step::Expand { bytes, unchanged } => {
                    self.advance(ResourceStage::Expanding);
                    Step::Finished(TransferReport {
                        children: self.take_children(),
                        bytes,
                        unchanged,
                        elapsed,
                    })
                }
                Step::Finished(report) => return Ok(report),
            };
        }
    }

    /// Opens the connection and waits for status and headers
    async fn fetch_headers(&mut self, ctx: &PipelineContext) -> Result<FetchResponse> {
        let mut request_url = self.linked_url.clone();
        request_url.set_fragment(None);

        let response = match timeout(ctx.header_timeout, fetcher::open(&ctx.client, &request_url)).await {
            Err(_) => {
                return Err(MirrorError::HeaderTimeout {
                    url: request_url.to_string(),
                })
            }
            Ok(Err(source)) => {
                return Err(MirrorError::Http {
                    url: request_url.to_string(),
                    source,
                })
            }
            Ok(Ok(response)) => response,
        };

        if response.final_url() != &request_url {
            tracing::debug!("{} redirected to {}", request_url, response.final_url());
            self.set_redirect_url(response.final_url().clone());
        }

        if response.status() >= 400 {
            return Err(MirrorError::Status {
                url: request_url.to_string(),
                status: response.status(),
            });
        }

        self.set_remote_headers(response.headers().clone());
        Ok(response)
    }

    /// Streams the body through the selected transform into the staging file
    async fn transfer(&mut self, ctx: &PipelineContext, mut response: FetchResponse) -> Result<u64> {
        let temp = match self.temp_file() {
            Some(path) => path.to_path_buf(),
            None => {
                let path = ctx.staging.allocate();
                self.set_temp_file(path.clone());
                path
            }
        };

        let url = self.linked_url.to_string();
        let mime_type = self.mime().to_string();
        let mut transformer = Transformer::for_mime(&mime_type);
        tracing::debug!("Transferring {} as {} ({})", url, mime_type, transformer.name());

        let file = fs::File::create(&temp)
            .await
            .map_err(|source| MirrorError::FileSystem {
                path: temp.clone(),
                source,
            })?;
        let mut writer = BufWriter::new(file);
        let mut resolver = LinkResolver::new(self, &ctx.layout, &ctx.filter);

        let body = async {
            let mut written = 0u64;
            let write_error = |source: std::io::Error| MirrorError::FileSystem {
                path: temp.clone(),
                source,
            };
            let transform_error = |source: TransformError| MirrorError::Transform {
                url: url.clone(),
                source,
            };

            while let Some(chunk) = response.chunk().await.map_err(|source| MirrorError::Http {
                url: url.clone(),
                source,
            })? {
                let out = transformer
                    .push(&chunk, &mut resolver)
                    .map_err(transform_error)?;
                writer.write_all(&out).await.map_err(write_error)?;
                written += out.len() as u64;
            }

            let out = transformer.finish(&mut resolver).map_err(transform_error)?;
            writer.write_all(&out).await.map_err(write_error)?;
            writer.flush().await.map_err(write_error)?;
            written += out.len() as u64;
            Ok::<u64, MirrorError>(written)
        };

        let outcome = timeout(ctx.body_timeout, body).await;
        match outcome {
            Ok(result) => result,
            Err(_) => Err(MirrorError::BodyTimeout { url }),
        }
    }

    /// Compares the staging file with an existing local copy
    ///
    /// Returns true when the content is unchanged; the staging file is then
    /// discarded.
    async fn evaluate(&mut self, ctx: &PipelineContext) -> Result<bool> {
        if !ctx.skip_existing {
            return Ok(false);
        }
        let local = self.local_path(&ctx.layout).to_path_buf();
        let Some(temp) = self.temp_file().map(Path::to_path_buf) else {
            return Ok(false);
        };
        if !fs::try_exists(&local).await.unwrap_or(false) {
            return Ok(false);
        }

        let existing = file_digest(&local).await?;
        let staged = file_digest(&temp).await?;
        if existing != staged {
            tracing::debug!("{} changed since last mirror", local.display());
            return Ok(false);
        }

        tracing::debug!("{} unchanged ({})", local.display(), existing);
        self.take_temp_file();
        remove_quietly(&temp).await;
        Ok(true)
    }

    /// Links aliases and moves the staging file into place
    async fn publish(&mut self, ctx: &PipelineContext, unchanged: bool) -> Result<()> {
        let primary = self.local_path(&ctx.layout).to_path_buf();

        if ctx.link_aliases {
            let mime_type = self.mime().to_string();
            for alias in self.alias_urls() {
                let alias_path = ctx.layout.path_for(&alias, &mime_type);
                if alias_path == primary {
                    continue;
                }
                tracing::debug!("Linking {} -> {}", alias_path.display(), primary.display());
                link_alias(&alias_path, &primary).await?;
            }
        }

        if unchanged {
            return Ok(());
        }
        let Some(temp) = self.temp_file().map(Path::to_path_buf) else {
            return Ok(());
        };
        publish_file(&temp, &primary).await?;
        self.take_temp_file();
        Ok(())
    }
}

fn fs_error(path: &Path) -> impl FnOnce(std::io::Error) -> MirrorError + '_ {
    move |source| MirrorError::FileSystem {
        path: path.to_path_buf(),
        source,
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            tracing::debug!("Could not remove staging file {}: {}", path.display(), e);
        }
    }
}

/// SHA-256 of a file's content, hex encoded
async fn file_digest(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path).await.map_err(fs_error(path))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buffer).await.map_err(fs_error(path))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Moves `staging` to `target` so readers only ever see a complete file
///
/// When the staging directory is on another filesystem the content is first
/// copied next to the target and then renamed over it.
async fn publish_file(staging: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).await.map_err(fs_error(parent))?;
    }

    if fs::rename(staging, target).await.is_ok() {
        return Ok(());
    }

    let partial = partial_path(target);
    let copied = async {
        fs::copy(staging, &partial).await?;
        fs::rename(&partial, target).await
    }
    .await;

    match copied {
        Ok(()) => {
            remove_quietly(staging).await;
            Ok(())
        }
        Err(source) => {
            remove_quietly(&partial).await;
            Err(MirrorError::FileSystem {
                path: target.to_path_buf(),
                source,
            })
        }
    }
}

fn partial_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{}.partial", name))
}

/// Points `alias` at `primary` with a relative symlink
///
/// An older symlink at the alias path is replaced. A regular file or a
/// directory there belongs to another resource and is left alone.
async fn link_alias(alias: &Path, primary: &Path) -> Result<()> {
    if let Some(parent) = alias.parent() {
        fs::create_dir_all(parent).await.map_err(fs_error(parent))?;
    }

    match fs::symlink_metadata(alias).await {
        Ok(meta) if meta.is_dir() => {
            tracing::warn!("Not linking alias over directory {}", alias.display());
            return Ok(());
        }
        Ok(meta) if meta.is_file() => {
            tracing::debug!("Not linking alias over stored file {}", alias.display());
            return Ok(());
        }
        Ok(_) => fs::remove_file(alias).await.map_err(fs_error(alias))?,
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(source) => {
            return Err(MirrorError::FileSystem {
                path: alias.to_path_buf(),
                source,
            })
        }
    }

    let target = relative_path(primary, alias);
    symlink(&target, alias).await.map_err(fs_error(alias))
}

#[cfg(unix)]
async fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    fs::symlink(target, link).await
}

#[cfg(windows)]
async fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    fs::symlink_file(target, link).await
}
