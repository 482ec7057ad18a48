//! Resource data model
//!
//! A [`Resource`] is the unit of mirror work for one logical target. It
//! tracks the URLs the target is known under, the MIME type and local path
//! it resolves to, and the children discovered while its body was rewritten.
//!
//! # Components
//!
//! - `local_path`: URL → file mapping and local relative links
//! - `links`: link resolution for HTML tags and CSS references
//! - `pipeline`: the per-resource fetch/rewrite/publish state machine

mod links;
mod local_path;
mod pipeline;

pub use links::LinkResolver;
pub use local_path::{local_path_for, relative_local_url, relative_path, LocalLayout};
pub use pipeline::{PipelineContext, TransferReport};

use crate::mime;
use crate::state::ResourceStage;
use crate::url::normalize_url;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use url::Url;

/// A child reference discovered while rewriting a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLink {
    /// Absolute URL of the child
    pub url: Url,
    /// Local file the child was mapped to when the link was rewritten
    pub local_path: PathBuf,
    /// MIME hint from the referencing context
    pub mime: String,
}

/// One admission decision made while resolving links
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDecision {
    pub url: Url,
    pub allowed: bool,
}

/// The unit of mirror work for one logical target
#[derive(Debug)]
pub struct Resource {
    linked_url: Url,
    redirect_url: Option<Url>,
    canonical_url: Option<Url>,
    base_url: Option<Url>,

    expected_mime: Option<String>,
    expected_local_path: Option<PathBuf>,
    mime: Option<String>,
    local_path: Option<PathBuf>,
    temp_file: Option<PathBuf>,

    parsed_resources: Vec<ParsedLink>,
    parsed_keys: HashSet<String>,
    filter_log: Vec<FilterDecision>,

    remote_headers: Option<HeaderMap>,
    /// Reserved; no code path retries a resource
    retries: u32,
    stage: ResourceStage,
}

impl Resource {
    /// Creates a resource for the URL it was referenced as
    pub fn new(linked_url: Url) -> Self {
        Self {
            linked_url,
            redirect_url: None,
            canonical_url: None,
            base_url: None,
            expected_mime: None,
            expected_local_path: None,
            mime: None,
            local_path: None,
            temp_file: None,
            parsed_resources: Vec::new(),
            parsed_keys: HashSet::new(),
            filter_log: Vec::new(),
            remote_headers: None,
            retries: 0,
            stage: ResourceStage::Queued,
        }
    }

    pub fn linked_url(&self) -> &Url {
        &self.linked_url
    }

    pub fn redirect_url(&self) -> Option<&Url> {
        self.redirect_url.as_ref()
    }

    pub fn canonical_url(&self) -> Option<&Url> {
        self.canonical_url.as_ref()
    }

    /// Records the final URL after HTTP redirects
    pub fn set_redirect_url(&mut self, url: Url) {
        if url != self.linked_url {
            self.redirect_url = Some(url);
        }
    }

    /// Records the canonical URL declared by the page
    pub fn set_canonical_url(&mut self, url: Url) {
        self.canonical_url = Some(url);
    }

    /// Overrides the URL relative links are resolved against
    pub fn set_base_url(&mut self, url: Url) {
        self.base_url = Some(url);
    }

    /// The URL the resource is best known under: canonical > redirect > linked
    pub fn official_url(&self) -> &Url {
        self.canonical_url
            .as_ref()
            .or(self.redirect_url.as_ref())
            .unwrap_or(&self.linked_url)
    }

    /// The URL the content was actually served from: redirect > linked
    pub fn open_url(&self) -> &Url {
        self.redirect_url.as_ref().unwrap_or(&self.linked_url)
    }

    /// The URL relative references are resolved against
    pub fn base_url(&self) -> &Url {
        self.base_url.as_ref().unwrap_or_else(|| self.open_url())
    }

    /// Redirect and canonical URLs that name a different resource than the linked URL
    pub fn alias_urls(&self) -> Vec<Url> {
        let primary = normalize_url(&self.linked_url);
        let mut seen = HashSet::from([primary]);
        [self.canonical_url.as_ref(), self.redirect_url.as_ref()]
            .into_iter()
            .flatten()
            .filter(|url| seen.insert(normalize_url(url)))
            .cloned()
            .collect()
    }

    pub fn expected_mime(&self) -> Option<&str> {
        self.expected_mime.as_deref()
    }

    /// Stamps the MIME hint of the context that discovered this resource
    pub fn set_expected_mime(&mut self, mime_type: impl Into<String>) {
        self.expected_mime = Some(mime_type.into());
    }

    pub fn expected_local_path(&self) -> Option<&Path> {
        self.expected_local_path.as_deref()
    }

    /// Stamps the local path the discovering link was rewritten to
    pub fn set_expected_local_path(&mut self, path: impl Into<PathBuf>) {
        self.expected_local_path = Some(path.into());
    }

    pub fn set_remote_headers(&mut self, headers: HeaderMap) {
        self.remote_headers = Some(headers);
    }

    pub fn remote_headers(&self) -> Option<&HeaderMap> {
        self.remote_headers.as_ref()
    }

    /// The resolved MIME type, computed once
    ///
    /// See [`resolve_mime`] for the precedence rules. Headers recorded after
    /// the first call do not change the result.
    pub fn mime(&mut self) -> &str {
        self.mime.get_or_insert_with(|| {
            let content_type = self
                .remote_headers
                .as_ref()
                .and_then(|headers| headers.get(CONTENT_TYPE))
                .and_then(|value| value.to_str().ok());
            resolve_mime(
                self.expected_mime.as_deref(),
                mime::guess_from_url(self.linked_url.as_str()),
                content_type,
            )
        })
    }

    /// The local file this resource is published to, computed once
    ///
    /// The path stamped by the discovering link wins, so the page that links
    /// here and the file written here always agree.
    pub fn local_path(&mut self, layout: &LocalLayout) -> &Path {
        let path = match self.local_path.take() {
            Some(path) => path,
            None => match self.expected_local_path.clone() {
                Some(expected) => expected,
                None => {
                    let mime_type = self.mime().to_string();
                    layout.path_for(&self.linked_url, &mime_type)
                }
            },
        };
        self.local_path.insert(path)
    }

    pub fn temp_file(&self) -> Option<&Path> {
        self.temp_file.as_deref()
    }

    pub fn set_temp_file(&mut self, path: PathBuf) {
        self.temp_file = Some(path);
    }

    pub fn take_temp_file(&mut self) -> Option<PathBuf> {
        self.temp_file.take()
    }

    /// Records a discovered child; returns false if it was already recorded
    pub fn record_link(&mut self, link: ParsedLink) -> bool {
        if !self.parsed_keys.insert(normalize_url(&link.url)) {
            return false;
        }
        self.parsed_resources.push(link);
        true
    }

    pub fn has_link(&self, url: &Url) -> bool {
        self.parsed_keys.contains(&normalize_url(url))
    }

    pub fn parsed_resources(&self) -> &[ParsedLink] {
        &self.parsed_resources
    }

    /// Hands the discovered children over, in discovery order
    pub fn take_children(&mut self) -> Vec<ParsedLink> {
        self.parsed_keys.clear();
        std::mem::take(&mut self.parsed_resources)
    }

    pub fn record_filter_decision(&mut self, url: &Url, allowed: bool) {
        self.filter_log.push(FilterDecision {
            url: url.clone(),
            allowed,
        });
    }

    pub fn take_filter_log(&mut self) -> Vec<FilterDecision> {
        std::mem::take(&mut self.filter_log)
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn stage(&self) -> ResourceStage {
        self.stage
    }

    /// Moves the resource to `to`; returns false if the move is not allowed
    pub fn advance(&mut self, to: ResourceStage) -> bool {
        if !self.stage.can_transition_to(to) {
            tracing::debug!(
                "Ignoring stage change {} -> {} for {}",
                self.stage,
                to,
                self.linked_url
            );
            return false;
        }
        self.stage = to;
        true
    }
}

/// Decides the MIME type of a resource
///
/// With an expected type `E` from the discovering context: the URL guess if
/// it contains `E`, else the `Content-Type` (parameters stripped) if it
/// contains `E`, else `E` itself. Without `E`: the `Content-Type`, falling
/// back to the URL guess. Containment is case-insensitive.
pub fn resolve_mime(expected: Option<&str>, url_guess: &str, content_type: Option<&str>) -> String {
    let content_type = content_type
        .map(mime::essence)
        .filter(|essence| !essence.is_empty());

    let Some(expected) = expected else {
        return content_type.unwrap_or(url_guess).to_string();
    };

    let wanted = expected.to_ascii_lowercase();
    if url_guess.to_ascii_lowercase().contains(&wanted) {
        return url_guess.to_string();
    }
    match content_type {
        Some(served) if served.to_ascii_lowercase().contains(&wanted) => served.to_string(),
        _ => expected.to_string(),
    }
}
