//! Resource registry, work queue and URL status bookkeeping
//!
//! The registry is the single source of truth for identity: every normalized
//! URL (scheme and fragment stripped) maps to exactly one [`ResourceId`].
//! Alias URLs (redirect targets, canonical URLs) are extra keys for an
//! existing id.
//!
//! Status is kept in one map, so a URL is in at most one of the queued,
//! downloaded and skipped sets at any time. Downloaded and skipped are
//! terminal.

use crate::resource::{ParsedLink, Resource};
use crate::state::UrlStatus;
use crate::url::normalize_url;
use std::collections::{HashMap, VecDeque};
use url::Url;

/// Index of a resource inside the registry
pub type ResourceId = usize;

/// Registry of resources plus the queue of pending work
#[derive(Debug, Default)]
pub struct Registry {
    ids: HashMap<String, ResourceId>,
    /// `None` while the resource is checked out to a running pipeline
    slots: Vec<Option<Resource>>,
    queue: VecDeque<ResourceId>,
    status: HashMap<String, UrlStatus>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id for `url`, creating its resource on first sight
    ///
    /// Repeated calls for URLs with the same normalized form return the
    /// same id.
    pub fn get_or_create(&mut self, url: &Url) -> ResourceId {
        let key = normalize_url(url);
        if let Some(&id) = self.ids.get(&key) {
            return id;
        }
        let id = self.slots.len();
        self.slots.push(Some(Resource::new(url.clone())));
        self.ids.insert(key, id);
        id
    }

    pub fn lookup(&self, url: &Url) -> Option<ResourceId> {
        self.ids.get(&normalize_url(url)).copied()
    }

    /// Registers `url` as another name for resource `id`
    ///
    /// Returns false if the URL already names a resource; the existing
    /// mapping is kept.
    pub fn alias(&mut self, url: &Url, id: ResourceId) -> bool {
        let key = normalize_url(url);
        if self.ids.contains_key(&key) {
            return false;
        }
        self.ids.insert(key, id);
        true
    }

    /// The resource for `id`, unless it is checked out
    pub fn get(&self, id: ResourceId) -> Option<&Resource> {
        self.slots.get(id).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: ResourceId) -> Option<&mut Resource> {
        self.slots.get_mut(id).and_then(Option::as_mut)
    }

    /// Takes the resource out for a pipeline run
    pub fn checkout(&mut self, id: ResourceId) -> Option<Resource> {
        self.slots.get_mut(id).and_then(Option::take)
    }

    /// Puts a resource back after its pipeline run
    pub fn checkin(&mut self, id: ResourceId, resource: Resource) {
        if let Some(slot) = self.slots.get_mut(id) {
            *slot = Some(resource);
        }
    }

    pub fn status(&self, url: &Url) -> Option<UrlStatus> {
        self.status.get(&normalize_url(url)).copied()
    }

    /// Sets the status of `url`
    ///
    /// A terminal status is never changed again; returns false in that case.
    pub fn mark(&mut self, url: &Url, status: UrlStatus) -> bool {
        let key = normalize_url(url);
        match self.status.get(&key) {
            Some(current) if current.is_terminal() => {
                tracing::debug!("{} already {}, not marking {}", key, current, status);
                false
            }
            _ => {
                self.status.insert(key, status);
                true
            }
        }
    }

    pub fn enqueue(&mut self, id: ResourceId) {
        self.queue.push_back(id);
    }

    pub fn dequeue(&mut self) -> Option<ResourceId> {
        self.queue.pop_front()
    }

    /// Admits discovered references into the queue
    ///
    /// URLs that are already queued or terminal are skipped. Every other URL
    /// gets its resource stamped with the local path and MIME hint it was
    /// linked with, is enqueued and marked queued. Returns how many were
    /// enqueued.
    pub fn admit(&mut self, links: Vec<ParsedLink>) -> usize {
        let mut admitted = 0;
        for link in links {
            if self.status(&link.url).is_some() {
                continue;
            }
            let id = self.get_or_create(&link.url);
            if let Some(resource) = self.get_mut(id) {
                resource.set_expected_local_path(link.local_path);
                resource.set_expected_mime(link.mime);
            }
            self.enqueue(id);
            self.mark(&link.url, UrlStatus::Queued);
            admitted += 1;
        }
        admitted
    }

    /// Number of distinct resources known
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Normalized URLs currently in `status`, sorted
    pub fn urls_with_status(&self, status: UrlStatus) -> Vec<String> {
        let mut urls: Vec<String> = self
            .status
            .iter()
            .filter(|(_, s)| **s == status)
            .map(|(key, _)| key.clone())
            .collect();
        urls.sort();
        urls
    }

    pub fn count_with_status(&self, status: UrlStatus) -> usize {
        self.status.values().filter(|s| **s == status).count()
    }
}
