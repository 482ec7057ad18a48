//! URL → local file mapping and local relative links
//!
//! The mapping must be reproduced exactly: the page that links to a resource
//! and the later fetch of that resource both compute the path independently,
//! and a rewritten link only works if they agree.

use crate::mime;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::path::{Component, Path, PathBuf};
use url::Url;

/// Bytes escaped when a file name is written into a link
///
/// File names keep the percent-encoded form of the remote path, so `%` must
/// be escaped too: the browser decodes the link once before opening the file.
const LINK_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b':')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Extension used when the MIME type has no known extension
const FALLBACK_EXTENSION: &str = "html";

/// Where and how mirrored files are laid out
#[derive(Debug, Clone)]
pub struct LocalLayout {
    /// Mirror root directory
    pub root: PathBuf,
    /// File name used for directory-style URLs (`/docs/`)
    pub default_index: String,
}

impl LocalLayout {
    pub fn new(root: impl Into<PathBuf>, default_index: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            default_index: default_index.into(),
        }
    }

    /// Maps `url` of type `mime_type` to its file under the mirror root
    pub fn path_for(&self, url: &Url, mime_type: &str) -> PathBuf {
        local_path_for(&self.root, url, mime_type, &self.default_index)
    }
}

/// Computes the local file for a URL
///
/// Layout: `<root>/<host>/<path without extension>[<base64 query>].<ext>`
///
/// 1. A query string (including its `?`) is base64 encoded (URL-safe
///    alphabet) and appended to the file stem, so `/p?x=1` and `/p` differ
/// 2. The extension comes from the MIME type, `html` if unknown
/// 3. An empty path becomes `/`; a path ending in `/` gets `default_index`
/// 4. Any extension already present in the path is replaced
///
/// # Examples
///
/// ```
/// use site_mirror::local_path_for;
/// use std::path::Path;
/// use url::Url;
///
/// let url = Url::parse("http://example.com/").unwrap();
/// let path = local_path_for(Path::new("/mirror"), &url, "text/html", "index.html");
/// assert_eq!(path, Path::new("/mirror/example.com/index.html"));
/// ```
pub fn local_path_for(root: &Path, url: &Url, mime_type: &str, default_index: &str) -> PathBuf {
    let query_suffix = url
        .query()
        .map(|query| URL_SAFE.encode(format!("?{}", query)))
        .unwrap_or_default();

    let extension = mime::extension_for(mime_type).unwrap_or(FALLBACK_EXTENSION);

    let mut path = match url.path() {
        p if p.len() > 1 => p.to_string(),
        _ => "/".to_string(),
    };
    if path.ends_with('/') {
        path.push_str(default_index);
    }

    strip_extension(&mut path);
    path.push_str(&query_suffix);
    path.push('.');
    path.push_str(extension);

    let mut full = root.join(url.host_str().unwrap_or_default());
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        full.push(segment);
    }
    full
}

/// Removes the extension of the last path segment (`/a/b.tar.gz` → `/a/b.tar`)
///
/// Dot files such as `/.well-known` keep their name.
fn strip_extension(path: &mut String) {
    let name_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    if let Some(dot) = path[name_start..].rfind('.') {
        if dot > 0 {
            path.truncate(name_start + dot);
        }
    }
}

/// Path of `target` relative to the directory containing `page`
///
/// Both paths are expected to live under the same mirror root.
pub fn relative_path(target: &Path, page: &Path) -> PathBuf {
    let from: Vec<Component> = page
        .parent()
        .map(|p| p.components().collect())
        .unwrap_or_default();
    let to: Vec<Component> = target
        .parent()
        .map(|p| p.components().collect())
        .unwrap_or_default();

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..from.len() {
        relative.push("..");
    }
    for component in &to[common..] {
        relative.push(component.as_os_str());
    }
    if let Some(name) = target.file_name() {
        relative.push(name);
    }
    relative
}

/// Builds the link written into `page` that points at `target`
///
/// The result is relative to the page's directory and uses `/` separators.
/// Each segment is percent-encoded, so a browser decoding the link opens
/// exactly the stored file name. The reference's query string and fragment
/// are appended unchanged.
///
/// # Examples
///
/// ```
/// use site_mirror::relative_local_url;
/// use std::path::Path;
///
/// let link = relative_local_url(Path::new("a/c/y.png"), Path::new("a/b/x.html"), None, None);
/// assert_eq!(link, "../c/y.png");
/// ```
pub fn relative_local_url(
    target: &Path,
    page: &Path,
    query: Option<&str>,
    fragment: Option<&str>,
) -> String {
    let relative = relative_path(target, page);
    let mut link = relative
        .components()
        .map(|c| utf8_percent_encode(&c.as_os_str().to_string_lossy(), LINK_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/");

    if let Some(query) = query {
        link.push('?');
        link.push_str(query);
    }
    if let Some(fragment) = fragment {
        link.push('#');
        link.push_str(fragment);
    }
    link
}
