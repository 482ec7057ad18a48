use crate::{UrlError, UrlResult};
use url::Url;

/// Parses an absolute http(s) URL
///
/// Only `http` and `https` URLs can be mirrored; everything else (`mailto:`,
/// `javascript:`, `data:`, ...) is rejected here.
///
/// # Examples
///
/// ```
/// use site_mirror::url::parse_http_url;
///
/// assert!(parse_http_url("https://example.com/page").is_ok());
/// assert!(parse_http_url("mailto:someone@example.com").is_err());
/// ```
pub fn parse_http_url(url_str: &str) -> UrlResult<Url> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    Ok(url)
}

/// Computes the registry key for a URL
///
/// The key drops the scheme and the fragment, so `http://a/x`, `https://a/x`
/// and `https://a/x#top` all name the same resource. Host, port, path and
/// query are kept as the `url` crate serializes them (host lowercased, dot
/// segments resolved).
///
/// The key must stay in tune with the local path mapper: two URLs sharing a
/// key always map to the same file.
///
/// # Examples
///
/// ```
/// use site_mirror::url::normalize_url;
/// use url::Url;
///
/// let url = Url::parse("HTTP://Example.COM/a/../b?x=1#frag").unwrap();
/// assert_eq!(normalize_url(&url), "//example.com/b?x=1");
/// ```
pub fn normalize_url(url: &Url) -> String {
    let mut key = String::from("//");
    key.push_str(url.host_str().unwrap_or_default());
    if let Some(port) = url.port() {
        key.push(':');
        key.push_str(&port.to_string());
    }
    key.push_str(url.path());
    if let Some(query) = url.query() {
        key.push('?');
        key.push_str(query);
    }
    key
}
