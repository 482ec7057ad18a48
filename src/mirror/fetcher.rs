//! HTTP transport
//!
//! One pooled [`reqwest::Client`] serves the whole run. [`open`] resolves
//! once the status line and headers are in; the body is then pulled chunk by
//! chunk with [`FetchResponse::chunk`]. Dropping the response tears the
//! connection down, which is how timeouts abort a transfer.

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Client, Response};
use std::time::Duration;
use url::Url;

/// Default user agent: a desktop browser, as many sites serve reduced pages
/// to unknown agents
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Connection settings for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub user_agent: String,
    /// Idle keep-alive connections kept per host
    pub max_idle_per_host: usize,
    /// How long an idle connection stays in the pool
    pub idle_timeout: Duration,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_idle_per_host: 256,
            idle_timeout: Duration::from_millis(3000),
        }
    }
}

/// Builds the HTTP client shared by every resource
///
/// Redirects are followed by the client; the final URL is reported on the
/// response. Compressed bodies are decoded transparently.
///
/// # Example
///
/// ```no_run
/// use site_mirror::mirror::fetcher::{build_http_client, HttpOptions};
///
/// let client = build_http_client(&HttpOptions::default()).unwrap();
/// ```
pub fn build_http_client(options: &HttpOptions) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(options.user_agent.as_str())
        .pool_max_idle_per_host(options.max_idle_per_host)
        .pool_idle_timeout(options.idle_timeout)
        .gzip(true)
        .brotli(true)
        .build()
}

/// A response whose headers have arrived and whose body is still pending
#[derive(Debug)]
pub struct FetchResponse {
    final_url: Url,
    status: u16,
    headers: HeaderMap,
    inner: Response,
}

impl FetchResponse {
    /// URL the content was served from, after redirects
    pub fn final_url(&self) -> &Url {
        &self.final_url
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Next chunk of the body, `None` once the body is complete
    pub async fn chunk(&mut self) -> Result<Option<Bytes>, reqwest::Error> {
        self.inner.chunk().await
    }
}

/// Sends a GET request and waits for the response headers
///
/// Error statuses are returned as responses; deciding what a status means is
/// up to the caller.
pub async fn open(client: &Client, url: &Url) -> Result<FetchResponse, reqwest::Error> {
    let response = client.get(url.clone()).send().await?;
    Ok(FetchResponse {
        final_url: response.url().clone(),
        status: response.status().as_u16(),
        headers: response.headers().clone(),
        inner: response,
    })
}
