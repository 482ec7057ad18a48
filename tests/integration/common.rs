use scraper::{Html, Selector};
use site_mirror::MirrorOptions;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Options mirroring `server` into a fresh directory under `dir`
pub fn options_for(server: &MockServer, dir: &TempDir) -> MirrorOptions {
    let entry = Url::parse(&format!("{}/", server.uri())).expect("mock server URI is valid");
    MirrorOptions::new(entry, dir.path().join("mirror")).with_temp_dir(dir.path().join("tmp"))
}

/// Directory holding the mirrored files of the mock server's host
pub fn host_dir(dir: &TempDir) -> PathBuf {
    dir.path().join("mirror").join("127.0.0.1")
}

pub fn url(server: &MockServer, path: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), path)).expect("test URL is valid")
}

/// Serves `body` as `text/html` at `route`, expecting exactly `times` requests
pub async fn serve_html(server: &MockServer, route: &str, body: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string(body),
        )
        .expect(times)
        .mount(server)
        .await;
}

pub async fn serve(server: &MockServer, route: &str, content_type: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", content_type)
                .set_body_bytes(body),
        )
        .expect(1)
        .mount(server)
        .await;
}

/// Values of `attr` on every element matching `selector` in an HTML file
pub fn attr_values(file: &Path, selector: &str, attr: &str) -> Vec<String> {
    let html = std::fs::read_to_string(file).expect("mirrored file exists");
    let document = Html::parse_document(&html);
    let selector = Selector::parse(selector).expect("selector is valid");
    document
        .select(&selector)
        .filter_map(|element| element.value().attr(attr).map(str::to_string))
        .collect()
}

pub fn count_matches(file: &Path, selector: &str) -> usize {
    let html = std::fs::read_to_string(file).expect("mirrored file exists");
    let document = Html::parse_document(&html);
    let selector = Selector::parse(selector).expect("selector is valid");
    document.select(&selector).count()
}
