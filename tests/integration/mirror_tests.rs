use crate::common::*;
use site_mirror::{Mirror, MirrorError, MirrorOptions, UrlStatus};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_basic_crawl_mirrors_and_rewrites() {
    let server = MockServer::start().await;
    serve_html(&server, "/", r#"<html><body><a href="/a.html">A</a></body></html>"#, 1).await;
    serve_html(&server, "/a.html", "<p>page a</p>", 1).await;

    let dir = TempDir::new().unwrap();
    let mut mirror = Mirror::new(options_for(&server, &dir)).unwrap();
    let summary = mirror.start().await.unwrap();

    assert!(summary.completed);
    assert_eq!(summary.stats.downloaded, 2);
    assert_eq!(summary.stats.skipped, 0);
    assert!(summary.stats.bytes > 0);
    assert!(summary.stats.speed() > 0);

    let index = host_dir(&dir).join("index.html");
    assert_eq!(attr_values(&index, "a", "href"), vec!["a.html"]);
    assert_eq!(
        std::fs::read_to_string(host_dir(&dir).join("a.html")).unwrap(),
        "<p>page a</p>"
    );
    assert_eq!(
        mirror.status(&url(&server, "/a.html")),
        Some(UrlStatus::Downloaded)
    );
}

#[tokio::test]
async fn test_duplicate_links_are_fetched_once() {
    let server = MockServer::start().await;
    serve_html(
        &server,
        "/",
        r#"<a href="/one.html">1</a><a href="/two.html">2</a><a href="/shared.html">s</a>"#,
        1,
    )
    .await;
    serve_html(&server, "/one.html", r#"<a href="/shared.html">s</a><a href="/">home</a>"#, 1).await;
    serve_html(&server, "/two.html", r#"<a href="shared.html#top">s</a>"#, 1).await;
    serve_html(&server, "/shared.html", "<p>shared</p>", 1).await;

    let dir = TempDir::new().unwrap();
    let mut mirror = Mirror::new(options_for(&server, &dir)).unwrap();
    let summary = mirror.start().await.unwrap();

    assert_eq!(summary.stats.downloaded, 4);
    assert_eq!(summary.stats.queued, 4);
    assert_eq!(
        attr_values(&host_dir(&dir).join("two.html"), "a", "href"),
        vec!["shared.html#top"]
    );
    assert_eq!(
        attr_values(&host_dir(&dir).join("one.html"), "a", "href"),
        vec!["shared.html", "index.html"]
    );
}

#[tokio::test]
async fn test_failed_resource_is_skipped_and_crawl_continues() {
    let server = MockServer::start().await;
    serve_html(
        &server,
        "/",
        r#"<a href="/missing.html">gone</a><a href="/ok.html">ok</a>"#,
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/missing.html"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    serve_html(&server, "/ok.html", "<p>ok</p>", 1).await;

    let dir = TempDir::new().unwrap();
    let mut mirror = Mirror::new(options_for(&server, &dir)).unwrap();
    let summary = mirror.start().await.unwrap();

    assert!(summary.completed);
    assert_eq!(summary.stats.downloaded, 2);
    assert_eq!(summary.stats.skipped, 1);
    assert_eq!(
        mirror.status(&url(&server, "/missing.html")),
        Some(UrlStatus::Skipped)
    );
    assert!(!host_dir(&dir).join("missing.html").exists());
    assert!(host_dir(&dir).join("ok.html").exists());
    // nothing is left behind in the staging directory
    assert_eq!(std::fs::read_dir(dir.path().join("tmp")).unwrap().count(), 0);
}

#[tokio::test]
async fn test_canonical_url_becomes_alias() {
    let server = MockServer::start().await;
    serve_html(
        &server,
        "/",
        r#"<html><head><link rel="canonical" href="/home.html"></head><body><a href="/home.html">home</a></body></html>"#,
        1,
    )
    .await;
    // the canonical URL is folded into the entry and never fetched
    serve_html(&server, "/home.html", "<p>never</p>", 0).await;

    let dir = TempDir::new().unwrap();
    let mut mirror = Mirror::new(options_for(&server, &dir)).unwrap();
    let summary = mirror.start().await.unwrap();

    assert_eq!(summary.stats.downloaded, 1);
    let index = host_dir(&dir).join("index.html");
    assert_eq!(count_matches(&index, "link[rel=canonical]"), 0);

    let alias = host_dir(&dir).join("home.html");
    assert_eq!(
        std::fs::read_link(&alias).unwrap(),
        std::path::Path::new("index.html")
    );
    assert_eq!(
        mirror.status(&url(&server, "/home.html")),
        Some(UrlStatus::Downloaded)
    );
}

#[tokio::test]
async fn test_redirect_target_is_not_fetched_twice() {
    let server = MockServer::start().await;
    serve_html(&server, "/", r#"<a href="/old">old</a>"#, 1).await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new.html"))
        .expect(1)
        .mount(&server)
        .await;
    // only reached through the redirect, although the page links to itself
    serve_html(&server, "/new.html", r#"<a href="/new.html">self</a>"#, 1).await;

    let dir = TempDir::new().unwrap();
    let mut mirror = Mirror::new(options_for(&server, &dir)).unwrap();
    let summary = mirror.start().await.unwrap();

    assert_eq!(summary.stats.downloaded, 2);
    assert_eq!(
        std::fs::read_link(host_dir(&dir).join("new.html")).unwrap(),
        std::path::Path::new("old.html")
    );
    assert_eq!(
        mirror.status(&url(&server, "/new.html")),
        Some(UrlStatus::Downloaded)
    );
}

#[tokio::test]
async fn test_denied_links_stay_absolute() {
    let server = MockServer::start().await;
    serve_html(
        &server,
        "/",
        r#"<a href="http://elsewhere.invalid/page">out</a><a href="mailto:me@example.com">mail</a>"#,
        1,
    )
    .await;

    let dir = TempDir::new().unwrap();
    let mut mirror = Mirror::new(options_for(&server, &dir)).unwrap();
    let summary = mirror.start().await.unwrap();

    assert_eq!(summary.stats.downloaded, 1);
    assert_eq!(summary.stats.denied, 1);
    assert_eq!(
        attr_values(&host_dir(&dir).join("index.html"), "a", "href"),
        vec!["http://elsewhere.invalid/page", "mailto:me@example.com"]
    );

    let analysis = mirror.filter_analysis();
    assert_eq!(analysis.denied.len(), 1);
    assert_eq!(analysis.denied[0].url, "//elsewhere.invalid/page");
    assert_eq!(analysis.denied[0].asks, 1);
}

#[tokio::test]
async fn test_many_workers_fetch_each_page_once() {
    let server = MockServer::start().await;
    let links: String = (0..12)
        .map(|i| format!(r#"<a href="/p{}.html">{}</a>"#, i, i))
        .collect();
    serve_html(&server, "/", &links, 1).await;
    for i in 0..12 {
        // every page links to every page, including the entry
        let body = format!(r#"<a href="/">home</a>{}"#, links);
        serve_html(&server, &format!("/p{}.html", i), &body, 1).await;
    }

    let dir = TempDir::new().unwrap();
    let mut mirror = Mirror::new(options_for(&server, &dir).with_workers(4)).unwrap();
    let summary = mirror.start().await.unwrap();

    assert!(summary.completed);
    assert_eq!(summary.stats.downloaded, 13);
    assert_eq!(mirror.registry().count_with_status(UrlStatus::Downloaded), 13);
    assert_eq!(mirror.registry().queue_len(), 0);
    for i in 0..12 {
        assert!(host_dir(&dir).join(format!("p{}.html", i)).is_file());
    }
}

#[tokio::test]
async fn test_second_run_detects_unchanged_files() {
    let server = MockServer::start().await;
    serve_html(&server, "/", r#"<a href="/a.html">A</a>"#, 2).await;
    serve_html(&server, "/a.html", "<p>a</p>", 2).await;

    let dir = TempDir::new().unwrap();
    let first = Mirror::new(options_for(&server, &dir))
        .unwrap()
        .start()
        .await
        .unwrap();
    assert_eq!(first.stats.unchanged, 0);

    let mut options = options_for(&server, &dir);
    options.skip_existing = true;
    let second = Mirror::new(options).unwrap().start().await.unwrap();
    assert_eq!(second.stats.downloaded, 2);
    assert_eq!(second.stats.unchanged, 2);
}

#[tokio::test]
async fn test_unwritable_mirror_root_fetches_nothing() {
    let server = MockServer::start().await;
    serve_html(&server, "/", "<p>never</p>", 0).await;

    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "a file, not a directory").unwrap();

    let entry = Url::parse(&format!("{}/", server.uri())).unwrap();
    let options = MirrorOptions::new(entry, blocker.join("mirror"))
        .with_temp_dir(dir.path().join("tmp"));
    let mut mirror = Mirror::new(options).unwrap();

    assert!(matches!(
        mirror.start().await,
        Err(MirrorError::Prepare { .. })
    ));
}

#[tokio::test]
async fn test_stop_handle_ends_run_early() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut mirror = Mirror::new(options_for(&server, &dir)).unwrap();
    let handle = mirror.stop_handle();

    // stops while the entry is being served
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(move |_: &wiremock::Request| {
            handle.stop();
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(r#"<a href="/a.html">A</a>"#)
        })
        .expect(1)
        .mount(&server)
        .await;
    serve_html(&server, "/a.html", "<p>a</p>", 0).await;

    let summary = mirror.start().await.unwrap();
    assert!(!summary.completed);
    assert_eq!(summary.stats.downloaded, 1);
    assert_eq!(mirror.registry().queue_len(), 1);
    assert_eq!(
        mirror.status(&url(&server, "/a.html")),
        Some(UrlStatus::Queued)
    );
}

#[tokio::test]
async fn test_canonical_never_replaces_a_stored_page() {
    let server = MockServer::start().await;
    serve_html(&server, "/", r#"<a href="/list">1</a><a href="/list2">2</a>"#, 1).await;
    serve_html(&server, "/list", "<p>the list</p>", 1).await;
    serve_html(
        &server,
        "/list2",
        r#"<link rel="canonical" href="/list"><p>page two</p>"#,
        1,
    )
    .await;

    let dir = TempDir::new().unwrap();
    let mut mirror = Mirror::new(options_for(&server, &dir)).unwrap();
    let summary = mirror.start().await.unwrap();

    assert_eq!(summary.stats.downloaded, 3);
    let list = host_dir(&dir).join("list.html");
    assert!(!std::fs::symlink_metadata(&list).unwrap().file_type().is_symlink());
    assert_eq!(std::fs::read_to_string(&list).unwrap(), "<p>the list</p>");
    assert_eq!(
        std::fs::read_to_string(host_dir(&dir).join("list2.html")).unwrap(),
        "<p>page two</p>"
    );
}

#[tokio::test]
async fn test_queued_page_is_still_fetched_when_named_as_canonical() {
    let server = MockServer::start().await;
    // /list2 is processed first and names the still queued /list as canonical
    serve_html(&server, "/", r#"<a href="/list2">2</a><a href="/list">1</a>"#, 1).await;
    serve_html(
        &server,
        "/list2",
        r#"<link rel="canonical" href="/list"><p>page two</p>"#,
        1,
    )
    .await;
    serve_html(&server, "/list", "<p>the list</p>", 1).await;

    let dir = TempDir::new().unwrap();
    let mut mirror = Mirror::new(options_for(&server, &dir)).unwrap();
    let summary = mirror.start().await.unwrap();

    assert_eq!(summary.stats.downloaded, 3);
    let list = host_dir(&dir).join("list.html");
    assert!(!std::fs::symlink_metadata(&list).unwrap().file_type().is_symlink());
    assert_eq!(std::fs::read_to_string(&list).unwrap(), "<p>the list</p>");
}

#[tokio::test]
async fn test_links_to_names_with_spaces_open_the_stored_file() {
    let server = MockServer::start().await;
    serve_html(&server, "/", r#"<a href="/a b.html">spaced</a>"#, 1).await;
    serve_html(&server, "/a%20b.html", "<p>spaced</p>", 1).await;

    let dir = TempDir::new().unwrap();
    let mut mirror = Mirror::new(options_for(&server, &dir)).unwrap();
    mirror.start().await.unwrap();

    let index = host_dir(&dir).join("index.html");
    let hrefs = attr_values(&index, "a", "href");
    assert_eq!(hrefs, vec!["a%2520b.html"]);

    // a browser decodes the link once before opening the file
    let opened = Url::from_file_path(&index).unwrap().join(&hrefs[0]).unwrap();
    let decoded = percent_encoding::percent_decode_str(opened.path())
        .decode_utf8()
        .unwrap()
        .into_owned();
    assert_eq!(
        std::fs::read_to_string(decoded).unwrap(),
        "<p>spaced</p>"
    );
}
