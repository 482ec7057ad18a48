use crate::common::*;
use site_mirror::{local_path_for, Mirror, UrlStatus};
use tempfile::TempDir;
use wiremock::MockServer;

const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

#[tokio::test]
async fn test_stylesheet_and_css_urls_are_mirrored() {
    let server = MockServer::start().await;
    serve_html(
        &server,
        "/",
        r#"<html><head><link rel="stylesheet" href="/css/site.css"></head><body></body></html>"#,
        1,
    )
    .await;
    serve(
        &server,
        "/css/site.css",
        "text/css",
        b"body { background: url(/img/x.png) no-repeat; }\n@import \"print.css\";\n".to_vec(),
    )
    .await;
    serve(&server, "/css/print.css", "text/css", b"p { color: black; }\n".to_vec()).await;
    serve(&server, "/img/x.png", "image/png", PNG.to_vec()).await;

    let dir = TempDir::new().unwrap();
    let mut mirror = Mirror::new(options_for(&server, &dir)).unwrap();
    let summary = mirror.start().await.unwrap();

    assert_eq!(summary.stats.downloaded, 4);
    let host = host_dir(&dir);
    assert_eq!(
        attr_values(&host.join("index.html"), "link", "href"),
        vec!["css/site.css"]
    );

    let css = std::fs::read_to_string(host.join("css").join("site.css")).unwrap();
    assert!(css.contains("url(../img/x.png)"), "{}", css);
    assert!(css.contains("@import \"print.css\""), "{}", css);
    assert_eq!(std::fs::read(host.join("img").join("x.png")).unwrap(), PNG);
    assert!(host.join("css").join("print.css").is_file());
}

#[tokio::test]
async fn test_images_scripts_and_style_attributes() {
    let server = MockServer::start().await;
    serve_html(
        &server,
        "/docs/",
        r#"<img src="../img/logo.png"><script src="/js/app.js"></script><div style="background: url('/img/bg.png')"></div>"#,
        1,
    )
    .await;
    serve(&server, "/img/logo.png", "image/png", PNG.to_vec()).await;
    serve(&server, "/img/bg.png", "image/png", PNG.to_vec()).await;
    serve(&server, "/js/app.js", "application/javascript", b"console.log(1);".to_vec()).await;

    let dir = TempDir::new().unwrap();
    let mut options = options_for(&server, &dir);
    options.entry = url(&server, "/docs/");
    let mut mirror = Mirror::new(options).unwrap();
    let summary = mirror.start().await.unwrap();

    assert_eq!(summary.stats.downloaded, 4);
    let page = host_dir(&dir).join("docs").join("index.html");
    assert_eq!(attr_values(&page, "img", "src"), vec!["../img/logo.png"]);
    assert_eq!(attr_values(&page, "script", "src"), vec!["../js/app.js"]);
    assert_eq!(
        attr_values(&page, "div", "style"),
        vec!["background: url('../img/bg.png')"]
    );
    assert!(host_dir(&dir).join("js").join("app.js").is_file());
}

#[tokio::test]
async fn test_base_tag_is_applied_and_dropped() {
    let server = MockServer::start().await;
    serve_html(
        &server,
        "/",
        r#"<html><head><base href="/section/"></head><body><a href="page.html">p</a></body></html>"#,
        1,
    )
    .await;
    serve_html(&server, "/section/page.html", "<p>in section</p>", 1).await;

    let dir = TempDir::new().unwrap();
    let mut mirror = Mirror::new(options_for(&server, &dir)).unwrap();
    mirror.start().await.unwrap();

    let index = host_dir(&dir).join("index.html");
    assert_eq!(count_matches(&index, "base"), 0);
    assert_eq!(attr_values(&index, "a", "href"), vec!["section/page.html"]);
    assert!(host_dir(&dir).join("section").join("page.html").is_file());
}

#[tokio::test]
async fn test_meta_refresh_target_is_followed() {
    let server = MockServer::start().await;
    serve_html(
        &server,
        "/",
        r#"<html><head><meta http-equiv="refresh" content="5; url=/landing.html"></head></html>"#,
        1,
    )
    .await;
    serve_html(&server, "/landing.html", "<p>landed</p>", 1).await;

    let dir = TempDir::new().unwrap();
    let mut mirror = Mirror::new(options_for(&server, &dir)).unwrap();
    mirror.start().await.unwrap();

    let index = host_dir(&dir).join("index.html");
    assert_eq!(
        attr_values(&index, "meta", "content"),
        vec!["5;url=landing.html"]
    );
    assert_eq!(
        mirror.status(&url(&server, "/landing.html")),
        Some(UrlStatus::Downloaded)
    );
}

#[tokio::test]
async fn test_query_strings_map_to_distinct_files() {
    let server = MockServer::start().await;
    serve_html(
        &server,
        "/",
        r#"<a href="/list.html?page=1">1</a><a href="/list.html?page=2">2</a>"#,
        1,
    )
    .await;
    serve_html(&server, "/list.html", "<p>list</p>", 2).await;

    let dir = TempDir::new().unwrap();
    let mut mirror = Mirror::new(options_for(&server, &dir)).unwrap();
    let summary = mirror.start().await.unwrap();
    assert_eq!(summary.stats.downloaded, 3);

    let root = dir.path().join("mirror");
    let first = local_path_for(&root, &url(&server, "/list.html?page=1"), "text/html", "index.html");
    let second = local_path_for(&root, &url(&server, "/list.html?page=2"), "text/html", "index.html");
    assert_ne!(first, second);
    assert!(first.is_file());
    assert!(second.is_file());

    let hrefs = attr_values(&host_dir(&dir).join("index.html"), "a", "href");
    let name = |p: &std::path::Path| p.file_name().unwrap().to_string_lossy().into_owned();
    let expected = vec![
        format!("{}?page=1", name(&first)),
        format!("{}?page=2", name(&second)),
    ];
    assert_eq!(hrefs, expected);
}
