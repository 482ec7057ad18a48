//! Link resolution for rewritten content
//!
//! [`LinkResolver`] is the visitor handed to the rewriters while a resource's
//! body streams through. Every reference it sees is resolved against the
//! resource's base URL, checked against the admission filter, and replaced by
//! a link relative to the resource's own local file. Admitted references are
//! recorded on the resource as children.

use super::local_path::{relative_local_url, LocalLayout};
use super::{ParsedLink, Resource};
use crate::mime;
use crate::rewrite::{rewrite_css, Attributes, CssVisitor, TagVerdict, TagVisitor};
use crate::url::UrlFilter;
use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;
use url::Url;

fn refresh_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)^\s*(\d+)\s*[;,]\s*url\s*=\s*['"]?([^'"]+?)['"]?\s*$"#)
            .expect("refresh pattern is valid")
    })
}

/// Resolves and rewrites the links of one resource
pub struct LinkResolver<'a> {
    resource: &'a mut Resource,
    layout: &'a LocalLayout,
    filter: &'a UrlFilter,
    page_path: PathBuf,
}

impl<'a> LinkResolver<'a> {
    /// Creates a resolver for `resource`; its local path must already be known
    pub fn new(resource: &'a mut Resource, layout: &'a LocalLayout, filter: &'a UrlFilter) -> Self {
        let page_path = resource.local_path(layout).to_path_buf();
        Self {
            resource,
            layout,
            filter,
            page_path,
        }
    }

    /// Resolves one reference and returns what it should be replaced with
    ///
    /// - Empty, fragment-only and non-http(s) references come back untouched
    /// - References the filter rejects come back as absolute URLs
    /// - Admitted references come back as a link relative to this page, and
    ///   are recorded as children unless already recorded
    pub fn resolve(&mut self, reference: &str, mime_hint: &str) -> String {
        let trimmed = reference.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return reference.to_string();
        }

        let Ok(absolute) = self.resource.base_url().join(trimmed) else {
            tracing::debug!("Unresolvable reference {:?} in {}", trimmed, self.resource.linked_url());
            return reference.to_string();
        };
        if !matches!(absolute.scheme(), "http" | "https") {
            return reference.to_string();
        }

        let allowed = (self.filter)(&absolute);
        self.resource.record_filter_decision(&absolute, allowed);
        if !allowed {
            tracing::debug!("Filtered out {}", absolute);
            return absolute.to_string();
        }

        let link_path = self.layout.path_for(&absolute, mime_hint);
        let local = relative_local_url(
            &link_path,
            &self.page_path,
            absolute.query(),
            absolute.fragment(),
        );

        if !self.resource.has_link(&absolute) {
            tracing::debug!("Discovered {} as {} ({})", absolute, local, mime_hint);
            self.resource.record_link(ParsedLink {
                url: absolute,
                local_path: link_path,
                mime: mime_hint.to_string(),
            });
        }
        local
    }

    fn rewrite_attribute(&mut self, attributes: &mut Attributes, name: &str, mime_hint: &str) {
        if let Some(value) = attributes.get(name).map(str::to_string) {
            let local = self.resolve(&value, mime_hint);
            attributes.set(name, local);
        }
    }

    fn rewrite_style_attribute(&mut self, attributes: &mut Attributes) {
        let Some(style) = attributes.get("style").map(str::to_string) else {
            return;
        };
        match rewrite_css(&style, self) {
            Ok(rewritten) => attributes.set("style", rewritten),
            Err(e) => tracing::debug!("Leaving style attribute as is: {}", e),
        }
    }

    fn rewrite_refresh(&mut self, attributes: &mut Attributes) {
        let Some(content) = attributes.get("content").map(str::to_string) else {
            return;
        };
        let Some(caps) = refresh_pattern().captures(&content) else {
            return;
        };
        let (Some(delay), Some(target)) = (caps.get(1), caps.get(2)) else {
            return;
        };
        let local = self.resolve(target.as_str(), mime::types::HTML);
        attributes.set("content", format!("{};url={}", delay.as_str(), local));
    }

    /// Resolves `href` against the current base without admitting it
    fn absolute(&self, href: &str) -> Option<Url> {
        self.resource
            .base_url()
            .join(href.trim())
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https"))
    }
}

fn has_rel(attributes: &Attributes, wanted: &str) -> bool {
    attributes
        .get("rel")
        .map(|rel| {
            rel.split_ascii_whitespace()
                .any(|token| token.eq_ignore_ascii_case(wanted))
        })
        .unwrap_or(false)
}

impl TagVisitor for LinkResolver<'_> {
    fn on_tag(&mut self, tag: &str, mut attributes: Attributes) -> TagVerdict {
        match tag {
            "a" | "area" => self.rewrite_attribute(&mut attributes, "href", mime::types::HTML),
            "form" => self.rewrite_attribute(&mut attributes, "action", mime::types::HTML),
            "button" | "input" => {
                self.rewrite_attribute(&mut attributes, "formaction", mime::types::HTML)
            }
            "link" => {
                if has_rel(&attributes, "canonical") {
                    if let Some(canonical) = attributes.get("href").and_then(|h| self.absolute(h)) {
                        tracing::debug!("Canonical URL of {} is {}", self.resource.linked_url(), canonical);
                        self.resource.set_canonical_url(canonical);
                    }
                    return TagVerdict::Drop;
                }
                if has_rel(&attributes, "stylesheet") {
                    self.rewrite_attribute(&mut attributes, "href", mime::types::CSS);
                } else if has_rel(&attributes, "icon") {
                    let guess = attributes
                        .get("href")
                        .map(mime::guess_from_url)
                        .unwrap_or(mime::types::ICO);
                    self.rewrite_attribute(&mut attributes, "href", guess);
                }
            }
            "img" => {
                if let Some(guess) = attributes.get("src").map(mime::guess_from_url) {
                    self.rewrite_attribute(&mut attributes, "src", guess);
                }
            }
            "script" => {
                self.rewrite_attribute(&mut attributes, "src", mime::types::JAVASCRIPT)
            }
            "base" => {
                if let Some(base) = attributes.get("href").and_then(|h| self.absolute(h)) {
                    self.resource.set_base_url(base);
                }
                return TagVerdict::Drop;
            }
            "meta" => {
                let is_refresh = attributes
                    .get("http-equiv")
                    .map(|v| v.trim().eq_ignore_ascii_case("refresh"))
                    .unwrap_or(false);
                if is_refresh {
                    self.rewrite_refresh(&mut attributes);
                }
            }
            _ => {}
        }

        if attributes.contains("style") {
            self.rewrite_style_attribute(&mut attributes);
        }
        TagVerdict::Keep(attributes)
    }
}

impl CssVisitor for LinkResolver<'_> {
    fn on_url(&mut self, reference: &str) -> String {
        self.resolve(reference, mime::guess_from_url(reference))
    }

    fn on_import(&mut self, reference: &str) -> String {
        self.resolve(reference, mime::types::CSS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::Transformer;
    use crate::url::same_host;
    use std::path::Path;

    struct Fixture {
        resource: Resource,
        layout: LocalLayout,
        filter: UrlFilter,
    }

    impl Fixture {
        fn new(page: &str, mime_type: &str) -> Self {
            let url = Url::parse(page).unwrap();
            let filter = same_host(&url);
            let mut resource = Resource::new(url);
            resource.set_expected_mime(mime_type);
            Self {
                resource,
                layout: LocalLayout::new("/m", "index.html"),
                filter,
            }
        }

        fn rewrite(&mut self, input: &str) -> String {
            let mut transformer = Transformer::for_mime(self.resource.mime());
            let mut resolver = LinkResolver::new(&mut self.resource, &self.layout, &self.filter);
            let mut out = transformer.push(input.as_bytes(), &mut resolver).unwrap();
            out.extend(transformer.finish(&mut resolver).unwrap());
            String::from_utf8(out).unwrap()
        }

        fn children(&self) -> Vec<(String, PathBuf, String)> {
            self.resource
                .parsed_resources()
                .iter()
                .map(|l| (l.url.to_string(), l.local_path.clone(), l.mime.clone()))
                .collect()
        }
    }

    #[test]
    fn test_anchor_is_rewritten_and_recorded() {
        let mut fixture = Fixture::new("http://example.com/", "text/html");
        let out = fixture.rewrite(r#"<a href="/a.html">x</a>"#);
        assert_eq!(out, r#"<a href="a.html">x</a>"#);
        assert_eq!(
            fixture.children(),
            vec![(
                "http://example.com/a.html".to_string(),
                PathBuf::from("/m/example.com/a.html"),
                "text/html".to_string()
            )]
        );
    }

    #[test]
    fn test_filtered_link_becomes_absolute() {
        let mut fixture = Fixture::new("http://example.com/docs/", "text/html");
        let out = fixture.rewrite(r#"<a href="//other.org/x">x</a>"#);
        assert_eq!(out, r#"<a href="http://other.org/x">x</a>"#);
        assert!(fixture.children().is_empty());
        let log = fixture.resource.take_filter_log();
        assert_eq!(log.len(), 1);
        assert!(!log[0].allowed);
    }

    #[test]
    fn test_special_references_are_untouched() {
        let mut fixture = Fixture::new("http://example.com/", "text/html");
        let input = r##"<a href="#top">t</a><a href="mailto:a@b.c">m</a><a href="javascript:void(0)">j</a><img src="data:image/png;base64,AAAA">"##;
        assert_eq!(fixture.rewrite(input), input);
        assert!(fixture.children().is_empty());
        assert!(fixture.resource.take_filter_log().is_empty());
    }

    #[test]
    fn test_canonical_tag_is_dropped_and_recorded() {
        let mut fixture = Fixture::new("http://example.com/page", "text/html");
        let out = fixture.rewrite(
            r#"<head><link rel="canonical" href="http://example.com/canon"><title>t</title></head>"#,
        );
        assert_eq!(out, "<head><title>t</title></head>");
        assert_eq!(
            fixture.resource.canonical_url().map(Url::as_str),
            Some("http://example.com/canon")
        );
        assert!(fixture.children().is_empty());
    }

    #[test]
    fn test_base_tag_changes_resolution_and_is_dropped() {
        let mut fixture = Fixture::new("http://example.com/a/page.html", "text/html");
        let out = fixture.rewrite(r#"<base href="/b/"><a href="c.html">c</a>"#);
        assert_eq!(out, r#"<a href="../b/c.html">c</a>"#);
        assert_eq!(fixture.children()[0].0, "http://example.com/b/c.html");
    }

    #[test]
    fn test_stylesheet_script_and_image_hints() {
        let mut fixture = Fixture::new("http://example.com/", "text/html");
        fixture.rewrite(
            r#"<link rel="stylesheet" href="/s/site"><script src="/app"></script><img src="/i/logo.png">"#,
        );
        let children = fixture.children();
        assert_eq!(children.len(), 3);
        assert_eq!(children[0].1, Path::new("/m/example.com/s/site.css"));
        assert_eq!(children[0].2, "text/css");
        assert_eq!(children[1].1, Path::new("/m/example.com/app.js"));
        assert_eq!(children[1].2, "application/javascript");
        assert_eq!(children[2].2, "image/png");
    }

    #[test]
    fn test_form_and_button_targets() {
        let mut fixture = Fixture::new("http://example.com/", "text/html");
        let out = fixture.rewrite(
            r#"<form action="/search?q=1"><button formaction="/go">go</button></form>"#,
        );
        let query_name = format!(
            "search{}.html?q=1",
            base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE, "?q=1")
        );
        assert_eq!(
            out,
            format!(r#"<form action="{}"><button formaction="go.html">go</button></form>"#, query_name)
        );
        assert_eq!(fixture.children().len(), 2);
    }

    #[test]
    fn test_meta_refresh_target_is_rewritten() {
        let mut fixture = Fixture::new("http://example.com/", "text/html");
        let out = fixture.rewrite(r#"<meta http-equiv="Refresh" content="5; URL=/next.html">"#);
        assert_eq!(out, r#"<meta http-equiv="Refresh" content="5;url=next.html">"#);
        assert_eq!(fixture.children()[0].0, "http://example.com/next.html");
    }

    #[test]
    fn test_style_attribute_references() {
        let mut fixture = Fixture::new("http://example.com/p/", "text/html");
        let out = fixture.rewrite(r#"<div style="background:url(/bg.gif)">x</div>"#);
        assert_eq!(out, r#"<div style="background:url(../bg.gif)">x</div>"#);
        assert_eq!(fixture.children()[0].2, "image/gif");
    }

    #[test]
    fn test_css_references_are_relative_to_stylesheet() {
        let mut fixture = Fixture::new("http://example.com/b.css", "text/css");
        let out = fixture.rewrite("a{background:url(img/x.png)}\n@import \"print\";\n");
        assert_eq!(out, "a{background:url(img/x.png)}\n@import \"print.css\";\n");
        let children = fixture.children();
        assert_eq!(children[0].0, "http://example.com/img/x.png");
        assert_eq!(children[0].2, "image/png");
        assert_eq!(children[1].1, Path::new("/m/example.com/print.css"));
    }

    #[test]
    fn test_repeated_reference_is_recorded_once() {
        let mut fixture = Fixture::new("http://example.com/", "text/html");
        let out = fixture.rewrite(r#"<a href="/a.html">1</a><a href="a.html#x">2</a>"#);
        assert_eq!(out, r#"<a href="a.html">1</a><a href="a.html#x">2</a>"#);
        assert_eq!(fixture.children().len(), 1);
    }
}
