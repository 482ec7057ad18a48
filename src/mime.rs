//! MIME type lookup
//!
//! Two directions are needed: guessing a type from a URL's file extension,
//! and picking the file extension a mirrored resource of a given type is
//! stored under.

use url::Url;

/// Common MIME type constants.
pub mod types {
    pub const HTML: &str = "text/html";
    pub const XHTML: &str = "application/xhtml+xml";
    pub const CSS: &str = "text/css";
    pub const JAVASCRIPT: &str = "application/javascript";
    pub const TEXT_JAVASCRIPT: &str = "text/javascript";
    pub const PLAIN: &str = "text/plain";
    pub const JSON: &str = "application/json";
    pub const XML: &str = "application/xml";
    pub const TEXT_XML: &str = "text/xml";
    pub const RSS: &str = "application/rss+xml";
    pub const ATOM: &str = "application/atom+xml";
    pub const PDF: &str = "application/pdf";
    pub const OCTET_STREAM: &str = "application/octet-stream";
    pub const WASM: &str = "application/wasm";
    pub const ZIP: &str = "application/zip";

    pub const PNG: &str = "image/png";
    pub const JPEG: &str = "image/jpeg";
    pub const GIF: &str = "image/gif";
    pub const WEBP: &str = "image/webp";
    pub const AVIF: &str = "image/avif";
    pub const SVG: &str = "image/svg+xml";
    pub const ICO: &str = "image/x-icon";
    pub const BMP: &str = "image/bmp";

    pub const MP3: &str = "audio/mpeg";
    pub const OGG_AUDIO: &str = "audio/ogg";
    pub const WAV: &str = "audio/wav";
    pub const MP4: &str = "video/mp4";
    pub const WEBM: &str = "video/webm";

    pub const WOFF: &str = "font/woff";
    pub const WOFF2: &str = "font/woff2";
    pub const TTF: &str = "font/ttf";
    pub const OTF: &str = "font/otf";
    pub const EOT: &str = "application/vnd.ms-fontobject";
}

/// Guess a MIME type from a file extension (without the dot).
pub fn from_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" | "shtml" => types::HTML,
        "xhtml" => types::XHTML,
        "css" => types::CSS,
        "js" | "mjs" => types::JAVASCRIPT,
        "txt" => types::PLAIN,
        "json" => types::JSON,
        "xml" => types::XML,
        "rss" => types::RSS,
        "atom" => types::ATOM,
        "pdf" => types::PDF,
        "wasm" => types::WASM,
        "zip" => types::ZIP,

        "png" => types::PNG,
        "jpg" | "jpeg" => types::JPEG,
        "gif" => types::GIF,
        "webp" => types::WEBP,
        "avif" => types::AVIF,
        "svg" => types::SVG,
        "ico" => types::ICO,
        "bmp" => types::BMP,

        "mp3" => types::MP3,
        "ogg" | "oga" => types::OGG_AUDIO,
        "wav" => types::WAV,
        "mp4" | "m4v" => types::MP4,
        "webm" => types::WEBM,

        "woff" => types::WOFF,
        "woff2" => types::WOFF2,
        "ttf" => types::TTF,
        "otf" => types::OTF,
        "eot" => types::EOT,

        _ => types::OCTET_STREAM,
    }
}

/// Guess a MIME type from a URL (absolute or relative).
///
/// Only the last path segment's extension is considered; query and fragment
/// are ignored. URLs without an extension guess `application/octet-stream`.
pub fn guess_from_url(url: &str) -> &'static str {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    let file_name = path.rsplit('/').next().unwrap_or_default();
    match file_name.rfind('.') {
        Some(dot) if dot > 0 && dot + 1 < file_name.len() => from_extension(&file_name[dot + 1..]),
        _ => types::OCTET_STREAM,
    }
}

/// File extension a resource of the given MIME type is stored under.
///
/// Parameters such as `; charset=utf-8` are ignored. Returns `None` when the
/// type is unknown, in which case callers fall back to `html`.
pub fn extension_for(mime: &str) -> Option<&'static str> {
    let ext = match essence(mime).to_ascii_lowercase().as_str() {
        types::HTML => "html",
        types::XHTML => "xhtml",
        types::CSS => "css",
        types::JAVASCRIPT | types::TEXT_JAVASCRIPT => "js",
        types::PLAIN => "txt",
        types::JSON => "json",
        types::XML | types::TEXT_XML => "xml",
        types::RSS => "rss",
        types::ATOM => "atom",
        types::PDF => "pdf",
        types::OCTET_STREAM => "bin",
        types::WASM => "wasm",
        types::ZIP => "zip",

        types::PNG => "png",
        types::JPEG => "jpeg",
        types::GIF => "gif",
        types::WEBP => "webp",
        types::AVIF => "avif",
        types::SVG => "svg",
        types::ICO | "image/vnd.microsoft.icon" => "ico",
        types::BMP => "bmp",

        types::MP3 => "mp3",
        types::OGG_AUDIO => "oga",
        types::WAV => "wav",
        types::MP4 => "mp4",
        types::WEBM => "webm",

        types::WOFF | "application/font-woff" => "woff",
        types::WOFF2 => "woff2",
        types::TTF => "ttf",
        types::OTF => "otf",
        types::EOT => "eot",

        _ => return None,
    };
    Some(ext)
}

/// Strips parameters from a `Content-Type` value.
///
/// `"text/html; charset=utf-8"` becomes `"text/html"`.
pub fn essence(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or_default().trim()
}

/// Check if the MIME type is rewritten as HTML.
pub fn is_html(mime: &str) -> bool {
    let essence = essence(mime);
    essence.eq_ignore_ascii_case(types::HTML)
        || essence.eq_ignore_ascii_case(types::XHTML)
        || essence.eq_ignore_ascii_case("html")
}

/// Check if the MIME type is rewritten as CSS.
pub fn is_css(mime: &str) -> bool {
    essence(mime).eq_ignore_ascii_case(types::CSS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_from_absolute_url() {
        assert_eq!(guess_from_url("http://example.com/a.html"), types::HTML);
        assert_eq!(guess_from_url("http://example.com/img/x.png"), types::PNG);
        assert_eq!(guess_from_url("http://example.com/app.js?v=3"), types::JAVASCRIPT);
        assert_eq!(guess_from_url("http://example.com/s.CSS#x"), types::CSS);
    }

    #[test]
    fn test_guess_from_relative_url() {
        assert_eq!(guess_from_url("img/x.jpg"), types::JPEG);
        assert_eq!(guess_from_url("../fonts/a.woff2?#iefix"), types::WOFF2);
    }

    #[test]
    fn test_guess_without_extension() {
        assert_eq!(guess_from_url("http://example.com/"), types::OCTET_STREAM);
        assert_eq!(guess_from_url("http://example.com/page"), types::OCTET_STREAM);
        assert_eq!(guess_from_url("http://example.com/.hidden"), types::OCTET_STREAM);
    }

    #[test]
    fn test_host_dots_are_not_extensions() {
        assert_eq!(guess_from_url("http://example.com"), types::OCTET_STREAM);
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("text/html"), Some("html"));
        assert_eq!(extension_for("text/html; charset=UTF-8"), Some("html"));
        assert_eq!(extension_for("TEXT/CSS"), Some("css"));
        assert_eq!(extension_for("application/javascript"), Some("js"));
        assert_eq!(extension_for("image/png"), Some("png"));
        assert_eq!(extension_for("application/octet-stream"), Some("bin"));
        assert_eq!(extension_for("application/x-unknown"), None);
    }

    #[test]
    fn test_html_and_css_detection() {
        assert!(is_html("text/html; charset=utf-8"));
        assert!(is_html("html"));
        assert!(is_html("application/xhtml+xml"));
        assert!(!is_html("text/css"));
        assert!(is_css("text/css;charset=utf-8"));
        assert!(!is_css("text/html"));
    }
}
