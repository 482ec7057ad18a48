//! Streaming HTML start-tag rewriter
//!
//! This is not a full HTML parser. It recognizes just enough structure to
//! find start tags and their attributes safely:
//! - comments, doctypes, processing instructions and end tags are copied
//! - `<script>`, `<style>`, `<textarea>` and `<title>` content is raw text
//!   and is never scanned for tags
//! - `<style>` content is fed through the CSS rewriter
//!
//! Input may arrive split at any byte; an incomplete tag at the end of a
//! chunk is held back until the rest arrives.

use super::attributes::decode_entities;
use super::css::CssRewriter;
use super::{Attributes, CssVisitor, TagVerdict, TagVisitor, TransformError, MAX_PENDING_BYTES};

/// Elements whose content is not markup
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// Streaming rewriter for HTML documents
#[derive(Debug, Default)]
pub struct HtmlRewriter {
    pending: Vec<u8>,
    raw_text: Option<RawText>,
}

#[derive(Debug)]
struct RawText {
    /// `</name`, lowercase
    closing: Vec<u8>,
    /// Present while inside `<style>`
    css: Option<CssRewriter>,
}

/// One piece of markup starting at `<`
enum Markup {
    /// Not enough input to tell where it ends
    Incomplete,
    /// A `<` that does not open markup; copy this many bytes as text
    Text(usize),
    /// Comment, doctype, end tag...; copy this many bytes
    Opaque(usize),
    StartTag(StartTag),
}

struct StartTag {
    len: usize,
    name: String,
    raw_name_len: usize,
    attributes: Attributes,
    self_closing: bool,
}

impl HtmlRewriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<V>(&mut self, chunk: &[u8], visitor: &mut V) -> Result<Vec<u8>, TransformError>
    where
        V: TagVisitor + CssVisitor,
    {
        self.pending.extend_from_slice(chunk);
        let out = self.drain(visitor, false)?;
        if self.pending.len() > MAX_PENDING_BYTES {
            return Err(TransformError::MarkupTooLong {
                limit: MAX_PENDING_BYTES,
            });
        }
        Ok(out)
    }

    pub fn finish<V>(&mut self, visitor: &mut V) -> Result<Vec<u8>, TransformError>
    where
        V: TagVisitor + CssVisitor,
    {
        let mut out = self.drain(visitor, true)?;
        if let Some(RawText { css: Some(mut css), .. }) = self.raw_text.take() {
            out.extend(css.finish(visitor)?);
        }
        Ok(out)
    }

    fn drain<V>(&mut self, visitor: &mut V, eof: bool) -> Result<Vec<u8>, TransformError>
    where
        V: TagVisitor + CssVisitor,
    {
        let buf = std::mem::take(&mut self.pending);
        let mut out = Vec::with_capacity(buf.len());
        let mut pos = 0;

        while pos < buf.len() {
            if let Some(raw) = self.raw_text.as_mut() {
                let rest = &buf[pos..];
                match find_ignore_case(rest, &raw.closing) {
                    Some(end) => {
                        emit_raw_text(raw, &rest[..end], &mut out, visitor)?;
                        if let Some(mut css) = raw.css.take() {
                            out.extend(css.finish(visitor)?);
                        }
                        self.raw_text = None;
                        pos += end;
                        continue;
                    }
                    None => {
                        // Hold back a possible partial closing tag
                        let keep = if eof {
                            0
                        } else {
                            (raw.closing.len() - 1).min(rest.len())
                        };
                        let emit = rest.len() - keep;
                        emit_raw_text(raw, &rest[..emit], &mut out, visitor)?;
                        pos += emit;
                        break;
                    }
                }
            }

            let rest = &buf[pos..];
            let Some(lt) = rest.iter().position(|&b| b == b'<') else {
                out.extend_from_slice(rest);
                pos = buf.len();
                break;
            };
            out.extend_from_slice(&rest[..lt]);
            pos += lt;

            match scan_markup(&buf[pos..]) {
                Markup::Incomplete => {
                    if eof {
                        out.extend_from_slice(&buf[pos..]);
                        pos = buf.len();
                    }
                    break;
                }
                Markup::Text(len) | Markup::Opaque(len) => {
                    out.extend_from_slice(&buf[pos..pos + len]);
                    pos += len;
                }
                Markup::StartTag(tag) => {
                    let raw = &buf[pos..pos + tag.len];
                    self.emit_start_tag(raw, tag, &mut out, visitor);
                    pos += raw.len();
                }
            }
        }

        self.pending = buf[pos..].to_vec();
        Ok(out)
    }

    fn emit_start_tag<V: TagVisitor>(
        &mut self,
        raw: &[u8],
        tag: StartTag,
        out: &mut Vec<u8>,
        visitor: &mut V,
    ) {
        let StartTag {
            name,
            raw_name_len,
            attributes,
            self_closing,
            ..
        } = tag;

        if !self_closing && RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
            let mut closing = b"</".to_vec();
            closing.extend_from_slice(name.as_bytes());
            self.raw_text = Some(RawText {
                closing,
                css: (name == "style").then(CssRewriter::new),
            });
        }

        match visitor.on_tag(&name, attributes) {
            TagVerdict::Drop => {}
            TagVerdict::Keep(attributes) if attributes.is_modified() => {
                out.push(b'<');
                out.extend_from_slice(&raw[1..1 + raw_name_len]);
                attributes.write_html(out);
                if self_closing {
                    out.extend_from_slice(b" /");
                }
                out.push(b'>');
            }
            TagVerdict::Keep(_) => out.extend_from_slice(raw),
        }
    }
}

fn emit_raw_text<V: CssVisitor>(
    raw: &mut RawText,
    text: &[u8],
    out: &mut Vec<u8>,
    visitor: &mut V,
) -> Result<(), TransformError> {
    match raw.css.as_mut() {
        Some(css) => out.extend(css.push(text, visitor)?),
        None => out.extend_from_slice(text),
    }
    Ok(())
}

fn find_ignore_case(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Classifies the markup at the start of `buf` (which begins with `<`)
fn scan_markup(buf: &[u8]) -> Markup {
    debug_assert_eq!(buf.first(), Some(&b'<'));
    let Some(&next) = buf.get(1) else {
        return Markup::Incomplete;
    };

    match next {
        b'!' => {
            if buf.len() < 4 && b"<!--".starts_with(buf) {
                return Markup::Incomplete;
            }
            if buf.starts_with(b"<!--") {
                return match find(&buf[4..], b"-->") {
                    Some(end) => Markup::Opaque(4 + end + 3),
                    None => Markup::Incomplete,
                };
            }
            opaque_until_gt(buf)
        }
        b'?' | b'/' => opaque_until_gt(buf),
        c if c.is_ascii_alphabetic() => scan_start_tag(buf),
        _ => Markup::Text(1),
    }
}

fn opaque_until_gt(buf: &[u8]) -> Markup {
    match buf.iter().position(|&b| b == b'>') {
        Some(end) => Markup::Opaque(end + 1),
        None => Markup::Incomplete,
    }
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c')
}

fn scan_start_tag(buf: &[u8]) -> Markup {
    let mut i = 1;
    while i < buf.len() && !is_space(buf[i]) && buf[i] != b'>' && buf[i] != b'/' {
        i += 1;
    }
    if i >= buf.len() {
        return Markup::Incomplete;
    }
    let raw_name_len = i - 1;
    let name = String::from_utf8_lossy(&buf[1..i]).to_ascii_lowercase();

    let mut attributes = Attributes::new();
    let mut self_closing = false;

    loop {
        while i < buf.len() && is_space(buf[i]) {
            i += 1;
        }
        let Some(&b) = buf.get(i) else {
            return Markup::Incomplete;
        };

        match b {
            b'>' => {
                return Markup::StartTag(StartTag {
                    len: i + 1,
                    name,
                    raw_name_len,
                    attributes,
                    self_closing,
                });
            }
            b'/' => {
                self_closing = true;
                i += 1;
                continue;
            }
            _ => self_closing = false,
        }

        let name_start = i;
        while i < buf.len() && !is_space(buf[i]) && !matches!(buf[i], b'=' | b'>' | b'/') {
            i += 1;
        }
        let attr_name = String::from_utf8_lossy(&buf[name_start..i]).into_owned();

        let mut after_name = i;
        while after_name < buf.len() && is_space(buf[after_name]) {
            after_name += 1;
        }
        if after_name >= buf.len() {
            return Markup::Incomplete;
        }
        if buf[after_name] != b'=' {
            attributes.push_source(&attr_name, None, &buf[name_start..i]);
            continue;
        }

        i = after_name + 1;
        while i < buf.len() && is_space(buf[i]) {
            i += 1;
        }
        let Some(&quote) = buf.get(i) else {
            return Markup::Incomplete;
        };

        let raw_value = if quote == b'"' || quote == b'\'' {
            let Some(end) = buf[i + 1..].iter().position(|&b| b == quote) else {
                return Markup::Incomplete;
            };
            let value = &buf[i + 1..i + 1 + end];
            i += end + 2;
            value
        } else {
            let start = i;
            while i < buf.len() && !is_space(buf[i]) && buf[i] != b'>' {
                i += 1;
            }
            if i >= buf.len() {
                return Markup::Incomplete;
            }
            &buf[start..i]
        };

        let value = decode_entities(&String::from_utf8_lossy(raw_value));
        attributes.push_source(&attr_name, Some(value), &buf[name_start..i]);
    }
}
