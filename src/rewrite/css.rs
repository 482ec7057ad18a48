//! Streaming CSS reference rewriter
//!
//! Rewrites `url(...)` references and `@import` targets. Input is processed
//! up to the last `}` or newline seen so far, so a reference is never split
//! across two processing passes.

use super::{CssVisitor, TransformError, MAX_PENDING_BYTES};
use regex::bytes::{Captures, Regex};
use std::sync::OnceLock;

fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"(?i)@import\s*(?:"(?P<idq>[^"]*)"|'(?P<isq>[^']*)')|(?P<lead>@import\s*)?url\(\s*(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)'|(?P<bare>[^)"'\s]*))\s*\)"#,
        )
        .expect("CSS reference pattern is valid")
    })
}

/// Streaming rewriter for stylesheets
#[derive(Debug, Default)]
pub struct CssRewriter {
    pending: Vec<u8>,
}

impl CssRewriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<V: CssVisitor>(
        &mut self,
        chunk: &[u8],
        visitor: &mut V,
    ) -> Result<Vec<u8>, TransformError> {
        self.pending.extend_from_slice(chunk);

        let Some(cut) = self
            .pending
            .iter()
            .rposition(|&b| b == b'}' || b == b'\n')
        else {
            if self.pending.len() > MAX_PENDING_BYTES {
                return Err(TransformError::MarkupTooLong {
                    limit: MAX_PENDING_BYTES,
                });
            }
            return Ok(Vec::new());
        };

        let rest = self.pending.split_off(cut + 1);
        let ready = std::mem::replace(&mut self.pending, rest);
        rewrite_references(&ready, visitor)
    }

    pub fn finish<V: CssVisitor>(&mut self, visitor: &mut V) -> Result<Vec<u8>, TransformError> {
        let ready = std::mem::take(&mut self.pending);
        rewrite_references(&ready, visitor)
    }
}

/// Rewrites a complete stylesheet held in memory (e.g. a `style` attribute)
pub fn rewrite_css<V: CssVisitor>(css: &str, visitor: &mut V) -> Result<String, TransformError> {
    let out = rewrite_references(css.as_bytes(), visitor)?;
    String::from_utf8(out).map_err(|_| TransformError::InvalidReference)
}

fn rewrite_references<V: CssVisitor>(
    input: &[u8],
    visitor: &mut V,
) -> Result<Vec<u8>, TransformError> {
    let mut out = Vec::with_capacity(input.len());
    let mut last = 0;

    for caps in reference_pattern().captures_iter(input) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let Some((group, is_import)) = reference_group(&caps) else {
            continue;
        };
        if group.as_bytes().is_empty() {
            continue;
        }

        let reference =
            std::str::from_utf8(group.as_bytes()).map_err(|_| TransformError::InvalidReference)?;
        let replacement = if is_import {
            visitor.on_import(reference)
        } else {
            visitor.on_url(reference)
        };

        out.extend_from_slice(&input[last..group.start()]);
        out.extend_from_slice(replacement.as_bytes());
        out.extend_from_slice(&input[group.end()..whole.end()]);
        last = whole.end();
    }

    out.extend_from_slice(&input[last..]);
    Ok(out)
}

/// Returns the captured reference and whether it is an `@import` target
fn reference_group<'h>(caps: &Captures<'h>) -> Option<(regex::bytes::Match<'h>, bool)> {
    if let Some(m) = caps.name("idq").or_else(|| caps.name("isq")) {
        return Some((m, true));
    }
    let is_import = caps.name("lead").is_some();
    caps.name("dq")
        .or_else(|| caps.name("sq"))
        .or_else(|| caps.name("bare"))
        .map(|m| (m, is_import))
}
