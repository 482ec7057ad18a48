//! Streaming content rewriters
//!
//! A rewriter consumes the response body chunk by chunk and emits rewritten
//! bytes. Every link-bearing construct it meets is handed to a visitor, which
//! decides what the link is replaced with:
//! - HTML start tags go to [`TagVisitor::on_tag`], which returns the
//!   (possibly changed) attributes or drops the tag entirely
//! - CSS `url(...)` references go to [`CssVisitor::on_url`]
//! - CSS `@import` targets go to [`CssVisitor::on_import`]
//!
//! Anything that is neither HTML nor CSS is passed through untouched.

mod attributes;
mod css;
mod html;

pub use attributes::{Attribute, Attributes};
pub use css::{rewrite_css, CssRewriter};
pub use html::HtmlRewriter;

use crate::mime;
use thiserror::Error;

/// Bytes a rewriter may hold back while waiting for the end of a tag
pub const MAX_PENDING_BYTES: usize = 1024 * 1024;

/// Errors raised while rewriting content
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Unterminated markup exceeds {limit} bytes")]
    MarkupTooLong { limit: usize },

    #[error("Reference is not valid UTF-8")]
    InvalidReference,
}

/// What to do with an HTML start tag after visiting it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagVerdict {
    /// Keep the tag with these attributes
    Keep(Attributes),
    /// Remove the tag from the output
    Drop,
}

/// Receives every HTML start tag
pub trait TagVisitor {
    /// `tag` is the lowercase tag name
    fn on_tag(&mut self, tag: &str, attributes: Attributes) -> TagVerdict;
}

/// Receives every CSS reference
pub trait CssVisitor {
    /// Called for `url(...)`; returns the replacement reference
    fn on_url(&mut self, reference: &str) -> String;

    /// Called for `@import` targets; returns the replacement reference
    fn on_import(&mut self, reference: &str) -> String;
}

/// The transform selected for one resource
#[derive(Debug)]
pub enum Transformer {
    Html(HtmlRewriter),
    Css(CssRewriter),
    PassThrough,
}

impl Transformer {
    /// Selects the transform for a resolved MIME type
    ///
    /// `text/html` gets the HTML rewriter, `text/css` the CSS rewriter,
    /// everything else is copied verbatim.
    pub fn for_mime(mime_type: &str) -> Self {
        if mime::is_html(mime_type) {
            Self::Html(HtmlRewriter::new())
        } else if mime::is_css(mime_type) {
            Self::Css(CssRewriter::new())
        } else {
            Self::PassThrough
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Html(_) => "html",
            Self::Css(_) => "css",
            Self::PassThrough => "pass-through",
        }
    }

    /// Feeds one chunk of the body; returns the bytes ready to be written
    pub fn push<V>(&mut self, chunk: &[u8], visitor: &mut V) -> Result<Vec<u8>, TransformError>
    where
        V: TagVisitor + CssVisitor,
    {
        match self {
            Self::Html(rewriter) => rewriter.push(chunk, visitor),
            Self::Css(rewriter) => rewriter.push(chunk, visitor),
            Self::PassThrough => Ok(chunk.to_vec()),
        }
    }

    /// Signals end of stream; returns whatever was still held back
    pub fn finish<V>(&mut self, visitor: &mut V) -> Result<Vec<u8>, TransformError>
    where
        V: TagVisitor + CssVisitor,
    {
        match self {
            Self::Html(rewriter) => rewriter.finish(visitor),
            Self::Css(rewriter) => rewriter.finish(visitor),
            Self::PassThrough => Ok(Vec::new()),
        }
    }
}
