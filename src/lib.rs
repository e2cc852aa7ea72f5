//! `mhtml-inline`: turn multipart web-page archives into standalone HTML.
//!
//! An archive bundles an HTML document with the resources it references.
//! This crate parses the archive into parts, indexes them by Content-ID and
//! Content-Location, and rewrites the HTML so every resource it can resolve
//! is embedded as a `data:` URI and every linked stylesheet is injected
//! inline. The result renders without the archive or the network.
//!
//! ```no_run
//! let raw = std::fs::read("page.mhtml")?;
//! let html = mhtml_inline::decode_and_inline(&raw)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod model;
pub mod parser;
pub mod response;
pub mod rewrite;

pub use error::{DecodeError, Issue, Result};
pub use rewrite::{InlineOptions, InlineReport, Inlined};

/// Decode an archive and return its HTML with resources inlined.
///
/// Fails only when the buffer is not a multipart archive or holds no HTML
/// part; unresolvable references are left as written.
pub fn decode_and_inline(raw: &[u8]) -> Result<String> {
    decode_and_inline_with(raw, &InlineOptions::default()).map(|inlined| inlined.html)
}

/// Like [`decode_and_inline`], with options, also returning what was inlined
/// and the non-fatal issues met along the way.
pub fn decode_and_inline_with(raw: &[u8], options: &InlineOptions) -> Result<Inlined> {
    let archive = parser::parse_archive(raw)?;
    Ok(rewrite::inline_resources(&archive, options))
}
