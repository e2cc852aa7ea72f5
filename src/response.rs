//! Response shaping for serving an archive.
//!
//! A decoded archive is served as standalone HTML. An archive that cannot
//! be decoded is served as its original bytes with a multipart content type
//! sniffed from the raw data, so a viewer still gets something to open.

use tracing::warn;

use crate::error::DecodeError;
use crate::rewrite::{InlineOptions, InlineReport};

/// Content type of an inlined document.
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// How many leading bytes are searched for a boundary declaration.
const SNIFF_LIMIT: usize = 2000;

/// How the body was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The archive was decoded and inlined.
    Inlined(InlineReport),
    /// The archive could not be decoded; the body is the original bytes.
    Raw(DecodeError),
}

/// A response ready to be written out.
#[derive(Debug, Clone)]
pub struct Rendered {
    /// Header name/value pairs, `Content-Type` first.
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
    pub outcome: Outcome,
}

impl Rendered {
    /// An inlined HTML document.
    pub fn html(html: String, report: InlineReport) -> Self {
        Self {
            headers: vec![
                ("Content-Type", HTML_CONTENT_TYPE.to_string()),
                ("Content-Disposition", "inline".to_string()),
                ("X-Content-Type-Options", "nosniff".to_string()),
                ("Cache-Control", "no-cache".to_string()),
            ],
            body: html.into_bytes(),
            outcome: Outcome::Inlined(report),
        }
    }

    /// The original archive bytes, after `error` prevented decoding.
    pub fn raw(raw: &[u8], error: DecodeError) -> Self {
        Self {
            headers: vec![
                ("Content-Type", sniff_multipart_content_type(raw)),
                ("Content-Disposition", "inline".to_string()),
                ("X-Content-Type-Options", "nosniff".to_string()),
            ],
            body: raw.to_vec(),
            outcome: Outcome::Raw(error),
        }
    }

    /// Value of the `Content-Type` header.
    pub fn content_type(&self) -> &str {
        self.headers
            .iter()
            .find(|(name, _)| *name == "Content-Type")
            .map_or("", |(_, value)| value.as_str())
    }

    pub fn is_inlined(&self) -> bool {
        matches!(self.outcome, Outcome::Inlined(_))
    }
}

/// Decode and inline `raw`, falling back to the raw bytes on failure.
pub fn render(raw: &[u8], options: &InlineOptions) -> Rendered {
    match crate::decode_and_inline_with(raw, options) {
        Ok(inlined) => Rendered::html(inlined.html, inlined.report),
        Err(e) => {
            warn!(error = %e, bytes = raw.len(), "Serving raw archive");
            Rendered::raw(raw, e)
        }
    }
}

/// Best-guess content type for a raw archive: `multipart/related` with the
/// first boundary declared in its leading bytes.
pub fn sniff_multipart_content_type(raw: &[u8]) -> String {
    match sniff_boundary(raw) {
        Some(boundary) => format!("multipart/related; boundary=\"{boundary}\""),
        None => "multipart/related".to_string(),
    }
}

fn sniff_boundary(raw: &[u8]) -> Option<String> {
    let head = &raw[..raw.len().min(SNIFF_LIMIT)];
    let text = String::from_utf8_lossy(head).replace(char::REPLACEMENT_CHARACTER, "");

    text.split('\n').find_map(|line| {
        let lower = line.to_ascii_lowercase();
        lower.match_indices("boundary=").find_map(|(at, key)| {
            let value = &line[at + key.len()..];
            let value = value.strip_prefix(['"', '\'']).unwrap_or(value);
            let end = value
                .find(|c: char| c == '"' || c == '\'' || c == ';' || c.is_whitespace())
                .unwrap_or(value.len());
            (end > 0).then(|| value[..end].to_string())
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_boundary_quoted() {
        let raw = b"MIME-Version: 1.0\r\nContent-Type: multipart/related;\r\n\ttype=\"text/html\";\r\n\tboundary=\"----MultipartBoundary--xyz----\"\r\n\r\n";
        assert_eq!(
            sniff_multipart_content_type(raw),
            "multipart/related; boundary=\"----MultipartBoundary--xyz----\""
        );
    }

    #[test]
    fn test_sniff_boundary_unquoted_and_case() {
        let raw = b"Content-Type: multipart/related; BOUNDARY=abc123; type=text/html\n";
        assert_eq!(
            sniff_multipart_content_type(raw),
            "multipart/related; boundary=\"abc123\""
        );
    }

    #[test]
    fn test_sniff_boundary_beyond_limit() {
        let mut raw = vec![b'x'; SNIFF_LIMIT];
        raw.extend_from_slice(b"\nboundary=late\n");
        assert_eq!(sniff_multipart_content_type(&raw), "multipart/related");
    }

    #[test]
    fn test_sniff_skips_empty_boundary() {
        let raw = b"boundary=\"\"\nContent-Type: multipart/related; boundary=ok\n";
        assert_eq!(
            sniff_multipart_content_type(raw),
            "multipart/related; boundary=\"ok\""
        );
    }

    #[test]
    fn test_render_falls_back_to_raw() {
        let raw = b"Content-Type: text/html\r\n\r\n<p>not an archive</p>";
        let rendered = render(raw, &InlineOptions::default());
        assert!(!rendered.is_inlined());
        assert_eq!(rendered.body, raw);
        assert_eq!(rendered.content_type(), "multipart/related");
        assert!(matches!(
            rendered.outcome,
            Outcome::Raw(DecodeError::MalformedArchive(_))
        ));
        assert!(!rendered.headers.iter().any(|(n, _)| *n == "Cache-Control"));
    }

    #[test]
    fn test_render_html_headers() {
        let rendered = Rendered::html("<p></p>".into(), InlineReport::default());
        assert!(rendered.is_inlined());
        assert_eq!(rendered.content_type(), HTML_CONTENT_TYPE);
        let names: Vec<&str> = rendered.headers.iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            vec!["Content-Type", "Content-Disposition", "X-Content-Type-Options", "Cache-Control"]
        );
    }
}
