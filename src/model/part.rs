//! A single decoded MIME body from the archive.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::parser::charset;

/// Media type assumed when a part declares none (RFC 2045 §5.2).
pub const DEFAULT_MEDIA_TYPE: &str = "text/plain";

/// One MIME body, after transfer decoding.
///
/// Parts are owned by the [`Archive`](super::archive::Archive); the indexes
/// refer to them by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Content-ID with surrounding `<` `>` removed.
    pub content_id: Option<String>,

    /// Content-Location URL exactly as declared.
    pub content_location: Option<String>,

    /// Lower-cased `type/subtype` (e.g. `"image/png"`).
    pub media_type: String,

    /// Declared charset label, if any. Only meaningful for text media types.
    pub charset: Option<String>,

    /// Body bytes with the Content-Transfer-Encoding removed.
    pub body: Vec<u8>,
}

impl Part {
    /// `true` for `text/*` media types.
    pub fn is_text(&self) -> bool {
        self.media_type.starts_with("text/")
    }

    /// `true` when the media type equals `media_type` (case-insensitive).
    pub fn has_media_type(&self, media_type: &str) -> bool {
        self.media_type.eq_ignore_ascii_case(media_type)
    }

    /// The charset used to decode this part as text, defaulting to UTF-8.
    pub fn charset_label(&self) -> &str {
        self.charset.as_deref().unwrap_or("utf-8")
    }

    /// Decode the body as text using the declared charset.
    ///
    /// Never fails: unknown or broken charsets fall back to lossy UTF-8.
    pub fn text(&self) -> String {
        charset::decode_text(&self.body, self.charset_label())
    }

    /// Render the body as a `data:` URI carrying the media type and base64 payload.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.media_type, STANDARD.encode(&self.body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(media_type: &str, charset: Option<&str>, body: &[u8]) -> Part {
        Part {
            content_id: None,
            content_location: None,
            media_type: media_type.to_string(),
            charset: charset.map(String::from),
            body: body.to_vec(),
        }
    }

    #[test]
    fn test_data_uri() {
        let p = part("image/png", None, b"\x89PNG");
        assert_eq!(p.to_data_uri(), "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn test_charset_defaults_to_utf8() {
        let p = part("text/css", None, "a{content:\"é\"}".as_bytes());
        assert_eq!(p.charset_label(), "utf-8");
        assert_eq!(p.text(), "a{content:\"é\"}");
    }

    #[test]
    fn test_text_with_declared_charset() {
        let p = part("text/css", Some("iso-8859-1"), b"caf\xe9");
        assert_eq!(p.text(), "café");
    }

    #[test]
    fn test_is_text() {
        assert!(part("text/html", None, b"").is_text());
        assert!(!part("image/gif", None, b"").is_text());
        assert!(part("TEXT/CSS", None, b"").has_media_type("text/css"));
    }
}
