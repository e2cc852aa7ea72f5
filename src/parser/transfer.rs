//! Content-Transfer-Encoding decoding (RFC 2045 §6) and quoted-printable
//! residue cleanup for extracted HTML text.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use thiserror::Error;
use tracing::warn;

use crate::error::Issue;

/// Base64 engine that accepts missing or superfluous padding.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

const HEX_DECODE: [i8; 256] = {
    let mut t = [-1i8; 256];
    let mut i = 0u8;
    while i < 10 {
        t[(b'0' + i) as usize] = i as i8;
        i += 1;
    }
    let mut i = 0u8;
    while i < 6 {
        t[(b'A' + i) as usize] = (10 + i) as i8;
        t[(b'a' + i) as usize] = (10 + i) as i8;
        i += 1;
    }
    t
};

/// A part body that could not be decoded.
#[derive(Error, Debug)]
pub enum TransferError {
    /// The declared encoding is not one this decoder knows.
    #[error("unsupported transfer encoding '{0}'")]
    Unsupported(String),

    /// The body is not valid base64.
    #[error("invalid base64 body: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Declared Content-Transfer-Encoding of a part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// `7bit`, `8bit`, `binary`, or no header at all.
    Identity,
    Base64,
    QuotedPrintable,
}

impl TransferEncoding {
    /// Classify a Content-Transfer-Encoding header value.
    pub fn from_header(value: Option<&str>) -> Result<Self, TransferError> {
        let Some(value) = value else {
            return Ok(Self::Identity);
        };
        let name = value.trim().trim_matches('"');
        if name.is_empty()
            || name.eq_ignore_ascii_case("7bit")
            || name.eq_ignore_ascii_case("8bit")
            || name.eq_ignore_ascii_case("binary")
        {
            Ok(Self::Identity)
        } else if name.eq_ignore_ascii_case("base64") {
            Ok(Self::Base64)
        } else if name.eq_ignore_ascii_case("quoted-printable") {
            Ok(Self::QuotedPrintable)
        } else {
            Err(TransferError::Unsupported(name.to_string()))
        }
    }

    /// Remove this encoding from a raw part body.
    pub fn decode(self, raw: &[u8]) -> Result<Vec<u8>, TransferError> {
        match self {
            Self::Identity => Ok(raw.to_vec()),
            Self::Base64 => {
                let compact: Vec<u8> = raw
                    .iter()
                    .copied()
                    .filter(|b| !b.is_ascii_whitespace())
                    .collect();
                Ok(LENIENT_BASE64.decode(compact)?)
            }
            Self::QuotedPrintable => Ok(decode_quoted_printable(raw)),
        }
    }
}

/// Decode quoted-printable: `=XX` escapes and soft line breaks.
///
/// Malformed escapes are kept literally, so this never fails.
pub fn decode_quoted_printable(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len());
    let mut i = 0;
    while i < src.len() {
        let b = src[i];
        if b != b'=' {
            out.push(b);
            i += 1;
            continue;
        }

        if i + 2 < src.len() {
            let v1 = HEX_DECODE[src[i + 1] as usize];
            let v2 = HEX_DECODE[src[i + 2] as usize];
            if v1 >= 0 && v2 >= 0 {
                out.push(((v1 as u8) << 4) | v2 as u8);
                i += 3;
                continue;
            }
        }

        // Soft line break, allowing transport padding between `=` and the newline.
        let mut j = i + 1;
        while j < src.len() && (src[j] == b' ' || src[j] == b'\t') {
            j += 1;
        }
        if src[j..].starts_with(b"\r\n") {
            i = j + 2;
        } else if src[j..].starts_with(b"\n") {
            i = j + 1;
        } else {
            out.push(b);
            i += 1;
        }
    }
    out
}

/// Undo quoted-printable escaping left behind in already-decoded HTML text.
///
/// Some savers encode the document twice, so transfer decoding leaves `=3D`
/// and soft line breaks in the markup. The text is re-run through the
/// quoted-printable decoder; if that does not yield UTF-8 the attempt is
/// abandoned and reported. Remaining `=3D` and line continuations are then
/// removed regardless.
///
/// The re-decode also hits legitimate `=XX` text, so a URL query such as
/// `?w=300` becomes `?w00` whenever the result is still valid UTF-8.
pub fn clean_quoted_printable_residue(text: &str) -> (String, Option<Issue>) {
    let (redecoded, issue) = match String::from_utf8(decode_quoted_printable(text.as_bytes())) {
        Ok(s) => (s, None),
        Err(e) => {
            warn!(error = %e, "Quoted-printable cleanup produced invalid UTF-8, keeping text as is");
            (text.to_string(), Some(Issue::PostProcessSkipped(e.to_string())))
        }
    };

    let cleaned = redecoded
        .replace("=3D", "=")
        .replace("=\r\n", "")
        .replace("=\n", "");
    (cleaned, issue)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_from_header() {
        assert_eq!(
            TransferEncoding::from_header(None).unwrap(),
            TransferEncoding::Identity
        );
        assert_eq!(
            TransferEncoding::from_header(Some("8BIT")).unwrap(),
            TransferEncoding::Identity
        );
        assert_eq!(
            TransferEncoding::from_header(Some(" Base64 ")).unwrap(),
            TransferEncoding::Base64
        );
        assert_eq!(
            TransferEncoding::from_header(Some("quoted-printable")).unwrap(),
            TransferEncoding::QuotedPrintable
        );
        assert!(TransferEncoding::from_header(Some("x-uuencode")).is_err());
    }

    #[test]
    fn test_base64_with_line_breaks() {
        let raw = b"SGVsbG8s\r\nIHdvcmxk\r\nIQ==\r\n";
        let decoded = TransferEncoding::Base64.decode(raw).unwrap();
        assert_eq!(decoded, b"Hello, world!");
    }

    #[test]
    fn test_base64_missing_padding() {
        let decoded = TransferEncoding::Base64.decode(b"SGk").unwrap();
        assert_eq!(decoded, b"Hi");
    }

    #[test]
    fn test_base64_garbage_fails() {
        assert!(TransferEncoding::Base64.decode(b"!!!not*base64***").is_err());
    }

    #[test]
    fn test_qp_escapes_and_soft_breaks() {
        let raw = b"<img src=3D\"cid:a\">=\r\nmore=20text=\nend";
        assert_eq!(
            decode_quoted_printable(raw),
            b"<img src=\"cid:a\">more textend".to_vec()
        );
    }

    #[test]
    fn test_qp_soft_break_with_padding() {
        assert_eq!(decode_quoted_printable(b"ab=  \r\ncd"), b"abcd".to_vec());
    }

    #[test]
    fn test_qp_malformed_escape_kept() {
        assert_eq!(decode_quoted_printable(b"a=ZZ b="), b"a=ZZ b=".to_vec());
    }

    #[test]
    fn test_qp_utf8_sequence() {
        assert_eq!(
            decode_quoted_printable(b"caf=C3=A9"),
            "café".as_bytes().to_vec()
        );
    }

    #[test]
    fn test_residue_cleanup_double_encoded() {
        let (text, issue) = clean_quoted_printable_residue("<a href=3D3D\"x\">=\nhi</a>");
        assert!(issue.is_none());
        assert_eq!(text, "<a href=\"x\">hi</a>");
    }

    #[test]
    fn test_residue_cleanup_keeps_text_on_invalid_utf8() {
        let (text, issue) = clean_quoted_printable_residue("<p>price=FF</p>");
        assert!(matches!(issue, Some(Issue::PostProcessSkipped(_))));
        assert_eq!(text, "<p>price=FF</p>");
    }
}
