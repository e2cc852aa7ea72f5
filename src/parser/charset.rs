//! Charset-aware text decoding for text parts.

use tracing::warn;

/// Decode bytes using a named charset.
///
/// Unknown labels, and bytes that are malformed in the declared charset,
/// fall back to UTF-8 with U+FFFD replacement.
pub fn decode_text(bytes: &[u8], charset: &str) -> String {
    let label = charset.trim().trim_matches('"');
    match label.to_ascii_lowercase().as_str() {
        "" | "utf-8" | "utf8" => String::from_utf8_lossy(strip_utf8_bom(bytes)).into_owned(),
        _ => match encoding_rs::Encoding::for_label(label.as_bytes()) {
            Some(encoding) => {
                let (decoded, used, had_errors) = encoding.decode(bytes);
                if had_errors {
                    warn!(
                        charset = label,
                        decoder = used.name(),
                        "Malformed text for declared charset, falling back to UTF-8 lossy"
                    );
                    String::from_utf8_lossy(strip_utf8_bom(bytes)).into_owned()
                } else {
                    decoded.into_owned()
                }
            }
            None => {
                warn!(
                    charset = label,
                    "Unknown charset, falling back to UTF-8 lossy"
                );
                String::from_utf8_lossy(strip_utf8_bom(bytes)).into_owned()
            }
        },
    }
}

fn strip_utf8_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes)
}
