//! Multipart archive parsing: part extraction, index building, and
//! primary HTML selection.

use mail_parser::{MessageParser, MessagePart, MimeHeaders, PartType};
use tracing::{debug, warn};

use crate::error::{DecodeError, Issue, Result};
use crate::model::archive::{normalize_content_id, Archive, PartIndex};
use crate::model::part::{Part, DEFAULT_MEDIA_TYPE};
use crate::parser::transfer::{clean_quoted_printable_residue, TransferEncoding, TransferError};

/// Header browsers record on the archive root with the page's original URL.
const SNAPSHOT_LOCATION_HEADER: &str = "Snapshot-Content-Location";

/// Parse a raw multipart web archive into an [`Archive`].
///
/// Fails with [`DecodeError::MalformedArchive`] when the buffer is not a
/// multipart message with a usable boundary, and with
/// [`DecodeError::NoHtmlContent`] when no part is `text/html`. Parts whose
/// body cannot be transfer-decoded are skipped and reported in
/// [`Archive::issues`].
pub fn parse_archive(raw: &[u8]) -> Result<Archive> {
    let data = skip_bom(raw);

    let message = MessageParser::default()
        .parse(data)
        .ok_or_else(|| DecodeError::MalformedArchive("not a MIME message".into()))?;
    let root = message
        .parts
        .first()
        .ok_or_else(|| DecodeError::MalformedArchive("message has no content".into()))?;

    let root_type = root.content_type().ok_or_else(|| {
        DecodeError::MalformedArchive("missing top-level Content-Type header".into())
    })?;
    if !root_type.ctype().eq_ignore_ascii_case("multipart") {
        return Err(DecodeError::MalformedArchive(format!(
            "top-level content type is {}, not multipart",
            media_type_of(root)
        )));
    }
    let boundary = root_type.attribute("boundary").ok_or_else(|| {
        DecodeError::MalformedArchive("no multipart boundary declared".into())
    })?;
    if message.parts.len() < 2 {
        return Err(DecodeError::MalformedArchive(format!(
            "boundary \"{boundary}\" does not delimit any part"
        )));
    }

    let snapshot_location = root_header(data, SNAPSHOT_LOCATION_HEADER);

    let mut parts: Vec<Part> = Vec::new();
    let mut index = PartIndex::default();
    let mut issues = Vec::new();
    let mut primary_html = None;

    for (position, mime_part) in message.parts.iter().enumerate() {
        if matches!(mime_part.body, PartType::Multipart(_)) {
            continue;
        }

        let media_type = media_type_of(mime_part);
        let body = match decode_body(data, mime_part) {
            Ok(body) => body,
            Err(e) => {
                warn!(
                    part = position,
                    media_type = %media_type,
                    error = %e,
                    "Skipping part that failed to decode"
                );
                issues.push(Issue::PartDecodeSkipped {
                    part: position,
                    media_type,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let charset = if media_type.starts_with("text/") {
            mime_part
                .content_type()
                .and_then(|ct| ct.attribute("charset"))
                .map(String::from)
        } else {
            None
        };

        let part = Part {
            content_id: mime_part.content_id().and_then(normalize_content_id),
            content_location: mime_part
                .content_location()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty()),
            media_type,
            charset,
            body,
        };

        let slot = parts.len();
        index.insert(slot, &part);
        if primary_html.is_none() && part.has_media_type("text/html") && !part.body.is_empty() {
            primary_html = Some(slot);
        }
        parts.push(part);
    }

    let primary_html = primary_html.ok_or(DecodeError::NoHtmlContent)?;
    let (html, residue) = clean_quoted_printable_residue(&parts[primary_html].text());
    issues.extend(residue);

    debug!(
        parts = parts.len(),
        skipped = issues.len(),
        identifier_keys = index.identifier_keys(),
        location_keys = index.location_keys(),
        html_bytes = html.len(),
        "Parsed archive"
    );

    Ok(Archive {
        parts,
        index,
        primary_html,
        html,
        snapshot_location,
        issues,
    })
}

/// Remove the transfer encoding from a part's raw body bytes.
fn decode_body(data: &[u8], part: &MessagePart<'_>) -> std::result::Result<Vec<u8>, TransferError> {
    let encoding = TransferEncoding::from_header(part.content_transfer_encoding())?;
    let start = part.raw_body_offset() as usize;
    let end = (part.raw_end_offset() as usize).max(start);
    let raw = data.get(start..end).unwrap_or_default();
    encoding.decode(raw)
}

/// Lower-cased `type/subtype` of a part, defaulting to `text/plain`.
fn media_type_of(part: &MessagePart<'_>) -> String {
    part.content_type()
        .map(|ct| match ct.subtype() {
            Some(sub) => format!("{}/{}", ct.ctype(), sub),
            None => ct.ctype().to_string(),
        })
        .map(|t| t.trim().to_ascii_lowercase())
        .unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_string())
}

/// Value of a top-level header, read from the raw header block.
///
/// Continuation lines are unfolded into the value.
fn root_header(data: &[u8], name: &str) -> Option<String> {
    let header_end = find_header_end(data).unwrap_or(data.len());
    let text = String::from_utf8_lossy(&data[..header_end]);

    let mut value: Option<String> = None;
    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(ref mut v) = value {
                v.push_str(line.trim());
            }
        } else if value.is_some() {
            break;
        } else if let Some((key, rest)) = line.split_once(':') {
            if key.trim().eq_ignore_ascii_case(name) {
                value = Some(rest.trim().to_string());
            }
        }
    }
    value.filter(|v| !v.is_empty())
}

/// Find the byte offset where headers end (position of the first blank line).
fn find_header_end(data: &[u8]) -> Option<usize> {
    let lf = memchr::memmem::find(data, b"\n\n");
    let crlf = memchr::memmem::find(data, b"\r\n\r\n");
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn skip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data)
}
