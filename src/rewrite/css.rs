//! `url(...)` references in CSS text and inline style attributes.

use std::ops::Range;

use memchr::memmem;

/// Quote tokens recognised around a `url(...)` target. Style attributes
/// saved by browsers often carry the entity-escaped forms.
const QUOTES: &[&str] = &["&quot;", "&#34;", "&#39;", "\"", "'"];

/// One `url(...)` occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRef<'a> {
    /// From the `u` of `url(` through the closing `)`.
    pub span: Range<usize>,
    /// The referenced URL, unquoted and trimmed.
    pub target: &'a str,
}

/// Find every well-formed `url(...)` reference in `css`, in order.
///
/// The function name is matched case-insensitively and must not be the tail
/// of a longer identifier. References without a closing parenthesis are
/// ignored.
pub fn url_refs(css: &str) -> Vec<UrlRef<'_>> {
    let lower = css.to_ascii_lowercase();
    let bytes = css.as_bytes();
    let mut refs = Vec::new();
    let mut resume = 0;

    for start in memmem::find_iter(lower.as_bytes(), b"url(") {
        if start < resume {
            continue;
        }
        if start > 0 && is_ident_byte(bytes[start - 1]) {
            continue;
        }
        if let Some(url_ref) = parse_at(css, start) {
            resume = url_ref.span.end;
            refs.push(url_ref);
        }
    }
    refs
}

fn parse_at(css: &str, start: usize) -> Option<UrlRef<'_>> {
    let bytes = css.as_bytes();
    let mut i = start + 4;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }

    let rest = &css[i..];
    let quote = QUOTES
        .iter()
        .find(|q| rest.get(..q.len()).is_some_and(|p| p.eq_ignore_ascii_case(q)));

    let (target, mut after) = match quote {
        Some(q) => {
            let open_end = i + q.len();
            let close = find_ignore_ascii_case(&css[open_end..], q)? + open_end;
            (&css[open_end..close], close + q.len())
        }
        None => {
            let close = css[i..].find(')')? + i;
            (&css[i..close], close)
        }
    };

    while after < bytes.len() && bytes[after].is_ascii_whitespace() {
        after += 1;
    }
    if bytes.get(after) != Some(&b')') {
        return None;
    }

    Some(UrlRef {
        span: start..after + 1,
        target: target.trim(),
    })
}

fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    if needle.bytes().all(|b| !b.is_ascii_alphabetic()) {
        return haystack.find(needle);
    }
    memmem::find(
        haystack.to_ascii_lowercase().as_bytes(),
        needle.to_ascii_lowercase().as_bytes(),
    )
}

#[inline]
fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}
