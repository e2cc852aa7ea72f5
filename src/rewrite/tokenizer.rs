//! Tolerant HTML tag tokenizer.
//!
//! Yields start and end tags with their attributes and exact byte spans, so
//! callers can splice replacements into the original text without touching
//! anything else. Malformed markup never fails: a stray `<` is text, an
//! unterminated tag runs to the end of input. Comments, doctypes and the
//! content of raw-text elements (`script`, `style`, ...) are skipped.

use std::ops::Range;

use memchr::{memchr, memmem};

/// Elements whose content is not markup.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "textarea", "title", "xmp", "noscript", "noembed", "noframes",
];

/// A start or end tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag<'a> {
    /// Tag name as written.
    pub name: &'a str,
    /// `true` for `</name>`.
    pub is_end: bool,
    /// From the `<` up to and including the `>` (or end of input).
    pub span: Range<usize>,
    pub attributes: Vec<Attribute<'a>>,
}

impl Tag<'_> {
    /// Case-insensitive tag name comparison.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// First attribute with the given name (case-insensitive).
    pub fn attribute(&self, name: &str) -> Option<&Attribute<'_>> {
        self.attributes.iter().find(|a| a.is(name))
    }
}

/// One attribute of a start tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute<'a> {
    pub name: &'a str,
    /// Value without its quotes; empty when the attribute has no value.
    pub value: &'a str,
    /// Byte span of `value` in the document.
    pub value_span: Range<usize>,
    /// The quote character around the value, if quoted.
    pub quote: Option<u8>,
}

impl Attribute<'_> {
    /// Case-insensitive attribute name comparison.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Iterator over the tags of an HTML document.
pub struct Tags<'a> {
    html: &'a str,
    pos: usize,
}

/// Tokenize `html` into tags.
pub fn tags(html: &str) -> Tags<'_> {
    Tags { html, pos: 0 }
}

impl<'a> Iterator for Tags<'a> {
    type Item = Tag<'a>;

    fn next(&mut self) -> Option<Tag<'a>> {
        let bytes = self.html.as_bytes();
        let len = bytes.len();

        loop {
            if self.pos >= len {
                return None;
            }
            let lt = self.pos + memchr(b'<', &bytes[self.pos..])?;
            let rest = &bytes[lt..];

            if rest.starts_with(b"<!--") {
                self.pos = memmem::find(&bytes[lt + 4..], b"-->").map_or(len, |p| lt + 4 + p + 3);
                continue;
            }
            if rest.starts_with(b"<!") || rest.starts_with(b"<?") {
                self.pos = memchr(b'>', rest).map_or(len, |p| lt + p + 1);
                continue;
            }

            let is_end = rest.starts_with(b"</");
            let name_start = if is_end { lt + 2 } else { lt + 1 };
            if !bytes.get(name_start).is_some_and(u8::is_ascii_alphabetic) {
                self.pos = lt + 1;
                continue;
            }

            let mut i = name_start;
            while i < len && !is_ws(bytes[i]) && bytes[i] != b'/' && bytes[i] != b'>' {
                i += 1;
            }
            let name = &self.html[name_start..i];
            let (attributes, end) = self.attributes_from(i);

            self.pos = end;
            if !is_end && RAW_TEXT_ELEMENTS.iter().any(|raw| name.eq_ignore_ascii_case(raw)) {
                self.pos = find_end_tag(bytes, end, name).unwrap_or(len);
            }

            return Some(Tag {
                name,
                is_end,
                span: lt..end,
                attributes,
            });
        }
    }
}

impl<'a> Tags<'a> {
    /// Parse attributes starting at `i`; returns them and the offset just past the tag.
    fn attributes_from(&self, mut i: usize) -> (Vec<Attribute<'a>>, usize) {
        let html = self.html;
        let bytes = html.as_bytes();
        let len = bytes.len();
        let mut attributes = Vec::new();

        loop {
            while i < len && (is_ws(bytes[i]) || bytes[i] == b'/') {
                i += 1;
            }
            if i >= len {
                return (attributes, len);
            }
            if bytes[i] == b'>' {
                return (attributes, i + 1);
            }

            // A leading `=` belongs to the name.
            let name_start = i;
            i += 1;
            while i < len && !is_ws(bytes[i]) && !matches!(bytes[i], b'/' | b'>' | b'=') {
                i += 1;
            }
            let name = &html[name_start..i];

            let mut j = i;
            while j < len && is_ws(bytes[j]) {
                j += 1;
            }
            if j >= len || bytes[j] != b'=' {
                attributes.push(Attribute {
                    name,
                    value: "",
                    value_span: i..i,
                    quote: None,
                });
                continue;
            }

            j += 1;
            while j < len && is_ws(bytes[j]) {
                j += 1;
            }
            if j < len && (bytes[j] == b'"' || bytes[j] == b'\'') {
                let quote = bytes[j];
                let start = j + 1;
                let end = memchr(quote, &bytes[start..]).map_or(len, |p| start + p);
                attributes.push(Attribute {
                    name,
                    value: &html[start..end],
                    value_span: start..end,
                    quote: Some(quote),
                });
                i = (end + 1).min(len);
            } else {
                let start = j;
                while j < len && !is_ws(bytes[j]) && bytes[j] != b'>' {
                    j += 1;
                }
                attributes.push(Attribute {
                    name,
                    value: &html[start..j],
                    value_span: start..j,
                    quote: None,
                });
                i = j;
            }
        }
    }
}

/// Offset of the `</name` that closes a raw-text element, searching from `from`.
fn find_end_tag(bytes: &[u8], from: usize, name: &str) -> Option<usize> {
    let name = name.as_bytes();
    let mut k = from;
    while let Some(p) = memmem::find(&bytes[k..], b"</") {
        let at = k + p;
        let name_end = at + 2 + name.len();
        if bytes
            .get(at + 2..name_end)
            .is_some_and(|n| n.eq_ignore_ascii_case(name))
            && bytes
                .get(name_end)
                .is_none_or(|&b| is_ws(b) || b == b'>' || b == b'/')
        {
            return Some(at);
        }
        k = at + 2;
    }
    None
}

/// Byte ranges of the candidate URLs in a `srcset` value.
///
/// A candidate URL is a run of non-whitespace; trailing commas end it,
/// otherwise its descriptors run to the next comma. Commas inside a URL
/// (as in `data:` URIs) are therefore kept.
pub fn srcset_urls(value: &str) -> Vec<Range<usize>> {
    let b = value.as_bytes();
    let len = b.len();
    let mut urls = Vec::new();
    let mut i = 0;

    loop {
        while i < len && (is_ws(b[i]) || b[i] == b',') {
            i += 1;
        }
        if i >= len {
            return urls;
        }

        let start = i;
        while i < len && !is_ws(b[i]) {
            i += 1;
        }
        let mut end = i;
        if b[end - 1] == b',' {
            while end > start && b[end - 1] == b',' {
                end -= 1;
            }
            if end > start {
                urls.push(start..end);
            }
            continue;
        }
        urls.push(start..end);

        while i < len && b[i] != b',' {
            i += 1;
        }
    }
}

#[inline]
fn is_ws(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0C')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_tag_attributes() {
        let html = r#"<p>x</p><img src="cid:a" alt='b c' width=10 hidden>"#;
        let all: Vec<Tag<'_>> = tags(html).collect();
        assert_eq!(all.len(), 3);
        let img = &all[2];
        assert!(img.is("IMG"));
        assert!(!img.is_end);
        assert_eq!(&html[img.span.clone()], &html[8..]);

        let src = img.attribute("src").unwrap();
        assert_eq!(src.value, "cid:a");
        assert_eq!(&html[src.value_span.clone()], "cid:a");
        assert_eq!(src.quote, Some(b'"'));

        assert_eq!(img.attribute("alt").unwrap().value, "b c");
        assert_eq!(img.attribute("width").unwrap().quote, None);
        assert_eq!(img.attribute("width").unwrap().value, "10");
        assert_eq!(img.attribute("hidden").unwrap().value, "");
    }

    #[test]
    fn test_end_tags_and_self_closing() {
        let html = "<br/><link href=x.css /></HEAD>";
        let all: Vec<Tag<'_>> = tags(html).collect();
        assert_eq!(all.len(), 3);
        assert!(all[0].is("br"));
        assert_eq!(all[1].attribute("href").unwrap().value, "x.css");
        assert!(all[2].is_end);
        assert!(all[2].is("head"));
    }

    #[test]
    fn test_comments_and_doctype_skipped() {
        let html = "<!DOCTYPE html><!-- <img src=\"cid:x\"> --><p>";
        let names: Vec<&str> = tags(html).map(|t| t.name).collect();
        assert_eq!(names, vec!["p"]);
    }

    #[test]
    fn test_raw_text_content_skipped() {
        let html = "<script>var s = '<img src=\"cid:x\">';</script><img src=\"cid:y\">";
        let all: Vec<Tag<'_>> = tags(html).collect();
        let names: Vec<&str> = all.iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["script", "script", "img"]);
        assert_eq!(all[2].attribute("src").unwrap().value, "cid:y");
    }

    #[test]
    fn test_noscript_content_skipped() {
        let html = "<noscript><img src=\"cid:fallback\"></noscript><img src=\"cid:lazy\">";
        let all: Vec<Tag<'_>> = tags(html).collect();
        let names: Vec<&str> = all.iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["noscript", "noscript", "img"]);
        assert_eq!(all[2].attribute("src").unwrap().value, "cid:lazy");
    }

    #[test]
    fn test_stray_angle_brackets_are_text() {
        let html = "a < b <3 <img src=x>";
        let all: Vec<Tag<'_>> = tags(html).collect();
        assert_eq!(all.len(), 1);
        assert!(all[0].is("img"));
    }

    #[test]
    fn test_unterminated_tag() {
        let html = "<img src=\"cid:a";
        let all: Vec<Tag<'_>> = tags(html).collect();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].span, 0..html.len());
        assert_eq!(all[0].attribute("src").unwrap().value, "cid:a");
    }

    #[test]
    fn test_multibyte_text() {
        let html = "<p title=\"café\">naïve</p><img src=ü.png>";
        let all: Vec<Tag<'_>> = tags(html).collect();
        assert_eq!(all[0].attribute("title").unwrap().value, "café");
        assert_eq!(all[2].attribute("src").unwrap().value, "ü.png");
    }

    #[test]
    fn test_srcset_urls() {
        let value = "a.png 1x, b.png 2x,c.png";
        let urls: Vec<&str> = srcset_urls(value).into_iter().map(|r| &value[r]).collect();
        assert_eq!(urls, vec!["a.png", "b.png", "c.png"]);
    }

    #[test]
    fn test_srcset_keeps_data_uri_commas() {
        let value = "data:image/png;base64,AAAA 1x, https://x.test/b.png 2x";
        let urls: Vec<&str> = srcset_urls(value).into_iter().map(|r| &value[r]).collect();
        assert_eq!(urls, vec!["data:image/png;base64,AAAA", "https://x.test/b.png"]);
    }

    #[test]
    fn test_srcset_trailing_comma() {
        let value = "a.png,, b.png";
        let urls: Vec<&str> = srcset_urls(value).into_iter().map(|r| &value[r]).collect();
        assert_eq!(urls, vec!["a.png", "b.png"]);
    }
}
