//! Reference resolution against an archive's indexes.

use tracing::trace;

use crate::model::archive::strip_cid_scheme;
use crate::model::{Archive, Part};

/// Resolves identifier, absolute-URL and relative-URL references to parts.
///
/// Parts with an empty body never resolve: inlining them would only replace
/// a possibly reachable reference with nothing.
pub struct Resolver<'a> {
    archive: &'a Archive,
    hints: Vec<String>,
}

impl<'a> Resolver<'a> {
    /// Build a resolver. Relative references are tried against
    /// `location_hints` in order, then the primary HTML part's location,
    /// then the archive's snapshot location.
    pub fn new(archive: &'a Archive, location_hints: &[String]) -> Self {
        let mut hints: Vec<String> = Vec::new();
        let implicit = [
            archive.primary_part().content_location.as_ref(),
            archive.snapshot_location.as_ref(),
        ];
        for hint in location_hints.iter().chain(implicit.into_iter().flatten()) {
            if is_absolute_http(hint) && !hints.contains(hint) {
                hints.push(hint.clone());
            }
        }
        Self { archive, hints }
    }

    /// The base URLs relative references are resolved against.
    pub fn hints(&self) -> &[String] {
        &self.hints
    }

    /// Resolve a content-identifier (the text after `cid:`, or a full `cid:` URL).
    pub fn identifier(&self, reference: &str) -> Option<&'a Part> {
        let part = self
            .archive
            .part_by_identifier(reference)
            .filter(|p| !p.body.is_empty());
        trace!(reference, hit = part.is_some(), "Identifier lookup");
        part
    }

    /// Resolve an absolute `http(s)` URL: exact, then without its query string.
    ///
    /// The primary HTML part never resolves, so a page naming its own URL
    /// is not embedded into itself.
    pub fn location(&self, url: &str) -> Option<&'a Part> {
        let url = decode_amp(url.trim());
        let primary = self.archive.primary_part();
        let part = self
            .archive
            .part_by_location(&url)
            .filter(|p| !p.body.is_empty() && !std::ptr::eq(*p, primary));
        trace!(url = %url, hit = part.is_some(), "Location lookup");
        part
    }

    /// Resolve a URL-valued reference: absolute URLs directly, relative ones
    /// against `base` (when given) and then against the resolver's hints.
    pub fn url(&self, reference: &str, base: Option<&str>) -> Option<&'a Part> {
        let reference = reference.trim();
        if is_absolute_http(reference) {
            return self.location(reference);
        }
        if !is_relative(reference) {
            return None;
        }
        let reference = decode_amp(reference);
        base.into_iter()
            .chain(self.hints.iter().map(String::as_str))
            .filter_map(|b| join_url(b, &reference))
            .find_map(|joined| self.location(&joined))
    }

    /// Resolve any reference found in a stylesheet: `cid:` identifiers or URLs.
    pub fn stylesheet_reference(&self, reference: &str, base: Option<&str>) -> Option<&'a Part> {
        match strip_cid_scheme(reference.trim()) {
            Some(id) => self.identifier(id),
            None => self.url(reference, base),
        }
    }
}

/// `true` for `http://` and `https://` URLs (case-insensitive scheme).
pub fn is_absolute_http(value: &str) -> bool {
    let lower = value.get(..8).unwrap_or(value).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// `true` for a non-empty reference that has no scheme and is not a bare fragment.
pub fn is_relative(value: &str) -> bool {
    !value.is_empty() && !value.starts_with('#') && scheme_of(value).is_none()
}

/// The scheme of `value` (`"data"`, `"cid"`, ...), if it has one.
fn scheme_of(value: &str) -> Option<&str> {
    let colon = value.find(':')?;
    let scheme = &value[..colon];
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if first.is_ascii_alphabetic()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    {
        Some(scheme)
    } else {
        None
    }
}

fn decode_amp(value: &str) -> String {
    value.replace("&amp;", "&")
}

/// Resolve `reference` against the absolute `base` URL.
///
/// Returns `None` when `base` is not hierarchical (`scheme://authority...`).
pub fn join_url(base: &str, reference: &str) -> Option<String> {
    let scheme_end = base.find("://")?;
    let scheme = &base[..scheme_end];
    let after_scheme = &base[scheme_end + 3..];
    let authority_end = after_scheme
        .find(['/', '?', '#'])
        .unwrap_or(after_scheme.len());
    let origin = &base[..scheme_end + 3 + authority_end];
    let rest = &after_scheme[authority_end..];
    let path = &rest[..rest.find(['?', '#']).unwrap_or(rest.len())];

    if let Some(network_path) = reference.strip_prefix("//") {
        return Some(format!("{scheme}://{network_path}"));
    }
    if reference.starts_with('/') {
        return Some(format!("{origin}{}", remove_dot_segments(reference)));
    }
    if reference.starts_with('?') {
        let path = if path.is_empty() { "/" } else { path };
        return Some(format!("{origin}{path}{reference}"));
    }

    let dir = path.rfind('/').map_or("/", |p| &path[..=p]);
    Some(format!(
        "{origin}{}",
        remove_dot_segments(&format!("{dir}{reference}"))
    ))
}

/// Collapse `.` and `..` segments of an absolute path, keeping any query or fragment.
fn remove_dot_segments(target: &str) -> String {
    let split = target.find(['?', '#']).unwrap_or(target.len());
    let (path, suffix) = target.split_at(split);

    let pieces: Vec<&str> = path.split('/').collect();
    let last = pieces.len() - 1;
    let mut segments: Vec<&str> = Vec::new();
    for (i, piece) in pieces.iter().enumerate().skip(1) {
        match *piece {
            "." => {
                if i == last {
                    segments.push("");
                }
            }
            ".." => {
                segments.pop();
                if i == last {
                    segments.push("");
                }
            }
            s => segments.push(s),
        }
    }
    format!("/{}{}", segments.join("/"), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PartIndex;

    fn archive(parts: Vec<Part>, snapshot: Option<&str>) -> Archive {
        let mut index = PartIndex::default();
        for (i, p) in parts.iter().enumerate() {
            index.insert(i, p);
        }
        Archive {
            parts,
            index,
            primary_html: 0,
            html: String::new(),
            snapshot_location: snapshot.map(String::from),
            issues: Vec::new(),
        }
    }

    fn part(cid: Option<&str>, location: Option<&str>, body: &[u8]) -> Part {
        Part {
            content_id: cid.map(String::from),
            content_location: location.map(String::from),
            media_type: "image/png".to_string(),
            charset: None,
            body: body.to_vec(),
        }
    }

    fn html_part(location: Option<&str>) -> Part {
        Part {
            media_type: "text/html".to_string(),
            ..part(None, location, b"<html></html>")
        }
    }

    #[test]
    fn test_join_url() {
        let base = "https://x.test/a/b/page.html?q=1#top";
        assert_eq!(join_url(base, "img.png").unwrap(), "https://x.test/a/b/img.png");
        assert_eq!(join_url(base, "../img.png").unwrap(), "https://x.test/a/img.png");
        assert_eq!(join_url(base, "./c/./d.png").unwrap(), "https://x.test/a/b/c/d.png");
        assert_eq!(join_url(base, "/root.png?v=2").unwrap(), "https://x.test/root.png?v=2");
        assert_eq!(join_url(base, "//cdn.test/x.png").unwrap(), "https://cdn.test/x.png");
        assert_eq!(join_url(base, "?p=2").unwrap(), "https://x.test/a/b/page.html?p=2");
        assert_eq!(join_url("https://x.test", "a.png").unwrap(), "https://x.test/a.png");
        assert_eq!(join_url("https://x.test/a/", "..").unwrap(), "https://x.test/");
        assert!(join_url("cid:frame", "a.png").is_none());
    }

    #[test]
    fn test_reference_kinds() {
        assert!(is_absolute_http("HTTPS://x.test/"));
        assert!(!is_absolute_http("data:image/png;base64,AA"));
        assert!(is_relative("img/a.png"));
        assert!(is_relative("//cdn.test/a.png"));
        assert!(!is_relative("#frag"));
        assert!(!is_relative("data:x"));
        assert!(!is_relative("javascript:void(0)"));
        assert!(!is_relative(""));
    }

    #[test]
    fn test_identifier_skips_empty_bodies() {
        let a = archive(
            vec![html_part(None), part(Some("full"), None, b"x"), part(Some("empty"), None, b"")],
            None,
        );
        let r = Resolver::new(&a, &[]);
        assert!(r.identifier("full").is_some());
        assert!(r.identifier("cid:full").is_some());
        assert!(r.identifier("empty").is_none());
    }

    #[test]
    fn test_location_decodes_amp() {
        let a = archive(
            vec![html_part(None), part(None, Some("https://x.test/i?a=1&b=2"), b"x")],
            None,
        );
        let r = Resolver::new(&a, &[]);
        assert!(r.location("https://x.test/i?a=1&amp;b=2").is_some());
    }

    #[test]
    fn test_relative_uses_hints_in_order() {
        let a = archive(
            vec![
                html_part(Some("https://page.test/dir/index.html")),
                part(None, Some("https://page.test/dir/img/a.png"), b"page"),
                part(None, Some("https://hint.test/img/a.png"), b"hint"),
            ],
            Some("https://snap.test/"),
        );

        let r = Resolver::new(&a, &[]);
        assert_eq!(
            r.hints(),
            &["https://page.test/dir/index.html", "https://snap.test/"]
        );
        assert_eq!(r.url("img/a.png", None).unwrap().body, b"page");

        let hinted = Resolver::new(&a, &["https://hint.test/".to_string()]);
        assert_eq!(hinted.url("img/a.png", None).unwrap().body, b"hint");
        assert_eq!(
            hinted.url("a.png", Some("https://page.test/dir/img/x.css")).unwrap().body,
            b"page"
        );
        assert!(hinted.url("mailto:a@b", None).is_none());
    }

    #[test]
    fn test_primary_document_never_resolves_by_location() {
        let a = archive(
            vec![
                html_part(Some("https://page.test/list/index.html")),
                part(None, Some("https://page.test/list/a.png"), b"a"),
            ],
            None,
        );
        let r = Resolver::new(&a, &[]);
        assert!(r.location("https://page.test/list/index.html").is_none());
        assert!(r.url("index.html", None).is_none());
        assert!(r.url("a.png", None).is_some());
    }
}
