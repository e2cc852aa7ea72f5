//! The decoded archive and its lookup indexes.

use std::collections::HashMap;

use super::part::Part;
use crate::error::Issue;

const CID_SCHEME: &str = "cid:";

/// A decoded multipart web archive.
///
/// Built once per decode call by [`parse_archive`](crate::parser::parse_archive)
/// and read-only afterwards.
#[derive(Debug, Clone)]
pub struct Archive {
    /// Every successfully decoded part, in stream order.
    pub parts: Vec<Part>,

    /// Name → part lookups over `parts`.
    pub index: PartIndex,

    /// Position in `parts` of the primary `text/html` part.
    pub primary_html: usize,

    /// Text of the primary HTML part after charset decoding and residue cleanup.
    pub html: String,

    /// Top-level `Snapshot-Content-Location` header, when the saver recorded one.
    pub snapshot_location: Option<String>,

    /// Non-fatal problems met while parsing.
    pub issues: Vec<Issue>,
}

impl Archive {
    /// The part the HTML text was taken from.
    pub fn primary_part(&self) -> &Part {
        &self.parts[self.primary_html]
    }

    /// Resolve a content-identifier reference (with or without `cid:`).
    pub fn part_by_identifier(&self, reference: &str) -> Option<&Part> {
        self.index.identifier(reference).map(|i| &self.parts[i])
    }

    /// Resolve an absolute URL against the recorded Content-Locations.
    pub fn part_by_location(&self, url: &str) -> Option<&Part> {
        self.index.location(url).map(|i| &self.parts[i])
    }
}

/// The two lookup tables over an archive's parts.
///
/// Each part is registered under several spellings of its keys: real-world
/// archives disagree on whether references carry the `cid:` scheme, and
/// resources are often referenced with a query string their
/// Content-Location lacks.
#[derive(Debug, Clone, Default)]
pub struct PartIndex {
    by_identifier: HashMap<String, usize>,
    by_location: HashMap<String, usize>,
}

impl PartIndex {
    /// Register `part`, stored at `position` in the archive, under all its keys.
    ///
    /// Later registrations overwrite earlier ones for the same key.
    pub fn insert(&mut self, position: usize, part: &Part) {
        if let Some(ref cid) = part.content_id {
            match strip_cid_scheme(cid) {
                Some(bare) => {
                    self.by_identifier.insert(bare.to_string(), position);
                }
                None => {
                    self.by_identifier
                        .insert(format!("{CID_SCHEME}{cid}"), position);
                }
            }
            self.by_identifier.insert(cid.clone(), position);
        }

        if let Some(ref location) = part.content_location {
            self.by_location.insert(location.clone(), position);
            if let Some(base) = strip_query(location) {
                self.by_location.insert(base.to_string(), position);
            }
            // Inline stylesheets are saved with a `cid:` location and no Content-ID.
            if let Some(bare) = strip_cid_scheme(location) {
                self.by_identifier.insert(bare.to_string(), position);
                self.by_identifier.insert(location.clone(), position);
            }
        }
    }

    /// Look up an identifier as written, then scheme-stripped, then scheme-added.
    pub fn identifier(&self, reference: &str) -> Option<usize> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }
        if let Some(&i) = self.by_identifier.get(reference) {
            return Some(i);
        }
        if let Some(bare) = strip_cid_scheme(reference) {
            if let Some(&i) = self.by_identifier.get(bare) {
                return Some(i);
            }
        }
        self.by_identifier
            .get(&format!("{CID_SCHEME}{reference}"))
            .copied()
    }

    /// Look up a URL exactly, then with its query string removed.
    pub fn location(&self, url: &str) -> Option<usize> {
        if let Some(&i) = self.by_location.get(url) {
            return Some(i);
        }
        strip_query(url).and_then(|base| self.by_location.get(base).copied())
    }

    /// Number of identifier keys (all spellings).
    pub fn identifier_keys(&self) -> usize {
        self.by_identifier.len()
    }

    /// Number of location keys (full and query-stripped).
    pub fn location_keys(&self) -> usize {
        self.by_location.len()
    }
}

/// Normalize a raw Content-ID header value: trim and drop `<` / `>` delimiters.
pub fn normalize_content_id(raw: &str) -> Option<String> {
    let cid = raw.trim().trim_matches(|c| c == '<' || c == '>').trim();
    if cid.is_empty() {
        None
    } else {
        Some(cid.to_string())
    }
}

/// Return the remainder after a case-insensitive `cid:` prefix.
pub fn strip_cid_scheme(value: &str) -> Option<&str> {
    let prefix = value.get(..CID_SCHEME.len())?;
    if prefix.eq_ignore_ascii_case(CID_SCHEME) {
        Some(&value[CID_SCHEME.len()..])
    } else {
        None
    }
}

/// The part of `url` before its first `?`, if it has one.
fn strip_query(url: &str) -> Option<&str> {
    url.find('?').map(|pos| &url[..pos])
}
