//! The four ordered rewrite passes and stylesheet injection.
//!
//! Every pass tokenizes the output of the previous one and splices
//! replacements into exact byte spans, so text it does not resolve is
//! copied through unchanged. Replacements are always `data:` URIs, which no
//! later pass looks up again.

use std::collections::HashSet;
use std::ops::Range;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, trace};

use super::css::url_refs;
use super::resolve::{is_absolute_http, is_relative, Resolver};
use super::tokenizer::{srcset_urls, tags, Attribute, Tag};
use super::InlineReport;
use crate::model::archive::strip_cid_scheme;
use crate::model::Part;

/// Attributes that name a hyperlink target or citation, not a resource.
const NON_RESOURCE_ATTRIBUTES: &[&str] = &["action", "formaction", "cite", "ping"];

/// Attributes whose value is a single URL (or a srcset) to be fetched, and
/// may therefore be resolved relative to the document's location.
const URL_ATTRIBUTES: &[&str] = &[
    "src",
    "poster",
    "background",
    "data",
    "srcset",
    "data-src",
    "data-srcset",
    "data-background",
];

/// `<link rel>` tokens naming a resource the page loads.
const RESOURCE_LINK_RELS: &[&str] = &[
    "stylesheet",
    "icon",
    "apple-touch-icon",
    "apple-touch-icon-precomposed",
    "mask-icon",
    "preload",
    "prefetch",
    "modulepreload",
];

/// A replacement of `span` in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub span: Range<usize>,
    pub replacement: String,
}

/// Apply non-overlapping edits, given in ascending span order.
pub fn apply_edits(src: &str, edits: &[Edit]) -> String {
    if edits.is_empty() {
        return src.to_string();
    }
    let extra: usize = edits.iter().map(|e| e.replacement.len()).sum();
    let mut out = String::with_capacity(src.len() + extra);
    let mut cursor = 0;
    for edit in edits {
        out.push_str(&src[cursor..edit.span.start]);
        out.push_str(&edit.replacement);
        cursor = edit.span.end;
    }
    out.push_str(&src[cursor..]);
    out
}

/// Edit replacing an attribute's whole value. Unquoted values come back double-quoted.
fn replace_value(attribute: &Attribute<'_>, value: String) -> Edit {
    let replacement = match attribute.quote {
        Some(_) => value,
        None => format!("\"{value}\""),
    };
    Edit {
        span: attribute.value_span.clone(),
        replacement,
    }
}

/// Stylesheet text collected from removed `<link>` elements, in document order.
///
/// Owned by one rewrite call; each identifier contributes at most once.
#[derive(Debug, Default)]
pub struct StylesheetAccumulator {
    seen: HashSet<String>,
    sheets: Vec<String>,
}

impl StylesheetAccumulator {
    /// Record `css` under `key`. Returns `false` if the key was already collected.
    pub fn add(&mut self, key: &str, css: String) -> bool {
        if !self.seen.insert(key.to_string()) {
            return false;
        }
        self.sheets.push(css);
        true
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// One `<style>` block per sheet, newline separated.
    pub fn render(&self) -> String {
        self.sheets
            .iter()
            .map(|css| format!("<style type=\"text/css\">{css}</style>"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Pass 1: replace `<link href="cid:...">` elements pointing at a `text/css`
/// part with collected stylesheet text, removing the element.
pub fn inline_stylesheet_links(
    html: &str,
    resolver: &Resolver<'_>,
    stylesheets: &mut StylesheetAccumulator,
    report: &mut InlineReport,
) -> String {
    let mut edits = Vec::new();

    for tag in tags(html).filter(|t| !t.is_end && t.is("link")) {
        let Some(id) = tag
            .attribute("href")
            .and_then(|href| strip_cid_scheme(href.value.trim()))
        else {
            continue;
        };

        // Misses are counted by the identifier pass, which sees the link next.
        let Some(part) = resolver.identifier(id) else {
            trace!(id, "Stylesheet link not in archive");
            continue;
        };
        if !part.has_media_type("text/css") {
            continue;
        }

        if !stylesheets.contains(id) {
            stylesheets.add(id, rewrite_stylesheet(part, resolver, report));
            trace!(id, bytes = part.body.len(), "Collected stylesheet");
        }
        report.links_removed += 1;
        edits.push(Edit {
            span: tag.span.clone(),
            replacement: String::new(),
        });
    }

    apply_edits(html, &edits)
}

/// Decode a stylesheet part and inline the resources its `url(...)`s reference.
fn rewrite_stylesheet(part: &Part, resolver: &Resolver<'_>, report: &mut InlineReport) -> String {
    let css = part.text();
    let base = part.content_location.as_deref();
    let mut edits = Vec::new();

    for url_ref in url_refs(&css) {
        let target = url_ref.target;
        let is_identifier = strip_cid_scheme(target).is_some();
        match resolver.stylesheet_reference(target, base) {
            Some(found) => {
                if is_identifier {
                    report.identifier_refs += 1;
                } else {
                    report.location_refs += 1;
                }
                edits.push(Edit {
                    span: url_ref.span,
                    replacement: format!("url({})", found.to_data_uri()),
                });
            }
            None if is_identifier || is_absolute_http(target) => report.unresolved += 1,
            None => {}
        }
    }

    apply_edits(&css, &edits)
}

/// Pass 2: replace `cid:` attribute values (and `srcset` candidates) with data URIs.
pub fn inline_identifier_sources(
    html: &str,
    resolver: &Resolver<'_>,
    report: &mut InlineReport,
) -> String {
    let mut edits = Vec::new();

    for tag in tags(html).filter(|t| !t.is_end) {
        for attribute in tag.attributes.iter().filter(|a| !a.is("style")) {
            let rewritten = rewrite_value(attribute, |candidate| {
                let id = strip_cid_scheme(candidate)?;
                let part = resolver.identifier(id);
                match part {
                    Some(_) => report.identifier_refs += 1,
                    None => report.unresolved += 1,
                }
                part.map(Part::to_data_uri)
            });
            edits.extend(rewritten.map(|value| replace_value(attribute, value)));
        }
    }

    apply_edits(html, &edits)
}

/// Pass 3: replace resource URLs recorded as a part's Content-Location.
///
/// Absolute `http(s)` values are looked up in any resource attribute;
/// relative values only in URL-valued ones, against the resolver's hints.
/// A stylesheet reached through `<link href>` has its own `url(...)`s
/// resolved against its location before it is embedded.
pub fn inline_location_sources(
    html: &str,
    resolver: &Resolver<'_>,
    report: &mut InlineReport,
) -> String {
    let mut edits = Vec::new();

    for tag in tags(html).filter(|t| !t.is_end) {
        for attribute in tag.attributes.iter() {
            if !is_resource_attribute(&tag, attribute) {
                continue;
            }
            let relative_ok = is_url_attribute(&tag, attribute);
            let is_link = tag.is("link") && attribute.is("href");
            let rewritten = rewrite_value(attribute, |candidate| {
                let found = if is_absolute_http(candidate) {
                    let part = resolver.location(candidate);
                    if part.is_none() {
                        report.unresolved += 1;
                    }
                    part
                } else if relative_ok && is_relative(candidate) {
                    resolver.url(candidate, None)
                } else {
                    None
                };
                let part = found?;
                report.location_refs += 1;
                if is_link && part.has_media_type("text/css") {
                    let css = rewrite_stylesheet(part, resolver, report);
                    return Some(css_data_uri(&css));
                }
                Some(part.to_data_uri())
            });
            edits.extend(rewritten.map(|value| replace_value(attribute, value)));
        }
    }

    apply_edits(html, &edits)
}

/// Pass 4: replace `url(cid:...)` references inside `style` attributes.
pub fn inline_style_attributes(
    html: &str,
    resolver: &Resolver<'_>,
    report: &mut InlineReport,
) -> String {
    let mut edits = Vec::new();

    for tag in tags(html).filter(|t| !t.is_end) {
        for attribute in tag.attributes.iter().filter(|a| a.is("style")) {
            let style = attribute.value;
            let mut style_edits = Vec::new();
            for url_ref in url_refs(style) {
                let Some(id) = strip_cid_scheme(url_ref.target) else {
                    continue;
                };
                match resolver.identifier(id) {
                    Some(part) => {
                        report.style_refs += 1;
                        style_edits.push(Edit {
                            span: url_ref.span,
                            replacement: format!("url({})", part.to_data_uri()),
                        });
                    }
                    None => report.unresolved += 1,
                }
            }
            if !style_edits.is_empty() {
                edits.push(replace_value(attribute, apply_edits(style, &style_edits)));
            }
        }
    }

    apply_edits(html, &edits)
}

/// Insert the collected stylesheets before the first `</head>` end tag.
///
/// Returns the document unchanged when there is nothing to inject or no
/// such tag exists.
pub fn inject_stylesheets(
    html: &str,
    stylesheets: &StylesheetAccumulator,
    report: &mut InlineReport,
) -> String {
    if stylesheets.is_empty() {
        return html.to_string();
    }
    let Some(head_end) = tags(html).find(|t| t.is_end && t.is("head")) else {
        debug!(
            stylesheets = stylesheets.len(),
            "No </head> in document, stylesheets not injected"
        );
        return html.to_string();
    };

    report.stylesheets_injected = stylesheets.len();
    let at = head_end.span.start;
    let block = stylesheets.render();
    let mut out = String::with_capacity(html.len() + block.len() + 1);
    out.push_str(&html[..at]);
    out.push_str(&block);
    out.push('\n');
    out.push_str(&html[at..]);
    out
}

/// Rewritten stylesheet text as a UTF-8 data URI.
fn css_data_uri(css: &str) -> String {
    format!("data:text/css;charset=utf-8;base64,{}", STANDARD.encode(css))
}

/// Rewrite an attribute's value through `lookup`, candidate by candidate
/// for `srcset`-style attributes. Returns `None` when nothing resolved.
fn rewrite_value(
    attribute: &Attribute<'_>,
    mut lookup: impl FnMut(&str) -> Option<String>,
) -> Option<String> {
    let value = attribute.value;
    if is_srcset(attribute) {
        let edits: Vec<Edit> = srcset_urls(value)
            .into_iter()
            .filter_map(|span| {
                let replacement = lookup(&value[span.clone()])?;
                Some(Edit { span, replacement })
            })
            .collect();
        return (!edits.is_empty()).then(|| apply_edits(value, &edits));
    }

    let candidate = value.trim();
    if candidate.is_empty() {
        return None;
    }
    lookup(candidate)
}

fn is_srcset(attribute: &Attribute<'_>) -> bool {
    attribute.is("srcset") || attribute.is("data-srcset")
}

fn is_resource_attribute(tag: &Tag<'_>, attribute: &Attribute<'_>) -> bool {
    if attribute.is("style") {
        return false;
    }
    if attribute.is("href") {
        return is_resource_link(tag);
    }
    !NON_RESOURCE_ATTRIBUTES.iter().any(|n| attribute.is(n))
}

fn is_url_attribute(tag: &Tag<'_>, attribute: &Attribute<'_>) -> bool {
    (attribute.is("href") && is_resource_link(tag))
        || URL_ATTRIBUTES.iter().any(|n| attribute.is(n))
}

/// A `<link>` whose `rel` names something loaded, not a relation like `canonical`.
fn is_resource_link(tag: &Tag<'_>) -> bool {
    tag.is("link")
        && tag.attribute("rel").is_some_and(|rel| {
            rel.value.split_ascii_whitespace().any(|token| {
                RESOURCE_LINK_RELS
                    .iter()
                    .any(|r| token.eq_ignore_ascii_case(r))
            })
        })
}
