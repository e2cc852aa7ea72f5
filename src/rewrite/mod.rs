//! Resource resolution and HTML rewriting.
//!
//! Turns the primary HTML of an [`Archive`] into a standalone document by
//! replacing references to other parts with `data:` URIs. The passes run in
//! a fixed order (stylesheet links, identifier attributes, location
//! attributes, style attributes) followed by stylesheet injection.
//! References that do not resolve are left exactly as written.

pub mod css;
pub mod passes;
pub mod resolve;
pub mod tokenizer;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Issue;
use crate::model::Archive;
use passes::StylesheetAccumulator;
use resolve::Resolver;

/// Caller-supplied rewrite settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InlineOptions {
    /// Base URLs for resolving relative resource references, tried in order
    /// before the document's own location.
    pub location_hints: Vec<String>,
}

/// What a rewrite call inlined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InlineReport {
    /// `<style>` blocks injected before `</head>`.
    pub stylesheets_injected: usize,
    /// `<link>` elements removed in favor of injected style.
    pub links_removed: usize,
    /// `cid:` references replaced, in attributes and stylesheets.
    pub identifier_refs: usize,
    /// URL references replaced, in attributes and stylesheets.
    pub location_refs: usize,
    /// `url(cid:...)` references replaced in `style` attributes.
    pub style_refs: usize,
    /// `cid:` and absolute URL references with no matching part.
    pub unresolved: usize,
}

impl InlineReport {
    /// Total references replaced by data URIs.
    pub fn inlined(&self) -> usize {
        self.identifier_refs + self.location_refs + self.style_refs
    }
}

/// The standalone document and what went into it.
#[derive(Debug, Clone)]
pub struct Inlined {
    pub html: String,
    pub report: InlineReport,
    /// Non-fatal problems from parsing.
    pub issues: Vec<Issue>,
}

/// Rewrite the archive's primary HTML into a standalone document.
pub fn inline_resources(archive: &Archive, options: &InlineOptions) -> Inlined {
    let resolver = Resolver::new(archive, &options.location_hints);
    let mut stylesheets = StylesheetAccumulator::default();
    let mut report = InlineReport::default();

    let html = passes::inline_stylesheet_links(
        &archive.html,
        &resolver,
        &mut stylesheets,
        &mut report,
    );
    let html = passes::inline_identifier_sources(&html, &resolver, &mut report);
    let html = passes::inline_location_sources(&html, &resolver, &mut report);
    let html = passes::inline_style_attributes(&html, &resolver, &mut report);
    let html = passes::inject_stylesheets(&html, &stylesheets, &mut report);

    debug!(
        hints = resolver.hints().len(),
        stylesheets = report.stylesheets_injected,
        links_removed = report.links_removed,
        identifier_refs = report.identifier_refs,
        location_refs = report.location_refs,
        style_refs = report.style_refs,
        unresolved = report.unresolved,
        "Inlined resources"
    );

    Inlined {
        html,
        report,
        issues: archive.issues.clone(),
    }
}
