//! Archive catalog: listing a directory of saved pages and labelling them
//! from their filenames.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CatalogError;

/// Catalog settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    /// Text that precedes the label in a filename.
    pub label_prefix: String,
    /// File extensions (without the dot) treated as archives.
    pub extensions: Vec<String>,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            label_prefix: "For sale_".to_string(),
            extensions: vec!["mhtml".to_string(), "mht".to_string()],
        }
    }
}

impl CatalogSettings {
    fn accepts_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }
}

/// A labelled archive file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub filename: String,
    pub label: String,
    pub path: PathBuf,
}

/// List the labelled archives in `dir`, sorted by filename.
///
/// Files whose name yields no label are left out. Entries are not
/// deduplicated by label.
pub fn scan(dir: &Path, settings: &CatalogSettings) -> Result<Vec<CatalogEntry>, CatalogError> {
    let read_dir = std::fs::read_dir(dir).map_err(|e| CatalogError::io(dir, e))?;

    let mut entries = Vec::new();
    let mut unlabelled = 0usize;
    for dir_entry in read_dir {
        let dir_entry = dir_entry.map_err(|e| CatalogError::io(dir, e))?;
        let path = dir_entry.path();
        if !path.is_file() || !settings.accepts_extension(&path) {
            continue;
        }
        let Some(filename) = dir_entry.file_name().to_str().map(String::from) else {
            continue;
        };
        match extract_label(&filename, &settings.label_prefix) {
            Some(label) => entries.push(CatalogEntry {
                filename,
                label,
                path,
            }),
            None => unlabelled += 1,
        }
    }

    entries.sort_by(|a, b| a.filename.cmp(&b.filename));
    debug!(
        dir = %dir.display(),
        entries = entries.len(),
        unlabelled,
        "Scanned catalog"
    );
    Ok(entries)
}

/// Extract the label from a filename shaped like `"<prefix> <label> - <digits>..."`.
///
/// The label is the shortest text after the prefix (and any whitespace)
/// that is followed by a dash and a number, trimmed. Later occurrences of
/// the prefix are tried when an earlier one does not yield a label.
pub fn extract_label(filename: &str, prefix: &str) -> Option<String> {
    filename
        .match_indices(prefix)
        .find_map(|(at, _)| label_after(&filename[at + prefix.len()..]))
}

fn label_after(rest: &str) -> Option<String> {
    let body = rest.trim_start();
    for (i, c) in body.char_indices() {
        if c == '\n' {
            return None;
        }
        let end = i + c.len_utf8();
        if is_number_suffix(&body[end..]) {
            let label = body[..end].trim();
            return (!label.is_empty()).then(|| label.to_string());
        }
    }
    None
}

/// `true` when `s` starts with optional whitespace, `-`, optional whitespace, a digit.
fn is_number_suffix(s: &str) -> bool {
    s.trim_start()
        .strip_prefix('-')
        .is_some_and(|r| r.trim_start().starts_with(|c: char| c.is_ascii_digit()))
}

/// Resolve a requested entry name to a file inside `dir`.
///
/// Names that are absolute, contain `..`, or lead outside `dir` through a
/// symlink are rejected.
pub fn resolve_entry(dir: &Path, name: &str) -> Result<PathBuf, CatalogError> {
    let requested = Path::new(name);
    let escapes = name.is_empty()
        || requested
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(CatalogError::InvalidPath(name.to_string()));
    }

    let candidate = dir.join(requested);
    if !candidate.is_file() {
        return Err(CatalogError::NotFound(candidate));
    }

    let root = dir.canonicalize().map_err(|e| CatalogError::io(dir, e))?;
    let resolved = candidate
        .canonicalize()
        .map_err(|e| CatalogError::io(&candidate, e))?;
    if !resolved.starts_with(&root) {
        return Err(CatalogError::InvalidPath(name.to_string()));
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_label() {
        let prefix = "For sale_";
        assert_eq!(
            extract_label("For sale_ 12 Oak Street, Victoria - 1234567.mhtml", prefix).as_deref(),
            Some("12 Oak Street, Victoria")
        );
        assert_eq!(
            extract_label("For sale_Unit 4-5 Bay Rd -2.mhtml", prefix).as_deref(),
            Some("Unit 4"),
            "shortest label followed by dash and digit wins"
        );
        assert_eq!(
            extract_label("Saved For sale_  Elm Ave  -  99", prefix).as_deref(),
            Some("Elm Ave")
        );
        assert_eq!(extract_label("For sale_ No number.mhtml", prefix), None);
        assert_eq!(extract_label("Sold_ 1 Main St - 5.mhtml", prefix), None);
        assert_eq!(extract_label("For sale_ - 5.mhtml", prefix), None);
    }

    #[test]
    fn test_extract_label_retries_later_prefix() {
        assert_eq!(
            extract_label("For sale_ x For sale_ Pine Rd - 7", "For sale_").as_deref(),
            Some("x For sale_ Pine Rd")
        );
        // A label never spans lines, so the second prefix is used.
        assert_eq!(
            extract_label("For sale_ a\nFor sale_ Pine Rd - 7", "For sale_").as_deref(),
            Some("Pine Rd")
        );
    }

    #[test]
    fn test_scan_filters_and_sorts() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in [
            "For sale_ B Street - 2.mhtml",
            "For sale_ A Street - 1.MHT",
            "For sale_ A Street - 3.mhtml",
            "For sale_ C Street - 4.html",
            "notes.mhtml",
        ] {
            std::fs::write(dir.path().join(name), b"x").expect("write");
        }
        std::fs::create_dir(dir.path().join("For sale_ D Street - 5.mhtml")).expect("mkdir");

        let entries = scan(dir.path(), &CatalogSettings::default()).expect("scan");
        let names: Vec<&str> = entries.iter().map(|e| e.filename.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "For sale_ A Street - 1.MHT",
                "For sale_ A Street - 3.mhtml",
                "For sale_ B Street - 2.mhtml",
            ]
        );
        assert_eq!(entries[0].label, "A Street");
        assert_eq!(entries[1].label, "A Street");
    }

    #[test]
    fn test_scan_missing_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope");
        assert!(matches!(
            scan(&missing, &CatalogSettings::default()),
            Err(CatalogError::Io { .. })
        ));
    }

    #[test]
    fn test_resolve_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("page.mhtml"), b"x").expect("write");

        let resolved = resolve_entry(dir.path(), "page.mhtml").expect("resolve");
        assert!(resolved.ends_with("page.mhtml"));

        assert!(matches!(
            resolve_entry(dir.path(), "../page.mhtml"),
            Err(CatalogError::InvalidPath(_))
        ));
        assert!(matches!(
            resolve_entry(dir.path(), "/etc/passwd"),
            Err(CatalogError::InvalidPath(_))
        ));
        assert!(matches!(
            resolve_entry(dir.path(), "other.mhtml"),
            Err(CatalogError::NotFound(_))
        ));
    }
}
