//! Centralized error types for mhtml-inline.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal failures of a single decode call.
///
/// Only these abort decoding; everything else degrades into an [`Issue`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer cannot be parsed as a multipart archive at all.
    #[error("Malformed archive: {0}")]
    MalformedArchive(String),

    /// The archive parsed, but none of its parts is `text/html`.
    #[error("Archive contains no text/html part")]
    NoHtmlContent,
}

/// Non-fatal conditions absorbed while decoding an archive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Issue {
    /// A part's body could not be transfer-decoded; it was dropped from both indexes.
    #[error("Skipped part #{part} ({media_type}): {reason}")]
    PartDecodeSkipped {
        part: usize,
        media_type: String,
        reason: String,
    },

    /// The quoted-printable cleanup of the HTML text failed; the earlier text was kept.
    #[error("Skipped quoted-printable cleanup of the HTML text: {0}")]
    PostProcessSkipped(String),
}

/// Errors from the archive catalog (directory listing and entry lookup).
#[derive(Error, Debug)]
pub enum CatalogError {
    /// I/O error with the associated path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The requested entry does not exist.
    #[error("Archive not found: {0}")]
    NotFound(PathBuf),

    /// The requested entry escapes the catalog directory.
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

impl CatalogError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias for `Result<T, DecodeError>`.
pub type Result<T> = std::result::Result<T, DecodeError>;
