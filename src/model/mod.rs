//! Core data model: decoded parts, the archive, and its lookup indexes.

pub mod archive;
pub mod part;

pub use archive::{Archive, PartIndex};
pub use part::Part;
