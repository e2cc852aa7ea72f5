//! Archive parsing: multipart structure, transfer decoding, and charsets.

pub mod archive;
pub mod charset;
pub mod transfer;

pub use archive::parse_archive;
