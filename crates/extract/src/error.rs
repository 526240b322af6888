//! Extraction Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Individual metadata fields never produce errors: a missing or unreadable
//! field is logged and defaulted. Only failures that make the whole record
//! meaningless surface here.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An extraction error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The archive is too malformed to enumerate its entries.
    #[display("archive too malformed to enumerate entries")]
    Malformed,
    /// The archive at this location could not be opened.
    #[display("failed to open archive: {}", _0.display())]
    Open(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Opening can fail on transient I/O; the cause is in the error tree.
        matches!(self, ErrorKind::Open(_))
    }
}
