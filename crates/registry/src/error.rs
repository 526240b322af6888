//! Registry Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Failures from the reader and
//! extraction crates are raised into these kinds, keeping their own error
//! tree as children.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A registry error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The location is unreadable or does not hold a valid archive.
    #[display("failed to open archive: {}", _0.display())]
    Open(#[error(not(source))] PathBuf),
    /// Unknown identifier, or a path that does not resolve to any entry.
    ///
    /// "Never opened" and "already closed" are the same error.
    #[display("not found")]
    NotFound,
    /// The archive is too malformed to enumerate its entries.
    #[display("archive metadata could not be extracted")]
    Metadata,
    /// A redirect chain reached the hop bound.
    #[display("redirect chain from {path} reached the limit of {limit} hops")]
    RedirectLoop {
        /// The path resolution started from.
        path: String,
        /// The configured hop bound.
        limit: usize,
    },
    /// Reading an entry from an open archive failed.
    #[display("failed to read archive entry")]
    Read,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Open(_) | ErrorKind::Read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let loop_error = ErrorKind::RedirectLoop { path: "/a".to_string(), limit: 16 };
        assert_eq!(loop_error.to_string(), "redirect chain from /a reached the limit of 16 hops");
        assert_eq!(ErrorKind::Open(PathBuf::from("/x.zim")).to_string(), "failed to open archive: /x.zim");
        assert!(!ErrorKind::NotFound.is_retryable());
    }
}
