//! Reader Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use stacks_compress::error::{Error as CompressionError, ErrorKind as CompressionErrorKind};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A reader error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for reader operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Archive file does not exist
    #[display("archive not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Access to the archive file was denied
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// The file is not an archive, or its structure is corrupt
    #[display("invalid archive: {_0}")]
    InvalidArchive(#[error(not(source))] String),
    /// A content path is empty, contains NUL bytes, or escapes the archive root
    #[display("invalid content path: {_0:?}")]
    InvalidPath(#[error(not(source))] String),
    /// An entry's payload does not match its recorded checksum
    #[display("checksum mismatch for entry: {_0}")]
    Integrity(#[error(not(source))] String),
    /// Member decompression error
    #[display("compression error: {_0}")]
    Compression(CompressionErrorKind),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}
impl ErrorKind {
    /// Convert a compression error into a reader error, preserving the
    /// compress crate's `Exn` frame (error tree) as a child in its own
    /// error tree.
    #[track_caller]
    pub fn compression(err: CompressionError) -> Error {
        let inner = (*err).clone();
        err.raise(ErrorKind::Compression(inner))
    }

    pub(crate) fn from_io(err: IoError, location: impl Into<PathBuf>) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(location.into()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(location.into()),
            _ => Self::Io(err),
        }
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_map_to_actionable_kinds() {
        let missing = IoError::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(ErrorKind::from_io(missing, "/a.zip"), ErrorKind::NotFound(p) if p == PathBuf::from("/a.zip")));
        let denied = IoError::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert!(matches!(ErrorKind::from_io(denied, "/a.zip"), ErrorKind::PermissionDenied(_)));
        let other = IoError::other("disk on fire");
        assert!(ErrorKind::from_io(other, "/a.zip").is_retryable());
    }

    #[test]
    fn display() {
        assert_eq!(ErrorKind::InvalidPath("../x".to_string()).to_string(), "invalid content path: \"../x\"");
        assert_eq!(ErrorKind::InvalidArchive("no directory".to_string()).to_string(), "invalid archive: no directory");
    }
}
