//! Command-line Error Types
//!
//! Failures from the library crates are raised into these kinds, keeping
//! their own error tree as children so the full chain is printed.

use derive_more::{Display, Error};

/// A command-line error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for command-line operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Configuration could not be loaded.
    #[display("invalid configuration")]
    Config,
    /// The archive request failed.
    #[display("{_0} failed")]
    Command(#[error(not(source))] &'static str),
    /// Writing results to standard output failed.
    #[display("failed to write output")]
    Output,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Output)
    }
}
