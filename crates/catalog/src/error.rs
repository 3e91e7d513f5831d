//! Catalog Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A catalog error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("calibredb not detected on your system")]
    ToolNotFound,
    /// The subprocess could not be started at all.
    #[display("failed to start catalog tool")]
    Spawn,
    /// Reading the subprocess output, or waiting on it, failed.
    Io,
    /// The tool produced output that could not be parsed into records.
    #[display("malformed output from `{_0}`")]
    MalformedOutput(#[error(not(source))] String),
    /// A record was parsed but a required field was absent.
    #[display("missing field in catalog output: {_0}")]
    MissingField(#[error(not(source))] &'static str),
    /// A field was present but held a value of the wrong shape.
    #[display("unexpected value for field '{field}': {value}")]
    InvalidData {
        /// Name of the offending field.
        field: String,
        /// The value as it was received.
        value: String,
    },
    /// `add` finished without reporting the id of a new book.
    #[display("catalog tool did not report an added book")]
    NotAdded,
    /// A mutating command was interrupted by cancellation.
    #[display("catalog command cancelled")]
    Cancelled,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Spawn | Self::Io)
    }
}
