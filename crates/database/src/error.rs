//! Database Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A catalog database error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for catalog database operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("database error")]
    Database,
    #[display("book not found: {_0}")]
    BookNotFound(#[error(not(source))] u64),
    /// A stored value could not be read, or a value could not be stored.
    #[display("invalid data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Another process (the catalog GUI, a content server) can hold the
        // write lock past the busy timeout.
        matches!(self, Self::Database)
    }
}
