//! Sync Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Failures in other shelf crates are
//! raised into the [`ErrorKind`] naming the subsystem they came from.

use derive_more::{Display, Error};

/// A sync error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a sync failure.
///
/// ### Input Errors
/// - [`ErrorKind::MissingIdentifier`]
/// - [`ErrorKind::Metadata`]
///
/// ### Dependency Errors
/// - [`ErrorKind::Catalog`]
/// - [`ErrorKind::Database`]
/// - [`ErrorKind::Feed`]
/// - [`ErrorKind::Download`]
#[derive(Debug, Display, Error, PartialEq, Eq)]
pub enum ErrorKind {
    /// The book declares no identifier, so it cannot be looked up.
    #[display("book has no identifier: {_0}")]
    MissingIdentifier(#[error(not(source))] String),
    /// Reading metadata from a book file failed.
    Metadata,
    /// A catalog tool invocation failed or produced unusable output.
    Catalog,
    /// The direct catalog database path failed.
    Database,
    /// Reading, writing or stamping a local file failed.
    #[display("file error")]
    Io,
    Feed,
    Download,
    /// The checkpoint file could not be read or written.
    Sentinel,
    #[display("invalid configuration")]
    Config,
    /// The book was reported as changed, but could not be found in the
    /// catalog afterwards.
    #[display("book not found in catalog: {_0}")]
    BookNotFound(#[error(not(source))] u64),
    Cancelled,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Feed | Self::Download | Self::Database)
    }
}
