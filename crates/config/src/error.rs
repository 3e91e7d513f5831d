//! Config Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration loading.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("configuration file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// A source could not be read or did not match the expected shape.
    #[display("failed to load configuration: {_0}")]
    Load(#[error(not(source))] String),
    #[display("invalid configuration value for '{field}': {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
