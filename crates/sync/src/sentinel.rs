//! Checkpoint of how far through the feed syncing has got.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// A file holding one RFC 3339 timestamp: every feed item updated at or
/// before it has been synced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentinel {
    path: PathBuf,
}

impl Sentinel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored checkpoint, or `None` if nothing has been synced yet.
    pub async fn load(&self) -> Result<Option<OffsetDateTime>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Err(err) if err.kind() == IoErrorKind::NotFound => return Ok(None),
            result => result.or_raise(|| ErrorKind::Sentinel)?,
        };
        let contents = contents.trim();
        if contents.is_empty() {
            return Ok(None);
        }
        OffsetDateTime::parse(contents, &Rfc3339).map(Some).or_raise(|| ErrorKind::Sentinel)
    }

    pub async fn store(&self, checkpoint: OffsetDateTime) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Sentinel)?;
        }
        let value = checkpoint.format(&Rfc3339).or_raise(|| ErrorKind::Sentinel)?;
        tokio::fs::write(&self.path, format!("{value}\n")).await.or_raise(|| ErrorKind::Sentinel)?;
        tracing::debug!(path = %self.path.display(), checkpoint = %value, "Stored sentinel");
        Ok(())
    }
}

/// Moves the checkpoint forward over a run's results, given as each item's
/// update time and whether it synced.
///
/// The checkpoint never passes a failed item, so failures are retried on the
/// next run, and it never moves backwards.
pub fn advance(current: Option<OffsetDateTime>, results: &[(OffsetDateTime, bool)]) -> Option<OffsetDateTime> {
    let first_failure = results.iter().filter(|(_, ok)| !ok).map(|(updated, _)| *updated).min();
    let reached = results
        .iter()
        .filter(|(updated, ok)| *ok && first_failure.is_none_or(|failure| *updated < failure))
        .map(|(updated, _)| *updated)
        .max();
    current.max(reached)
}
