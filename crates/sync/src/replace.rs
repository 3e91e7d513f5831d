//! Keeping stored book files identical to their source.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::path::Path;
use std::time::SystemTime;
use time::OffsetDateTime;
use tracing::instrument;

/// What the replacement check found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replacement {
    /// Stored file matches the source.
    Unchanged,
    /// Stored file differed and was overwritten.
    Replaced(Mismatch),
}

/// The first property found to differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mismatch {
    Modified,
    Length,
    Digest,
}

/// Overwrites `stored` with `source` unless they have the same modification
/// time, length and BLAKE3 digest. The copy is stamped with `modified`.
#[instrument(skip_all, fields(source = %source.display(), stored = %stored.display()))]
pub async fn replace_if_changed(source: &Path, stored: &Path, modified: OffsetDateTime) -> Result<Replacement> {
    let Some(mismatch) = compare(source, stored, modified).await? else {
        return Ok(Replacement::Unchanged);
    };
    tracing::info!(?mismatch, "Stored file differs from source; replacing");
    tokio::fs::copy(source, stored).await.or_raise(|| ErrorKind::Io)?;
    touch(stored, modified).await?;
    Ok(Replacement::Replaced(mismatch))
}

async fn compare(source: &Path, stored: &Path, modified: OffsetDateTime) -> Result<Option<Mismatch>> {
    let source_meta = tokio::fs::metadata(source).await.or_raise(|| ErrorKind::Io)?;
    let stored_meta = tokio::fs::metadata(stored).await.or_raise(|| ErrorKind::Io)?;
    let stored_modified = stored_meta.modified().map(OffsetDateTime::from).or_raise(|| ErrorKind::Io)?;
    // File systems differ in timestamp precision; whole seconds are compared.
    if stored_modified.unix_timestamp() != modified.unix_timestamp() {
        return Ok(Some(Mismatch::Modified));
    }
    if source_meta.len() != stored_meta.len() {
        return Ok(Some(Mismatch::Length));
    }
    if digest(source).await? != digest(stored).await? {
        return Ok(Some(Mismatch::Digest));
    }
    Ok(None)
}

async fn digest(path: &Path) -> Result<blake3::Hash> {
    let bytes = tokio::fs::read(path).await.or_raise(|| ErrorKind::Io)?;
    Ok(blake3::hash(&bytes))
}

/// Sets the modification time of `path`, unless it already matches.
pub async fn touch(path: &Path, modified: OffsetDateTime) -> Result<bool> {
    let current = tokio::fs::metadata(path)
        .await
        .and_then(|m| m.modified())
        .map(OffsetDateTime::from)
        .or_raise(|| ErrorKind::Io)?;
    if current.unix_timestamp() == modified.unix_timestamp() {
        return Ok(false);
    }
    let file = tokio::fs::OpenOptions::new().write(true).open(path).await.or_raise(|| ErrorKind::Io)?;
    let file = file.into_std().await;
    let stamp = SystemTime::from(modified);
    tokio::task::spawn_blocking(move || file.set_modified(stamp))
        .await
        .or_raise(|| ErrorKind::Io)?
        .or_raise(|| ErrorKind::Io)?;
    tracing::trace!(path = %path.display(), %modified, "Stamped modification time");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const MODIFIED: OffsetDateTime = datetime!(2024-05-06 07:08:09 UTC);

    async fn write(dir: &Path, name: &str, contents: &[u8], modified: OffsetDateTime) -> std::path::PathBuf {
        let path = dir.join(name);
        tokio::fs::write(&path, contents).await.unwrap();
        touch(&path, modified).await.unwrap();
        path
    }

    async fn modified_of(path: &Path) -> i64 {
        OffsetDateTime::from(tokio::fs::metadata(path).await.unwrap().modified().unwrap()).unix_timestamp()
    }

    #[tokio::test]
    async fn test_identical_files_are_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let source = write(dir.path(), "source.epub", b"book", MODIFIED).await;
        let stored = write(dir.path(), "stored.epub", b"book", MODIFIED).await;
        assert_eq!(replace_if_changed(&source, &stored, MODIFIED).await.unwrap(), Replacement::Unchanged);
    }

    #[tokio::test]
    async fn test_same_length_different_content_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let source = write(dir.path(), "source.epub", b"new!", MODIFIED).await;
        let stored = write(dir.path(), "stored.epub", b"old!", MODIFIED).await;
        let result = replace_if_changed(&source, &stored, MODIFIED).await.unwrap();
        assert_eq!(result, Replacement::Replaced(Mismatch::Digest));
        assert_eq!(tokio::fs::read(&stored).await.unwrap(), b"new!");
        assert_eq!(modified_of(&stored).await, MODIFIED.unix_timestamp());
    }

    #[tokio::test]
    async fn test_modified_time_mismatch_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let source = write(dir.path(), "source.epub", b"book", MODIFIED).await;
        let stored = write(dir.path(), "stored.epub", b"book", datetime!(2020-01-01 00:00 UTC)).await;
        let result = replace_if_changed(&source, &stored, MODIFIED).await.unwrap();
        assert_eq!(result, Replacement::Replaced(Mismatch::Modified));
        assert_eq!(modified_of(&stored).await, MODIFIED.unix_timestamp());
        // Second check finds nothing left to do.
        assert_eq!(replace_if_changed(&source, &stored, MODIFIED).await.unwrap(), Replacement::Unchanged);
    }

    #[tokio::test]
    async fn test_length_mismatch_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let source = write(dir.path(), "source.epub", b"longer book", MODIFIED).await;
        let stored = write(dir.path(), "stored.epub", b"book", MODIFIED).await;
        let result = replace_if_changed(&source, &stored, MODIFIED).await.unwrap();
        assert_eq!(result, Replacement::Replaced(Mismatch::Length));
    }

    #[tokio::test]
    async fn test_touch_reports_whether_it_changed_anything() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "book.epub", b"book", MODIFIED).await;
        assert!(!touch(&path, MODIFIED).await.unwrap());
        assert!(touch(&path, datetime!(2021-01-01 00:00 UTC)).await.unwrap());
    }
}
