//! Where book files come from.
//!
//! A [`Feed`] announces books with the time they were last updated, a
//! [`Downloader`] turns an announcement into a file on local disk, and a
//! [`MetadataReader`] parses that file. Parsing e-book containers is left to
//! the embedding application.

use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use shelf_asyncutils::CancellationToken;
use shelf_metadata::SourceMetadata;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// One entry of a feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    /// Where the book file can be fetched from.
    pub uri: String,
    pub updated: OffsetDateTime,
}

#[async_trait]
pub trait Feed: Send + Sync {
    /// Every item currently in the feed, in any order.
    async fn items(&self, cancel: &CancellationToken) -> Result<Vec<FeedItem>>;
}

#[async_trait]
pub trait Downloader: Send + Sync {
    /// Fetches `item` and returns the path of the local copy.
    async fn download(&self, item: &FeedItem, cancel: &CancellationToken) -> Result<PathBuf>;
}

#[async_trait]
pub trait MetadataReader: Send + Sync {
    async fn read(&self, path: &Path) -> Result<SourceMetadata>;
}

/// A directory of book files acting as both feed and downloader.
///
/// Every regular file with one of the accepted extensions is an item,
/// dated by its modification time. "Downloading" returns the file itself.
#[derive(Debug, Clone)]
pub struct DirectoryFeed {
    root: PathBuf,
    extensions: Vec<String>,
}
impl DirectoryFeed {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: vec!["epub".to_string(), "azw3".to_string(), "kepub".to_string()],
        }
    }

    pub fn with_extensions<I: IntoIterator<Item = S>, S: Into<String>>(mut self, extensions: I) -> Self {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|accepted| accepted.eq_ignore_ascii_case(ext)))
    }
}

#[async_trait]
impl Feed for DirectoryFeed {
    async fn items(&self, cancel: &CancellationToken) -> Result<Vec<FeedItem>> {
        let mut entries = tokio::fs::read_dir(&self.root).await.or_raise(|| ErrorKind::Feed)?;
        let mut items = Vec::new();
        while let Some(entry) = entries.next_entry().await.or_raise(|| ErrorKind::Feed)? {
            if cancel.is_cancelled() {
                exn::bail!(ErrorKind::Cancelled);
            }
            let path = entry.path();
            let metadata = entry.metadata().await.or_raise(|| ErrorKind::Feed)?;
            if !metadata.is_file() || !self.accepts(&path) {
                tracing::trace!(path = %path.display(), "Skipping");
                continue;
            }
            let updated = metadata.modified().map(OffsetDateTime::from).or_raise(|| ErrorKind::Feed)?;
            items.push(FeedItem {
                uri: path.to_string_lossy().into_owned(),
                updated,
            });
        }
        Ok(items)
    }
}

#[async_trait]
impl Downloader for DirectoryFeed {
    async fn download(&self, item: &FeedItem, _cancel: &CancellationToken) -> Result<PathBuf> {
        let path = PathBuf::from(&item.uri);
        if !path.is_file() {
            exn::bail!(ErrorKind::Download);
        }
        Ok(path)
    }
}
