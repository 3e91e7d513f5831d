//! Resolving one book file against the catalog and bringing it up to date.

use crate::description::LinkRewriter;
use crate::error::{ErrorKind, Result};
use crate::reconcile::Reconciler;
use crate::replace::{self, Replacement};
use crate::tags;
use exn::{OptionExt, ResultExt};
use shelf_asyncutils::CancellationToken;
use shelf_catalog::{Catalog, CatalogEntry, Columns, Credentials, FieldUpdate, Location, NewBook, ProcessChannel};
use shelf_config::Config;
use shelf_database::CatalogDatabase;
use shelf_metadata::{Identifier, SourceMetadata};
use std::path::Path;
use std::sync::Arc;
use time::Duration;
use tracing::instrument;

/// How the book was matched to a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// An entry with this identifier already held the file's format.
    Existing,
    /// An entry with this identifier existed; the file was attached to it.
    AttachedFormat,
    /// No entry existed; the book was added.
    Added,
}

/// What syncing one book did.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub id: u64,
    pub title: String,
    pub resolution: Resolution,
    /// `None` when the stored file was just written or cannot be reached.
    pub replacement: Option<Replacement>,
    pub updates: Vec<FieldUpdate>,
    pub timestamp_corrected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Synced(Report),
    /// The book was added or attached, but could not be found afterwards.
    /// Always the case in dry-run mode.
    Unresolved(Identifier),
}

/// Drives a book through lookup, add or attach, file replacement, metadata
/// reconciliation and last-modified correction.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    reconciler: Reconciler,
    database: Option<Arc<CatalogDatabase>>,
    tolerance: Duration,
}

impl Orchestrator {
    pub fn new(reconciler: Reconciler, database: Option<Arc<CatalogDatabase>>, tolerance: Duration) -> Self {
        Self {
            reconciler,
            database,
            tolerance,
        }
    }

    /// Builds an orchestrator from configuration, locating the catalog tool
    /// and opening the catalog database when the library is local.
    ///
    /// # Errors
    /// [`ErrorKind::Config`] if the tool cannot be found, and
    /// [`ErrorKind::Database`] if an explicitly configured database cannot
    /// be opened.
    pub async fn connect(config: &Config) -> Result<Self> {
        let tool = shelf_catalog::discover(config.catalog.executable.as_deref()).or_raise(|| ErrorKind::Config)?;
        let Ok(location) = config.catalog.library.parse::<Location>();
        let credentials = config
            .catalog
            .username
            .clone()
            .zip(config.catalog.password.clone())
            .map(|(username, password)| Credentials { username, password });
        let channel = ProcessChannel::new(tool, location.clone()).with_credentials(credentials);
        let columns = Columns::new(config.catalog.subtitle_column.clone(), config.catalog.set_column.clone());
        let catalog = Catalog::new(channel, columns).dry_run(config.catalog.dry_run);
        let reconciler = Reconciler::new(catalog, LinkRewriter::new(&config.links.base_url));

        let database = match (&config.catalog.database, location.local_root()) {
            (Some(path), _) => Some(CatalogDatabase::connect(path).await.or_raise(|| ErrorKind::Database)?),
            (None, Some(root)) => match CatalogDatabase::connect_library(root).await {
                Ok(database) => Some(database),
                Err(err) => {
                    tracing::warn!(error = ?err, root = %root.display(), "Catalog database unavailable; last-modified times will not be corrected");
                    None
                },
            },
            (None, None) => None,
        };
        let tolerance = Duration::minutes(i64::from(config.sync.timestamp_tolerance_minutes));
        Ok(Self::new(reconciler, database.map(Arc::new), tolerance))
    }

    pub fn catalog(&self) -> &Catalog {
        self.reconciler.catalog()
    }

    /// Syncs one book file into the catalog.
    ///
    /// # Errors
    /// [`ErrorKind::MissingIdentifier`] before anything is run if the book
    /// declares no identifier.
    #[instrument(skip_all, fields(title = %metadata.title, file = %metadata.path().display()))]
    pub async fn sync(&self, metadata: &SourceMetadata, cancel: &CancellationToken) -> Result<Outcome> {
        let identifier = metadata
            .primary_identifier()
            .or_raise(|| ErrorKind::MissingIdentifier(metadata.title.clone()))?;
        let format = metadata
            .file
            .format()
            .ok_or_raise(|| ErrorKind::Metadata)?;

        let (entry, resolution, replacement) = match self.find(identifier, Some(&format), cancel).await? {
            Some(entry) => {
                let replacement = self.replace_stored(&entry, &format, metadata).await?;
                (entry, Resolution::Existing, replacement)
            },
            None => {
                let resolution = self.add_or_attach(identifier, metadata, cancel).await?;
                let Some(entry) = self.find(identifier, Some(&format), cancel).await? else {
                    tracing::warn!(%identifier, "Book not found after adding it");
                    return Ok(Outcome::Unresolved(identifier.clone()));
                };
                self.stamp_stored(&entry, &format, metadata).await?;
                (entry, resolution, None)
            },
        };

        let updates = self.reconciler.reconcile(entry.id, metadata, cancel).await?;
        let timestamp_corrected = self.correct_last_modified(entry.id, metadata).await;
        tracing::info!(id = entry.id, ?resolution, updates = updates.len(), "Synced book");
        Ok(Outcome::Synced(Report {
            id: entry.id,
            title: metadata.title.clone(),
            resolution,
            replacement,
            updates,
            timestamp_corrected,
        }))
    }

    async fn find(&self, identifier: &Identifier, format: Option<&str>, cancel: &CancellationToken) -> Result<Option<CatalogEntry>> {
        self.catalog().find(identifier, format, cancel).await.or_raise(|| ErrorKind::Catalog)
    }

    async fn add_or_attach(&self, identifier: &Identifier, metadata: &SourceMetadata, cancel: &CancellationToken) -> Result<Resolution> {
        if let Some(entry) = self.find(identifier, None, cancel).await? {
            tracing::info!(id = entry.id, "Attaching new format to existing book");
            self.catalog()
                .add_format(entry.id, metadata.path(), cancel)
                .await
                .or_raise(|| ErrorKind::Catalog)?;
            return Ok(Resolution::AttachedFormat);
        }

        // Kept alive until the tool has read it.
        let cover = match &metadata.cover {
            Some(cover) => {
                let file = tempfile::Builder::new()
                    .prefix("shelf-cover-")
                    .suffix(&format!(".{}", cover.extension()))
                    .tempfile()
                    .or_raise(|| ErrorKind::Io)?;
                tokio::fs::write(file.path(), &cover.data).await.or_raise(|| ErrorKind::Io)?;
                Some(file)
            },
            None => None,
        };
        let book = NewBook {
            file: metadata.path().to_path_buf(),
            title: metadata.title.clone(),
            authors: metadata.authors.clone(),
            tags: tags::sanitize(&metadata.tags),
            identifiers: metadata.identifiers.clone(),
            series: metadata.series().map(|s| {
                let index = s.position.map_or(crate::series::DEFAULT_SERIES_INDEX, f64::from);
                (s.name.clone(), index)
            }),
            cover: cover.as_ref().map(|file| file.path().to_path_buf()),
        };
        self.catalog().add(&book, cancel).await.or_raise(|| ErrorKind::Catalog)?;
        Ok(Resolution::Added)
    }

    /// The stored file for `format`, when the library is on local disk.
    fn stored_file<'a>(&self, entry: &'a CatalogEntry, format: &str) -> Option<&'a Path> {
        self.catalog().location().local_root()?;
        let stored = entry.format_file(format);
        if stored.is_none() {
            tracing::debug!(id = entry.id, format, "Catalog reported no file for format");
        }
        stored
    }

    async fn replace_stored(&self, entry: &CatalogEntry, format: &str, metadata: &SourceMetadata) -> Result<Option<Replacement>> {
        let Some(stored) = self.stored_file(entry, format) else {
            return Ok(None);
        };
        if self.catalog().is_dry_run() {
            tracing::info!(stored = %stored.display(), "Dry run; not checking stored file");
            return Ok(None);
        }
        replace::replace_if_changed(metadata.path(), stored, metadata.file.modified)
            .await
            .map(Some)
    }

    async fn stamp_stored(&self, entry: &CatalogEntry, format: &str, metadata: &SourceMetadata) -> Result<()> {
        if let Some(stored) = self.stored_file(entry, format) {
            replace::touch(stored, metadata.file.modified).await?;
        }
        Ok(())
    }

    /// Failures are logged; they never fail the book.
    async fn correct_last_modified(&self, id: u64, metadata: &SourceMetadata) -> bool {
        let Some(database) = &self.database else {
            tracing::debug!(id, "No catalog database; skipping last-modified correction");
            return false;
        };
        if self.catalog().is_dry_run() {
            return false;
        }
        match database.correct_last_modified(id, metadata.file.modified, self.tolerance).await {
            Ok(corrected) => corrected,
            Err(err) => {
                tracing::warn!(id, error = ?err, "Could not correct last-modified time");
                false
            },
        }
    }
}
