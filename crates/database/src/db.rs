//! Connection to the catalog database.

use crate::error::{ErrorKind, Result};
use crate::timestamp;
use exn::{OptionExt, ResultExt};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection, SqliteConnection};
use std::path::{Path, PathBuf};
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;
use tracing::instrument;

/// File name of the catalog database inside a library directory.
pub const METADATA_FILE: &str = "metadata.db";
const UPDATE_TRIGGER: &str = "books_update_trg";
const DROP_TRIGGER: &str = "DROP TRIGGER IF EXISTS books_update_trg";

/// Schema used by [`CatalogDatabase::connect_in_memory`]: the `books` columns
/// this crate touches, plus an update trigger that fails outside the catalog
/// application the same way the real one does.
const FIXTURE_SCHEMA: &str = r#"
    CREATE TABLE books (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL DEFAULT 'Unknown',
        sort TEXT,
        last_modified TIMESTAMP NOT NULL DEFAULT '2000-01-01 00:00:00+00:00'
    );
    CREATE TRIGGER books_update_trg
        AFTER UPDATE ON books
        BEGIN
            UPDATE books SET sort = title_sort(NEW.title) WHERE id = NEW.id AND OLD.title <> NEW.title;
        END;
"#;

/// A single owned connection to a library's `metadata.db`.
///
/// Access is serialized; the catalog application itself may hold the
/// database at the same time, so contention is handled by SQLite's busy
/// timeout rather than by a pool.
#[derive(Debug)]
pub struct CatalogDatabase {
    conn: Mutex<SqliteConnection>,
    /// `CREATE TRIGGER` statement for [`UPDATE_TRIGGER`], as read at connect
    /// time. `None` when the database has no such trigger.
    trigger: Option<String>,
}

impl CatalogDatabase {
    async fn new(options: SqliteConnectOptions) -> Result<Self> {
        let conn = options.connect().await.or_raise(|| ErrorKind::Database)?;
        Self::from_connection(conn).await
    }

    async fn from_connection(mut conn: SqliteConnection) -> Result<Self> {
        let trigger = load_trigger(&mut conn).await?;
        if trigger.is_none() {
            tracing::debug!(trigger = UPDATE_TRIGGER, "Catalog database has no update trigger");
        }
        Ok(Self {
            conn: Mutex::new(conn),
            trigger,
        })
    }

    /// Opens the catalog database at `path`. The file must already exist;
    /// this never creates a catalog.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let options = Self::base_options().filename(path.as_ref()).create_if_missing(false);
        Self::new(options).await
    }

    /// Opens the catalog database inside a library directory.
    pub async fn connect_library(root: impl AsRef<Path>) -> Result<Self> {
        Self::connect(Self::path_in(root)).await
    }

    /// Connect to an in-memory database holding a minimal `books` table.
    ///
    /// Note: do NOT apply `#[cfg(test)]` so that other crates can also use
    /// this in their tests.
    pub async fn connect_in_memory() -> Result<Self> {
        let mut conn = Self::base_options()
            .filename(":memory:")
            .connect()
            .await
            .or_raise(|| ErrorKind::Database)?;
        sqlx::raw_sql(FIXTURE_SCHEMA).execute(&mut conn).await.or_raise(|| ErrorKind::Database)?;
        Self::from_connection(conn).await
    }

    /// Where a library keeps its catalog database.
    pub fn path_in(root: impl AsRef<Path>) -> PathBuf {
        root.as_ref().join(METADATA_FILE)
    }

    fn base_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            // The catalog application, or a content server, may be writing
            // at the same time.
            .busy_timeout(std::time::Duration::from_millis(5000))
            .foreign_keys(false)
    }

    /// Inserts a bare book row. Intended for test fixtures.
    pub async fn insert_book(&self, id: u64, title: &str, last_modified: OffsetDateTime) -> Result<()> {
        let id = i64::try_from(id).or_raise(|| ErrorKind::InvalidData("book id"))?;
        sqlx::query("INSERT INTO books (id, title, sort, last_modified) VALUES (?, ?, ?, ?)")
            .bind(id)
            .bind(title)
            .bind(title)
            .bind(timestamp::format(last_modified)?)
            .execute(&mut *self.conn.lock().await)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// The stored last-modified time of a book.
    ///
    /// # Errors
    /// [`ErrorKind::BookNotFound`] if no book has this id.
    #[instrument(skip(self))]
    pub async fn last_modified(&self, id: u64) -> Result<OffsetDateTime> {
        let key = i64::try_from(id).or_raise(|| ErrorKind::InvalidData("book id"))?;
        let stored: Option<String> = sqlx::query_scalar("SELECT last_modified FROM books WHERE id = ?")
            .bind(key)
            .fetch_optional(&mut *self.conn.lock().await)
            .await
            .or_raise(|| ErrorKind::Database)?;
        timestamp::parse(&stored.ok_or_raise(|| ErrorKind::BookNotFound(id))?)
    }

    /// Overwrites a book's last-modified time.
    ///
    /// The update trigger is dropped, the row updated, and the trigger
    /// recreated from its original definition, all in one transaction.
    #[instrument(skip(self))]
    pub async fn set_last_modified(&self, id: u64, value: OffsetDateTime) -> Result<()> {
        let key = i64::try_from(id).or_raise(|| ErrorKind::InvalidData("book id"))?;
        let stored = timestamp::format(value)?;
        let mut conn = self.conn.lock().await;
        let mut tx = conn.begin().await.or_raise(|| ErrorKind::Database)?;
        if self.trigger.is_some() {
            sqlx::query(DROP_TRIGGER)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        let updated = sqlx::query("UPDATE books SET last_modified = ? WHERE id = ?")
            .bind(&stored)
            .bind(key)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?
            .rows_affected();
        if updated == 0 {
            // Dropping the transaction rolls back, restoring the trigger.
            exn::bail!(ErrorKind::BookNotFound(id));
        }
        if let Some(trigger) = &self.trigger {
            sqlx::raw_sql(trigger).execute(&mut *tx).await.or_raise(|| ErrorKind::Database)?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        tracing::debug!(last_modified = %stored, "Updated last-modified time directly");
        Ok(())
    }

    /// Moves a book's last-modified time forward to `file` when the stored
    /// value is older by more than `tolerance`. Returns whether it did.
    pub async fn correct_last_modified(&self, id: u64, file: OffsetDateTime, tolerance: Duration) -> Result<bool> {
        let stored = self.last_modified(id).await?;
        if !crate::needs_correction(stored, file, tolerance) {
            tracing::trace!(id, %stored, %file, "Last-modified time within tolerance");
            return Ok(false);
        }
        tracing::info!(id, %stored, %file, "Correcting last-modified time");
        self.set_last_modified(id, file).await?;
        Ok(true)
    }

    /// Close the connection.
    pub async fn close(self) {
        _ = self.conn.into_inner().close().await;
    }
}

async fn load_trigger(conn: &mut SqliteConnection) -> Result<Option<String>> {
    sqlx::query_scalar("SELECT sql FROM sqlite_master WHERE type = 'trigger' AND name = ?")
        .bind(UPDATE_TRIGGER)
        .fetch_optional(conn)
        .await
        .or_raise(|| ErrorKind::Database)
}
