use super::Row;
use crate::error::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// Fields requested when resolving a [`CatalogEntry`].
pub(crate) const ENTRY_FIELDS: &[&str] = &["id", "title", "authors", "identifiers", "last_modified", "formats"];

/// A book as the catalog currently records it.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub id: u64,
    pub title: String,
    pub authors: Vec<String>,
    /// Scheme to value.
    pub identifiers: BTreeMap<String, String>,
    pub last_modified: Option<OffsetDateTime>,
    /// Absolute paths of the stored format files.
    pub formats: Vec<PathBuf>,
}
impl CatalogEntry {
    /// Display name, e.g. `The Time Machine by H. G. Wells`.
    pub fn name(&self) -> String {
        if self.authors.is_empty() {
            return self.title.clone();
        }
        format!("{} by {}", self.title, self.authors.join(" & "))
    }

    /// Directory holding this book's files.
    pub fn path(&self) -> Option<&Path> {
        self.formats.first().and_then(|f| f.parent())
    }

    /// The stored file for `format` (matched on extension, case-insensitive).
    pub fn format_file(&self, format: &str) -> Option<&Path> {
        self.formats
            .iter()
            .find(|path| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(format))
            })
            .map(PathBuf::as_path)
    }
}
impl TryFrom<&Row> for CatalogEntry {
    type Error = crate::error::Error;

    fn try_from(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.id()?,
            title: row.string("title").unwrap_or_default(),
            authors: row.strings("authors", " & "),
            identifiers: row.map("identifiers").into_iter().collect(),
            last_modified: row.timestamp("last_modified")?,
            formats: row.strings("formats", ",").into_iter().map(PathBuf::from).collect(),
        })
    }
}
