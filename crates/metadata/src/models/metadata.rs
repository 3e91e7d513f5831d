use super::{Collection, CollectionKind, Cover, Identifier};
use crate::error::{ErrorKind, Result};
use exn::OptionExt;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// The book file on local disk that metadata was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Last write time of the file itself (not of the book's content).
    pub modified: OffsetDateTime,
}
impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, modified: OffsetDateTime) -> Self {
        Self { path: path.into(), modified }
    }

    /// Catalog format name derived from the file extension (`EPUB`, `AZW3`,
    /// ...). Returns `None` for files without an extension.
    pub fn format(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::trim)
            .filter(|ext| !ext.is_empty())
            .map(str::to_uppercase)
    }
}

/// Metadata read from a single book file. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMetadata {
    pub title: String,
    pub subtitle: Option<String>,
    pub authors: Vec<String>,
    pub publishers: Vec<String>,
    /// Free-text subject tags, exactly as they appear in the book file.
    pub tags: Vec<String>,
    /// At least one is required before the book can be synchronized.
    pub identifiers: Vec<Identifier>,
    /// Plain-text summary
    pub description: Option<String>,
    /// Long description markup (XHTML fragment), preferred over `description`.
    pub long_description: Option<String>,
    pub collections: Vec<Collection>,
    pub published: OffsetDateTime,
    pub file: SourceFile,
    pub cover: Option<Cover>,
}
impl SourceMetadata {
    /// The identifier used to resolve this book in the catalog.
    ///
    /// # Errors
    /// [`ErrorKind::MissingIdentifier`] when the book declares none.
    pub fn primary_identifier(&self) -> Result<&Identifier> {
        self.identifiers.first().ok_or_raise(|| ErrorKind::MissingIdentifier(self.title.clone()))
    }

    pub fn path(&self) -> &Path {
        &self.file.path
    }

    /// The first collection of kind [`Series`](CollectionKind::Series).
    pub fn series(&self) -> Option<&Collection> {
        self.collections.iter().find(|c| c.kind == CollectionKind::Series)
    }

    /// Names of all [`Set`](CollectionKind::Set) collections, in declaration order.
    pub fn sets(&self) -> impl Iterator<Item = &str> {
        self.collections.iter().filter(|c| c.kind == CollectionKind::Set).map(|c| c.name.as_str())
    }

    /// Description to store in the catalog: the long description markup when
    /// present, otherwise the plain summary.
    pub fn preferred_description(&self) -> Option<&str> {
        self.long_description
            .as_deref()
            .or(self.description.as_deref())
            .filter(|d| !d.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::ops::Deref;

    fn make_test_metadata(identifiers: Vec<Identifier>) -> SourceMetadata {
        SourceMetadata {
            title: "The Time Machine".to_string(),
            subtitle: None,
            authors: vec!["H. G. Wells".to_string()],
            publishers: vec![],
            tags: vec![],
            identifiers,
            description: Some("A summary.".to_string()),
            long_description: None,
            collections: vec![Collection::set("Classics"), Collection::series("Wells", 2), Collection::set("Sci-Fi")],
            published: OffsetDateTime::UNIX_EPOCH,
            file: SourceFile::new("/tmp/time-machine.epub", OffsetDateTime::UNIX_EPOCH),
            cover: None,
        }
    }

    #[test]
    fn test_missing_identifier_fails_fast() {
        let metadata = make_test_metadata(vec![]);
        let err = metadata.primary_identifier().unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::MissingIdentifier(title) if title == "The Time Machine"));
    }

    #[test]
    fn test_primary_identifier_is_first() {
        let metadata = make_test_metadata(vec![Identifier::new("url", "https://a"), Identifier::new("isbn", "1")]);
        assert_eq!(metadata.primary_identifier().unwrap().scheme, "url");
    }

    #[test]
    fn test_collections() {
        let metadata = make_test_metadata(vec![]);
        assert_eq!(metadata.series().map(|s| s.position), Some(Some(2)));
        assert_eq!(metadata.sets().collect::<Vec<_>>(), vec!["Classics", "Sci-Fi"]);
    }

    #[test]
    fn test_long_description_preferred() {
        let mut metadata = make_test_metadata(vec![]);
        assert_eq!(metadata.preferred_description(), Some("A summary."));
        metadata.long_description = Some("<p>Long</p>".to_string());
        assert_eq!(metadata.preferred_description(), Some("<p>Long</p>"));
    }

    #[rstest]
    #[case("/tmp/book.epub", Some("EPUB"))]
    #[case("/tmp/book.kepub.epub", Some("EPUB"))]
    #[case("/tmp/book.azw3", Some("AZW3"))]
    #[case("/tmp/book", None)]
    fn test_format(#[case] path: &str, #[case] expected: Option<&str>) {
        let file = SourceFile::new(path, OffsetDateTime::UNIX_EPOCH);
        assert_eq!(file.format().as_deref(), expected);
    }
}
