use std::fmt::{Display, Formatter, Result as FmtResult};

/// A named grouping a book belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Collection {
    /// Collection name
    pub name: String,
    pub kind: CollectionKind,
    /// Position within the collection (1-indexed), only meaningful for series.
    pub position: Option<u32>,
}
impl Collection {
    pub fn series(name: impl Into<String>, position: impl Into<Option<u32>>) -> Self {
        Self {
            name: name.into(),
            kind: CollectionKind::Series,
            position: position.into(),
        }
    }

    pub fn set(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: CollectionKind::Set,
            position: None,
        }
    }
}

/// Collection type enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    /// Ordered collection, the book has a position in it.
    Series,
    /// Unordered collection (anthologies, curated lists, ...).
    Set,
}
impl CollectionKind {
    /// Returns the display string for the collection kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::Series => "Series",
            CollectionKind::Set => "Set",
        }
    }
}
impl Display for CollectionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}
