use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Kind of a catalog category, from the `category_type` column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CategoryKind {
    Authors,
    Tags,
    Series,
    Publisher,
    Rating,
    Languages,
    Formats,
    Identifiers,
    News,
    /// A user-defined column, e.g. `#genre`.
    Custom(String),
}
impl CategoryKind {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "authors" => Self::Authors,
            "tags" => Self::Tags,
            "series" => Self::Series,
            "publisher" => Self::Publisher,
            "rating" => Self::Rating,
            "languages" => Self::Languages,
            "formats" => Self::Formats,
            "identifiers" => Self::Identifiers,
            "news" => Self::News,
            _ => Self::Custom(value.trim().to_string()),
        }
    }
}
impl Display for CategoryKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Self::Authors => "authors",
            Self::Tags => "tags",
            Self::Series => "series",
            Self::Publisher => "publisher",
            Self::Rating => "rating",
            Self::Languages => "languages",
            Self::Formats => "formats",
            Self::Identifiers => "identifiers",
            Self::News => "news",
            Self::Custom(name) => name,
        };
        write!(f, "{name}")
    }
}

/// One row of `list_categories --csv`.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub kind: CategoryKind,
    pub name: String,
    /// Number of books in the category.
    pub count: u64,
    pub rating: f64,
}
impl Category {
    /// Builds a category from a reassembled CSV record laid out as
    /// `category_type,tag_name,count,rating`.
    pub fn from_record(record: &[Option<String>]) -> Result<Self> {
        let count = column(record, 2, "count")?;
        let rating = record.get(3).and_then(Option::as_deref).unwrap_or("0");
        Ok(Self {
            kind: CategoryKind::parse(column(record, 0, "category_type")?),
            name: column(record, 1, "tag_name")?.to_string(),
            count: count.trim().parse::<u64>().or_raise(|| ErrorKind::InvalidData {
                field: "count".to_string(),
                value: count.to_string(),
            })?,
            rating: rating.trim().parse::<f64>().or_raise(|| ErrorKind::InvalidData {
                field: "rating".to_string(),
                value: rating.to_string(),
            })?,
        })
    }
}

fn column<'a>(record: &'a [Option<String>], index: usize, name: &'static str) -> Result<&'a str> {
    record.get(index).and_then(Option::as_deref).ok_or_raise(|| ErrorKind::MissingField(name))
}
