use std::fmt::{Display, Formatter, Result as FmtResult};

/// Built-in field names accepted by `set_metadata --field`.
pub mod fields {
    pub const TITLE: &str = "title";
    pub const COMMENTS: &str = "comments";
    pub const TAGS: &str = "tags";
    pub const SERIES: &str = "series";
    pub const SERIES_INDEX: &str = "series_index";
    pub const PUBDATE: &str = "pubdate";
}

/// A single field assignment. A batch of these for one book is applied in
/// one `set_metadata` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldUpdate {
    pub field: String,
    /// Written comma-joined. An empty list clears the field.
    pub values: Vec<String>,
}
impl FieldUpdate {
    pub fn single(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            values: vec![value.into()],
        }
    }

    pub fn multiple<I: IntoIterator<Item = S>, S: Into<String>>(field: impl Into<String>, values: I) -> Self {
        Self {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn clear(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            values: Vec::new(),
        }
    }

    pub fn value(&self) -> String {
        self.values.join(",")
    }
}
impl Display for FieldUpdate {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}:{}", self.field, self.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(FieldUpdate::single(fields::SERIES_INDEX, "2").to_string(), "series_index:2");
        assert_eq!(FieldUpdate::multiple(fields::TAGS, ["A", "B"]).to_string(), "tags:A,B");
        assert_eq!(FieldUpdate::clear(fields::SERIES).to_string(), "series:");
    }
}
