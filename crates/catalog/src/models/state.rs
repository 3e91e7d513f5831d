use super::Row;
use crate::error::Result;
use time::OffsetDateTime;

/// Custom column lookup names (`#subtitle`, `#set`).
///
/// `set_metadata` addresses custom columns as `#name`, while `list` reports
/// and selects them as `*name`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Columns {
    pub subtitle: Option<String>,
    pub set: Option<String>,
}
impl Columns {
    pub fn new(subtitle: Option<impl Into<String>>, set: Option<impl Into<String>>) -> Self {
        Self {
            subtitle: subtitle.map(|c| normalize(&c.into())),
            set: set.map(|c| normalize(&c.into())),
        }
    }

    /// Name of a custom column as used by `list --fields` and its output.
    pub fn list_key(column: &str) -> String {
        format!("*{}", column.trim_start_matches(['#', '*']))
    }
}

fn normalize(column: &str) -> String {
    format!("#{}", column.trim().trim_start_matches(['#', '*']))
}

/// The reconcilable fields of one book, as currently stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookState {
    pub id: u64,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub comments: Option<String>,
    pub tags: Vec<String>,
    pub series: Option<String>,
    pub series_index: f64,
    pub sets: Vec<String>,
    pub published: Option<OffsetDateTime>,
}
impl BookState {
    /// Fields to request from `list` to build this state.
    pub fn fields(columns: &Columns) -> Vec<String> {
        let mut fields: Vec<String> = ["id", "title", "comments", "tags", "series", "series_index", "pubdate"]
            .into_iter()
            .map(String::from)
            .collect();
        fields.extend(columns.subtitle.iter().map(|c| Columns::list_key(c)));
        fields.extend(columns.set.iter().map(|c| Columns::list_key(c)));
        fields
    }

    pub fn from_row(row: &Row, columns: &Columns) -> Result<Self> {
        Ok(Self {
            id: row.id()?,
            title: row.string("title"),
            subtitle: columns.subtitle.as_ref().and_then(|c| row.string(&Columns::list_key(c))),
            comments: row.string("comments"),
            tags: row.strings("tags", ","),
            series: row.string("series"),
            series_index: row.number("series_index")?.unwrap_or(1.0),
            sets: columns
                .set
                .as_ref()
                .map(|c| row.strings(&Columns::list_key(c), ","))
                .unwrap_or_default(),
            published: row.timestamp("pubdate")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_column_names() {
        let columns = Columns::new(Some("subtitle"), Some("*set"));
        assert_eq!(columns.subtitle.as_deref(), Some("#subtitle"));
        assert_eq!(columns.set.as_deref(), Some("#set"));
        assert_eq!(Columns::list_key("#set"), "*set");
    }

    #[test]
    fn test_from_row() {
        let columns = Columns::new(Some("#subtitle"), Some("#set"));
        let row: Row = serde_json::from_value(json!({
            "id": 3,
            "title": "Dracula",
            "*subtitle": "A Novel",
            "comments": "<p>Vampires.</p>",
            "tags": ["Horror", "Fiction"],
            "series": null,
            "series_index": 1.0,
            "*set": "Gothic,Classics",
            "pubdate": "1897-05-26T00:00:00+00:00",
        }))
        .unwrap();
        let state = BookState::from_row(&row, &columns).unwrap();
        assert_eq!(state.id, 3);
        assert_eq!(state.subtitle.as_deref(), Some("A Novel"));
        assert_eq!(state.tags, vec!["Horror", "Fiction"]);
        assert_eq!(state.series, None);
        assert_eq!(state.sets, vec!["Gothic", "Classics"]);
        assert_eq!(state.published.map(|p| p.year()), Some(1897));
    }

    #[test]
    fn test_fields_include_custom_columns() {
        let fields = BookState::fields(&Columns::new(Some("#subtitle"), None::<String>));
        assert!(fields.contains(&"*subtitle".to_string()));
        assert!(!fields.iter().any(|f| f == "*set"));
    }
}
