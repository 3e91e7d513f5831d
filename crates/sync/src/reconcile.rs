//! Bringing a catalog entry's metadata in line with its source file.

use crate::description::{LinkRewriter, minify};
use crate::error::{ErrorKind, Result};
use crate::{series, tags};
use exn::{OptionExt, ResultExt};
use shelf_asyncutils::CancellationToken;
use shelf_catalog::fields::{COMMENTS, PUBDATE, TAGS, TITLE};
use shelf_catalog::{BookState, Catalog, FieldUpdate};
use shelf_metadata::SourceMetadata;
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};
use tracing::instrument;

/// Computes and applies the field updates that make a catalog entry match
/// its source metadata.
#[derive(Debug, Clone)]
pub struct Reconciler {
    catalog: Catalog,
    links: LinkRewriter,
}

impl Reconciler {
    pub fn new(catalog: Catalog, links: LinkRewriter) -> Self {
        Self { catalog, links }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Updates needed for book `id`, in the order they are written.
    ///
    /// # Errors
    /// [`ErrorKind::BookNotFound`] if the catalog has no book `id`.
    #[instrument(skip_all, fields(id = id, title = %desired.title))]
    pub async fn compute(&self, id: u64, desired: &SourceMetadata, cancel: &CancellationToken) -> Result<Vec<FieldUpdate>> {
        let current = self
            .catalog
            .book_state(id, cancel)
            .await
            .or_raise(|| ErrorKind::Catalog)?
            .ok_or_raise(|| ErrorKind::BookNotFound(id))?;
        let columns = self.catalog.columns();
        let mut updates = Vec::new();

        if current.title.as_deref() != Some(desired.title.as_str()) {
            updates.push(FieldUpdate::single(TITLE, &desired.title));
        }

        if let Some(column) = &columns.subtitle {
            match (&desired.subtitle, &current.subtitle) {
                (Some(wanted), stored) if stored.as_ref() != Some(wanted) => {
                    updates.push(FieldUpdate::single(column, wanted));
                },
                (None, Some(_)) => updates.push(FieldUpdate::clear(column)),
                _ => {},
            }
        }

        // An absent description never clears the stored one.
        if let Some(description) = desired.preferred_description() {
            let rewritten = self.links.rewrite(description, &self.catalog, cancel).await?;
            let wanted = minify(&rewritten);
            if current.comments.as_deref().map(minify).as_deref() != Some(wanted.as_str()) {
                updates.push(FieldUpdate::single(COMMENTS, wanted));
            }
        }

        let wanted_tags = tags::sanitize(&desired.tags);
        if wanted_tags != tags::normalize_current(&current.tags) {
            updates.push(FieldUpdate::multiple(TAGS, wanted_tags));
        }

        let wanted_series = desired
            .series()
            .map(|s| (s.name.as_str(), s.position.map_or(series::DEFAULT_SERIES_INDEX, f64::from)));
        updates.extend(series::updates((current.series.as_deref(), current.series_index), wanted_series));

        if let Some(column) = &columns.set {
            let mut wanted: Vec<&str> = desired.sets().collect();
            wanted.sort_unstable();
            wanted.dedup();
            let mut stored: Vec<&str> = current.sets.iter().map(String::as_str).collect();
            stored.sort_unstable();
            if wanted != stored {
                updates.push(FieldUpdate::multiple(column, wanted));
            }
        }

        if let Some(update) = published_update(&current, desired.published)? {
            updates.push(update);
        }

        tracing::debug!(updates = updates.len(), "Computed metadata updates");
        Ok(updates)
    }

    /// Applies [`compute`](Self::compute) to the catalog. Returns the
    /// updates written; nothing is run when there are none.
    #[instrument(skip_all, fields(id = id))]
    pub async fn reconcile(&self, id: u64, desired: &SourceMetadata, cancel: &CancellationToken) -> Result<Vec<FieldUpdate>> {
        let updates = self.compute(id, desired, cancel).await?;
        if updates.is_empty() {
            tracing::trace!("Metadata already up to date");
            return Ok(updates);
        }
        self.catalog.set_metadata(id, &updates, cancel).await.or_raise(|| ErrorKind::Catalog)?;
        tracing::info!(fields = ?updates.iter().map(|u| u.field.as_str()).collect::<Vec<_>>(), "Updated metadata");
        Ok(updates)
    }
}

/// Publish dates are compared by UTC calendar date.
fn published_update(current: &BookState, published: OffsetDateTime) -> Result<Option<FieldUpdate>> {
    let published = published.to_offset(UtcOffset::UTC);
    let stored = current.published.map(|p| p.to_offset(UtcOffset::UTC).date());
    if stored == Some(published.date()) {
        return Ok(None);
    }
    let value = published.format(&Rfc3339).or_raise(|| ErrorKind::Metadata)?;
    Ok(Some(FieldUpdate::single(PUBDATE, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value, json};
    use shelf_catalog::Columns;
    use shelf_catalog::mock::{MockResponse, MockRunner};
    use shelf_metadata::{Collection, Identifier, SourceFile};
    use std::sync::{Arc, Mutex};
    use time::macros::datetime;

    /// A one-book catalog that remembers what `set_metadata` writes.
    fn stateful_runner(initial: Value) -> Arc<MockRunner> {
        let book = Arc::new(Mutex::new(initial.as_object().cloned().unwrap_or_default()));
        Arc::new(MockRunner::new(move |command| match command.subcommand() {
            "list" if command.option_value("search").is_some_and(|s| s.starts_with("identifiers:")) => MockResponse::ok(),
            "list" => MockResponse::json(&json!([Value::Object(book.lock().unwrap().clone())])),
            "set_metadata" => {
                let mut book = book.lock().unwrap();
                for field in command.options("field") {
                    let (name, value) = field.split_once(':').unwrap();
                    apply(&mut book, name, value);
                }
                MockResponse::ok()
            },
            _ => MockResponse::ok(),
        }))
    }

    fn apply(book: &mut Map<String, Value>, name: &str, value: &str) {
        let key = match name.strip_prefix('#') {
            Some(column) => format!("*{column}"),
            None => name.to_string(),
        };
        let value = match key.as_str() {
            _ if value.is_empty() => Value::Null,
            "series_index" => json!(value.parse::<f64>().unwrap()),
            "tags" | "*set" => json!(value.split(',').collect::<Vec<_>>()),
            _ => json!(value),
        };
        book.insert(key, value);
    }

    fn reconciler(runner: &Arc<MockRunner>) -> Reconciler {
        let catalog = Catalog::new(runner.channel(), Columns::new(Some("#subtitle"), Some("#set")));
        Reconciler::new(catalog, LinkRewriter::new("https://standardebooks.org"))
    }

    fn make_test_metadata() -> SourceMetadata {
        SourceMetadata {
            title: "The Time Machine".to_string(),
            subtitle: Some("An Invention".to_string()),
            authors: vec!["H. G. Wells".to_string()],
            publishers: vec![],
            tags: vec!["Time travel -- Fiction".to_string(), "Science fiction".to_string()],
            identifiers: vec![Identifier::new("url", "https://standardebooks.org/ebooks/h-g-wells/the-time-machine")],
            description: Some("A summary.".to_string()),
            long_description: Some(
                "<p>\n  A traveller, see <a href=\"/ebooks/h-g-wells/the-war-of-the-worlds\">another</a>.\n</p>".to_string(),
            ),
            collections: vec![Collection::set("Classics"), Collection::series("Wells", 2), Collection::set("Adventure")],
            published: datetime!(1895-05-07 12:00 UTC),
            file: SourceFile::new("/downloads/the-time-machine.epub", datetime!(2024-01-01 00:00 UTC)),
            cover: None,
        }
    }

    #[tokio::test]
    async fn test_fresh_book_gets_every_field() {
        let runner = stateful_runner(json!({"id": 1, "title": "the-time-machine", "series_index": 1.0}));
        let updates = reconciler(&runner).compute(1, &make_test_metadata(), &CancellationToken::new()).await.unwrap();
        let rendered: Vec<String> = updates.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "title:The Time Machine",
                "#subtitle:An Invention",
                "comments:<p> A traveller, see <a href=\"/ebooks/h-g-wells/the-war-of-the-worlds\">another</a>. </p>",
                "tags:Fiction,Science Fiction,Time Travel",
                "series:Wells",
                "series_index:2",
                "#set:Adventure,Classics",
                "pubdate:1895-05-07T12:00:00Z",
            ]
        );
    }

    #[tokio::test]
    async fn test_reconciling_twice_changes_nothing() {
        let runner = stateful_runner(json!({"id": 1, "title": "Draft", "comments": "<p>Old</p>", "series_index": 1.0}));
        let reconciler = reconciler(&runner);
        let cancel = CancellationToken::new();
        let first = reconciler.reconcile(1, &make_test_metadata(), &cancel).await.unwrap();
        assert!(!first.is_empty());
        let second = reconciler.reconcile(1, &make_test_metadata(), &cancel).await.unwrap();
        assert_eq!(second, Vec::new());
        assert_eq!(runner.calls("set_metadata").len(), 1);
        let logged = runner.calls("set_metadata")[0].to_string();
        assert!(logged.contains(r#"--field tags:Fiction,"Science Fiction","Time Travel""#), "{logged}");
        assert!(logged.contains("--field #set:Adventure,Classics"), "{logged}");
    }

    #[tokio::test]
    async fn test_missing_values_clear_or_keep() {
        let runner = stateful_runner(json!({
            "id": 1,
            "title": "The Time Machine",
            "*subtitle": "Stale",
            "comments": "<p>Keep me</p>",
            "series": "Wells",
            "series_index": 2.0,
            "pubdate": "1895-05-07T00:00:00+00:00",
        }));
        let mut metadata = make_test_metadata();
        metadata.subtitle = None;
        metadata.description = None;
        metadata.long_description = None;
        metadata.tags = vec![];
        metadata.collections = vec![];
        let updates = reconciler(&runner).compute(1, &metadata, &CancellationToken::new()).await.unwrap();
        let rendered: Vec<String> = updates.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["#subtitle:", "series:", "series_index:0"]);
    }

    #[tokio::test]
    async fn test_unknown_book() {
        let runner = Arc::new(MockRunner::new(|_| MockResponse::ok()));
        let err = reconciler(&runner).compute(4, &make_test_metadata(), &CancellationToken::new()).await.unwrap_err();
        assert_eq!(*err, ErrorKind::BookNotFound(4));
    }

    #[test]
    fn test_publish_date_compares_calendar_date() {
        let state = BookState {
            published: Some(datetime!(1895-05-07 23:30 -2)),
            ..BookState::default()
        };
        // 1895-05-08 01:30 UTC
        assert!(published_update(&state, datetime!(1895-05-08 09:00 UTC)).unwrap().is_none());
        assert!(published_update(&state, datetime!(1895-05-07 09:00 UTC)).unwrap().is_some());
    }
}
