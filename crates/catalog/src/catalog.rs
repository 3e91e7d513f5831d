use crate::command::{CommandLine, Location};
use crate::error::{ErrorKind, Result};
use crate::models::{BookState, CatalogEntry, Category, Columns, ENTRY_FIELDS, FieldUpdate, Row};
use crate::process::{Completion, ProcessChannel};
use crate::{records, search};
use exn::ResultExt;
use futures::{Stream, StreamExt, TryStreamExt};
use shelf_asyncutils::CancellationToken;
use shelf_metadata::Identifier;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Options for a `list` query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub fields: Vec<String>,
    pub sort_by: Option<String>,
    pub ascending: bool,
    pub search: Option<String>,
    pub limit: Option<usize>,
}
impl ListQuery {
    pub fn new<I: IntoIterator<Item = S>, S: Into<String>>(fields: I) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn search(mut self, expression: impl Into<String>) -> Self {
        self.search = Some(expression.into());
        self
    }

    pub fn sort_by(mut self, field: impl Into<String>, ascending: bool) -> Self {
        self.sort_by = Some(field.into());
        self.ascending = ascending;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A book to be added to the catalog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewBook {
    pub file: PathBuf,
    pub title: String,
    pub authors: Vec<String>,
    pub tags: Vec<String>,
    pub identifiers: Vec<Identifier>,
    /// Series name and position.
    pub series: Option<(String, f64)>,
    /// Image file to use as the cover.
    pub cover: Option<PathBuf>,
}

/// Typed operations on one catalog.
#[derive(Debug, Clone)]
pub struct Catalog {
    channel: ProcessChannel,
    columns: Columns,
    dry_run: bool,
}

impl Catalog {
    pub fn new(channel: ProcessChannel, columns: Columns) -> Self {
        Self {
            channel,
            columns,
            dry_run: false,
        }
    }

    /// When enabled, commands that would modify the catalog are logged
    /// instead of executed.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn channel(&self) -> &ProcessChannel {
        &self.channel
    }

    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    pub fn location(&self) -> &Location {
        self.channel.location()
    }

    /// Streams the rows matching `query`.
    pub fn list(&self, query: &ListQuery, cancel: &CancellationToken) -> impl Stream<Item = Result<Row>> + Send + 'static {
        let command = self
            .channel
            .command("list")
            .values("fields", query.fields.iter().cloned())
            .option_if("sort-by", query.sort_by.clone())
            .flag("ascending", query.ascending)
            .option_if("search", query.search.clone())
            .option_if("limit", query.limit.map(|l| l.to_string()))
            .flag("for-machine", true);
        records::buffered(&self.channel, command, cancel)
    }

    /// Looks up a book by identifier, optionally requiring a stored file in
    /// `format`. The lowest id wins when several books match.
    #[instrument(skip_all, fields(identifier = %identifier, format = ?format))]
    pub async fn find(&self, identifier: &Identifier, format: Option<&str>, cancel: &CancellationToken) -> Result<Option<CatalogEntry>> {
        let mut terms = vec![search::identifier(identifier)];
        terms.extend(format.map(search::format));
        let query = ListQuery::new(ENTRY_FIELDS.iter().copied())
            .search(search::all(terms))
            .sort_by("id", true)
            .limit(1);
        let rows = self.list(&query, cancel);
        let mut rows = std::pin::pin!(rows);
        match rows.next().await {
            Some(row) => Ok(Some(CatalogEntry::try_from(&row?)?)),
            None => Ok(None),
        }
    }

    /// Reads the reconcilable fields of a single book.
    #[instrument(skip(self, cancel))]
    pub async fn book_state(&self, id: u64, cancel: &CancellationToken) -> Result<Option<BookState>> {
        let query = ListQuery::new(BookState::fields(&self.columns)).search(search::book(id));
        let rows = self.list(&query, cancel);
        let mut rows = std::pin::pin!(rows);
        while let Some(row) = rows.next().await {
            let row = row?;
            if row.id()? == id {
                return Ok(Some(BookState::from_row(&row, &self.columns)?));
            }
        }
        Ok(None)
    }

    /// Streams every category (authors, tags, series, custom columns, ...).
    pub fn list_categories(&self, cancel: &CancellationToken) -> impl Stream<Item = Result<Category>> + Send + 'static {
        let command = self.channel.command("list_categories").flag("csv", true);
        records::tabular(&self.channel, command, cancel).and_then(|record| async move { Category::from_record(&record) })
    }

    /// Ids of the books matching `expression`.
    #[instrument(skip(self, cancel))]
    pub async fn search(&self, expression: &str, cancel: &CancellationToken) -> Result<Vec<u64>> {
        let command = self.channel.command("search").arg(expression);
        let (_, lines) = self.channel.output(&command, cancel).await?;
        lines
            .iter()
            .flat_map(|line| line.split(','))
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| {
                id.parse::<u64>().or_raise(|| ErrorKind::InvalidData {
                    field: "id".to_string(),
                    value: id.to_string(),
                })
            })
            .collect()
    }

    /// Adds a book, even if an identical one is already present.
    ///
    /// Returns the new book's id, or `None` in dry-run mode.
    ///
    /// # Errors
    /// [`ErrorKind::NotAdded`] if the tool did not report a new id.
    #[instrument(skip_all, fields(file = %book.file.display()))]
    pub async fn add(&self, book: &NewBook, cancel: &CancellationToken) -> Result<Option<u64>> {
        let mut command = self
            .channel
            .command("add")
            .flag("duplicates", true)
            .option("title", &book.title)
            .option_if("authors", (!book.authors.is_empty()).then(|| book.authors.join(" & ")))
            .values("tags", book.tags.iter().cloned());
        for identifier in &book.identifiers {
            command = command.option("identifier", identifier.to_string());
        }
        if let Some((series, index)) = &book.series {
            command = command.option("series", series).option("series-index", index.to_string());
        }
        let command = command
            .option_if("cover", book.cover.as_ref().map(|c| c.to_string_lossy().into_owned()))
            .arg(book.file.to_string_lossy());
        let Some(lines) = self.mutate(&command, cancel).await? else {
            return Ok(None);
        };
        let id = lines
            .iter()
            .find_map(|line| line.trim().strip_prefix("Added book ids:"))
            .and_then(|ids| ids.split(',').next())
            .and_then(|id| id.trim().parse::<u64>().ok());
        match id {
            Some(id) => {
                tracing::info!(id, title = %book.title, "Added book to catalog");
                Ok(Some(id))
            },
            None => exn::bail!(ErrorKind::NotAdded),
        }
    }

    /// Attaches `file` to an existing book as an additional format.
    #[instrument(skip(self, cancel))]
    pub async fn add_format(&self, id: u64, file: &Path, cancel: &CancellationToken) -> Result<()> {
        let command = self.channel.command("add_format").arg(id.to_string()).arg(file.to_string_lossy());
        self.mutate(&command, cancel).await?;
        Ok(())
    }

    /// Applies every update in one invocation. Nothing is run for an empty
    /// set of updates.
    #[instrument(skip(self, updates, cancel), fields(updates = updates.len()))]
    pub async fn set_metadata(&self, id: u64, updates: &[FieldUpdate], cancel: &CancellationToken) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        let command = updates
            .iter()
            .fold(self.channel.command("set_metadata").arg(id.to_string()), |command, update| command.field(update));
        self.mutate(&command, cancel).await?;
        Ok(())
    }

    #[instrument(skip(self, cancel))]
    pub async fn remove(&self, ids: &[u64], cancel: &CancellationToken) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let ids: Vec<String> = ids.iter().map(u64::to_string).collect();
        let command = self.channel.command("remove").arg(ids.join(","));
        self.mutate(&command, cancel).await?;
        Ok(())
    }

    /// Runs a command that modifies the catalog, returning its output lines.
    async fn mutate(&self, command: &CommandLine, cancel: &CancellationToken) -> Result<Option<Vec<String>>> {
        if self.dry_run {
            tracing::info!(command = %command, "Dry run; not modifying catalog");
            return Ok(None);
        }
        match self.channel.output(command, cancel).await? {
            (Completion::Cancelled, _) => exn::bail!(ErrorKind::Cancelled),
            (Completion::Exited(_), lines) => Ok(Some(lines)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockResponse, MockRunner};
    use crate::models::{CategoryKind, fields};
    use serde_json::json;
    use std::ops::Deref;
    use std::sync::Arc;

    fn catalog(runner: &Arc<MockRunner>) -> Catalog {
        Catalog::new(runner.channel(), Columns::new(Some("#subtitle"), Some("#set")))
    }

    #[tokio::test]
    async fn test_find_by_identifier_and_format() {
        let runner = Arc::new(MockRunner::new(|_| {
            MockResponse::json(&json!([{
                "id": 9,
                "title": "The Time Machine",
                "authors": "H. G. Wells",
                "identifiers": {"url": "https://standardebooks.org/ebooks/h-g-wells/the-time-machine"},
                "last_modified": "2024-01-01T00:00:00+00:00",
                "formats": ["/library/H. G. Wells/The Time Machine (9)/The Time Machine - H. G. Wells.epub"],
            }]))
        }));
        let identifier = Identifier::new("url", "https://standardebooks.org/ebooks/h-g-wells/the-time-machine");
        let entry = catalog(&runner)
            .find(&identifier, Some("EPUB"), &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.id, 9);
        assert_eq!(entry.name(), "The Time Machine by H. G. Wells");

        let calls = runner.calls("list");
        let list = &calls[0];
        assert!(list.has_flag("for-machine"));
        assert_eq!(
            list.option_value("search").unwrap(),
            r#"identifiers:"=url:=https://standardebooks.org/ebooks/h-g-wells/the-time-machine" and formats:"=EPUB""#
        );
        assert_eq!(list.option_value("with-library").as_deref(), Some("/library"));
    }

    #[tokio::test]
    async fn test_find_without_match() {
        let runner = Arc::new(MockRunner::new(|_| MockResponse::ok()));
        let found = catalog(&runner)
            .find(&Identifier::new("isbn", "1"), None, &CancellationToken::new())
            .await
            .unwrap();
        assert!(found.is_none());
        assert!(!runner.calls("list")[0].option_value("search").unwrap().contains("formats"));
    }

    #[tokio::test]
    async fn test_book_state_requests_custom_columns() {
        let runner = Arc::new(MockRunner::new(|_| {
            MockResponse::json(&json!([{"id": 5, "title": "Carmilla", "*subtitle": "A Vampyre Tale", "series_index": 1.0}]))
        }));
        let state = catalog(&runner).book_state(5, &CancellationToken::new()).await.unwrap().unwrap();
        assert_eq!(state.subtitle.as_deref(), Some("A Vampyre Tale"));
        let fields = runner.calls("list")[0].option_value("fields").unwrap();
        assert!(fields.contains("*subtitle") && fields.contains("*set"));
    }

    #[tokio::test]
    async fn test_add_reports_new_id() {
        let runner = Arc::new(MockRunner::new(|_| MockResponse::stdout("Backing up metadata\nAdded book ids: 17")));
        let book = NewBook {
            file: PathBuf::from("/downloads/the-time-machine.epub"),
            title: "The Time Machine".to_string(),
            authors: vec!["H. G. Wells".to_string()],
            tags: vec!["Science Fiction".to_string()],
            identifiers: vec![Identifier::new("url", "https://x"), Identifier::new("isbn", "1")],
            series: Some(("Wells".to_string(), 2.0)),
            cover: Some(PathBuf::from("/tmp/cover.jpg")),
        };
        let id = catalog(&runner).add(&book, &CancellationToken::new()).await.unwrap();
        assert_eq!(id, Some(17));

        let calls = runner.calls("add");
        let add = &calls[0];
        assert!(add.has_flag("duplicates"));
        assert_eq!(add.options("identifier"), vec!["url:https://x", "isbn:1"]);
        assert_eq!(add.option_value("series-index").as_deref(), Some("2"));
        assert_eq!(add.option_value("cover").as_deref(), Some("/tmp/cover.jpg"));
        assert_eq!(add.positionals(), vec!["/downloads/the-time-machine.epub"]);
    }

    #[tokio::test]
    async fn test_add_without_reported_id() {
        let runner = Arc::new(MockRunner::new(|_| MockResponse::ok().with_stderr("Permission denied")));
        let err = catalog(&runner).add(&NewBook::default(), &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.deref(), &ErrorKind::NotAdded);
    }

    #[tokio::test]
    async fn test_set_metadata_is_one_invocation() {
        let runner = Arc::new(MockRunner::new(|_| MockResponse::ok()));
        let updates = [
            FieldUpdate::single(fields::TITLE, "Dracula"),
            FieldUpdate::multiple(fields::TAGS, ["Fiction", "Horror"]),
        ];
        catalog(&runner).set_metadata(3, &updates, &CancellationToken::new()).await.unwrap();
        let calls = runner.history();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].positionals(), vec!["3"]);
        assert_eq!(calls[0].options("field"), vec!["title:Dracula", "tags:Fiction,Horror"]);
    }

    #[tokio::test]
    async fn test_empty_updates_run_nothing() {
        let runner = Arc::new(MockRunner::new(|_| MockResponse::ok()));
        catalog(&runner).set_metadata(3, &[], &CancellationToken::new()).await.unwrap();
        assert!(runner.history().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_skips_mutations() {
        let runner = Arc::new(MockRunner::new(|_| MockResponse::stdout("Added book ids: 1")));
        let catalog = catalog(&runner).dry_run(true);
        let cancel = CancellationToken::new();
        assert_eq!(catalog.add(&NewBook::default(), &cancel).await.unwrap(), None);
        catalog.add_format(1, Path::new("/tmp/a.azw3"), &cancel).await.unwrap();
        catalog.remove(&[1, 2], &cancel).await.unwrap();
        assert!(runner.history().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_mutation_is_an_error() {
        let runner = Arc::new(MockRunner::new(|_| MockResponse::ok()));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = catalog(&runner).remove(&[4], &cancel).await.unwrap_err();
        assert_eq!(err.deref(), &ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn test_search_and_categories() {
        let runner = Arc::new(MockRunner::new(|command| match command.subcommand() {
            "search" => MockResponse::stdout("3,5,8"),
            _ => MockResponse::stdout("category_type,tag_name,count,rating\nauthors,\"Wells, H. G.\",4,0"),
        }));
        let catalog = catalog(&runner);
        let cancel = CancellationToken::new();
        assert_eq!(catalog.search("tags:Horror", &cancel).await.unwrap(), vec![3, 5, 8]);

        let categories: Vec<Category> = catalog.list_categories(&cancel).try_collect().await.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].kind, CategoryKind::Authors);
        assert_eq!(categories[0].name, "Wells, H. G.");
        assert!(runner.calls("list_categories")[0].has_flag("csv"));
    }
}
