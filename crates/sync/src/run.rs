//! Syncing everything a feed has announced since the last run.

use crate::error::Result;
use crate::orchestrate::{Orchestrator, Outcome};
use crate::sentinel::{self, Sentinel};
use crate::source::{Downloader, Feed, FeedItem, MetadataReader};
use async_stream::stream;
use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt};
use shelf_asyncutils::CancellationToken;
use shelf_config::Config;
use std::collections::VecDeque;
use std::sync::Arc;

/// Progress events emitted by [`run`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started) exactly once.
/// 2. [`DiscoveryComplete`](Self::DiscoveryComplete) exactly once, with the
///    number of items newer than the sentinel.
/// 3. [`Synced`](Self::Synced) zero or more times, one per item.
/// 4. [`Complete`](Self::Complete) exactly once.
///
/// Reading the sentinel or the feed failing ends the stream early, as does
/// cancellation; [`Complete`](Self::Complete) is then never emitted.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Started,
    DiscoveryComplete(u64),
    Synced(FeedItem, Outcome),
    Complete,
}

/// Everything a feed run needs.
#[derive(Clone)]
pub struct SyncContext {
    orchestrator: Orchestrator,
    feed: Arc<dyn Feed>,
    downloader: Arc<dyn Downloader>,
    reader: Arc<dyn MetadataReader>,
    sentinel: Option<Sentinel>,
    concurrency: usize,
    delete_source: bool,
}

impl SyncContext {
    pub fn new(
        orchestrator: Orchestrator,
        feed: Arc<dyn Feed>,
        downloader: Arc<dyn Downloader>,
        reader: Arc<dyn MetadataReader>,
    ) -> Self {
        Self {
            orchestrator,
            feed,
            downloader,
            reader,
            sentinel: None,
            concurrency: 1,
            delete_source: false,
        }
    }

    /// Applies the `sync` section of `config`.
    pub fn configure(self, config: &Config) -> Self {
        self.sentinel(config.sync.sentinel.clone().map(Sentinel::new))
            .concurrency(config.sync.concurrency)
            .delete_source(config.sync.delete_source)
    }

    pub fn sentinel(mut self, sentinel: Option<Sentinel>) -> Self {
        self.sentinel = sentinel;
        self
    }

    /// Books processed at the same time. At least one.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn delete_source(mut self, delete_source: bool) -> Self {
        self.delete_source = delete_source;
        self
    }

    async fn sync_item(&self, item: FeedItem, cancel: &CancellationToken) -> (FeedItem, Result<Outcome>) {
        let result = self.sync_item_inner(&item, cancel).await;
        if let Err(err) = &result {
            tracing::warn!(uri = %item.uri, error = ?err, "Failed to sync feed item");
        }
        (item, result)
    }

    async fn sync_item_inner(&self, item: &FeedItem, cancel: &CancellationToken) -> Result<Outcome> {
        let path = self.downloader.download(item, cancel).await?;
        let metadata = self.reader.read(&path).await?;
        let outcome = self.orchestrator.sync(&metadata, cancel).await?;
        if self.delete_source && matches!(outcome, Outcome::Synced(_)) && !self.orchestrator.catalog().is_dry_run() {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => tracing::debug!(path = %path.display(), "Deleted synced source file"),
                Err(err) => tracing::warn!(path = %path.display(), error = %err, "Could not delete source file"),
            }
        }
        Ok(outcome)
    }
}

impl std::fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncContext")
            .field("orchestrator", &self.orchestrator)
            .field("sentinel", &self.sentinel)
            .field("concurrency", &self.concurrency)
            .field("delete_source", &self.delete_source)
            .finish_non_exhaustive()
    }
}

/// Streams [`SyncEvent`]s while syncing every feed item updated after the
/// sentinel, oldest first.
///
/// Up to the configured concurrency, items are processed at the same time;
/// further items are started in feed order as earlier ones finish.
/// Individual item failures are surfaced as `Err` items without terminating
/// the stream. Once all items have finished, the sentinel is advanced past
/// every item that synced, up to the first that did not.
pub fn run(ctx: &SyncContext, cancel: CancellationToken) -> impl Stream<Item = Result<SyncEvent>> + '_ {
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        yield Ok(SyncEvent::Started);

        let checkpoint = match &ctx.sentinel {
            Some(sentinel) => match sentinel.load().await {
                Ok(checkpoint) => checkpoint,
                Err(e) => {
                    yield Err(e);
                    return;
                },
            },
            None => None,
        };
        let mut items = match ctx.feed.items(&cancel).await {
            Ok(items) => items,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        items.retain(|item| checkpoint.is_none_or(|checkpoint| item.updated > checkpoint));
        items.sort_by_key(|item| item.updated);
        tracing::info!(items = items.len(), ?checkpoint, "Discovered feed items");
        // Infallible: a usize (either 32- or 64-bit) will always fit in a u64.
        yield Ok(SyncEvent::DiscoveryComplete(u64::try_from(items.len()).unwrap_or(0)));

        let mut pending: VecDeque<FeedItem> = items.into();
        let mut processing = FuturesUnordered::new();
        let mut results = Vec::new();
        if !cancel.is_cancelled() {
            while processing.len() < ctx.concurrency {
                let Some(item) = pending.pop_front() else { break };
                processing.push(ctx.sync_item(item, &cancel));
            }
        }
        while let Some((item, result)) = processing.next().await {
            results.push((item.updated, matches!(result, Ok(Outcome::Synced(_)))));
            yield result.map(|outcome| SyncEvent::Synced(item, outcome));
            // Pop-n-push, but FIFO instead of LIFO.
            if !cancel.is_cancelled()
                && let Some(next) = pending.pop_front()
            {
                processing.push(ctx.sync_item(next, &cancel));
            }
        }
        // Never started, so never synced.
        results.extend(pending.iter().map(|item| (item.updated, false)));

        if let Some(sentinel) = &ctx.sentinel {
            let advanced = sentinel::advance(checkpoint, &results);
            if let Some(advanced) = advanced.filter(|a| Some(*a) != checkpoint) {
                if let Err(e) = sentinel.store(advanced).await {
                    yield Err(e);
                }
            }
        }

        if cancel.is_cancelled() {
            tracing::info!("Feed run cancelled");
            return;
        }
        yield Ok(SyncEvent::Complete);
    })
}

/// Collects a whole run. Errors that end the stream are returned; per-item
/// failures are only counted.
pub async fn run_to_completion(ctx: &SyncContext, cancel: CancellationToken) -> Result<Summary> {
    let mut summary = Summary::default();
    let mut discovered = false;
    let events = run(ctx, cancel);
    let mut events = std::pin::pin!(events);
    while let Some(event) = events.next().await {
        match event {
            Ok(SyncEvent::Started) => {},
            Ok(SyncEvent::DiscoveryComplete(total)) => {
                summary.discovered = total;
                discovered = true;
            },
            Ok(SyncEvent::Synced(_, Outcome::Synced(_))) => summary.synced += 1,
            Ok(SyncEvent::Synced(_, Outcome::Unresolved(_))) => summary.unresolved += 1,
            Ok(SyncEvent::Complete) => summary.complete = true,
            // Before discovery, or after every item has been reported.
            Err(err) if !discovered || summary.processed() == summary.discovered => return Err(err),
            Err(_) => summary.failed += 1,
        }
    }
    Ok(summary)
}

/// Totals for one feed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub discovered: u64,
    pub synced: u64,
    pub unresolved: u64,
    pub failed: u64,
    /// Whether the run finished rather than being cancelled.
    pub complete: bool,
}
impl Summary {
    pub fn processed(&self) -> u64 {
        self.synced + self.unresolved + self.failed
    }
}
