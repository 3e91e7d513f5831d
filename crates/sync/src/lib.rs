//! Keeps a calibre catalog in step with a collection of e-book files.
//!
//! For each book file, the [`Orchestrator`] finds the matching catalog entry
//! by identifier (adding the book or attaching the file's format when
//! needed), replaces the stored file if it differs from the source,
//! reconciles metadata field by field, and finally corrects the entry's
//! last-modified time. [`run`] drives that over every item a [`Feed`] has
//! announced since the last run.

pub(crate) mod consts;
pub mod description;
pub mod error;
pub mod orchestrate;
pub mod reconcile;
pub mod replace;
pub mod run;
pub mod sentinel;
pub mod series;
pub mod source;
pub mod tags;

pub use crate::description::{Link, LinkRewriter};
pub use crate::orchestrate::{Orchestrator, Outcome, Report, Resolution};
pub use crate::reconcile::Reconciler;
pub use crate::replace::{Mismatch, Replacement};
pub use crate::run::{Summary, SyncContext, SyncEvent, run, run_to_completion};
pub use crate::sentinel::Sentinel;
pub use crate::source::{DirectoryFeed, Downloader, Feed, FeedItem, MetadataReader};
