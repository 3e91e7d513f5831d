//! Direct access to a calibre library's `metadata.db`.
//!
//! Everything else about a book is changed through the command-line tool.
//! The one exception is `books.last_modified`, which the tool offers no way
//! to set. Writing it directly is complicated by `books_update_trg`, which
//! calls a SQL function (`title_sort`) that only exists inside the catalog
//! application; any `UPDATE` on `books` from outside fails while the trigger
//! is in place.

mod db;
pub mod error;
mod timestamp;

pub use crate::db::{CatalogDatabase, METADATA_FILE};
pub use crate::timestamp::needs_correction;
