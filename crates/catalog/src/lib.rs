//! Client for a calibre catalog driven through its `calibredb` command-line
//! tool.
//!
//! [`ProcessChannel`] runs the tool and streams its output line by line.
//! [`records`] turns that output into lazy record streams, and [`Catalog`]
//! wraps the whole thing in typed queries and mutations.

mod catalog;
pub mod command;
mod discover;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod models;
pub mod parse;
pub mod process;
pub mod records;
pub mod search;

pub use crate::catalog::{Catalog, ListQuery, NewBook};
pub use crate::command::{CommandLine, Location};
pub use crate::discover::discover;
pub use crate::models::{BookState, CatalogEntry, Category, CategoryKind, Columns, FieldUpdate, Row, fields};
pub use crate::process::{Completion, Credentials, ProcessChannel, Runner, SystemRunner};
