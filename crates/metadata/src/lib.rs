//! Source-side book metadata.
//!
//! These are the types produced by the (external) e-book container parser and
//! consumed by the catalog synchronization engine. Nothing here talks to the
//! catalog; the only shared vocabulary between both sides is [`Identifier`].

pub mod error;
pub mod models;

pub use crate::models::{Collection, CollectionKind, Cover, Identifier, SourceFile, SourceMetadata};
