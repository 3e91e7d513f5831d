//! Reassembly of the catalog tool's line-oriented output into records.
//!
//! Both parsers are fed one physical stdout line at a time (without its
//! terminator) and are agnostic of where the lines come from.

mod csv;
mod json;

pub use self::csv::{CsvReassembler, Record};
pub use self::json::JsonCollector;
