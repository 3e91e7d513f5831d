mod category;
mod entry;
mod field;
mod row;
mod state;

pub use self::category::{Category, CategoryKind};
pub use self::entry::CatalogEntry;
pub(crate) use self::entry::ENTRY_FIELDS;
pub use self::field::{FieldUpdate, fields};
pub use self::row::Row;
pub use self::state::{BookState, Columns};
