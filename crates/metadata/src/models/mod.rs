mod collection;
mod cover;
mod identifier;
mod metadata;

pub use self::collection::{Collection, CollectionKind};
pub use self::cover::Cover;
pub use self::identifier::Identifier;
pub use self::metadata::{SourceFile, SourceMetadata};
