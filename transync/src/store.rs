//! Collaborator interfaces
//!
//! The tracker never owns content, language groups or field configuration.
//! It talks to them through these traits:
//!
//! - [`ContentStore`] - item fields and opaque per-item blobs
//! - [`LanguageRegistry`] - languages, source items and translation siblings
//! - [`FieldMetadataSource`] - declared field types and classifications
//!
//! [`crate::memory::MemoryStore`] and [`crate::sqlite::SqliteStore`] implement
//! the first two; [`crate::metadata::StaticFieldMetadata`] implements the third.

use crate::field::{Classification, ContentItem, FieldRef};
use crate::language::{ItemId, LanguageTag, TermId};
use crate::value::FieldValue;

/// Errors raised by the storage layer
///
/// These are the only failures the tracker treats as fatal, and only for the
/// operation in progress.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown item {0}")]
    UnknownItem(ItemId),

    #[error("corrupt value for item {item} key '{key}': {reason}")]
    Corrupt {
        item: ItemId,
        key: String,
        reason: String,
    },

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Reads and writes item fields and per-item blobs
///
/// A blob is read and written as a whole; there is no partial update.
pub trait ContentStore: Send + Sync {
    fn item(&self, id: ItemId) -> StoreResult<Option<ContentItem>>;

    fn field(&self, id: ItemId, field: &FieldRef) -> StoreResult<Option<FieldValue>>;

    fn set_field(&self, id: ItemId, field: &FieldRef, value: FieldValue) -> StoreResult<()>;

    fn delete_field(&self, id: ItemId, field: &FieldRef) -> StoreResult<()>;

    fn blob(&self, id: ItemId, key: &str) -> StoreResult<Option<Vec<u8>>>;

    fn set_blob(&self, id: ItemId, key: &str, blob: &[u8]) -> StoreResult<()>;

    fn delete_blob(&self, id: ItemId, key: &str) -> StoreResult<()>;
}

/// Resolves languages and translation groups
pub trait LanguageRegistry: Send + Sync {
    fn language_of(&self, id: ItemId) -> StoreResult<Option<LanguageTag>>;

    /// The source item of `id`'s translation group (`id` itself for a source item)
    fn source_of(&self, id: ItemId) -> StoreResult<Option<ItemId>>;

    fn is_source(&self, id: ItemId) -> StoreResult<bool> {
        Ok(self.source_of(id)? == Some(id))
    }

    /// The item in `id`'s group written in `language`
    fn sibling(&self, id: ItemId, language: &LanguageTag) -> StoreResult<Option<ItemId>>;

    /// Every other-language member of `id`'s group
    fn translations(&self, id: ItemId) -> StoreResult<Vec<(LanguageTag, ItemId)>>;

    /// Resolve the `language` item of `source`'s group, creating an empty one
    /// when it does not exist yet.
    fn link_translation(&self, source: ItemId, language: &LanguageTag) -> StoreResult<ItemId>;

    /// The term in `term`'s group written in `language`
    fn term_sibling(&self, term: TermId, language: &LanguageTag) -> StoreResult<Option<TermId>>;
}

/// Field configuration owned by someone else (a field-group plugin, a config file)
///
/// Both lookups answer `None` when nothing is known; callers decide the default.
pub trait FieldMetadataSource: Send + Sync {
    /// Declared type tag, e.g. `"text"`, `"wysiwyg"`, `"relationship"`, `"taxonomy"`
    fn field_type(&self, item: ItemId, field: &FieldRef) -> Option<String>;

    fn classification(&self, item: ItemId, field: &FieldRef) -> Option<Classification>;
}
