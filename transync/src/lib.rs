//! Pending-translation tracking for multilingual content
//!
//! When the source-language version of a content item changes, its
//! translations go stale. This crate keeps track of which fields went stale,
//! so a reconciler (see the `transync-mt` crate) can resync exactly those.
//!
//! # Overview
//!
//! 1. **Change Detector** - decides whether an old/new value pair is a material change
//! 2. **Field Classifier** - resolves a field's `translate | copy | ignore` disposition
//! 3. **Ledger** - per-source-item record of fields awaiting resync
//! 4. **Change Tracker** - wires the three together for save events
//!
//! Content, language groups and field configuration are owned elsewhere and
//! reached through the traits in [`store`].
//!
//! # Example
//!
//! ```ignore
//! use transync::{ChangeTracker, FieldRef, MemoryStore, StaticFieldMetadata};
//!
//! let store = MemoryStore::new();
//! let post = store.insert_source(&"en".parse()?);
//! let metadata = StaticFieldMetadata::with_content_defaults();
//!
//! let tracker = ChangeTracker::new(&store, &store, &metadata);
//! let (old, new) = ("Hello".into(), "Hello World".into());
//! tracker.track_change(post, &FieldRef::title(), Some(&old), Some(&new))?;
//!
//! assert!(tracker.ledger().is_pending(post, &FieldRef::title())?);
//! ```

pub mod classifier;
pub mod detector;
pub mod field;
pub mod language;
pub mod ledger;
pub mod memory;
pub mod metadata;
pub mod sqlite;
pub mod store;
pub mod tracker;
pub mod value;

pub use classifier::FieldClassifier;
pub use detector::is_material_change;
pub use field::{BuiltinField, Classification, ContentItem, FieldCategory, FieldRef, FieldSnapshot};
pub use language::{ItemId, LanguageTag, LanguageTagError, TermId};
pub use ledger::Ledger;
pub use memory::MemoryStore;
pub use metadata::{FieldSpec, StaticFieldMetadata};
pub use sqlite::SqliteStore;
pub use store::{ContentStore, FieldMetadataSource, LanguageRegistry, StoreError, StoreResult};
pub use tracker::{ChangeTracker, FlagOutcome};
pub use value::FieldValue;
