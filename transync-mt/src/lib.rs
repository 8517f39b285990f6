//! Machine translation and reconciliation for transync
//!
//! This crate resyncs the fields `transync` has flagged as pending into the
//! target-language versions of a content item.
//!
//! # Architecture
//!
//! 1. **Translation** - [`MachineTranslator`] for text, [`ReferenceResolver`]
//!    for ids of related items and terms
//! 2. **Handlers** - a [`HandlerRegistry`] picks the strategy per field type
//! 3. **Reconciler** - walks pending fields × target languages, writes the
//!    results and clears the ledger
//! 4. **Report** - per-target, per-field outcome of a run
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use transync::{MemoryStore, StaticFieldMetadata};
//! use transync_mt::{HandlerRegistry, MockMode, MockTranslator, Reconciler, RegistryResolver};
//!
//! let store = Arc::new(MemoryStore::new());
//! let metadata = StaticFieldMetadata::with_content_defaults();
//! let handlers = HandlerRegistry::with_defaults(
//!     Arc::new(MockTranslator::new(MockMode::Suffix)),
//!     Arc::new(RegistryResolver::new(store.clone())),
//! );
//!
//! let reconciler = Reconciler::new(&*store, &*store, &metadata, &handlers);
//! let report = reconciler.reconcile(post, &["de".parse()?, "fr".parse()?]).await?;
//! println!("{}", report);
//! ```

pub mod config;
pub mod error;
pub mod google_translate;
pub mod handler;
pub mod mock;
pub mod reconciler;
pub mod report;
pub mod translator;

#[cfg(test)]
mod integration_tests;

pub use config::{ConfigError, SyncConfig};
pub use error::{MtError, MtResult};
pub use google_translate::GoogleTranslateProvider;
pub use handler::{
    CopyHandler, FieldAction, FieldHandler, FieldJob, HandlerRegistry, ReferenceHandler,
    TextHandler,
};
pub use mock::{MockMode, MockTranslator};
pub use reconciler::{ClearPolicy, ReconcileError, Reconciler, ReconcilerOptions};
pub use report::{FieldOutcome, FieldStatus, ReconcileReport, TargetReport};
pub use translator::{MachineTranslator, ReferenceKind, ReferenceResolver, RegistryResolver};
