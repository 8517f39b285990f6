//! Translation capability
//!
//! Two kinds of translation happen during a resync:
//!
//! - text goes through a [`MachineTranslator`] (Google Translate, mock, ...)
//! - references to other items or terms go through a [`ReferenceResolver`],
//!   which maps an id to the id of its sibling in the target language
//!
//! # Example
//!
//! ```ignore
//! use transync_mt::{MachineTranslator, GoogleTranslateProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = GoogleTranslateProvider::from_env()?;
//!     let fr = "fr".parse()?;
//!
//!     let result = provider.translate("Hello, world!", Some(&"en".parse()?), &fr).await?;
//!     println!("{}", result); // "Bonjour, le monde!"
//!
//!     Ok(())
//! }
//! ```

use crate::error::MtResult;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use transync::{ItemId, LanguageRegistry, LanguageTag, TermId};

/// Generic trait for machine translation providers
///
/// All methods are async to support I/O-bound operations like network requests.
#[async_trait]
pub trait MachineTranslator: Send + Sync {
    /// Translate a single text string into `target`
    ///
    /// With no `source`, the provider detects the source language itself.
    async fn translate(
        &self,
        text: &str,
        source: Option<&LanguageTag>,
        target: &LanguageTag,
    ) -> MtResult<String>;

    /// Translate multiple strings in a single batch operation
    ///
    /// # Guarantees
    ///
    /// - Output order matches input order
    /// - Output length equals input length
    async fn translate_batch(
        &self,
        texts: &[String],
        source: Option<&LanguageTag>,
        target: &LanguageTag,
    ) -> MtResult<Vec<String>>;

    /// Used for logging to identify which provider handled a translation.
    fn provider_name(&self) -> &str;
}

/// What a reference field points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    /// Another content item (relationship, post object, page link)
    Item,
    /// A taxonomy term
    Term,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceKind::Item => write!(f, "item"),
            ReferenceKind::Term => write!(f, "term"),
        }
    }
}

/// Maps a referenced id to the equivalent id in another language
#[async_trait]
pub trait ReferenceResolver: Send + Sync {
    /// `Ok(None)` when the referenced item has no sibling in `target`.
    async fn resolve(
        &self,
        kind: ReferenceKind,
        id: u64,
        target: &LanguageTag,
    ) -> MtResult<Option<u64>>;
}

/// Resolves references through a [`LanguageRegistry`]
pub struct RegistryResolver<R: ?Sized> {
    registry: Arc<R>,
}

impl<R: LanguageRegistry + ?Sized> RegistryResolver<R> {
    pub fn new(registry: Arc<R>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl<R: LanguageRegistry + ?Sized> ReferenceResolver for RegistryResolver<R> {
    async fn resolve(
        &self,
        kind: ReferenceKind,
        id: u64,
        target: &LanguageTag,
    ) -> MtResult<Option<u64>> {
        Ok(match kind {
            ReferenceKind::Item => self.registry.sibling(ItemId(id), target)?.map(|id| id.0),
            ReferenceKind::Term => self.registry.term_sibling(TermId(id), target)?.map(|id| id.0),
        })
    }
}
