//! In-process content store and language registry

use crate::field::{ContentItem, FieldRef};
use crate::language::{ItemId, LanguageTag, TermId};
use crate::store::{ContentStore, LanguageRegistry, StoreError, StoreResult};
use crate::value::FieldValue;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    items: BTreeMap<ItemId, ContentItem>,
    fields: HashMap<(ItemId, FieldRef), FieldValue>,
    blobs: HashMap<(ItemId, String), Vec<u8>>,
    /// term -> (language, group)
    terms: HashMap<TermId, (LanguageTag, u64)>,
    unavailable: bool,
}

impl Inner {
    fn check(&self) -> StoreResult<()> {
        if self.unavailable {
            return Err(StoreError::Unavailable("memory store switched off".to_string()));
        }
        Ok(())
    }

    fn require(&self, id: ItemId) -> StoreResult<&ContentItem> {
        self.items.get(&id).ok_or(StoreError::UnknownItem(id))
    }

    fn allocate(&mut self) -> ItemId {
        self.next_id += 1;
        ItemId(self.next_id)
    }
}

/// A [`ContentStore`] and [`LanguageRegistry`] kept in memory
///
/// Useful for tests and for embedding the tracker in front of a store that
/// is loaded wholesale.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new source item, starting a new translation group
    pub fn insert_source(&self, language: &LanguageTag) -> ItemId {
        let mut inner = self.inner.lock();
        let id = inner.allocate();
        inner.items.insert(
            id,
            ContentItem {
                id,
                language: language.clone(),
                source: id,
            },
        );
        id
    }

    /// Add a translation of `source`, replacing nothing: an existing sibling in
    /// `language` is returned as-is.
    pub fn insert_translation(
        &self,
        source: ItemId,
        language: &LanguageTag,
    ) -> StoreResult<ItemId> {
        self.link_translation(source, language)
    }

    /// Register a taxonomy term as a member of term group `group`
    pub fn insert_term(&self, term: TermId, language: &LanguageTag, group: u64) {
        self.inner.lock().terms.insert(term, (language.clone(), group));
    }

    /// Make every subsequent call fail with [`StoreError::Unavailable`]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.lock().unavailable = unavailable;
    }

    pub fn blob_exists(&self, id: ItemId, key: &str) -> bool {
        self.inner.lock().blobs.contains_key(&(id, key.to_string()))
    }
}

impl ContentStore for MemoryStore {
    fn item(&self, id: ItemId) -> StoreResult<Option<ContentItem>> {
        let inner = self.inner.lock();
        inner.check()?;
        Ok(inner.items.get(&id).cloned())
    }

    fn field(&self, id: ItemId, field: &FieldRef) -> StoreResult<Option<FieldValue>> {
        let inner = self.inner.lock();
        inner.check()?;
        Ok(inner.fields.get(&(id, field.clone())).cloned())
    }

    fn set_field(&self, id: ItemId, field: &FieldRef, value: FieldValue) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner.check()?;
        inner.require(id)?;
        inner.fields.insert((id, field.clone()), value);
        Ok(())
    }

    fn delete_field(&self, id: ItemId, field: &FieldRef) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner.check()?;
        inner.require(id)?;
        inner.fields.remove(&(id, field.clone()));
        Ok(())
    }

    fn blob(&self, id: ItemId, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let inner = self.inner.lock();
        inner.check()?;
        Ok(inner.blobs.get(&(id, key.to_string())).cloned())
    }

    fn set_blob(&self, id: ItemId, key: &str, blob: &[u8]) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner.check()?;
        inner.require(id)?;
        inner.blobs.insert((id, key.to_string()), blob.to_vec());
        Ok(())
    }

    fn delete_blob(&self, id: ItemId, key: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner.check()?;
        inner.blobs.remove(&(id, key.to_string()));
        Ok(())
    }
}

impl LanguageRegistry for MemoryStore {
    fn language_of(&self, id: ItemId) -> StoreResult<Option<LanguageTag>> {
        let inner = self.inner.lock();
        inner.check()?;
        Ok(inner.items.get(&id).map(|item| item.language.clone()))
    }

    fn source_of(&self, id: ItemId) -> StoreResult<Option<ItemId>> {
        let inner = self.inner.lock();
        inner.check()?;
        Ok(inner.items.get(&id).map(|item| item.source))
    }

    fn sibling(&self, id: ItemId, language: &LanguageTag) -> StoreResult<Option<ItemId>> {
        let inner = self.inner.lock();
        inner.check()?;
        let Some(item) = inner.items.get(&id) else {
            return Ok(None);
        };
        Ok(inner
            .items
            .values()
            .find(|other| other.source == item.source && &other.language == language)
            .map(|other| other.id))
    }

    fn translations(&self, id: ItemId) -> StoreResult<Vec<(LanguageTag, ItemId)>> {
        let inner = self.inner.lock();
        inner.check()?;
        let Some(item) = inner.items.get(&id) else {
            return Ok(Vec::new());
        };
        Ok(inner
            .items
            .values()
            .filter(|other| other.source == item.source && other.id != id)
            .map(|other| (other.language.clone(), other.id))
            .collect())
    }

    fn link_translation(&self, source: ItemId, language: &LanguageTag) -> StoreResult<ItemId> {
        let mut inner = self.inner.lock();
        inner.check()?;
        let group = inner.require(source)?.source;

        if let Some(existing) = inner
            .items
            .values()
            .find(|other| other.source == group && &other.language == language)
        {
            return Ok(existing.id);
        }

        let id = inner.allocate();
        inner.items.insert(
            id,
            ContentItem {
                id,
                language: language.clone(),
                source: group,
            },
        );
        Ok(id)
    }

    fn term_sibling(&self, term: TermId, language: &LanguageTag) -> StoreResult<Option<TermId>> {
        let inner = self.inner.lock();
        inner.check()?;
        let Some((_, group)) = inner.terms.get(&term) else {
            return Ok(None);
        };
        Ok(inner
            .terms
            .iter()
            .find(|(_, (lang, other_group))| other_group == group && lang == language)
            .map(|(id, _)| *id))
    }
}
