//! Pending-update ledger
//!
//! The ledger remembers, per source item, which fields have translations that
//! no longer match the source. It lives in one JSON blob on the source item:
//!
//! ```json
//! { "content": { "title": true }, "keyed": { "hero_caption": true } }
//! ```
//!
//! The blob is absent when nothing is pending. Clearing the last entry deletes
//! the blob and stamps the item with a last-synced time.
//!
//! Every write is a read-modify-write of the whole blob. Two writers touching
//! the same item concurrently can lose each other's updates; callers that need
//! more must serialize access themselves.
//!
//! The ledger trusts its callers on classification: it never checks that a
//! flagged field is classified `translate`. See [`crate::tracker::ChangeTracker`]
//! for the pipeline that enforces it.

use crate::field::{BuiltinField, FieldCategory, FieldRef};
use crate::language::ItemId;
use crate::store::{ContentStore, StoreError, StoreResult};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

pub const PENDING_KEY: &str = "_transync_pending";
pub const LAST_SYNCED_KEY: &str = "_transync_last_synced";

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct PendingRecord {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    content: BTreeMap<String, bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    keyed: BTreeMap<String, bool>,
}

impl PendingRecord {
    fn entries(&self, category: FieldCategory) -> &BTreeMap<String, bool> {
        match category {
            FieldCategory::Content => &self.content,
            FieldCategory::Keyed => &self.keyed,
        }
    }

    fn entries_mut(&mut self, category: FieldCategory) -> &mut BTreeMap<String, bool> {
        match category {
            FieldCategory::Content => &mut self.content,
            FieldCategory::Keyed => &mut self.keyed,
        }
    }

    fn is_empty(&self) -> bool {
        !self.content.values().chain(self.keyed.values()).any(|flag| *flag)
    }

    fn fields(&self, item: ItemId, category: Option<FieldCategory>) -> BTreeSet<FieldRef> {
        let mut fields = BTreeSet::new();
        if category.is_none_or(|c| c == FieldCategory::Content) {
            for key in flagged(&self.content) {
                match key.parse::<BuiltinField>() {
                    Ok(builtin) => {
                        fields.insert(FieldRef::content(builtin));
                    }
                    Err(_) => warn!(%item, key, "ignoring unknown content field in pending record"),
                }
            }
        }
        if category.is_none_or(|c| c == FieldCategory::Keyed) {
            fields.extend(flagged(&self.keyed).map(FieldRef::keyed));
        }
        fields
    }
}

fn flagged(entries: &BTreeMap<String, bool>) -> impl Iterator<Item = &str> {
    entries
        .iter()
        .filter(|(_, flag)| **flag)
        .map(|(key, _)| key.as_str())
}

pub struct Ledger<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: ContentStore + ?Sized> Ledger<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Mark `field` on `source` as needing a resync.
    ///
    /// Flagging an already pending field changes nothing. An unknown `source`
    /// is silently ignored.
    pub fn flag(&self, source: ItemId, field: &FieldRef) -> StoreResult<()> {
        if field.category == FieldCategory::Content && field.builtin().is_none() {
            warn!(%source, %field, "not flagging unknown content field");
            return Ok(());
        }
        if self.store.item(source)?.is_none() {
            debug!(%source, %field, "not flagging field of unknown item");
            return Ok(());
        }

        let mut record = self.load(source)?.unwrap_or_default();
        let entries = record.entries_mut(field.category);
        if entries.get(&field.key) == Some(&true) {
            return Ok(());
        }
        entries.insert(field.key.clone(), true);
        self.save(source, &record)?;
        debug!(%source, %field, "flagged field as pending");
        Ok(())
    }

    /// Fields of `source` awaiting resync, optionally limited to one category
    pub fn pending(
        &self,
        source: ItemId,
        category: Option<FieldCategory>,
    ) -> StoreResult<BTreeSet<FieldRef>> {
        Ok(self
            .load(source)?
            .map(|record| record.fields(source, category))
            .unwrap_or_default())
    }

    pub fn is_pending(&self, source: ItemId, field: &FieldRef) -> StoreResult<bool> {
        Ok(self
            .load(source)?
            .is_some_and(|record| record.entries(field.category).get(&field.key) == Some(&true)))
    }

    /// Mark `field` (or every field, when `None`) as resynced.
    ///
    /// Once no entries remain the record is deleted, then the last-synced
    /// time is written. Clearing an item with no record does nothing.
    pub fn clear(&self, source: ItemId, field: Option<&FieldRef>) -> StoreResult<()> {
        let Some(mut record) = self.load(source)? else {
            return Ok(());
        };

        match field {
            Some(field) => {
                if record.entries_mut(field.category).remove(&field.key).is_none() {
                    return Ok(());
                }
                debug!(%source, %field, "cleared pending field");
            }
            None => record = PendingRecord::default(),
        }

        if record.is_empty() {
            self.store.delete_blob(source, PENDING_KEY)?;
            self.store
                .set_blob(source, LAST_SYNCED_KEY, now_rfc3339().as_bytes())?;
            info!(%source, "all pending fields synced");
        } else {
            self.save(source, &record)?;
        }
        Ok(())
    }

    /// When the last pending field of `source` was cleared
    pub fn last_synced(&self, source: ItemId) -> StoreResult<Option<DateTime<Utc>>> {
        let Some(raw) = self.store.blob(source, LAST_SYNCED_KEY)? else {
            return Ok(None);
        };
        let text = String::from_utf8_lossy(&raw);
        DateTime::parse_from_rfc3339(&text)
            .map(|time| Some(time.with_timezone(&Utc)))
            .map_err(|e| StoreError::Corrupt {
                item: source,
                key: LAST_SYNCED_KEY.to_string(),
                reason: e.to_string(),
            })
    }

    /// Whether a pending record currently exists for `source`
    pub fn has_record(&self, source: ItemId) -> StoreResult<bool> {
        Ok(self.store.blob(source, PENDING_KEY)?.is_some())
    }

    fn load(&self, source: ItemId) -> StoreResult<Option<PendingRecord>> {
        let Some(raw) = self.store.blob(source, PENDING_KEY)? else {
            return Ok(None);
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                item: source,
                key: PENDING_KEY.to_string(),
                reason: e.to_string(),
            })
    }

    fn save(&self, source: ItemId, record: &PendingRecord) -> StoreResult<()> {
        let raw = serde_json::to_vec(record)?;
        self.store.set_blob(source, PENDING_KEY, &raw)
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
