//! Change tracking pipeline
//!
//! Connects a save event to the ledger: change detection first, then
//! classification, then flagging. Only `translate` fields with a material
//! change on a source item ever reach the ledger.

use crate::classifier::FieldClassifier;
use crate::detector::is_material_change;
use crate::field::{Classification, FieldCategory, FieldRef, FieldSnapshot};
use crate::language::ItemId;
use crate::ledger::Ledger;
use crate::store::{ContentStore, FieldMetadataSource, LanguageRegistry, StoreResult};
use crate::value::FieldValue;
use std::collections::BTreeSet;
use tracing::{debug, trace, warn};

/// Result of an explicit request to flag a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagOutcome {
    Flagged,
    UnknownItem,
    /// `item` is a translation; the record belongs to `source`
    NotSource { source: ItemId },
    NotTranslatable(Classification),
}

pub struct ChangeTracker<'a, S: ?Sized, R: ?Sized, M: ?Sized> {
    store: &'a S,
    registry: &'a R,
    metadata: &'a M,
}

impl<'a, S, R, M> ChangeTracker<'a, S, R, M>
where
    S: ContentStore + ?Sized,
    R: LanguageRegistry + ?Sized,
    M: FieldMetadataSource + ?Sized,
{
    pub fn new(store: &'a S, registry: &'a R, metadata: &'a M) -> Self {
        Self {
            store,
            registry,
            metadata,
        }
    }

    pub fn ledger(&self) -> Ledger<'a, S> {
        Ledger::new(self.store)
    }

    /// Record one field change on `item`. Returns whether the field was flagged.
    ///
    /// Changes on items that are not the source of their group are ignored:
    /// the pending record only ever lives on the source.
    pub fn track_change(
        &self,
        item: ItemId,
        field: &FieldRef,
        old: Option<&FieldValue>,
        new: Option<&FieldValue>,
    ) -> StoreResult<bool> {
        if !self.registry.is_source(item)? {
            trace!(%item, %field, "not a source item, change not tracked");
            return Ok(false);
        }

        if !is_material_change(old, new) {
            return Ok(false);
        }

        let classification = self.classify(item, field);
        if classification != Classification::Translate {
            trace!(%item, %field, ?classification, "field not translatable, change not tracked");
            return Ok(false);
        }

        self.ledger().flag(item, field)?;
        Ok(true)
    }

    /// Flag `field` on `item` without a value change, after the same source
    /// and classification checks a tracked change goes through.
    pub fn flag_field(&self, item: ItemId, field: &FieldRef) -> StoreResult<FlagOutcome> {
        let source = match self.registry.source_of(item)? {
            Some(source) => source,
            None => return Ok(FlagOutcome::UnknownItem),
        };
        if source != item {
            warn!(%item, %source, %field, "refusing to flag a translation");
            return Ok(FlagOutcome::NotSource { source });
        }

        let classification = self.classify(item, field);
        if classification != Classification::Translate {
            warn!(%item, %field, ?classification, "refusing to flag untranslatable field");
            return Ok(FlagOutcome::NotTranslatable(classification));
        }

        self.ledger().flag(item, field)?;
        Ok(FlagOutcome::Flagged)
    }

    fn classify(&self, item: ItemId, field: &FieldRef) -> Classification {
        FieldClassifier::new(self.store, self.metadata).classify(item, field)
    }

    /// Record every field change of a whole save, given the values before and after.
    ///
    /// A field missing from one snapshot counts as absent. Returns the fields
    /// that were flagged.
    pub fn track_update(
        &self,
        item: ItemId,
        old: &FieldSnapshot,
        new: &FieldSnapshot,
    ) -> StoreResult<Vec<FieldRef>> {
        let fields: BTreeSet<&FieldRef> = old.keys().chain(new.keys()).collect();
        let mut flagged = Vec::new();
        for field in fields {
            if self.track_change(item, field, old.get(field), new.get(field))? {
                flagged.push(field.clone());
            }
        }
        if !flagged.is_empty() {
            debug!(%item, count = flagged.len(), "tracked changed fields");
        }
        Ok(flagged)
    }

    /// Fields needing a resync for whichever group `item` belongs to.
    ///
    /// Works for target items too, by reading the record of their source.
    pub fn pending_for_item(
        &self,
        item: ItemId,
        category: Option<FieldCategory>,
    ) -> StoreResult<BTreeSet<FieldRef>> {
        match self.registry.source_of(item)? {
            Some(source) => self.ledger().pending(source, category),
            None => Ok(BTreeSet::new()),
        }
    }
}
