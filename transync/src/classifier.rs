//! Field classification
//!
//! Classification is a lookup against field metadata the tracker does not
//! own. Anything that cannot be resolved (an empty key, an unknown item, an
//! undeclared field, a storage hiccup while checking the item) degrades to
//! [`Classification::Copy`]: not tracked for translation, but not discarded.

use crate::field::{Classification, FieldRef};
use crate::language::ItemId;
use crate::store::{ContentStore, FieldMetadataSource};
use tracing::{trace, warn};

pub const DEFAULT_CLASSIFICATION: Classification = Classification::Copy;

pub struct FieldClassifier<'a, S: ?Sized, M: ?Sized> {
    store: &'a S,
    metadata: &'a M,
}

impl<'a, S, M> FieldClassifier<'a, S, M>
where
    S: ContentStore + ?Sized,
    M: FieldMetadataSource + ?Sized,
{
    pub fn new(store: &'a S, metadata: &'a M) -> Self {
        Self { store, metadata }
    }

    pub fn classify(&self, item: ItemId, field: &FieldRef) -> Classification {
        if field.key.is_empty() {
            return DEFAULT_CLASSIFICATION;
        }

        match self.store.item(item) {
            Ok(Some(_)) => {}
            Ok(None) => {
                trace!(%item, %field, "item not found, using default classification");
                return DEFAULT_CLASSIFICATION;
            }
            Err(e) => {
                warn!(
                    %item,
                    %field,
                    error = %e,
                    "item lookup failed, using default classification"
                );
                return DEFAULT_CLASSIFICATION;
            }
        }

        let classification = self
            .metadata
            .classification(item, field)
            .unwrap_or(DEFAULT_CLASSIFICATION);
        trace!(%item, %field, ?classification, "classified field");
        classification
    }
}
