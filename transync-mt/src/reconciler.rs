//! Sync Reconciler
//!
//! Drives the resync of a source item's pending fields into a set of target
//! languages:
//!
//! 1. Resolve (or create) the target item for each language
//! 2. For each pending field, produce the target value through the handler
//!    registered for the field's type, or delete the target field when the
//!    source value is empty
//! 3. Clear fields from the ledger once the [`ClearPolicy`] is satisfied
//!
//! Targets and fields are processed one at a time, in order, to stay within
//! provider rate limits. A failing field is recorded in the report and the
//! run moves on; only storage failures stop it.

use crate::error::MtError;
use crate::handler::{FieldAction, FieldJob, HandlerRegistry};
use crate::report::{FieldOutcome, ReconcileReport, TargetReport};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use transync::{
    ContentStore, FieldMetadataSource, FieldRef, ItemId, LanguageRegistry, LanguageTag, Ledger,
    StoreError,
};

/// When a resynced field leaves the pending record
///
/// The record tracks fields, not (field, language) pairs, so a field that
/// succeeded for some targets and failed for others must either stay pending
/// for all of them or for none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearPolicy {
    /// Clear once every requested target succeeded in the same run
    #[default]
    AllTargets,
    /// Clear as soon as one target succeeded
    AnyTarget,
}

impl ClearPolicy {
    pub fn satisfied(self, succeeded: usize, total: usize) -> bool {
        match self {
            ClearPolicy::AllTargets => succeeded == total,
            ClearPolicy::AnyTarget => succeeded > 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilerOptions {
    pub clear_policy: ClearPolicy,
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("unknown item {0}")]
    UnknownItem(ItemId),

    #[error("item {item} is a translation of item {source_item}; reconcile the source item")]
    NotSource { item: ItemId, source_item: ItemId },

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Storage failed mid-run. Clears already applied stay applied.
    #[error("reconcile of item {} halted: {error}", .report.source)]
    Halted {
        report: Box<ReconcileReport>,
        #[source]
        error: StoreError,
    },
}

impl ReconcileError {
    fn halted(report: ReconcileReport, error: StoreError) -> Self {
        ReconcileError::Halted {
            report: Box::new(report),
            error,
        }
    }

    /// The partial report of a halted run
    pub fn partial_report(&self) -> Option<&ReconcileReport> {
        match self {
            ReconcileError::Halted { report, .. } => Some(report),
            _ => None,
        }
    }
}

pub struct Reconciler<'a, S: ?Sized, R: ?Sized, M: ?Sized> {
    store: &'a S,
    registry: &'a R,
    metadata: &'a M,
    handlers: &'a HandlerRegistry,
    options: ReconcilerOptions,
}

impl<'a, S, R, M> Reconciler<'a, S, R, M>
where
    S: ContentStore + ?Sized,
    R: LanguageRegistry + ?Sized,
    M: FieldMetadataSource + ?Sized,
{
    pub fn new(
        store: &'a S,
        registry: &'a R,
        metadata: &'a M,
        handlers: &'a HandlerRegistry,
    ) -> Self {
        Self {
            store,
            registry,
            metadata,
            handlers,
            options: ReconcilerOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ReconcilerOptions) -> Self {
        self.options = options;
        self
    }

    /// Resync every pending field of `source` into `targets`
    pub async fn reconcile(
        &self,
        source: ItemId,
        targets: &[LanguageTag],
    ) -> Result<ReconcileReport, ReconcileError> {
        let source_language = self.source_language(source)?;
        let fields: Vec<FieldRef> = Ledger::new(self.store)
            .pending(source, None)?
            .into_iter()
            .collect();
        self.run(source, source_language, fields, targets).await
    }

    /// Resync one field of `source` into `targets`, pending or not
    pub async fn reconcile_field(
        &self,
        source: ItemId,
        field: &FieldRef,
        targets: &[LanguageTag],
    ) -> Result<ReconcileReport, ReconcileError> {
        let source_language = self.source_language(source)?;
        self.run(source, source_language, vec![field.clone()], targets)
            .await
    }

    /// Resync every pending field into every language `source` already has a
    /// translation in
    pub async fn reconcile_all_translations(
        &self,
        source: ItemId,
    ) -> Result<ReconcileReport, ReconcileError> {
        let source_language = self.source_language(source)?;
        let targets: Vec<LanguageTag> = self
            .registry
            .translations(source)?
            .into_iter()
            .map(|(language, _)| language)
            .collect();
        let fields: Vec<FieldRef> = Ledger::new(self.store)
            .pending(source, None)?
            .into_iter()
            .collect();
        self.run(source, source_language, fields, &targets).await
    }

    fn source_language(&self, source: ItemId) -> Result<LanguageTag, ReconcileError> {
        let language = self
            .registry
            .language_of(source)?
            .ok_or(ReconcileError::UnknownItem(source))?;
        match self.registry.source_of(source)? {
            Some(source_item) if source_item != source => Err(ReconcileError::NotSource {
                item: source,
                source_item,
            }),
            _ => Ok(language),
        }
    }

    async fn run(
        &self,
        source: ItemId,
        source_language: LanguageTag,
        fields: Vec<FieldRef>,
        targets: &[LanguageTag],
    ) -> Result<ReconcileReport, ReconcileError> {
        let mut languages: Vec<&LanguageTag> = Vec::new();
        for language in targets {
            if *language == source_language {
                debug!(%source, %language, "skipping source language");
            } else if !languages.contains(&language) {
                languages.push(language);
            }
        }

        let mut report = ReconcileReport::new(source, source_language.clone());
        if fields.is_empty() || languages.is_empty() {
            debug!(%source, "nothing to reconcile");
            return Ok(report);
        }

        info!(
            %source,
            fields = fields.len(),
            targets = languages.len(),
            policy = ?self.options.clear_policy,
            "reconciling pending fields"
        );

        let ledger = Ledger::new(self.store);
        let mut succeeded = vec![0usize; fields.len()];
        let mut cleared = vec![false; fields.len()];

        for language in languages.iter().copied() {
            let target = match self.registry.link_translation(source, language) {
                Ok(target) => target,
                Err(error) => return Err(ReconcileError::halted(report, error)),
            };
            report.targets.push(TargetReport::new(language.clone(), target));
            let slot = report.targets.len() - 1;

            for (index, field) in fields.iter().enumerate() {
                let outcome = match self
                    .sync_field(source, target, field, &source_language, language)
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(MtError::Store(error)) => {
                        warn!(
                            %source,
                            target_item = %target,
                            %field,
                            %error,
                            "storage failure, halting"
                        );
                        return Err(ReconcileError::halted(report, error));
                    }
                    Err(error) => {
                        warn!(%source, %language, %field, %error, "field resync failed");
                        report.targets[slot].record(field, FieldOutcome::Failed(error.to_string()));
                        continue;
                    }
                };
                report.targets[slot].record(field, outcome);
                succeeded[index] += 1;

                if !cleared[index]
                    && self
                        .options
                        .clear_policy
                        .satisfied(succeeded[index], languages.len())
                {
                    cleared[index] = true;
                    match clear_if_pending(&ledger, source, field) {
                        Ok(true) => report.cleared.push(field.clone()),
                        Ok(false) => {}
                        Err(error) => return Err(ReconcileError::halted(report, error)),
                    }
                }
            }
        }

        info!(
            %source,
            failures = report.failures().len(),
            cleared = report.cleared.len(),
            "reconcile finished"
        );
        Ok(report)
    }

    async fn sync_field(
        &self,
        source: ItemId,
        target: ItemId,
        field: &FieldRef,
        source_language: &LanguageTag,
        target_language: &LanguageTag,
    ) -> Result<FieldOutcome, MtError> {
        let value = self.store.field(source, field)?;
        let Some(value) = value.filter(|value| !value.is_empty_state()) else {
            self.store.delete_field(target, field)?;
            debug!(target_item = %target, %field, "empty source value, deleted target field");
            return Ok(FieldOutcome::Deleted);
        };

        let field_type = self.metadata.field_type(source, field);
        let handler = self.handlers.resolve(field_type.as_deref());
        let job = FieldJob {
            source,
            target,
            field,
            value: &value,
            source_language,
            target_language,
        };

        match handler.sync(&job).await? {
            FieldAction::Write(translated) => {
                self.store.set_field(job.target, job.field, translated)?;
                debug!(
                    target_item = %job.target,
                    field = %job.field,
                    handler = handler.name(),
                    "wrote target field"
                );
                Ok(FieldOutcome::Translated)
            }
            FieldAction::Delete => {
                self.store.delete_field(job.target, job.field)?;
                debug!(
                    target_item = %job.target,
                    field = %job.field,
                    handler = handler.name(),
                    "deleted target field"
                );
                Ok(FieldOutcome::Deleted)
            }
        }
    }
}

fn clear_if_pending<S: ContentStore + ?Sized>(
    ledger: &Ledger<'_, S>,
    source: ItemId,
    field: &FieldRef,
) -> Result<bool, StoreError> {
    if !ledger.is_pending(source, field)? {
        return Ok(false);
    }
    ledger.clear(source, Some(field))?;
    Ok(true)
}
