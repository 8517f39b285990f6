//! End-to-end tests: save → track → reconcile → ledger

use crate::handler::{FieldAction, FieldHandler, FieldJob, HandlerRegistry};
use crate::mock::{MockMode, MockTranslator};
use crate::reconciler::{ClearPolicy, ReconcileError, Reconciler, ReconcilerOptions};
use crate::report::FieldOutcome;
use crate::translator::RegistryResolver;
use crate::{MachineTranslator, MtResult};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use transync::{
    ChangeTracker, Classification, ContentStore, FieldCategory, FieldRef, FieldValue, ItemId,
    LanguageRegistry, LanguageTag, Ledger, MemoryStore, SqliteStore, StaticFieldMetadata,
};

fn tag(s: &str) -> LanguageTag {
    s.parse().unwrap()
}

struct Site {
    store: Arc<MemoryStore>,
    metadata: StaticFieldMetadata,
    post: ItemId,
}

impl Site {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let post = store.insert_source(&tag("en"));
        let mut metadata = StaticFieldMetadata::with_content_defaults();
        metadata
            .set_field("related", "relationship", Classification::Translate)
            .set_field("price", "number", Classification::Copy)
            .set_field("internal_note", "textarea", Classification::Ignore);
        Self {
            store,
            metadata,
            post,
        }
    }

    /// Save a new value the way an editor would: track, then write
    fn save(&self, item: ItemId, field: &FieldRef, value: impl Into<FieldValue>) {
        let value = value.into();
        let old = self.store.field(item, field).unwrap();
        ChangeTracker::new(&*self.store, &*self.store, &self.metadata)
            .track_change(item, field, old.as_ref(), Some(&value))
            .unwrap();
        self.store.set_field(item, field, value).unwrap();
    }

    fn handlers(&self, translator: Arc<dyn MachineTranslator>) -> HandlerRegistry {
        let resolver = Arc::new(RegistryResolver::new(self.store.clone()));
        HandlerRegistry::with_defaults(translator, resolver)
    }

    fn reconciler<'a>(
        &'a self,
        handlers: &'a HandlerRegistry,
        policy: ClearPolicy,
    ) -> Reconciler<'a, MemoryStore, MemoryStore, StaticFieldMetadata> {
        Reconciler::new(&*self.store, &*self.store, &self.metadata, handlers).with_options(
            ReconcilerOptions {
                clear_policy: policy,
            },
        )
    }

    fn ledger(&self) -> Ledger<'_, MemoryStore> {
        Ledger::new(&*self.store)
    }

    fn translation(&self, language: &str) -> ItemId {
        self.store.sibling(self.post, &tag(language)).unwrap().unwrap()
    }

    fn target_value(&self, language: &str, field: &FieldRef) -> Option<FieldValue> {
        self.store.field(self.translation(language), field).unwrap()
    }
}

#[tokio::test]
async fn test_single_field_update_resyncs_title() {
    let site = Site::new();
    site.save(site.post, &FieldRef::title(), "Hello");
    site.ledger().clear(site.post, None).unwrap();

    site.save(site.post, &FieldRef::title(), "Hello World");
    assert_eq!(
        site.ledger().pending(site.post, Some(FieldCategory::Content)).unwrap(),
        [FieldRef::title()].into_iter().collect()
    );

    let handlers = site.handlers(Arc::new(MockTranslator::new(MockMode::Suffix)));
    let report = site
        .reconciler(&handlers, ClearPolicy::AllTargets)
        .reconcile(site.post, &[tag("de")])
        .await
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.cleared, vec![FieldRef::title()]);
    assert_eq!(
        site.target_value("de", &FieldRef::title()),
        Some("Hello World_de".into())
    );
    assert!(site.ledger().pending(site.post, None).unwrap().is_empty());
    assert!(site.ledger().last_synced(site.post).unwrap().is_some());
}

fn partial_failure_site() -> (Site, HandlerRegistry) {
    let site = Site::new();
    site.save(site.post, &FieldRef::summary(), "Summary text");
    site.save(site.post, &FieldRef::body(), "Body text");
    let handlers = site.handlers(Arc::new(MockTranslator::failing_for(
        "Body text",
        "fr",
        "quota exceeded",
    )));
    (site, handlers)
}

#[tokio::test]
async fn test_partial_failure_keeps_failed_field_pending() {
    let (site, handlers) = partial_failure_site();
    let report = site
        .reconciler(&handlers, ClearPolicy::AllTargets)
        .reconcile(site.post, &[tag("de"), tag("fr")])
        .await
        .unwrap();

    let (de, fr) = (tag("de"), tag("fr"));
    assert_eq!(report.status(&de, &FieldRef::summary()), Some(&FieldOutcome::Translated));
    assert_eq!(report.status(&fr, &FieldRef::summary()), Some(&FieldOutcome::Translated));
    assert_eq!(report.status(&de, &FieldRef::body()), Some(&FieldOutcome::Translated));
    assert!(matches!(
        report.status(&fr, &FieldRef::body()),
        Some(FieldOutcome::Failed(msg)) if msg.contains("quota exceeded")
    ));
    assert_eq!(report.failures().len(), 1);

    assert_eq!(report.cleared, vec![FieldRef::summary()]);
    assert_eq!(
        site.ledger().pending(site.post, None).unwrap(),
        [FieldRef::body()].into_iter().collect()
    );
    assert_eq!(site.target_value("de", &FieldRef::body()), Some("Body text_de".into()));
    assert_eq!(site.target_value("fr", &FieldRef::body()), None);
    assert!(report.to_string().contains("✗ content:body: Translation error: quota exceeded"));
}

#[tokio::test]
async fn test_partial_failure_with_any_target_policy() {
    let (site, handlers) = partial_failure_site();
    let report = site
        .reconciler(&handlers, ClearPolicy::AnyTarget)
        .reconcile(site.post, &[tag("de"), tag("fr")])
        .await
        .unwrap();

    assert_eq!(report.failures().len(), 1);
    assert_eq!(report.cleared, vec![FieldRef::body(), FieldRef::summary()]);
    assert!(site.ledger().pending(site.post, None).unwrap().is_empty());
    assert!(!site.store.blob_exists(site.post, transync::ledger::PENDING_KEY));
}

#[tokio::test]
async fn test_retry_after_partial_failure() {
    let (site, handlers) = partial_failure_site();
    let targets = [tag("de"), tag("fr")];
    site.reconciler(&handlers, ClearPolicy::AllTargets)
        .reconcile(site.post, &targets)
        .await
        .unwrap();

    let translator = Arc::new(MockTranslator::new(MockMode::Suffix));
    let handlers = site.handlers(translator.clone());
    let report = site
        .reconciler(&handlers, ClearPolicy::AllTargets)
        .reconcile(site.post, &targets)
        .await
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.cleared, vec![FieldRef::body()]);
    assert_eq!(translator.calls(), 2);
    assert_eq!(site.target_value("fr", &FieldRef::body()), Some("Body text_fr".into()));
    assert!(!site.ledger().has_record(site.post).unwrap());
}

#[tokio::test]
async fn test_relationship_field_maps_to_sibling() {
    let site = Site::new();
    let related = site.store.insert_source(&tag("en"));
    let related_de = site.store.insert_translation(related, &tag("de")).unwrap();
    let related_field = FieldRef::keyed("related");

    // fr already holds a stale reference from an earlier sync
    let post_fr = site.store.insert_translation(site.post, &tag("fr")).unwrap();
    site.store
        .set_field(post_fr, &related_field, FieldValue::from(related.0))
        .unwrap();

    site.save(site.post, &related_field, related.0);

    let translator = Arc::new(MockTranslator::new(MockMode::Suffix));
    let handlers = site.handlers(translator.clone());
    let report = site
        .reconciler(&handlers, ClearPolicy::AllTargets)
        .reconcile(site.post, &[tag("de"), tag("fr")])
        .await
        .unwrap();

    assert_eq!(
        site.target_value("de", &related_field),
        Some(FieldValue::from(related_de.0))
    );
    assert_eq!(
        report.status(&tag("fr"), &related_field),
        Some(&FieldOutcome::Deleted)
    );
    assert_eq!(site.store.field(post_fr, &related_field).unwrap(), None);
    assert_eq!(translator.calls(), 0);
    assert!(report.is_complete());
}

#[tokio::test]
async fn test_empty_source_value_deletes_target_without_translation() {
    let site = Site::new();
    site.save(site.post, &FieldRef::summary(), "Short summary");
    let translator = Arc::new(MockTranslator::new(MockMode::Suffix));
    let handlers = site.handlers(translator.clone());
    site.reconciler(&handlers, ClearPolicy::AllTargets)
        .reconcile(site.post, &[tag("de")])
        .await
        .unwrap();
    assert_eq!(translator.calls(), 1);

    site.save(site.post, &FieldRef::summary(), "");
    assert!(site.ledger().is_pending(site.post, &FieldRef::summary()).unwrap());

    let report = site
        .reconciler(&handlers, ClearPolicy::AllTargets)
        .reconcile(site.post, &[tag("de")])
        .await
        .unwrap();

    assert_eq!(translator.calls(), 1);
    assert_eq!(
        report.status(&tag("de"), &FieldRef::summary()),
        Some(&FieldOutcome::Deleted)
    );
    assert_eq!(site.target_value("de", &FieldRef::summary()), None);
    assert!(site.ledger().pending(site.post, None).unwrap().is_empty());
}

#[tokio::test]
async fn test_untranslatable_fields_never_reach_reconciler() {
    let site = Site::new();
    site.save(site.post, &FieldRef::keyed("internal_note"), "do not translate");
    site.save(site.post, &FieldRef::keyed("price"), 42u64);
    site.save(site.post, &FieldRef::keyed("undeclared"), "whatever");
    assert!(!site.ledger().has_record(site.post).unwrap());

    let handlers = site.handlers(Arc::new(MockTranslator::new(MockMode::Suffix)));
    let report = site
        .reconciler(&handlers, ClearPolicy::AllTargets)
        .reconcile(site.post, &[tag("de")])
        .await
        .unwrap();
    assert_eq!(report.field_count(), 0);
    assert!(report.targets.is_empty());
}

#[tokio::test]
async fn test_edits_on_translation_are_not_tracked() {
    let site = Site::new();
    let post_de = site.store.insert_translation(site.post, &tag("de")).unwrap();
    site.save(post_de, &FieldRef::title(), "Hallo");
    assert!(!site.ledger().has_record(site.post).unwrap());
    assert!(!site.ledger().has_record(post_de).unwrap());

    let handlers = site.handlers(Arc::new(MockTranslator::new(MockMode::Suffix)));
    let result = site
        .reconciler(&handlers, ClearPolicy::AllTargets)
        .reconcile(post_de, &[tag("fr")])
        .await;
    assert!(matches!(
        result,
        Err(ReconcileError::NotSource { item, source_item })
            if item == post_de && source_item == site.post
    ));

    let result = site
        .reconciler(&handlers, ClearPolicy::AllTargets)
        .reconcile(ItemId(999), &[tag("fr")])
        .await;
    assert!(matches!(result, Err(ReconcileError::UnknownItem(ItemId(999)))));
}

#[tokio::test]
async fn test_source_language_and_duplicate_targets_skipped() {
    let site = Site::new();
    site.save(site.post, &FieldRef::title(), "Hello");
    let translator = Arc::new(MockTranslator::new(MockMode::Suffix));
    let handlers = site.handlers(translator.clone());

    let report = site
        .reconciler(&handlers, ClearPolicy::AllTargets)
        .reconcile(site.post, &[tag("en"), tag("de"), tag("DE"), tag("en")])
        .await
        .unwrap();

    assert_eq!(report.targets.len(), 1);
    assert_eq!(report.targets[0].language, tag("de"));
    assert_eq!(translator.calls(), 1);
    assert_eq!(site.store.translations(site.post).unwrap().len(), 1);
}

#[tokio::test]
async fn test_reconcile_all_translations_uses_existing_languages() {
    let site = Site::new();
    site.store.insert_translation(site.post, &tag("de")).unwrap();
    site.store.insert_translation(site.post, &tag("ja")).unwrap();
    site.save(site.post, &FieldRef::title(), "Hello");

    let handlers = site.handlers(Arc::new(MockTranslator::new(MockMode::Suffix)));
    let report = site
        .reconciler(&handlers, ClearPolicy::AllTargets)
        .reconcile_all_translations(site.post)
        .await
        .unwrap();

    assert_eq!(report.targets.len(), 2);
    assert_eq!(site.target_value("ja", &FieldRef::title()), Some("Hello_ja".into()));
    assert!(!site.ledger().has_record(site.post).unwrap());
}

#[tokio::test]
async fn test_reconcile_single_field() {
    let site = Site::new();
    site.save(site.post, &FieldRef::title(), "Hello");
    site.save(site.post, &FieldRef::body(), "Body");

    let handlers = site.handlers(Arc::new(MockTranslator::new(MockMode::Suffix)));
    let report = site
        .reconciler(&handlers, ClearPolicy::AllTargets)
        .reconcile_field(site.post, &FieldRef::body(), &[tag("de")])
        .await
        .unwrap();

    assert_eq!(report.field_count(), 1);
    assert_eq!(report.cleared, vec![FieldRef::body()]);
    assert_eq!(
        site.ledger().pending(site.post, None).unwrap(),
        [FieldRef::title()].into_iter().collect()
    );
    assert_eq!(site.target_value("de", &FieldRef::title()), None);
}

/// Takes the store down while handling a field
struct Outage(Arc<MemoryStore>);

#[async_trait]
impl FieldHandler for Outage {
    async fn sync(&self, job: &FieldJob<'_>) -> MtResult<FieldAction> {
        self.0.set_unavailable(true);
        Ok(FieldAction::Write(job.value.clone()))
    }

    fn name(&self) -> &str {
        "outage"
    }
}

#[tokio::test]
async fn test_storage_failure_halts_and_keeps_earlier_clears() {
    let mut site = Site::new();
    site.metadata
        .set_field("a_heading", "text", Classification::Translate)
        .set_field("z_gallery", "outage", Classification::Translate);
    site.save(site.post, &FieldRef::keyed("a_heading"), "Welcome");
    site.save(site.post, &FieldRef::keyed("z_gallery"), "caption");

    let mut handlers = site.handlers(Arc::new(MockTranslator::new(MockMode::Suffix)));
    handlers.register("outage", Arc::new(Outage(site.store.clone())));

    let result = site
        .reconciler(&handlers, ClearPolicy::AnyTarget)
        .reconcile(site.post, &[tag("de"), tag("fr")])
        .await;

    let error = match result {
        Err(error @ ReconcileError::Halted { .. }) => error,
        other => panic!("expected a halted run, got {:?}", other),
    };
    let partial = error.partial_report().unwrap();
    assert_eq!(partial.targets.len(), 1);
    assert_eq!(partial.cleared, vec![FieldRef::keyed("a_heading")]);

    site.store.set_unavailable(false);
    assert_eq!(
        site.ledger().pending(site.post, None).unwrap(),
        [FieldRef::keyed("z_gallery")].into_iter().collect()
    );
    assert_eq!(
        site.target_value("de", &FieldRef::keyed("a_heading")),
        Some("Welcome_de".into())
    );
}

#[tokio::test]
async fn test_nested_text_value_roundtrip_through_sqlite() {
    let store = SqliteStore::open_in_memory().unwrap();
    let post = store.insert_source(&tag("en")).unwrap();
    let mut metadata = StaticFieldMetadata::with_content_defaults();
    metadata.set_field("faq", "textarea", Classification::Translate);
    let faq = FieldRef::keyed("faq");

    let value = FieldValue::new(json!({"q": "Why?", "a": "Because.", "order": 1}));
    ChangeTracker::new(&store, &store, &metadata)
        .track_change(post, &faq, None, Some(&value))
        .unwrap();
    store.set_field(post, &faq, value).unwrap();

    let store = Arc::new(store);
    let handlers = HandlerRegistry::with_defaults(
        Arc::new(MockTranslator::new(MockMode::Suffix)),
        Arc::new(RegistryResolver::new(store.clone())),
    );
    let report = Reconciler::new(&*store, &*store, &metadata, &handlers)
        .reconcile(post, &[tag("fr")])
        .await
        .unwrap();
    assert!(report.is_complete());

    let post_fr = store.sibling(post, &tag("fr")).unwrap().unwrap();
    assert_eq!(
        store.field(post_fr, &faq).unwrap(),
        Some(FieldValue::new(json!({"q": "Why?_fr", "a": "Because._fr", "order": 1})))
    );
    assert!(!Ledger::new(&*store).has_record(post).unwrap());
}
