//! Field-type handlers
//!
//! Each declared field type maps to one [`FieldHandler`] that knows how to
//! produce the target-language value of a field:
//!
//! - text-like fields are machine translated ([`TextHandler`])
//! - relationship and taxonomy fields hold ids; each id is swapped for its
//!   sibling in the target language ([`ReferenceHandler`])
//! - plain data fields are copied ([`CopyHandler`])
//!
//! The mapping lives in a [`HandlerRegistry`] built once, up front.

use crate::error::{MtError, MtResult};
use crate::translator::{MachineTranslator, ReferenceKind, ReferenceResolver};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use transync::{FieldRef, FieldValue, ItemId, LanguageTag};

/// Everything a handler needs to know about one field of one target
#[derive(Debug, Clone, Copy)]
pub struct FieldJob<'a> {
    pub source: ItemId,
    pub target: ItemId,
    pub field: &'a FieldRef,
    /// The source value; never in the empty state
    pub value: &'a FieldValue,
    pub source_language: &'a LanguageTag,
    pub target_language: &'a LanguageTag,
}

/// What to do with the target field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldAction {
    Write(FieldValue),
    Delete,
}

#[async_trait]
pub trait FieldHandler: Send + Sync {
    async fn sync(&self, job: &FieldJob<'_>) -> MtResult<FieldAction>;

    fn name(&self) -> &str;
}

/// Machine-translates every non-empty string in the value
///
/// Strings nested in lists or objects are sent as one batch and put back in
/// place; numbers and booleans are kept as they are.
pub struct TextHandler {
    translator: Arc<dyn MachineTranslator>,
}

impl TextHandler {
    pub fn new(translator: Arc<dyn MachineTranslator>) -> Self {
        Self { translator }
    }
}

fn collect_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) if !s.is_empty() => out.push(s.clone()),
        Value::Array(items) => items.iter().for_each(|item| collect_strings(item, out)),
        Value::Object(map) => map.values().for_each(|item| collect_strings(item, out)),
        _ => {}
    }
}

fn replace_strings(value: &mut Value, translated: &mut impl Iterator<Item = String>) {
    match value {
        Value::String(s) if !s.is_empty() => {
            if let Some(text) = translated.next() {
                *s = text;
            }
        }
        Value::Array(items) => items
            .iter_mut()
            .for_each(|item| replace_strings(item, translated)),
        Value::Object(map) => map
            .values_mut()
            .for_each(|item| replace_strings(item, translated)),
        _ => {}
    }
}

#[async_trait]
impl FieldHandler for TextHandler {
    async fn sync(&self, job: &FieldJob<'_>) -> MtResult<FieldAction> {
        if let Some(text) = job.value.as_str() {
            let translated = self
                .translator
                .translate(text, Some(job.source_language), job.target_language)
                .await?;
            return Ok(FieldAction::Write(translated.into()));
        }

        let mut texts = Vec::new();
        collect_strings(job.value.as_json(), &mut texts);
        if texts.is_empty() {
            return Ok(FieldAction::Write(job.value.clone()));
        }

        let translated = self
            .translator
            .translate_batch(&texts, Some(job.source_language), job.target_language)
            .await?;
        if translated.len() != texts.len() {
            return Err(MtError::Translation(format!(
                "{} returned {} translations for {} texts",
                self.translator.provider_name(),
                translated.len(),
                texts.len()
            )));
        }

        let mut value = job.value.as_json().clone();
        replace_strings(&mut value, &mut translated.into_iter());
        Ok(FieldAction::Write(FieldValue::new(value)))
    }

    fn name(&self) -> &str {
        "text"
    }
}

/// Swaps referenced ids for their target-language siblings
///
/// Accepts a single id (number or numeric string) or a list of them, and
/// keeps the shape it was given. Ids without a sibling are dropped; when
/// nothing resolves the target field is deleted rather than left stale.
pub struct ReferenceHandler {
    kind: ReferenceKind,
    resolver: Arc<dyn ReferenceResolver>,
}

impl ReferenceHandler {
    pub fn new(kind: ReferenceKind, resolver: Arc<dyn ReferenceResolver>) -> Self {
        Self { kind, resolver }
    }

    async fn resolve_one(&self, value: &Value, target: &LanguageTag) -> MtResult<Option<Value>> {
        let id = reference_id(value).ok_or_else(|| {
            MtError::UnsupportedValue(format!("expected a {} id, got {}", self.kind, value))
        })?;

        let resolved = self.resolver.resolve(self.kind, id, target).await?;
        if resolved.is_none() {
            debug!(kind = %self.kind, id, %target, "no sibling in target language");
        }
        Ok(resolved.map(|id| match value {
            Value::String(_) => Value::String(id.to_string()),
            _ => Value::from(id),
        }))
    }
}

fn reference_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl FieldHandler for ReferenceHandler {
    async fn sync(&self, job: &FieldJob<'_>) -> MtResult<FieldAction> {
        match job.value.as_json() {
            Value::Array(ids) => {
                let mut resolved = Vec::with_capacity(ids.len());
                for id in ids {
                    if let Some(sibling) = self.resolve_one(id, job.target_language).await? {
                        resolved.push(sibling);
                    }
                }
                if resolved.is_empty() {
                    Ok(FieldAction::Delete)
                } else {
                    Ok(FieldAction::Write(FieldValue::new(Value::Array(resolved))))
                }
            }
            single => Ok(match self.resolve_one(single, job.target_language).await? {
                Some(sibling) => FieldAction::Write(FieldValue::new(sibling)),
                None => FieldAction::Delete,
            }),
        }
    }

    fn name(&self) -> &str {
        match self.kind {
            ReferenceKind::Item => "relationship",
            ReferenceKind::Term => "taxonomy",
        }
    }
}

/// Writes the source value unchanged
pub struct CopyHandler;

#[async_trait]
impl FieldHandler for CopyHandler {
    async fn sync(&self, job: &FieldJob<'_>) -> MtResult<FieldAction> {
        Ok(FieldAction::Write(job.value.clone()))
    }

    fn name(&self) -> &str {
        "copy"
    }
}

pub const TEXT_TYPES: &[&str] = &["text", "textarea", "wysiwyg"];
pub const ITEM_REFERENCE_TYPES: &[&str] = &["relationship", "post_object", "page_link"];
pub const TERM_REFERENCE_TYPES: &[&str] = &["taxonomy"];
pub const COPY_TYPES: &[&str] = &[
    "number",
    "true_false",
    "email",
    "url",
    "date_picker",
    "date_time_picker",
    "time_picker",
    "color_picker",
];

/// Field type tag → handler, with a fallback for undeclared types
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn FieldHandler>>,
    fallback: Arc<dyn FieldHandler>,
}

impl HandlerRegistry {
    pub fn new(fallback: Arc<dyn FieldHandler>) -> Self {
        Self {
            handlers: HashMap::new(),
            fallback,
        }
    }

    /// Text, reference and copy handlers for the common field types; text is
    /// the fallback.
    pub fn with_defaults(
        translator: Arc<dyn MachineTranslator>,
        resolver: Arc<dyn ReferenceResolver>,
    ) -> Self {
        let text: Arc<dyn FieldHandler> = Arc::new(TextHandler::new(translator));
        let items: Arc<dyn FieldHandler> =
            Arc::new(ReferenceHandler::new(ReferenceKind::Item, resolver.clone()));
        let terms: Arc<dyn FieldHandler> =
            Arc::new(ReferenceHandler::new(ReferenceKind::Term, resolver));
        let copy: Arc<dyn FieldHandler> = Arc::new(CopyHandler);

        let mut registry = Self::new(text.clone());
        for (types, handler) in [
            (TEXT_TYPES, &text),
            (ITEM_REFERENCE_TYPES, &items),
            (TERM_REFERENCE_TYPES, &terms),
            (COPY_TYPES, &copy),
        ] {
            for type_tag in types {
                registry.register(type_tag, handler.clone());
            }
        }
        registry
    }

    pub fn register(&mut self, type_tag: &str, handler: Arc<dyn FieldHandler>) -> &mut Self {
        self.handlers.insert(type_tag.to_string(), handler);
        self
    }

    /// Use the handler of an already registered type for undeclared types
    pub fn set_fallback_type(&mut self, type_tag: &str) -> MtResult<()> {
        let handler = self.handlers.get(type_tag).cloned().ok_or_else(|| {
            MtError::Config(format!("no handler registered for field type '{}'", type_tag))
        })?;
        self.fallback = handler;
        Ok(())
    }

    pub fn resolve(&self, type_tag: Option<&str>) -> &dyn FieldHandler {
        type_tag
            .and_then(|tag| self.handlers.get(tag))
            .unwrap_or(&self.fallback)
            .as_ref()
    }

    pub fn is_registered(&self, type_tag: &str) -> bool {
        self.handlers.contains_key(type_tag)
    }
}
