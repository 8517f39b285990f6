//! Sync configuration file
//!
//! ```json
//! {
//!   "clear_policy": "all_targets",
//!   "fallback_field_type": "text",
//!   "content": { "summary": "copy" },
//!   "fields": {
//!     "hero_text": { "type": "wysiwyg", "classification": "translate" },
//!     "related":   { "type": "relationship", "classification": "translate" },
//!     "price":     { "type": "number", "classification": "copy" }
//!   }
//! }
//! ```
//!
//! Every key is optional. Built-in fields not listed under `content` are
//! classified `translate`.

use crate::handler::HandlerRegistry;
use crate::reconciler::{ClearPolicy, ReconcilerOptions};
use crate::translator::{MachineTranslator, ReferenceResolver};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;
use transync::StaticFieldMetadata;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no handler for field type '{0}'")]
    UnknownFieldType(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub clear_policy: ClearPolicy,
    /// Handler for fields without a declared type; `text` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_field_type: Option<String>,
    /// Overrides the Google Translate endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translate_endpoint: Option<String>,
    #[serde(flatten)]
    pub metadata: StaticFieldMetadata,
}

impl SyncConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Field metadata with unlisted built-in fields defaulting to `translate`
    pub fn metadata(&self) -> StaticFieldMetadata {
        let mut metadata = StaticFieldMetadata::with_content_defaults();
        metadata.merge(self.metadata.clone());
        metadata
    }

    pub fn reconciler_options(&self) -> ReconcilerOptions {
        ReconcilerOptions {
            clear_policy: self.clear_policy,
        }
    }

    /// Default handlers, with the configured fallback applied
    ///
    /// Declared field types without a handler are reported and fall back.
    pub fn handler_registry(
        &self,
        translator: Arc<dyn MachineTranslator>,
        resolver: Arc<dyn ReferenceResolver>,
    ) -> Result<HandlerRegistry, ConfigError> {
        let mut registry = HandlerRegistry::with_defaults(translator, resolver);
        if let Some(fallback) = &self.fallback_field_type {
            registry
                .set_fallback_type(fallback)
                .map_err(|_| ConfigError::UnknownFieldType(fallback.clone()))?;
        }

        for (key, spec) in self.metadata.fields() {
            if let Some(field_type) = &spec.field_type
                && !registry.is_registered(field_type)
            {
                warn!(field = %key, %field_type, "no handler for field type, using fallback");
            }
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockMode, MockTranslator};
    use crate::translator::RegistryResolver;
    use transync::{
        BuiltinField, Classification, FieldMetadataSource, FieldRef, ItemId, MemoryStore,
    };

    const SAMPLE: &str = r#"{
        "clear_policy": "any_target",
        "fallback_field_type": "number",
        "content": { "summary": "copy" },
        "fields": {
            "hero_text": { "type": "wysiwyg", "classification": "translate" },
            "related": { "type": "relationship", "classification": "translate" },
            "sku": { "classification": "ignore" }
        }
    }"#;

    fn registry(config: &SyncConfig) -> Result<HandlerRegistry, ConfigError> {
        config.handler_registry(
            Arc::new(MockTranslator::new(MockMode::Suffix)),
            Arc::new(RegistryResolver::new(Arc::new(MemoryStore::new()))),
        )
    }

    #[test]
    fn test_parse_full_config() {
        let config = SyncConfig::from_json(SAMPLE).unwrap();
        assert_eq!(config.clear_policy, ClearPolicy::AnyTarget);
        assert_eq!(config.reconciler_options().clear_policy, ClearPolicy::AnyTarget);

        let metadata = config.metadata();
        let item = ItemId(1);
        assert_eq!(
            metadata.classification(item, &FieldRef::summary()),
            Some(Classification::Copy)
        );
        assert_eq!(
            metadata.classification(item, &FieldRef::content(BuiltinField::Title)),
            Some(Classification::Translate)
        );
        assert_eq!(
            metadata.field_type(item, &FieldRef::keyed("related")).as_deref(),
            Some("relationship")
        );
        assert_eq!(
            metadata.classification(item, &FieldRef::keyed("sku")),
            Some(Classification::Ignore)
        );
        assert_eq!(metadata.field_type(item, &FieldRef::keyed("sku")), None);
    }

    #[test]
    fn test_empty_config_defaults() {
        let config = SyncConfig::from_json("{}").unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.clear_policy, ClearPolicy::AllTargets);
        assert_eq!(
            config.metadata().classification(ItemId(1), &FieldRef::body()),
            Some(Classification::Translate)
        );
        assert_eq!(registry(&config).unwrap().resolve(None).name(), "text");
    }

    #[test]
    fn test_fallback_field_type() {
        let config = SyncConfig::from_json(SAMPLE).unwrap();
        assert_eq!(registry(&config).unwrap().resolve(None).name(), "copy");

        let config = SyncConfig::from_json(r#"{"fallback_field_type": "gallery"}"#).unwrap();
        assert!(matches!(
            registry(&config),
            Err(ConfigError::UnknownFieldType(t)) if t == "gallery"
        ));
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            SyncConfig::from_json(r#"{"clear_policy": "sometimes"}"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            SyncConfig::from_json(r#"{"content": {"titel": "copy"}}"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            SyncConfig::from_file(Path::new("/nonexistent/transync.json")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transync.json");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = SyncConfig::from_file(&path).unwrap();
        assert_eq!(config.fallback_field_type.as_deref(), Some("number"));
    }
}
