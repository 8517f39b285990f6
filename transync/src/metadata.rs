//! Configuration-backed field metadata

use crate::field::{BuiltinField, Classification, FieldCategory, FieldRef};
use crate::language::ItemId;
use crate::store::FieldMetadataSource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    pub classification: Classification,
}

/// Field types and classifications declared up front, independent of the item
///
/// Built-in fields are keyed by name (`title`, `body`, `summary`), and any
/// other name under `content` is rejected; custom fields by their key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticFieldMetadata {
    #[serde(default)]
    content: BTreeMap<BuiltinField, Classification>,
    #[serde(default)]
    fields: BTreeMap<String, FieldSpec>,
}

impl StaticFieldMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// All built-in fields classified `translate`
    pub fn with_content_defaults() -> Self {
        let mut metadata = Self::new();
        for builtin in BuiltinField::ALL {
            metadata.set_content(builtin, Classification::Translate);
        }
        metadata
    }

    pub fn set_content(
        &mut self,
        field: BuiltinField,
        classification: Classification,
    ) -> &mut Self {
        self.content.insert(field, classification);
        self
    }

    pub fn set_field(
        &mut self,
        key: &str,
        field_type: &str,
        classification: Classification,
    ) -> &mut Self {
        self.fields.insert(
            key.to_string(),
            FieldSpec {
                field_type: Some(field_type.to_string()),
                classification,
            },
        );
        self
    }

    /// Entries from `other` replace entries with the same name
    pub fn merge(&mut self, other: StaticFieldMetadata) {
        self.content.extend(other.content);
        self.fields.extend(other.fields);
    }

    /// Declared custom fields, by key
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(key, spec)| (key.as_str(), spec))
    }
}

impl FieldMetadataSource for StaticFieldMetadata {
    fn field_type(&self, _item: ItemId, field: &FieldRef) -> Option<String> {
        match field.category {
            FieldCategory::Content => field.builtin().map(|builtin| match builtin {
                BuiltinField::Title => "text".to_string(),
                BuiltinField::Body => "wysiwyg".to_string(),
                BuiltinField::Summary => "textarea".to_string(),
            }),
            FieldCategory::Keyed => self.fields.get(&field.key)?.field_type.clone(),
        }
    }

    fn classification(&self, _item: ItemId, field: &FieldRef) -> Option<Classification> {
        match field.category {
            FieldCategory::Content => {
                field.builtin().and_then(|builtin| self.content.get(&builtin).copied())
            }
            FieldCategory::Keyed => self.fields.get(&field.key).map(|spec| spec.classification),
        }
    }
}
