//! Field identities and classifications

use crate::language::{ItemId, LanguageTag};
use crate::value::FieldValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Built-in fields every content item carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuiltinField {
    Title,
    Body,
    Summary,
}

impl BuiltinField {
    pub const ALL: [BuiltinField; 3] = [
        BuiltinField::Title,
        BuiltinField::Body,
        BuiltinField::Summary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BuiltinField::Title => "title",
            BuiltinField::Body => "body",
            BuiltinField::Summary => "summary",
        }
    }
}

impl FromStr for BuiltinField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "title" => Ok(BuiltinField::Title),
            "body" => Ok(BuiltinField::Body),
            "summary" => Ok(BuiltinField::Summary),
            other => Err(format!("unknown built-in field '{}'", other)),
        }
    }
}

/// Which family a field belongs to; only used to filter reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldCategory {
    /// Built-in fields (title, body, summary)
    Content,
    /// Open-ended custom fields
    Keyed,
}

impl fmt::Display for FieldCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldCategory::Content => write!(f, "content"),
            FieldCategory::Keyed => write!(f, "keyed"),
        }
    }
}

impl FromStr for FieldCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "content" => Ok(FieldCategory::Content),
            "keyed" => Ok(FieldCategory::Keyed),
            other => Err(format!("unknown field category '{}'", other)),
        }
    }
}

/// Identity of a field on a content item
///
/// The key is unique within its category, so `content:title` and a custom
/// field `keyed:title` are distinct fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldRef {
    pub category: FieldCategory,
    pub key: String,
}

impl FieldRef {
    pub fn content(field: BuiltinField) -> Self {
        FieldRef {
            category: FieldCategory::Content,
            key: field.as_str().to_string(),
        }
    }

    pub fn keyed(key: impl Into<String>) -> Self {
        FieldRef {
            category: FieldCategory::Keyed,
            key: key.into(),
        }
    }

    pub fn title() -> Self {
        Self::content(BuiltinField::Title)
    }

    pub fn body() -> Self {
        Self::content(BuiltinField::Body)
    }

    pub fn summary() -> Self {
        Self::content(BuiltinField::Summary)
    }

    /// The built-in field this ref names, if it is a content field
    pub fn builtin(&self) -> Option<BuiltinField> {
        match self.category {
            FieldCategory::Content => self.key.parse().ok(),
            FieldCategory::Keyed => None,
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category, self.key)
    }
}

/// Parses `content:title`, `keyed:subtitle`, or a bare key.
///
/// A bare built-in name (`title`) is a content field; any other bare key is a
/// keyed field.
impl FromStr for FieldRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((category, key)) = s.split_once(':') {
            return match category.parse::<FieldCategory>()? {
                FieldCategory::Content => Ok(FieldRef::content(key.parse()?)),
                FieldCategory::Keyed if key.is_empty() => Err("field key is empty".to_string()),
                FieldCategory::Keyed => Ok(FieldRef::keyed(key)),
            };
        }
        if s.is_empty() {
            return Err("field key is empty".to_string());
        }
        Ok(match s.parse::<BuiltinField>() {
            Ok(builtin) => FieldRef::content(builtin),
            Err(_) => FieldRef::keyed(s),
        })
    }
}

/// How a field behaves across translations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Translate,
    Copy,
    Ignore,
}

impl FromStr for Classification {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "translate" => Ok(Classification::Translate),
            "copy" => Ok(Classification::Copy),
            "ignore" => Ok(Classification::Ignore),
            other => Err(format!("unknown classification '{}'", other)),
        }
    }
}

/// A content item in a translation group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: ItemId,
    pub language: LanguageTag,
    /// The authoritative item of this item's translation group
    pub source: ItemId,
}

impl ContentItem {
    pub fn is_source(&self) -> bool {
        self.id == self.source
    }
}

/// The field values of an item at one point in time, as seen by a save event
pub type FieldSnapshot = BTreeMap<FieldRef, FieldValue>;
