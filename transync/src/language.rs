//! Identifiers and language tags
//!
//! Content items and taxonomy terms are identified by opaque integers. Every
//! language-sensitive operation in this crate takes a [`LanguageTag`] as an
//! explicit argument; there is no ambient "current language".

use icu_locale::Locale;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque id of a content item (a post, a page, a product...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ItemId {
    fn from(id: u64) -> Self {
        ItemId(id)
    }
}

/// Opaque id of a taxonomy term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TermId(pub u64);

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TermId {
    fn from(id: u64) -> Self {
        TermId(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LanguageTagError {
    #[error("language tag is empty")]
    Empty,
    #[error("invalid language tag '{tag}': {reason}")]
    Invalid { tag: String, reason: String },
}

/// A validated BCP 47 language tag, normalized to lower case with hyphens
///
/// `pt_BR`, `pt-BR` and `PT-br` all normalize to `pt-br`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LanguageTag(String);

impl LanguageTag {
    pub fn parse(tag: &str) -> Result<Self, LanguageTagError> {
        let trimmed = tag.trim();
        if trimmed.is_empty() {
            return Err(LanguageTagError::Empty);
        }

        let normalized = trimmed.replace('_', "-");
        let _locale: Locale = normalized.parse().map_err(|e| LanguageTagError::Invalid {
            tag: tag.to_string(),
            reason: format!("{:?}", e),
        })?;

        Ok(LanguageTag(normalized.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The language subtag without script or region (`zh-hant-tw` → `zh`)
    pub fn base(&self) -> &str {
        self.0.split('-').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LanguageTag {
    type Err = LanguageTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LanguageTag::parse(s)
    }
}

impl TryFrom<String> for LanguageTag {
    type Error = LanguageTagError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        LanguageTag::parse(&value)
    }
}

impl From<LanguageTag> for String {
    fn from(tag: LanguageTag) -> Self {
        tag.0
    }
}
