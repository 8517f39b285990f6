//! Mock Machine Translator for testing
//!
//! This module provides a deterministic, API-free translator for testing
//! the resync pipeline without requiring API keys or network access.
//!
//! # Example
//!
//! ```ignore
//! use transync_mt::{MachineTranslator, MockTranslator, MockMode};
//!
//! #[tokio::test]
//! async fn test_translation() {
//!     let mock = MockTranslator::new(MockMode::Suffix);
//!     let result = mock.translate("hello", None, &"fr".parse().unwrap()).await.unwrap();
//!     assert_eq!(result, "hello_fr");
//! }
//! ```

use crate::error::{MtError, MtResult};
use crate::translator::MachineTranslator;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use transync::LanguageTag;

/// Mock translation modes for testing different scenarios
#[derive(Debug, Clone)]
pub enum MockMode {
    /// Append target suffix: "hello" → "hello_fr"
    Suffix,

    /// Use predefined mappings: (text, target) → translation, falling back to suffix
    Mappings(HashMap<(String, String), String>),

    /// Simulate API errors for every call
    Error(String),

    /// Fail only for matching text and/or target language, suffix otherwise
    FailFor {
        text: Option<String>,
        target: Option<String>,
        message: String,
    },

    /// No-op: return input unchanged
    NoOp,
}

/// Mock translator that simulates various translation scenarios
///
/// Counts every text it is asked to translate, so tests can assert that a
/// code path did not reach the provider.
#[derive(Debug)]
pub struct MockTranslator {
    mode: MockMode,
    /// Optional simulated network delay (in milliseconds)
    delay_ms: u64,
    calls: AtomicUsize,
}

impl MockTranslator {
    pub fn new(mode: MockMode) -> Self {
        Self {
            mode,
            delay_ms: 0,
            calls: AtomicUsize::new(0),
        }
    }

    /// Create a MockTranslator with simulated network delay
    pub fn with_delay(mode: MockMode, delay_ms: u64) -> Self {
        Self {
            delay_ms,
            ..Self::new(mode)
        }
    }

    /// Fail whenever `text` is translated into `target`
    pub fn failing_for(text: &str, target: &str, message: &str) -> Self {
        Self::new(MockMode::FailFor {
            text: Some(text.to_string()),
            target: Some(target.to_string()),
            message: message.to_string(),
        })
    }

    /// Number of texts translated so far (a batch of three counts three)
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn apply_delay(&self) {
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
    }

    fn apply_translation(&self, text: &str, target: &LanguageTag) -> MtResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let suffixed = || format!("{}_{}", text, target);

        match &self.mode {
            MockMode::Suffix => Ok(suffixed()),
            MockMode::Mappings(map) => {
                let key = (text.to_string(), target.to_string());
                Ok(map.get(&key).cloned().unwrap_or_else(suffixed))
            }
            MockMode::Error(msg) => Err(MtError::Translation(msg.clone())),
            MockMode::FailFor {
                text: fail_text,
                target: fail_target,
                message,
            } => {
                let text_matches = fail_text.as_deref().is_none_or(|t| t == text);
                let target_matches = fail_target.as_deref().is_none_or(|t| t == target.as_str());
                if text_matches && target_matches {
                    Err(MtError::Translation(message.clone()))
                } else {
                    Ok(suffixed())
                }
            }
            MockMode::NoOp => Ok(text.to_string()),
        }
    }
}

#[async_trait]
impl MachineTranslator for MockTranslator {
    async fn translate(
        &self,
        text: &str,
        _source: Option<&LanguageTag>,
        target: &LanguageTag,
    ) -> MtResult<String> {
        self.apply_delay().await;
        self.apply_translation(text, target)
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        _source: Option<&LanguageTag>,
        target: &LanguageTag,
    ) -> MtResult<Vec<String>> {
        // per batch, not per string
        self.apply_delay().await;

        texts
            .iter()
            .map(|text| self.apply_translation(text, target))
            .collect()
    }

    fn provider_name(&self) -> &str {
        "Mock Translator"
    }
}
