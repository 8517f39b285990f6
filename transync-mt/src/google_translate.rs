//! Google Translate API provider for machine translation
//!
//! This module integrates with Google Translate API v2 to provide real
//! machine translation capabilities.
//!
//! # Authentication
//!
//! The provider loads the API key from the `GOOGLE_TRANSLATE_API_KEY`
//! environment variable. Obtain a key from:
//! https://console.cloud.google.com/

use crate::error::{MtError, MtResult};
use crate::translator::MachineTranslator;
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;
use transync::LanguageTag;

pub const DEFAULT_ENDPOINT: &str = "https://translation.googleapis.com/language/translate/v2";

/// Google Translate API v2 provider
///
/// Requests go out one chunk at a time; the reconciler calls it one field at
/// a time, which keeps a bulk resync inside the provider's rate limits.
#[derive(Clone)]
pub struct GoogleTranslateProvider {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
}

impl GoogleTranslateProvider {
    /// Google Translate v2 API accepts up to 128 texts per request
    const MAX_BATCH_SIZE: usize = 128;

    /// Maximum characters per string (30KB per Google Translate API limits)
    const MAX_CHARS_PER_STRING: usize = 30_000;

    pub fn new(api_key: String) -> MtResult<Self> {
        if api_key.trim().is_empty() {
            return Err(MtError::Config("API key cannot be empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| MtError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            client,
            base_url: DEFAULT_ENDPOINT.to_string(),
        })
    }

    /// Create a GoogleTranslateProvider from the `GOOGLE_TRANSLATE_API_KEY` environment variable
    pub fn from_env() -> MtResult<Self> {
        let api_key = std::env::var("GOOGLE_TRANSLATE_API_KEY").map_err(|_| {
            MtError::Config("GOOGLE_TRANSLATE_API_KEY environment variable not set".to_string())
        })?;

        Self::new(api_key)
    }

    /// Send requests to a different endpoint (a proxy, a compatible service)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Language code in the form the API expects
    ///
    /// Google wants bare ISO 639-1 codes, except for the Chinese scripts and
    /// a few regional Portuguese/French variants.
    pub fn language_code(tag: &LanguageTag) -> String {
        match tag.as_str() {
            "zh-hant" | "zh-tw" | "zh-hk" | "zh-hant-tw" | "zh-hant-hk" => "zh-TW".to_string(),
            "zh" | "zh-hans" | "zh-cn" | "zh-hans-cn" => "zh-CN".to_string(),
            "pt-pt" => "pt-PT".to_string(),
            "fr-ca" => "fr-CA".to_string(),
            _ => tag.base().to_string(),
        }
    }

    fn chunk_batch(texts: &[String]) -> Vec<&[String]> {
        texts.chunks(Self::MAX_BATCH_SIZE).collect()
    }

    fn check_length(text: &str) -> MtResult<()> {
        if text.chars().count() > Self::MAX_CHARS_PER_STRING {
            return Err(MtError::Translation(format!(
                "Text exceeds maximum length of {} characters",
                Self::MAX_CHARS_PER_STRING
            )));
        }
        Ok(())
    }

    async fn translate_chunk(
        &self,
        texts: &[String],
        source: Option<&LanguageTag>,
        target: &LanguageTag,
    ) -> MtResult<Vec<String>> {
        let url = format!("{}?key={}", self.base_url, self.api_key);

        let mut body = json!({
            "q": texts,
            "target": Self::language_code(target),
            "format": "text"
        });
        if let Some(source) = source {
            body["source"] = json!(Self::language_code(source));
        }

        debug!(count = texts.len(), %target, "sending translation request");
        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            return Err(if status.is_client_error() {
                MtError::Config(format!("API client error ({}): {}", status, error_text))
            } else {
                MtError::Translation(format!("API server error ({}): {}", status, error_text))
            });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| MtError::Translation(format!("Failed to parse API response: {}", e)))?;

        parse_translations(&json, texts.len())
    }
}

/// Pull `data.translations[].translatedText` out of an API response
fn parse_translations(json: &serde_json::Value, expected: usize) -> MtResult<Vec<String>> {
    let translations = json["data"]["translations"].as_array().ok_or_else(|| {
        MtError::Translation("Invalid API response: missing 'data.translations' array".to_string())
    })?;

    let results = translations
        .iter()
        .map(|t| {
            t["translatedText"]
                .as_str()
                .map(|s| s.to_string())
                .ok_or_else(|| {
                    MtError::Translation(
                        "Invalid API response: missing 'translatedText' field".to_string(),
                    )
                })
        })
        .collect::<MtResult<Vec<String>>>()?;

    if results.len() != expected {
        return Err(MtError::Translation(format!(
            "API returned {} translations for {} texts",
            results.len(),
            expected
        )));
    }
    Ok(results)
}

impl std::fmt::Debug for GoogleTranslateProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleTranslateProvider")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl MachineTranslator for GoogleTranslateProvider {
    async fn translate(
        &self,
        text: &str,
        source: Option<&LanguageTag>,
        target: &LanguageTag,
    ) -> MtResult<String> {
        if text.is_empty() {
            return Ok(String::new());
        }
        Self::check_length(text)?;

        let results = self
            .translate_chunk(&[text.to_string()], source, target)
            .await?;

        Ok(results.into_iter().next().unwrap_or_default())
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        source: Option<&LanguageTag>,
        target: &LanguageTag,
    ) -> MtResult<Vec<String>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        for text in texts {
            Self::check_length(text)?;
        }

        let mut all_results = Vec::with_capacity(texts.len());
        for chunk in Self::chunk_batch(texts) {
            let chunk_results = self.translate_chunk(chunk, source, target).await?;
            all_results.extend(chunk_results);
        }

        Ok(all_results)
    }

    fn provider_name(&self) -> &str {
        "Google Translate"
    }
}
