use transync::StoreError;

/// Error types for translation and field resync
#[derive(Debug, thiserror::Error)]
pub enum MtError {
    /// Provider misconfiguration (missing key, rejected credentials)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport failure talking to the provider
    #[error("Network error: {0}")]
    Network(String),

    /// The provider does not accept this language
    #[error("Invalid locale: {0}")]
    InvalidLocale(String),

    /// The provider answered, but not with a usable translation
    #[error("Translation error: {0}")]
    Translation(String),

    /// A field value a handler cannot work with
    #[error("Unsupported value: {0}")]
    UnsupportedValue(String),

    /// Storage failure while resolving or writing
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl From<reqwest::Error> for MtError {
    fn from(err: reqwest::Error) -> Self {
        MtError::Network(err.to_string())
    }
}

/// Result type for MT operations
pub type MtResult<T> = Result<T, MtError>;
