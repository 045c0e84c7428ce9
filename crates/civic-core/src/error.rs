use thiserror::Error;

/// Top-level error type for the civic services assistant.
///
/// Subsystem crates either use it directly (storage) or define their own
/// error type with a `From<CivicError>` conversion so `?` works across
/// crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CivicError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Identity error: {0}")]
    Identity(String),

    #[error("Subscription error: {0}")]
    Subscription(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for CivicError {
    fn from(err: toml::de::Error) -> Self {
        CivicError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for CivicError {
    fn from(err: toml::ser::Error) -> Self {
        CivicError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for CivicError {
    fn from(err: serde_json::Error) -> Self {
        CivicError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for civic operations.
pub type Result<T> = std::result::Result<T, CivicError>;
