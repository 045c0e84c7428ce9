//! Error types for conversation sessions.

use civic_core::CivicError;

/// Errors from the session manager and identity providers.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("no identity is available")]
    IdentityUnavailable,
    #[error("identity error: {0}")]
    Identity(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("subscription error: {0}")]
    Subscription(String),
}

impl From<CivicError> for ChatError {
    fn from(err: CivicError) -> Self {
        match err {
            CivicError::Identity(msg) => ChatError::Identity(msg),
            CivicError::Subscription(msg) => ChatError::Subscription(msg),
            other => ChatError::Storage(other.to_string()),
        }
    }
}
