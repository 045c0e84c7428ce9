//! Conversation sessions for the civic services assistant.
//!
//! A [`SessionManager`] owns one browser-load worth of conversation: a
//! session token, the signed-in identity, a live transcript per focused
//! department and the send pipeline (persist user text, route it, persist
//! the reply).

pub mod error;
pub mod identity;
pub mod session;
pub mod transcript;

pub use error::ChatError;
pub use identity::{IdentityProvider, MemoryIdentityProvider};
pub use session::{SendOutcome, SessionManager, SessionSettings, TranscriptSubscription};
pub use transcript::order_transcript;
