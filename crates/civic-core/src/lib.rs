//! Shared domain model for the civic services assistant.
//!
//! Department contexts, chat messages, structured router responses,
//! portal configuration and the common error type.

pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::PortalConfig;
pub use error::{CivicError, Result};
pub use events::ChatEvent;
pub use types::*;
