//! HTTP surface of the civic services assistant.
//!
//! Exposes the intent router, per-session transcripts and an SSE stream of
//! transcript snapshots over axum.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
