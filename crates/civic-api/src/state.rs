//! Application state shared by all handlers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::info;

use civic_chat::{IdentityProvider, MemoryIdentityProvider, SessionManager, SessionSettings};
use civic_core::{DepartmentContext, Identity, Message, PortalConfig};
use civic_intent::IntentRouter;
use civic_storage::DocumentStore;

use crate::error::ApiError;

/// How long session creation waits for sign-in.
const SIGN_IN_TIMEOUT: Duration = Duration::from_secs(5);

/// A live session. Dropping the last handle stops its listeners.
pub struct SessionHandle {
    pub manager: SessionManager,
}

impl SessionHandle {
    /// Transcript receiver of `dept`.
    ///
    /// A session follows one department at a time: asking for another
    /// one closes the previous transcript, and streams on it end.
    pub fn transcript(&self, dept: DepartmentContext) -> watch::Receiver<Vec<Message>> {
        self.manager.focus_transcript(dept)
    }
}

/// Shared application state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PortalConfig>,
    pub router: Arc<IntentRouter>,
    pub store: Arc<dyn DocumentStore>,
    pub sessions: Arc<Mutex<HashMap<String, Arc<SessionHandle>>>>,
    /// Server start time for uptime.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: PortalConfig, store: Arc<dyn DocumentStore>) -> Self {
        let router = IntentRouter::from_config(&config);
        Self::with_router(config, router, store)
    }

    pub fn with_router(config: PortalConfig, router: IntentRouter, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            config: Arc::new(config),
            router: Arc::new(router),
            store,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            start_time: Instant::now(),
        }
    }

    /// Start a session, signed in with `custom_token` or anonymously.
    pub async fn create_session(
        &self,
        custom_token: Option<String>,
    ) -> Result<(Arc<SessionHandle>, Identity), ApiError> {
        if let Some(token) = &custom_token {
            if !self.config.identity.custom_tokens.contains_key(token) {
                return Err(ApiError::Unauthorized("invalid custom token".into()));
            }
        }

        let provider: Arc<dyn IdentityProvider> = Arc::new(MemoryIdentityProvider::new(
            self.config.identity.custom_tokens.clone(),
        ));
        let manager = SessionManager::new(
            Arc::clone(&self.store),
            Arc::clone(&self.router),
            SessionSettings::from_config(&self.config),
        );
        manager.initialize_session(provider, custom_token);

        let identity = tokio::time::timeout(SIGN_IN_TIMEOUT, manager.wait_for_identity())
            .await
            .map_err(|_| ApiError::ServiceUnavailable("sign-in timed out".into()))??;

        let session_id = manager.session_id().to_string();
        let handle = Arc::new(SessionHandle { manager });
        self.lock_sessions()?
            .insert(session_id.clone(), Arc::clone(&handle));
        info!(session_id = %session_id, uid = %identity.uid, "Session opened");
        Ok((handle, identity))
    }

    pub fn session(&self, id: &str) -> Result<Arc<SessionHandle>, ApiError> {
        self.lock_sessions()?
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("session not found: {}", id)))
    }

    /// Forget session `id`, tearing down its listeners.
    pub fn close_session(&self, id: &str) -> Result<(), ApiError> {
        let removed = self
            .lock_sessions()?
            .remove(id)
            .ok_or_else(|| ApiError::NotFound(format!("session not found: {}", id)))?;
        info!(session_id = %id, "Session closed");
        drop(removed);
        Ok(())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn lock_sessions(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, Arc<SessionHandle>>>, ApiError> {
        self.sessions
            .lock()
            .map_err(|e| ApiError::Internal(format!("session lock poisoned: {}", e)))
    }
}
