//! Identity providers.
//!
//! The session manager only needs a stable per-user id and a way to watch
//! it change. [`MemoryIdentityProvider`] issues anonymous ids locally and
//! accepts a fixed table of custom sign-in tokens.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use civic_core::Identity;

use crate::error::ChatError;

/// Source of the current user identity.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Sign in with a fresh anonymous identity.
    async fn sign_in_anonymously(&self) -> Result<Identity, ChatError>;

    /// Sign in with a pre-issued credential.
    async fn sign_in_with_custom_token(&self, token: &str) -> Result<Identity, ChatError>;

    /// Watch the signed-in identity; `None` while signed out.
    fn on_auth_state_changed(&self) -> watch::Receiver<Option<Identity>>;
}

/// In-process identity provider.
#[derive(Debug)]
pub struct MemoryIdentityProvider {
    tokens: BTreeMap<String, String>,
    state: watch::Sender<Option<Identity>>,
    unavailable: AtomicBool,
}

impl Default for MemoryIdentityProvider {
    fn default() -> Self {
        Self::new(BTreeMap::new())
    }
}

impl MemoryIdentityProvider {
    /// Provider accepting `tokens` (token → uid) for custom sign-in.
    pub fn new(tokens: BTreeMap<String, String>) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            tokens,
            state,
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn with_token(mut self, token: &str, uid: &str) -> Self {
        self.tokens.insert(token.to_string(), uid.to_string());
        self
    }

    /// Make every subsequent sign-in fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn sign_out(&self) {
        self.state.send_replace(None);
        info!("Signed out");
    }

    pub fn current(&self) -> Option<Identity> {
        self.state.borrow().clone()
    }

    fn check_available(&self) -> Result<(), ChatError> {
        if self.unavailable.load(Ordering::SeqCst) {
            warn!("Identity provider unavailable");
            return Err(ChatError::Identity("identity provider unavailable".into()));
        }
        Ok(())
    }

    fn publish(&self, identity: Identity) -> Identity {
        self.state.send_replace(Some(identity.clone()));
        identity
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn sign_in_anonymously(&self) -> Result<Identity, ChatError> {
        self.check_available()?;
        let uid = format!("anon-{}", Uuid::new_v4().simple());
        info!(uid = %uid, "Signed in anonymously");
        Ok(self.publish(Identity {
            uid,
            anonymous: true,
        }))
    }

    async fn sign_in_with_custom_token(&self, token: &str) -> Result<Identity, ChatError> {
        self.check_available()?;
        let uid = self.tokens.get(token).ok_or_else(|| {
            warn!("Rejected unknown sign-in token");
            ChatError::Identity("invalid custom token".into())
        })?;
        info!(uid = %uid, "Signed in with custom token");
        Ok(self.publish(Identity {
            uid: uid.clone(),
            anonymous: false,
        }))
    }

    fn on_auth_state_changed(&self) -> watch::Receiver<Option<Identity>> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_anonymous_ids_are_fresh() {
        let provider = MemoryIdentityProvider::default();
        let a = provider.sign_in_anonymously().await.unwrap();
        let b = provider.sign_in_anonymously().await.unwrap();
        assert!(a.anonymous);
        assert_ne!(a.uid, b.uid);
        assert_eq!(provider.current(), Some(b));
    }

    #[tokio::test]
    async fn test_custom_token() {
        let provider = MemoryIdentityProvider::default().with_token("tok-1", "resident-42");
        let identity = provider.sign_in_with_custom_token("tok-1").await.unwrap();
        assert_eq!(identity.uid, "resident-42");
        assert!(!identity.anonymous);

        let err = provider.sign_in_with_custom_token("forged").await.unwrap_err();
        assert!(matches!(err, ChatError::Identity(_)));
    }

    #[tokio::test]
    async fn test_state_watch() {
        let provider = MemoryIdentityProvider::default();
        let mut rx = provider.on_auth_state_changed();
        assert!(rx.borrow().is_none());

        provider.sign_in_anonymously().await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_some());

        provider.sign_out();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());
    }

    #[tokio::test]
    async fn test_unavailable() {
        let provider = MemoryIdentityProvider::default();
        provider.set_unavailable(true);
        assert!(provider.sign_in_anonymously().await.is_err());
        assert!(provider.current().is_none());
    }
}
