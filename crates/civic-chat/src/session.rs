//! The conversation session manager.
//!
//! One manager per page load. It owns the session token, mirrors the
//! provider's identity, keeps a live transcript per subscribed department
//! and runs the send pipeline.
//!
//! Sends go through a FIFO gate, so each completes (user write, routing,
//! reply write) before the next starts. A reply is always tagged with the
//! department that was active when its send began, even if the user has
//! moved on to another page since.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use civic_core::{
    ChatEvent, DepartmentContext, Identity, Message, MessageRecord, PortalConfig, SessionId,
};
use civic_intent::IntentRouter;
use civic_storage::{to_fields, CollectionPath, DocumentId, DocumentStore, EqualityFilter};

use crate::error::ChatError;
use crate::identity::IdentityProvider;
use crate::transcript::order_transcript_now;

const EVENT_CAPACITY: usize = 256;

/// Settings a session needs from the portal configuration.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Already sanitized application id.
    pub app_id: String,
    pub max_message_length: usize,
}

impl SessionSettings {
    pub fn from_config(config: &PortalConfig) -> Self {
        Self {
            app_id: config.sanitized_app_id(),
            max_message_length: config.chat.max_message_length,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&PortalConfig::default())
    }
}

/// Result of [`SessionManager::send_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Nothing was sent: blank text or no identity yet.
    Ignored,
    /// Both messages were written.
    Sent {
        user_id: DocumentId,
        reply_id: DocumentId,
    },
}

struct Shared {
    store: Arc<dyn DocumentStore>,
    router: Arc<IntentRouter>,
    settings: SessionSettings,
    session_id: SessionId,
    identity: watch::Sender<Option<Identity>>,
    typing: watch::Sender<bool>,
    events: broadcast::Sender<ChatEvent>,
    send_gate: tokio::sync::Mutex<()>,
}

impl Shared {
    fn emit(&self, event: ChatEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    fn set_typing(&self, typing: bool) {
        self.typing.send_replace(typing);
        self.emit(ChatEvent::typing(&self.session_id, typing));
    }

    fn collection(&self, identity: &Identity) -> CollectionPath {
        CollectionPath::messages(&self.settings.app_id, &identity.uid)
    }
}

/// Live transcript of one department for one session.
///
/// Dropping it (or calling [`unsubscribe`](Self::unsubscribe)) tears down
/// the underlying store listener.
#[derive(Debug)]
pub struct TranscriptSubscription {
    context: DepartmentContext,
    transcript: watch::Receiver<Vec<Message>>,
    task: JoinHandle<()>,
}

impl TranscriptSubscription {
    pub fn context(&self) -> DepartmentContext {
        self.context
    }

    /// Receiver of the ordered transcript.
    pub fn transcript(&self) -> watch::Receiver<Vec<Message>> {
        self.transcript.clone()
    }

    /// Latest published transcript.
    pub fn current(&self) -> Vec<Message> {
        self.transcript.borrow().clone()
    }

    /// Wait until the transcript satisfies `predicate`.
    ///
    /// Fails if the listener stops before that happens.
    pub async fn wait_until<F>(&mut self, mut predicate: F) -> Result<Vec<Message>, ChatError>
    where
        F: FnMut(&[Message]) -> bool,
    {
        let messages = self
            .transcript
            .wait_for(|m| predicate(m.as_slice()))
            .await
            .map_err(|_| ChatError::Subscription("transcript listener stopped".into()))?;
        Ok((*messages).clone())
    }

    pub fn unsubscribe(self) {}
}

impl Drop for TranscriptSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Conversation session: identity, transcripts and the send pipeline.
pub struct SessionManager {
    shared: Arc<Shared>,
    active: Mutex<Option<TranscriptSubscription>>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionManager {
    /// New session with a freshly generated session token.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        router: Arc<IntentRouter>,
        settings: SessionSettings,
    ) -> Self {
        let (identity, _) = watch::channel(None);
        let (typing, _) = watch::channel(false);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let session_id = SessionId::generate();
        info!(session_id = %session_id, "Session created");

        Self {
            shared: Arc::new(Shared {
                store,
                router,
                settings,
                session_id,
                identity,
                typing,
                events,
                send_gate: tokio::sync::Mutex::new(()),
            }),
            active: Mutex::new(None),
            background: Mutex::new(Vec::new()),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.shared.session_id
    }

    /// Identity currently signed in, if resolved.
    pub fn identity(&self) -> Option<Identity> {
        self.shared.identity.borrow().clone()
    }

    pub fn typing(&self) -> watch::Receiver<bool> {
        self.shared.typing.subscribe()
    }

    pub fn is_typing(&self) -> bool {
        *self.shared.typing.borrow()
    }

    pub fn events(&self) -> broadcast::Receiver<ChatEvent> {
        self.shared.events.subscribe()
    }

    /// Message collection of the current identity.
    pub fn collection(&self) -> Option<CollectionPath> {
        self.identity().map(|i| self.shared.collection(&i))
    }

    /// Follow `provider`'s identity and sign in in the background.
    ///
    /// Uses the custom-token path when `bootstrap_token` is given, the
    /// anonymous path otherwise. A failed sign-in is logged and leaves the
    /// session without identity: sends are ignored and subscriptions wait.
    pub fn initialize_session(
        &self,
        provider: Arc<dyn IdentityProvider>,
        bootstrap_token: Option<String>,
    ) {
        let mut auth = provider.on_auth_state_changed();
        let shared = Arc::clone(&self.shared);
        let follow = tokio::spawn(async move {
            loop {
                let current = auth.borrow_and_update().clone();
                shared.identity.send_if_modified(|slot| {
                    if *slot == current {
                        return false;
                    }
                    *slot = current;
                    true
                });
                if auth.changed().await.is_err() {
                    debug!("Identity provider dropped");
                    break;
                }
            }
        });

        let sign_in = tokio::spawn(async move {
            let result = match bootstrap_token.as_deref() {
                Some(token) => provider.sign_in_with_custom_token(token).await,
                None => provider.sign_in_anonymously().await,
            };
            if let Err(e) = result {
                error!(error = %e, "Sign-in failed; session has no identity");
            }
        });

        if let Ok(mut background) = self.background.lock() {
            background.push(follow);
            background.push(sign_in);
        }
    }

    /// Wait until an identity is available.
    pub async fn wait_for_identity(&self) -> Result<Identity, ChatError> {
        let mut rx = self.shared.identity.subscribe();
        let identity = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| ChatError::IdentityUnavailable)?;
        identity.clone().ok_or(ChatError::IdentityUnavailable)
    }

    /// Start a live transcript of `context` for this session.
    ///
    /// The listener waits for an identity, follows identity changes, and
    /// seeds one welcome message the first time it sees an empty
    /// transcript.
    pub fn subscribe_to_transcript(&self, context: DepartmentContext) -> TranscriptSubscription {
        let (tx, rx) = watch::channel(Vec::new());
        let shared = Arc::clone(&self.shared);
        let task = tokio::spawn(run_listener(shared, context, tx));
        TranscriptSubscription {
            context,
            transcript: rx,
            task,
        }
    }

    /// Replace the active subscription with one for `context`.
    pub fn focus(&self, context: DepartmentContext) -> watch::Receiver<Vec<Message>> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        Self::refocus(&mut active, self.subscribe_to_transcript(context))
    }

    /// Transcript of `context`, reusing the active subscription when it
    /// already follows that department and refocusing otherwise.
    pub fn focus_transcript(&self, context: DepartmentContext) -> watch::Receiver<Vec<Message>> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = active.as_ref().filter(|s| s.context() == context) {
            return current.transcript();
        }
        Self::refocus(&mut active, self.subscribe_to_transcript(context))
    }

    fn refocus(
        active: &mut Option<TranscriptSubscription>,
        subscription: TranscriptSubscription,
    ) -> watch::Receiver<Vec<Message>> {
        let transcript = subscription.transcript();
        let context = subscription.context();
        if let Some(previous) = active.replace(subscription) {
            debug!(from = %previous.context(), to = %context, "Switching department");
        }
        transcript
    }

    /// Department of the active subscription.
    pub fn focused(&self) -> Option<DepartmentContext> {
        self.active
            .lock()
            .ok()
            .and_then(|a| a.as_ref().map(TranscriptSubscription::context))
    }

    /// Send `text` from `context` and persist the routed reply.
    pub async fn send_message(
        &self,
        context: DepartmentContext,
        text: &str,
    ) -> Result<SendOutcome, ChatError> {
        if text.trim().is_empty() {
            return Ok(SendOutcome::Ignored);
        }
        let max = self.shared.settings.max_message_length;
        if text.chars().count() > max {
            return Err(ChatError::MessageTooLong(max));
        }
        let Some(identity) = self.identity() else {
            debug!("Send ignored: no identity yet");
            return Ok(SendOutcome::Ignored);
        };

        let _gate = self.shared.send_gate.lock().await;
        let path = self.shared.collection(&identity);

        let result = self.deliver(&path, context, text).await;
        if self.is_typing() {
            self.shared.set_typing(false);
        }

        match result {
            Ok((user_id, reply_id)) => Ok(SendOutcome::Sent { user_id, reply_id }),
            Err(e) => {
                warn!(department = %context, error = %e, "Send failed");
                self.shared.emit(ChatEvent::WriteFailed {
                    session_id: self.shared.session_id.clone(),
                    department: context,
                    reason: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                Err(e)
            }
        }
    }

    async fn deliver(
        &self,
        path: &CollectionPath,
        context: DepartmentContext,
        text: &str,
    ) -> Result<(DocumentId, DocumentId), ChatError> {
        let shared = &self.shared;
        let user = MessageRecord::user(text, context, &shared.session_id);
        let user_id = append(shared, path, &user).await?;

        shared.set_typing(true);
        let response = shared.router.respond(text, context).await;

        let reply = MessageRecord::assistant(response, context, &shared.session_id);
        let reply_id = append(shared, path, &reply).await?;
        Ok((user_id, reply_id))
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Ok(mut active) = self.active.lock() {
            active.take();
        }
        if let Ok(mut background) = self.background.lock() {
            for handle in background.drain(..) {
                handle.abort();
            }
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("session_id", &self.shared.session_id)
            .field("identity", &self.identity())
            .finish()
    }
}

async fn append(
    shared: &Shared,
    path: &CollectionPath,
    record: &MessageRecord,
) -> Result<DocumentId, ChatError> {
    let id = shared.store.add_document(path, to_fields(record)?).await?;
    shared.emit(ChatEvent::MessageAppended {
        session_id: shared.session_id.clone(),
        department: record.department_context,
        role: record.role,
        document_id: id.clone(),
        timestamp: chrono::Utc::now(),
    });
    Ok(id)
}

/// Body of a transcript listener. Runs until aborted, until the store
/// reports an error, or until the manager is gone.
async fn run_listener(
    shared: Arc<Shared>,
    context: DepartmentContext,
    tx: watch::Sender<Vec<Message>>,
) {
    let mut identity_rx = shared.identity.subscribe();
    let filter = EqualityFilter::new("departmentContext", context.as_str());

    loop {
        let identity = match identity_rx.wait_for(Option::is_some).await {
            Ok(identity) => identity.clone(),
            Err(_) => return,
        };
        let Some(identity) = identity else { continue };

        let path = shared.collection(&identity);
        let mut stream = match shared.store.subscribe(&path, filter.clone()).await {
            Ok(stream) => stream,
            Err(e) => {
                listener_failed(&shared, context, &e.to_string());
                return;
            }
        };
        debug!(collection = %path, department = %context, "Transcript listener attached");
        let mut welcomed = false;

        loop {
            tokio::select! {
                item = stream.next() => match item {
                    Some(Ok(documents)) => {
                        let messages = order_transcript_now(documents, &shared.session_id);
                        if !messages.is_empty() {
                            tx.send_replace(messages);
                        } else if !welcomed {
                            welcomed = true;
                            seed_welcome(&shared, &path, context).await;
                        }
                    }
                    Some(Err(e)) => {
                        listener_failed(&shared, context, &e.to_string());
                        return;
                    }
                    None => {
                        listener_failed(&shared, context, "listener closed by store");
                        return;
                    }
                },
                changed = identity_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    let uid = identity_rx.borrow_and_update().as_ref().map(|i| i.uid.clone());
                    if uid.as_deref() != Some(identity.uid.as_str()) {
                        info!(department = %context, "Identity changed; re-subscribing");
                        tx.send_replace(Vec::new());
                        break;
                    }
                }
            }
        }
    }
}

async fn seed_welcome(shared: &Shared, path: &CollectionPath, context: DepartmentContext) {
    let welcome = MessageRecord::assistant(shared.router.welcome(context), context, &shared.session_id);
    match append(shared, path, &welcome).await {
        Ok(_) => {
            debug!(department = %context, "Welcome seeded");
            shared.emit(ChatEvent::WelcomeSeeded {
                session_id: shared.session_id.clone(),
                department: context,
                timestamp: chrono::Utc::now(),
            });
        }
        Err(e) => {
            warn!(department = %context, error = %e, "Failed to seed welcome");
            shared.emit(ChatEvent::WriteFailed {
                session_id: shared.session_id.clone(),
                department: context,
                reason: e.to_string(),
                timestamp: chrono::Utc::now(),
            });
        }
    }
}

fn listener_failed(shared: &Shared, context: DepartmentContext, reason: &str) {
    error!(department = %context, reason, "Transcript listener failed");
    shared.emit(ChatEvent::SubscriptionFailed {
        session_id: shared.session_id.clone(),
        department: context,
        reason: reason.to_string(),
        timestamp: chrono::Utc::now(),
    });
}
