//! End-to-end tests of the session manager over the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use civic_chat::{
    ChatError, IdentityProvider, MemoryIdentityProvider, SendOutcome, SessionManager,
    SessionSettings, TranscriptSubscription,
};
use civic_core::{ChatEvent, DepartmentContext, Message, MessageRecord, Role, SessionId};
use civic_intent::IntentRouter;
use civic_storage::{to_fields, DocumentStore, EqualityFilter, MemoryStore};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);
const HOME_WELCOME: &str =
    "Welcome to CommunitySphere. How can I assist you with city services today?";

fn router() -> Arc<IntentRouter> {
    Arc::new(IntentRouter::default().with_latency(0, 0))
}

fn manager(store: &Arc<MemoryStore>, router: Arc<IntentRouter>) -> SessionManager {
    let store: Arc<dyn DocumentStore> = store.clone();
    SessionManager::new(store, router, SessionSettings::default())
}

async fn signed_in(store: &Arc<MemoryStore>) -> (SessionManager, Arc<MemoryIdentityProvider>) {
    let provider = Arc::new(MemoryIdentityProvider::default());
    let session = manager(store, router());
    session.initialize_session(provider.clone(), None);
    timeout(WAIT, session.wait_for_identity()).await.unwrap().unwrap();
    (session, provider)
}

async fn wait_len(sub: &mut TranscriptSubscription, len: usize) -> Vec<Message> {
    timeout(WAIT, sub.wait_until(|m| m.len() == len))
        .await
        .expect("timed out waiting for transcript")
        .unwrap()
}

#[tokio::test]
async fn test_welcome_then_tax_answer_tagged_home() {
    let store = Arc::new(MemoryStore::new());
    let (session, _provider) = signed_in(&store).await;

    let mut sub = session.subscribe_to_transcript(DepartmentContext::Home);
    let transcript = wait_len(&mut sub, 1).await;
    assert_eq!(transcript[0].role, Role::Assistant);
    assert_eq!(transcript[0].content, HOME_WELCOME);

    let outcome = session
        .send_message(DepartmentContext::Home, "How do I file my taxes?")
        .await
        .unwrap();
    assert!(matches!(outcome, SendOutcome::Sent { .. }));

    let transcript = wait_len(&mut sub, 3).await;
    assert_eq!(transcript[1].role, Role::User);
    assert_eq!(transcript[1].content, "How do I file my taxes?");
    assert_eq!(transcript[2].role, Role::Assistant);
    let reply = transcript[2].response();
    assert!(reply.text.starts_with("To file your local taxes"));
    assert!(!reply.actions.is_empty());
    assert!(transcript
        .iter()
        .all(|m| m.department_context == DepartmentContext::Home
            && &m.session_id == session.session_id()));
    assert!(!session.is_typing());
}

#[tokio::test]
async fn test_department_welcome_text() {
    let store = Arc::new(MemoryStore::new());
    let (session, _provider) = signed_in(&store).await;
    let mut sub = session.subscribe_to_transcript(DepartmentContext::Vehicle);
    let transcript = wait_len(&mut sub, 1).await;
    assert_eq!(
        transcript[0].content,
        "Welcome to the Vehicle Services assistant."
    );
}

#[tokio::test]
async fn test_sessions_sharing_identity_are_isolated() {
    let store = Arc::new(MemoryStore::new());
    let provider = Arc::new(MemoryIdentityProvider::default().with_token("tok", "resident-1"));

    let first = manager(&store, router());
    let second = manager(&store, router());
    first.initialize_session(provider.clone(), Some("tok".into()));
    second.initialize_session(provider.clone(), Some("tok".into()));
    let a = timeout(WAIT, first.wait_for_identity()).await.unwrap().unwrap();
    let b = timeout(WAIT, second.wait_for_identity()).await.unwrap().unwrap();
    assert_eq!(a.uid, b.uid);
    assert_ne!(first.session_id(), second.session_id());

    let mut sub_a = first.subscribe_to_transcript(DepartmentContext::Housing);
    let mut sub_b = second.subscribe_to_transcript(DepartmentContext::Housing);
    wait_len(&mut sub_a, 1).await;
    wait_len(&mut sub_b, 1).await;

    first
        .send_message(DepartmentContext::Housing, "section 8 waitlist")
        .await
        .unwrap();
    let transcript_a = wait_len(&mut sub_a, 3).await;
    assert!(transcript_a[2].content.contains("Section 8"));

    // The other session still only sees its own welcome.
    let transcript_b = sub_b.current();
    assert_eq!(transcript_b.len(), 1);
    assert_eq!(&transcript_b[0].session_id, second.session_id());
}

#[tokio::test]
async fn test_pending_timestamp_sorts_last_until_committed() {
    let store = Arc::new(MemoryStore::new());
    let (session, _provider) = signed_in(&store).await;
    let path = session.collection().unwrap();
    let sid = session.session_id().clone();

    store.hold_commits(true).unwrap();
    let early = MessageRecord::user("written first", DepartmentContext::Tax, &sid);
    store.add_document(&path, to_fields(&early).unwrap()).await.unwrap();
    store.hold_commits(false).unwrap();
    let late = MessageRecord::user("written second", DepartmentContext::Tax, &sid);
    store.add_document(&path, to_fields(&late).unwrap()).await.unwrap();

    let mut sub = session.subscribe_to_transcript(DepartmentContext::Tax);
    let transcript = wait_len(&mut sub, 2).await;
    assert_eq!(transcript[0].content, "written second");
    assert_eq!(transcript[1].content, "written first");
    assert!(transcript[1].is_pending());

    store.commit_pending().unwrap();
    let transcript = timeout(WAIT, sub.wait_until(|m| m.iter().all(|m| !m.is_pending())))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(transcript[0].content, "written first");
    assert_eq!(transcript[1].content, "written second");
}

#[tokio::test]
async fn test_reply_tagged_with_send_time_department() {
    let store = Arc::new(MemoryStore::new());
    let provider = Arc::new(MemoryIdentityProvider::default());
    let slow = Arc::new(IntentRouter::default().with_latency(200, 200));
    let session = Arc::new(manager(&store, slow));
    session.initialize_session(provider, None);
    timeout(WAIT, session.wait_for_identity()).await.unwrap().unwrap();

    session.focus(DepartmentContext::Tax);
    let sender = Arc::clone(&session);
    let send = tokio::spawn(async move {
        sender
            .send_message(DepartmentContext::Tax, "where is my refund")
            .await
    });

    // Switch pages while the router is still "thinking".
    let mut typing = session.typing();
    timeout(WAIT, typing.wait_for(|t| *t)).await.unwrap().unwrap();
    session.focus(DepartmentContext::Housing);
    assert_eq!(session.focused(), Some(DepartmentContext::Housing));

    let outcome = timeout(WAIT, send).await.unwrap().unwrap().unwrap();
    let SendOutcome::Sent { reply_id, .. } = outcome else {
        panic!("send was ignored");
    };

    let path = session.collection().unwrap();
    let tax_docs = store
        .query(&path, &EqualityFilter::new("departmentContext", "tax"))
        .await
        .unwrap();
    let reply = tax_docs.iter().find(|d| d.id == reply_id).unwrap();
    let record: MessageRecord = reply.decode().unwrap();
    assert_eq!(record.department_context, DepartmentContext::Tax);
    assert!(record.content.starts_with("Refunds are usually issued"));
}

#[tokio::test]
async fn test_write_failure_clears_typing_and_reports() {
    let store = Arc::new(MemoryStore::new());
    let (session, _provider) = signed_in(&store).await;
    let mut events = session.events();

    store.fail_writes(true).unwrap();
    let err = session
        .send_message(DepartmentContext::Waste, "bulk pickup")
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::Storage(_)));
    assert!(!session.is_typing());

    let mut saw_failure = false;
    while let Ok(event) = events.try_recv() {
        if let ChatEvent::WriteFailed { department, .. } = event {
            assert_eq!(department, DepartmentContext::Waste);
            saw_failure = true;
        }
    }
    assert!(saw_failure);
}

#[tokio::test]
async fn test_send_without_identity_is_ignored() {
    let store = Arc::new(MemoryStore::new());
    let provider = Arc::new(MemoryIdentityProvider::default());
    provider.set_unavailable(true);
    let session = manager(&store, router());
    session.initialize_session(provider, None);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(session.identity().is_none());
    let outcome = session
        .send_message(DepartmentContext::Home, "hello")
        .await
        .unwrap();
    assert_eq!(outcome, SendOutcome::Ignored);
}

#[tokio::test]
async fn test_blank_and_oversized_input() {
    let store = Arc::new(MemoryStore::new());
    let (session, _provider) = signed_in(&store).await;

    assert_eq!(
        session
            .send_message(DepartmentContext::Home, "   \n\t")
            .await
            .unwrap(),
        SendOutcome::Ignored
    );
    let long = "a".repeat(2001);
    assert!(matches!(
        session.send_message(DepartmentContext::Home, &long).await,
        Err(ChatError::MessageTooLong(2000))
    ));

    let path = session.collection().unwrap();
    let docs = store
        .query(&path, &EqualityFilter::new("departmentContext", "home"))
        .await
        .unwrap();
    assert!(docs.is_empty());
}

#[tokio::test]
async fn test_custom_token_sign_in() {
    let store = Arc::new(MemoryStore::new());
    let provider = Arc::new(MemoryIdentityProvider::default().with_token("tok-9", "resident-9"));
    let session = manager(&store, router());
    session.initialize_session(provider, Some("tok-9".into()));
    let identity = timeout(WAIT, session.wait_for_identity()).await.unwrap().unwrap();
    assert_eq!(identity.uid, "resident-9");
    assert!(!identity.anonymous);
    assert_eq!(
        session.collection().unwrap().as_str(),
        "artifacts/default-app-id/users/resident-9/messages"
    );
}

#[tokio::test]
async fn test_identity_change_resubscribes() {
    let store = Arc::new(MemoryStore::new());
    let (session, provider) = signed_in(&store).await;
    let first_uid = session.identity().unwrap().uid;

    let mut sub = session.subscribe_to_transcript(DepartmentContext::Benefits);
    wait_len(&mut sub, 1).await;
    session
        .send_message(DepartmentContext::Benefits, "child care")
        .await
        .unwrap();
    wait_len(&mut sub, 3).await;

    provider.sign_in_anonymously().await.unwrap();
    timeout(WAIT, async {
        while session.identity().map(|i| i.uid).as_deref() == Some(first_uid.as_str()) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    // The new identity's collection is empty, so only a fresh welcome shows.
    let transcript = timeout(
        WAIT,
        sub.wait_until(|m| m.len() == 1 && m[0].role == Role::Assistant),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(
        transcript[0].content,
        "Welcome to the Unemployment assistant."
    );
}

#[tokio::test]
async fn test_unsubscribe_releases_listener() {
    let store = Arc::new(MemoryStore::new());
    let (session, _provider) = signed_in(&store).await;
    let mut sub = session.subscribe_to_transcript(DepartmentContext::Home);
    wait_len(&mut sub, 1).await;
    assert_eq!(store.listener_count(), 1);

    sub.unsubscribe();
    timeout(WAIT, async {
        while store.listener_count() > 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
}

async fn wait_listeners(store: &MemoryStore, count: usize) {
    timeout(WAIT, async {
        while store.listener_count() != count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("listener count never settled");
}

#[tokio::test]
async fn test_focus_transcript_keeps_one_listener() {
    let store = Arc::new(MemoryStore::new());
    let (session, _provider) = signed_in(&store).await;

    let mut tax = session.focus_transcript(DepartmentContext::Tax);
    timeout(WAIT, tax.wait_for(|m| m.len() == 1)).await.unwrap().unwrap();
    let again = session.focus_transcript(DepartmentContext::Tax);
    assert!(again.same_channel(&tax));
    wait_listeners(&store, 1).await;

    let mut housing = session.focus_transcript(DepartmentContext::Housing);
    timeout(WAIT, housing.wait_for(|m| m.len() == 1)).await.unwrap().unwrap();
    assert_eq!(session.focused(), Some(DepartmentContext::Housing));
    wait_listeners(&store, 1).await;
    // The replaced listener's channel closes.
    timeout(WAIT, async { while tax.changed().await.is_ok() {} })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_dropping_manager_releases_listener() {
    let store = Arc::new(MemoryStore::new());
    let (session, _provider) = signed_in(&store).await;
    let mut rx = session.focus_transcript(DepartmentContext::Waste);
    timeout(WAIT, rx.wait_for(|m| m.len() == 1)).await.unwrap().unwrap();
    assert_eq!(store.listener_count(), 1);

    drop(session);
    wait_listeners(&store, 0).await;
}

#[tokio::test]
async fn test_subscription_failure_is_reported() {
    let store = Arc::new(MemoryStore::new());
    let (session, _provider) = signed_in(&store).await;
    let mut events = session.events();
    let mut sub = session.subscribe_to_transcript(DepartmentContext::Tax);
    wait_len(&mut sub, 1).await;

    store.fail_subscriptions(true).unwrap();
    let result = timeout(WAIT, sub.wait_until(|m| m.is_empty())).await.unwrap();
    assert!(result.is_err());

    let event = timeout(WAIT, async {
        loop {
            match events.recv().await {
                Ok(ChatEvent::SubscriptionFailed { department, .. }) => break department,
                Ok(_) => continue,
                Err(e) => panic!("event stream closed: {}", e),
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(event, DepartmentContext::Tax);
}

#[test]
fn test_session_ids_differ_per_manager() {
    let ids: Vec<SessionId> = (0..3).map(|_| SessionId::generate()).collect();
    assert_ne!(ids[0], ids[1]);
    assert_ne!(ids[1], ids[2]);
}
