use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::types::{DepartmentContext, Role, SessionId, Timestamp};

/// Events emitted by a conversation session.
///
/// Consumed by the SSE stream and by tests observing the send lifecycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ChatEvent {
    /// A message document was written to the store.
    MessageAppended {
        session_id: SessionId,
        department: DepartmentContext,
        role: Role,
        document_id: String,
        timestamp: Timestamp,
    },

    /// An empty transcript was seeded with a welcome message.
    WelcomeSeeded {
        session_id: SessionId,
        department: DepartmentContext,
        timestamp: Timestamp,
    },

    /// The typing indicator flipped.
    TypingChanged {
        session_id: SessionId,
        typing: bool,
        timestamp: Timestamp,
    },

    /// A message write failed; no reply will appear for this send.
    WriteFailed {
        session_id: SessionId,
        department: DepartmentContext,
        reason: String,
        timestamp: Timestamp,
    },

    /// The live transcript listener reported an error and stopped.
    SubscriptionFailed {
        session_id: SessionId,
        department: DepartmentContext,
        reason: String,
        timestamp: Timestamp,
    },
}

impl ChatEvent {
    pub fn typing(session_id: &SessionId, typing: bool) -> Self {
        ChatEvent::TypingChanged {
            session_id: session_id.clone(),
            typing,
            timestamp: Utc::now(),
        }
    }

    /// Returns the timestamp of the event.
    pub fn timestamp(&self) -> Timestamp {
        match self {
            ChatEvent::MessageAppended { timestamp, .. }
            | ChatEvent::WelcomeSeeded { timestamp, .. }
            | ChatEvent::TypingChanged { timestamp, .. }
            | ChatEvent::WriteFailed { timestamp, .. }
            | ChatEvent::SubscriptionFailed { timestamp, .. } => *timestamp,
        }
    }

    /// Session that produced the event.
    pub fn session_id(&self) -> &SessionId {
        match self {
            ChatEvent::MessageAppended { session_id, .. }
            | ChatEvent::WelcomeSeeded { session_id, .. }
            | ChatEvent::TypingChanged { session_id, .. }
            | ChatEvent::WriteFailed { session_id, .. }
            | ChatEvent::SubscriptionFailed { session_id, .. } => session_id,
        }
    }

    /// Returns a human-readable event name for logging and SSE.
    pub fn event_name(&self) -> &'static str {
        match self {
            ChatEvent::MessageAppended { .. } => "message_appended",
            ChatEvent::WelcomeSeeded { .. } => "welcome_seeded",
            ChatEvent::TypingChanged { .. } => "typing_changed",
            ChatEvent::WriteFailed { .. } => "write_failed",
            ChatEvent::SubscriptionFailed { .. } => "subscription_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_timestamp_and_name() {
        let sid = SessionId::from("abc1234");
        let event = ChatEvent::typing(&sid, true);
        assert_eq!(event.event_name(), "typing_changed");
        assert_eq!(event.session_id(), &sid);
        assert!(event.timestamp() <= Utc::now());
    }

    #[test]
    fn test_event_serialization() {
        let event = ChatEvent::WelcomeSeeded {
            session_id: SessionId::from("s1"),
            department: DepartmentContext::Housing,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("WelcomeSeeded"));
        assert!(json.contains("\"housing\""));
    }
}
