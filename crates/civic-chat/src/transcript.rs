//! Turning raw snapshots into an ordered transcript.

use chrono::Utc;
use tracing::warn;

use civic_core::{Message, MessageRecord, SessionId, Timestamp};
use civic_storage::Document;

/// Decode `documents`, keep those of `session`, and order them by commit
/// time.
///
/// A document whose commit time is still pending sorts as if committed at
/// `now` (or just after the latest committed one, if the clock lags), so
/// a freshly sent message shows up at the bottom. Ties keep arrival order.
pub fn order_transcript(documents: Vec<Document>, session: &SessionId, now: Timestamp) -> Vec<Message> {
    let mut messages: Vec<Message> = documents
        .into_iter()
        .filter_map(|doc| match doc.decode::<MessageRecord>() {
            Ok(record) => Some(Message::from_record(doc.id, record, doc.created_at)),
            Err(e) => {
                warn!(id = %doc.id, error = %e, "Skipping undecodable message");
                None
            }
        })
        .filter(|m| &m.session_id == session)
        .collect();

    let latest = messages.iter().filter_map(|m| m.created_at).max();
    let pending_at = latest.map_or(now, |latest| latest.max(now));
    // A pending message sharing its key with the newest committed one still
    // goes after it.
    messages.sort_by_key(|m| (m.created_at.unwrap_or(pending_at), m.created_at.is_none()));
    messages
}

/// [`order_transcript`] at the current time.
pub fn order_transcript_now(documents: Vec<Document>, session: &SessionId) -> Vec<Message> {
    order_transcript(documents, session, Utc::now())
}
