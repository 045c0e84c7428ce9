//! Route handlers.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;

use civic_chat::SendOutcome;
use civic_core::config::BrandConfig;
use civic_core::{DepartmentContext, Message, StructuredResponse};
use civic_intent::RouteDecision;

use crate::error::ApiError;
use crate::state::AppState;

/// How long a transcript request waits for the store to catch up.
const TRANSCRIPT_WAIT: Duration = Duration::from_secs(5);

// =============================================================================
// Request / response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_sessions: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DepartmentInfo {
    pub id: DepartmentContext,
    pub name: String,
    pub brand: String,
    pub hero_title: String,
    pub hero_subtitle: String,
    pub query_suggestion: String,
}

#[derive(Debug, Serialize)]
pub struct DepartmentsResponse {
    pub brand: BrandConfig,
    pub departments: Vec<DepartmentInfo>,
}

#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    pub query: String,
    #[serde(default)]
    pub department: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RouteResponse {
    /// Context the query was evaluated in.
    pub department: DepartmentContext,
    /// `greeting`, `department` or `fallback`.
    pub decision: String,
    /// Department whose answer was used, if any.
    pub resolved: Option<DepartmentContext>,
    pub response: StructuredResponse,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub custom_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub uid: String,
    pub anonymous: bool,
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptResponse {
    pub session_id: String,
    pub department: DepartmentContext,
    /// `sent` or `ignored` for POST; absent for GET.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TypingResponse {
    pub session_id: String,
    pub typing: bool,
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_sessions: state.session_count(),
    })
}

/// GET /departments - brand and every department profile.
pub async fn departments(State(state): State<AppState>) -> Json<DepartmentsResponse> {
    let departments = DepartmentContext::ALL
        .into_iter()
        .map(|id| {
            let profile = state.config.department(id);
            DepartmentInfo {
                id,
                name: profile.name,
                brand: profile.brand,
                hero_title: profile.hero_title,
                hero_subtitle: profile.hero_subtitle,
                query_suggestion: profile.query_suggestion,
            }
        })
        .collect();
    Json(DepartmentsResponse {
        brand: state.config.brand.clone(),
        departments,
    })
}

/// POST /route - raw router output, without simulated latency.
pub async fn route(
    State(state): State<AppState>,
    Json(req): Json<RouteRequest>,
) -> Result<Json<RouteResponse>, ApiError> {
    if req.query.trim().is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".into()));
    }
    let department = req
        .department
        .as_deref()
        .map(DepartmentContext::parse_lenient)
        .unwrap_or_default();

    let (decision, resolved) = match state.router.classify(&req.query, department) {
        RouteDecision::Greeting(d) => ("greeting", Some(d)),
        RouteDecision::Department(d) => ("department", Some(d)),
        RouteDecision::Fallback => ("fallback", None),
    };
    let response = state.router.route(&req.query, department);

    Ok(Json(RouteResponse {
        department,
        decision: decision.to_string(),
        resolved,
        response,
    }))
}

/// POST /sessions
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    let (handle, identity) = state.create_session(req.custom_token).await?;
    Ok(Json(CreateSessionResponse {
        session_id: handle.manager.session_id().to_string(),
        uid: identity.uid,
        anonymous: identity.anonymous,
    }))
}

/// GET /sessions/{id}/departments/{dept}/messages
///
/// The first request for a department opens its transcript and waits for
/// the welcome message.
pub async fn get_messages(
    State(state): State<AppState>,
    Path((id, dept)): Path<(String, String)>,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let handle = state.session(&id)?;
    let department = DepartmentContext::parse_lenient(&dept);
    let mut transcript = handle.transcript(department);
    let messages = wait_for_transcript(&mut transcript, |m| !m.is_empty()).await?;

    Ok(Json(TranscriptResponse {
        session_id: id,
        department,
        outcome: None,
        messages,
    }))
}

/// POST /sessions/{id}/departments/{dept}/messages
pub async fn post_message(
    State(state): State<AppState>,
    Path((id, dept)): Path<(String, String)>,
    Json(req): Json<SendRequest>,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let handle = state.session(&id)?;
    let department = DepartmentContext::parse_lenient(&dept);
    let mut transcript = handle.transcript(department);

    let outcome = handle.manager.send_message(department, &req.text).await?;
    let (label, messages) = match outcome {
        SendOutcome::Sent { reply_id, .. } => {
            let messages =
                wait_for_transcript(&mut transcript, |m| m.iter().any(|msg| msg.id == reply_id))
                    .await?;
            ("sent", messages)
        }
        SendOutcome::Ignored => {
            let current = transcript.borrow().clone();
            ("ignored", current)
        }
    };

    Ok(Json(TranscriptResponse {
        session_id: id,
        department,
        outcome: Some(label.to_string()),
        messages,
    }))
}

/// DELETE /sessions/{id}
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.close_session(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /sessions/{id}/typing
pub async fn typing(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TypingResponse>, ApiError> {
    let handle = state.session(&id)?;
    Ok(Json(TypingResponse {
        session_id: id,
        typing: handle.manager.is_typing(),
    }))
}

/// GET /sessions/{id}/departments/{dept}/stream - SSE of transcript snapshots.
///
/// The stream ends when the session switches department or is closed.
pub async fn stream(
    State(state): State<AppState>,
    Path((id, dept)): Path<(String, String)>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>> + Send>, ApiError> {
    let handle = state.session(&id)?;
    let department = DepartmentContext::parse_lenient(&dept);
    let rx = handle.transcript(department);

    let stream = WatchStream::new(rx)
        .filter(|messages| !messages.is_empty())
        .map(|messages| {
            let data = serde_json::to_string(&messages).unwrap_or_default();
            Ok(Event::default().event("transcript").data(data))
        });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

async fn wait_for_transcript<F>(
    rx: &mut watch::Receiver<Vec<Message>>,
    mut ready: F,
) -> Result<Vec<Message>, ApiError>
where
    F: FnMut(&[Message]) -> bool,
{
    let waited = tokio::time::timeout(TRANSCRIPT_WAIT, rx.wait_for(|m| ready(m.as_slice())))
        .await
        .map_err(|_| ApiError::ServiceUnavailable("transcript not ready".into()))?;
    let messages = waited.map_err(|_| ApiError::Internal("transcript listener stopped".into()))?;
    Ok((*messages).clone())
}
