use crate::server::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use steward_core::{ChatMessage, FeedbackRecord, FeedbackSubmission, StewardError};
use steward_orchestrator::{validate_feedback, AgentDescriptor, FeedbackStats, RequestContext};
use steward_trust::TrustScore;
use tracing::{error, info};
use uuid::Uuid;

/// Longest accepted chat message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 5000;
/// Most files that may accompany one chat message.
pub const MAX_FILES_PER_MESSAGE: usize = 10;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A [`StewardError`] rendered as `{"detail": ...}` with a matching status.
#[derive(Debug)]
pub struct ApiError(pub StewardError);

impl From<StewardError> for ApiError {
    fn from(e: StewardError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self.0 {
            StewardError::Validation(m) => (StatusCode::BAD_REQUEST, m),
            StewardError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            StewardError::Conflict(m) => (StatusCode::CONFLICT, m),
            other => {
                error!(error = %other, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };
        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// Body of `POST /api/chat/send`.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// User query, at most 5000 characters.
    pub message: String,
    /// Session to continue; a new one is created when absent.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Uploaded file references.
    #[serde(default, alias = "file_ids")]
    pub files: Vec<String>,
    /// Parsed file payloads keyed by file ref.
    #[serde(default)]
    pub file_data: BTreeMap<String, serde_json::Value>,
    /// Requesting user, checked by the policy gate.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Extra request attributes passed to agents.
    #[serde(default)]
    pub context: serde_json::Map<String, serde_json::Value>,
}

/// Body returned by `POST /api/chat/send`.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    /// The assistant message.
    pub message: ChatMessage,
    /// Agent that handled the query.
    pub agent_used: Option<String>,
    /// Routing confidence.
    pub confidence: f64,
    /// Session the message belongs to.
    pub session_id: String,
}

fn validate_chat(request: &ChatRequest) -> Result<(), StewardError> {
    let chars = request.message.trim().chars().count();
    if chars == 0 {
        return Err(StewardError::Validation("message must not be empty".into()));
    }
    if chars > MAX_MESSAGE_CHARS {
        return Err(StewardError::Validation(format!(
            "message must be at most {MAX_MESSAGE_CHARS} characters"
        )));
    }
    if request.files.len() > MAX_FILES_PER_MESSAGE {
        return Err(StewardError::Validation(format!(
            "at most {MAX_FILES_PER_MESSAGE} files may be attached"
        )));
    }
    Ok(())
}

/// `POST /api/chat/send`
pub async fn send_chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    validate_chat(&request)?;

    let context = RequestContext {
        session_id: request.session_id,
        file_refs: request.files,
        file_data: request.file_data,
        user_id: request.user_id,
        attributes: request.context,
    };
    let started = Instant::now();
    let result = state.graph.run(&request.message, &context).await;
    let execution_time = started.elapsed().as_secs_f64();

    let mut message =
        ChatMessage::assistant(result.user_facing_response(), result.selected_agent.clone());
    if let Some(execution_id) = result.execution_id {
        state.messages.record(message.id.to_string(), execution_id);
    }

    let metadata = &mut message.metadata;
    metadata.insert("message_id".into(), message.id.to_string().into());
    metadata.insert("execution_id".into(), serde_json::json!(result.execution_id));
    metadata.insert("execution_path".into(), serde_json::json!(result.execution_path()));
    metadata.insert("agent_data".into(), serde_json::json!(result.agent_data));
    metadata.insert("confidence".into(), result.confidence.into());
    metadata.insert("execution_time".into(), execution_time.into());
    if let Some(err) = &result.error {
        metadata.insert("error".into(), err.kind.to_string().into());
    }

    info!(
        session_id = %result.session_id,
        agent_id = ?result.selected_agent,
        message_id = %message.id,
        "Chat message answered"
    );

    Ok(Json(ChatResponse {
        message,
        agent_used: result.selected_agent.clone(),
        confidence: result.confidence,
        session_id: result.session_id,
    }))
}

// ---------------------------------------------------------------------------
// Feedback
// ---------------------------------------------------------------------------

/// Body of `POST /api/feedback`.
#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    /// Rated chat message.
    pub message_id: String,
    /// Optional when the message was answered by this gateway.
    #[serde(default)]
    pub execution_id: Option<Uuid>,
    /// `thumbs_up` or `thumbs_down`.
    pub feedback_type: String,
    /// Optional star rating, 1 to 5.
    #[serde(default)]
    pub rating: Option<i64>,
    /// Optional comment.
    #[serde(default)]
    pub comment: Option<String>,
    /// Submitting user; `anonymous` when absent.
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Body returned by `POST /api/feedback`.
#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    /// Always `"success"`.
    pub status: &'static str,
    /// Confirmation text.
    pub message: &'static str,
    /// Stored record id.
    pub feedback_id: Uuid,
    /// Agent that produced the rated execution.
    pub agent_id: String,
    /// Human-readable trust delta.
    pub trust_impact: String,
    /// Score after the update, when one was applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_score: Option<TrustScore>,
}

/// `POST /api/feedback`
pub async fn submit_feedback(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    let mut submission = FeedbackSubmission {
        message_id: request.message_id,
        execution_id: request.execution_id.unwrap_or_default(),
        user_id: request.user_id,
        feedback_type: request.feedback_type,
        rating: request.rating,
        comment: request.comment,
    };
    validate_feedback(&submission)?;
    if request.execution_id.is_none() {
        submission.execution_id = state
            .messages
            .execution_for(&submission.message_id)
            .ok_or_else(|| StewardError::NotFound("Message not found".into()))?;
    }

    let receipt = state.feedback.submit(submission).await?;

    Ok(Json(FeedbackResponse {
        status: "success",
        message: "Feedback submitted successfully",
        feedback_id: receipt.record.feedback_id,
        agent_id: receipt.agent_id,
        trust_impact: receipt.trust_impact,
        trust_score: receipt.trust_score,
    }))
}

/// One feedback record as listed by the API.
#[derive(Debug, Serialize)]
pub struct FeedbackEntry {
    /// Record id.
    pub id: Uuid,
    /// `thumbs_up` or `thumbs_down`.
    pub feedback_type: String,
    /// Star rating.
    pub rating: Option<u8>,
    /// Comment.
    pub comment: Option<String>,
    /// Submitting user.
    pub user_id: String,
    /// When the record was stored.
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<FeedbackRecord> for FeedbackEntry {
    fn from(r: FeedbackRecord) -> Self {
        Self {
            id: r.feedback_id,
            feedback_type: r.feedback_type.to_string(),
            rating: r.rating,
            comment: r.comment,
            user_id: r.user_id,
            created_at: r.created_at,
        }
    }
}

/// Body of `GET /api/feedback/message/{message_id}`.
#[derive(Debug, Serialize)]
pub struct MessageFeedbackResponse {
    /// Always `"success"`.
    pub status: &'static str,
    /// The requested message.
    pub message_id: String,
    /// Number of entries in `feedbacks`.
    pub feedback_count: usize,
    /// Records, newest first.
    pub feedbacks: Vec<FeedbackEntry>,
}

/// `GET /api/feedback/message/{message_id}`
pub async fn message_feedback(
    State(state): State<Arc<AppState>>,
    Path(message_id): Path<String>,
) -> Result<Json<MessageFeedbackResponse>, ApiError> {
    let records = state.feedback.list_for_message(&message_id).await?;
    Ok(Json(MessageFeedbackResponse {
        status: "success",
        message_id,
        feedback_count: records.len(),
        feedbacks: records.into_iter().map(FeedbackEntry::from).collect(),
    }))
}

/// Body of `GET /api/feedback/stats`.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// Always `"success"`.
    pub status: &'static str,
    /// Aggregate counters.
    #[serde(flatten)]
    pub stats: FeedbackStats,
}

/// `GET /api/feedback/stats`
pub async fn feedback_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatsResponse>, ApiError> {
    Ok(Json(StatsResponse {
        status: "success",
        stats: state.feedback.stats().await?,
    }))
}

// ---------------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------------

/// One agent with its trust score.
#[derive(Debug, Serialize)]
pub struct AgentSummary {
    /// Agent metadata.
    #[serde(flatten)]
    pub descriptor: AgentDescriptor,
    /// Current trust score, when registered.
    pub trust: Option<TrustScore>,
}

/// Body of `GET /api/agents`.
#[derive(Debug, Serialize)]
pub struct AgentListResponse {
    /// Agents in declaration order.
    pub agents: Vec<AgentSummary>,
}

/// `GET /api/agents`: every registered agent in declaration order, with its trust score.
pub async fn list_agents(State(state): State<Arc<AppState>>) -> Json<AgentListResponse> {
    let mut agents = Vec::new();
    let descriptors: Vec<AgentDescriptor> =
        state.graph.registry().list().into_iter().cloned().collect();
    for descriptor in descriptors {
        let trust = state.graph.trust().get(&descriptor.id).await.ok();
        agents.push(AgentSummary { descriptor, trust });
    }
    Json(AgentListResponse { agents })
}

/// `GET /api/agents/{agent_id}/trust`
pub async fn agent_trust(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> Result<Json<TrustScore>, ApiError> {
    if !state.graph.registry().contains(&agent_id) {
        return Err(StewardError::NotFound(format!("Agent '{agent_id}' not found")).into());
    }
    Ok(Json(state.graph.trust().get(&agent_id).await?))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

/// `GET /health`
pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let publisher = state.graph.publisher();
    Json(serde_json::json!({
        "status": "ok",
        "service": "steward",
        "agents": state.graph.registry().len(),
        "events": publisher.stats(),
        "event_queue_depth": publisher.queue_depth(),
    }))
}
