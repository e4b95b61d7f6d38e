//! Events handed to the governance log.
//!
//! An [`Event`] is a topic plus a JSON object payload. The typed payload
//! structs below describe the shapes published for each topic.

use crate::error::{StewardError, StewardResult};
use crate::record::{ExecutionRecord, Outcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stream an event is published to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    /// Per-execution metrics.
    Metrics,
    /// Trust score deltas.
    Trust,
    /// User feedback.
    Feedback,
}

impl Topic {
    /// Name of the stream in the external log.
    pub fn stream(&self) -> &'static str {
        match self {
            Topic::Metrics => "steward:events:metrics",
            Topic::Trust => "steward:events:trust",
            Topic::Feedback => "steward:events:feedback",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Topic::Metrics => write!(f, "metrics"),
            Topic::Trust => write!(f, "trust"),
            Topic::Feedback => write!(f, "feedback"),
        }
    }
}

/// A single published event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Destination topic.
    pub topic: Topic,
    /// Event body.
    pub payload: serde_json::Map<String, serde_json::Value>,
    /// When the event was created.
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Build an event from an already-shaped JSON object.
    pub fn new(topic: Topic, payload: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            topic,
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Build an event from any serializable payload. The payload must
    /// serialize to a JSON object.
    pub fn from_payload<T: Serialize>(topic: Topic, payload: &T) -> StewardResult<Self> {
        match serde_json::to_value(payload)? {
            serde_json::Value::Object(map) => Ok(Self::new(topic, map)),
            other => Err(StewardError::Validation(format!(
                "event payload must be a JSON object, got {other}"
            ))),
        }
    }
}

/// Body of a `metrics` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsPayload {
    /// Agent whose run is measured.
    pub agent_id: String,
    /// How the run ended.
    pub outcome: Outcome,
    /// Wall-clock duration of the run.
    pub duration_ms: u64,
    /// Run identifier.
    pub execution_id: Uuid,
    /// When the run finished.
    pub timestamp: DateTime<Utc>,
}

impl From<&ExecutionRecord> for MetricsPayload {
    fn from(record: &ExecutionRecord) -> Self {
        Self {
            agent_id: record.agent_id.clone(),
            outcome: record.outcome,
            duration_ms: record.duration_ms,
            execution_id: record.execution_id,
            timestamp: record.timestamp,
        }
    }
}

/// What caused a trust change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustEventType {
    /// Successful execution.
    TaskCompleted,
    /// Handled failure or fault.
    TaskFailed,
    /// Execution cancelled at its deadline.
    TimeoutExceeded,
    /// Execution blocked by the policy gate.
    PolicyViolation,
    /// User rating.
    UserFeedback,
}

/// How strongly a trust event should weigh in governance decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Score went up.
    Positive,
    /// No material change.
    Neutral,
    /// Score went down.
    Negative,
    /// Policy violation.
    Critical,
}

/// Correlation data attached to a trust event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustContext {
    /// Execution the change belongs to.
    pub execution_id: Uuid,
    /// User behind a feedback-driven change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Rating behind a feedback-driven change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
}

/// Body of a `trust` event. Only published for non-zero deltas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustPayload {
    /// Agent whose score changed.
    pub agent_id: String,
    /// Cause of the change.
    pub event_type: TrustEventType,
    /// Weight for governance consumers.
    pub severity: Severity,
    /// Signed delta that was applied.
    pub impact: f64,
    /// Routing or rating confidence behind the change.
    pub confidence: f64,
    /// Correlation data.
    pub context: TrustContext,
    /// When the change was applied.
    pub timestamp: DateTime<Utc>,
}

/// Body of a `feedback` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackPayload {
    /// Stored record id.
    pub feedback_id: Uuid,
    /// Rated chat message.
    pub message_id: String,
    /// Rated execution.
    pub execution_id: Uuid,
    /// Agent that produced the execution.
    pub agent_id: String,
    /// Submitting user.
    pub user_id: String,
    /// `thumbs_up` or `thumbs_down`.
    pub feedback_type: String,
    /// Star rating, 1 to 5.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    /// Free-text comment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// When the feedback was recorded.
    pub timestamp: DateTime<Utc>,
}
