use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Mutually exclusive result of one agent execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The agent produced a response without error.
    Success,
    /// The agent returned a handled error.
    Failure,
    /// The agent faulted, panicked or timed out.
    Error,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Success => write!(f, "success"),
            Outcome::Failure => write!(f, "failure"),
            Outcome::Error => write!(f, "error"),
        }
    }
}

/// Immutable record of one agent run, produced by the execution graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Unique id of the execution.
    pub execution_id: Uuid,
    /// Agent that ran.
    pub agent_id: String,
    /// How the run ended.
    pub outcome: Outcome,
    /// Wall-clock duration of the run.
    pub duration_ms: u64,
    /// When the run finished.
    pub timestamp: DateTime<Utc>,
}

impl ExecutionRecord {
    /// Create a record stamped with the current time.
    pub fn new(execution_id: Uuid, agent_id: impl Into<String>, outcome: Outcome, duration_ms: u64) -> Self {
        Self {
            execution_id,
            agent_id: agent_id.into(),
            outcome,
            duration_ms,
            timestamp: Utc::now(),
        }
    }
}
