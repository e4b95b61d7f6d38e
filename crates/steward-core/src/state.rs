//! Per-request state threaded through the execution graph.
//!
//! [`RequestState`] is a value type: every step consumes one instance and
//! returns a new one via the `with_*` methods. The execution path is private
//! and can only grow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Category of a failure captured into [`RequestState::error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No agent could be selected and no fallback exists.
    Routing,
    /// The agent reported a handled failure.
    AgentExecution,
    /// The agent faulted, panicked or timed out.
    AgentFault,
    /// The governance policy gate denied the execution.
    PolicyViolation,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Routing => write!(f, "routing_error"),
            ErrorKind::AgentExecution => write!(f, "agent_execution_error"),
            ErrorKind::AgentFault => write!(f, "agent_fault"),
            ErrorKind::PolicyViolation => write!(f, "policy_violation"),
        }
    }
}

/// Structured error carried on the request state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateError {
    /// Failure category.
    pub kind: ErrorKind,
    /// Internal description. Never shown to end users verbatim.
    pub message: String,
}

impl StateError {
    /// Create a new state error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Bounded message that is safe to show to the user.
    pub fn user_message(&self) -> &'static str {
        match self.kind {
            ErrorKind::Routing => {
                "I couldn't work out how to handle that request. Please try again."
            }
            ErrorKind::AgentExecution => "The agent could not complete your request.",
            ErrorKind::AgentFault => {
                "Something went wrong while processing your request. Please try again."
            }
            ErrorKind::PolicyViolation => "Access denied by governance policy.",
        }
    }
}

/// State of a single request as it moves through the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestState {
    /// The user query being processed.
    pub query: String,
    /// Chat session the query belongs to.
    pub session_id: String,
    /// Uploaded file ids, in upload order.
    pub uploaded_file_refs: Vec<String>,
    /// Payloads for file refs, populated lazily by agents.
    #[serde(default)]
    pub loaded_file_data: BTreeMap<String, serde_json::Value>,
    /// Agent chosen by the routing policy.
    pub selected_agent: Option<String>,
    /// Text produced by the agent.
    pub agent_response: Option<String>,
    /// Structured data produced by the agent.
    pub agent_data: Option<serde_json::Map<String, serde_json::Value>>,
    execution_path: Vec<String>,
    /// Failure captured during the run, if any.
    pub error: Option<StateError>,
    /// Agent confidence in its response (0.0-1.0).
    pub confidence: f64,
    /// Id of the agent execution, assigned by the engine.
    pub execution_id: Option<Uuid>,
    /// Free-form metadata (routing decision, routing confidence, ...).
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// When the request entered the graph.
    pub timestamp: DateTime<Utc>,
}

impl RequestState {
    /// Create the entry state for an inbound query.
    pub fn new(
        query: impl Into<String>,
        session_id: impl Into<String>,
        uploaded_file_refs: Vec<String>,
    ) -> Self {
        Self {
            query: query.into(),
            session_id: session_id.into(),
            uploaded_file_refs,
            loaded_file_data: BTreeMap::new(),
            selected_agent: None,
            agent_response: None,
            agent_data: None,
            execution_path: Vec::new(),
            error: None,
            confidence: 0.0,
            execution_id: None,
            metadata: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Ordered record of the nodes that handled this request.
    pub fn execution_path(&self) -> &[String] {
        &self.execution_path
    }

    /// Whether any error has been captured.
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Append a step to the execution path. Consecutive duplicates are collapsed
    /// so a node handling both routing and execution appears once.
    pub fn with_execution_step(mut self, step: impl Into<String>) -> Self {
        let step = step.into();
        if self.execution_path.last() != Some(&step) {
            self.execution_path.push(step);
        }
        self
    }

    /// Record the routing decision.
    pub fn with_selected_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.selected_agent = Some(agent_id.into());
        self
    }

    /// Record the agent's output.
    pub fn with_response(
        mut self,
        response: impl Into<String>,
        confidence: f64,
        data: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Self {
        self.agent_response = Some(response.into());
        self.confidence = confidence.clamp(0.0, 1.0);
        self.agent_data = data;
        self
    }

    /// Capture a failure.
    pub fn with_error(mut self, kind: ErrorKind, message: impl Into<String>) -> Self {
        self.error = Some(StateError::new(kind, message));
        self
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Attach a loaded payload for one of the uploaded file refs.
    pub fn with_file_data(mut self, file_ref: impl Into<String>, payload: serde_json::Value) -> Self {
        self.loaded_file_data.insert(file_ref.into(), payload);
        self
    }

    /// Stamp the execution id.
    pub fn with_execution_id(mut self, execution_id: Uuid) -> Self {
        self.execution_id = Some(execution_id);
        self
    }

    /// Replace the execution path with the one carried by `other`. Used by the
    /// engine to discard any edits an agent made to its own copy of the path.
    pub fn with_execution_path_of(mut self, other: &RequestState) -> Self {
        self.execution_path = other.execution_path.clone();
        self
    }

    /// Text to show the user: the agent's response when present, otherwise the
    /// bounded message for the captured error.
    pub fn user_facing_response(&self) -> String {
        match (&self.agent_response, &self.error) {
            (Some(response), None) => response.clone(),
            (Some(response), Some(err)) if err.kind == ErrorKind::AgentExecution => {
                response.clone()
            }
            (_, Some(err)) => err.user_message().to_string(),
            (None, None) => "I apologize, but I couldn't process your request.".to_string(),
        }
    }
}
