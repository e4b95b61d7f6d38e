use thiserror::Error;

/// A convenience `Result` alias using [`StewardError`].
pub type StewardResult<T> = Result<T, StewardError>;

/// Top-level error type for the Steward workspace.
///
/// Node-level failures inside a graph run are never surfaced through this type;
/// they are captured into [`crate::StateError`] on the request state instead.
#[derive(Error, Debug)]
pub enum StewardError {
    /// The routing policy could not select any agent and no fallback is configured.
    #[error("Routing error: {0}")]
    Routing(String),

    /// An agent signalled a handled failure.
    #[error("Agent execution error: {0}")]
    AgentExecution(String),

    /// An agent faulted internally (panic, timeout, unexpected error).
    #[error("Agent fault: {0}")]
    AgentFault(String),

    /// Malformed input, rejected before any state change.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Event delivery to the external log failed.
    #[error("Publish failure: {0}")]
    Publish(String),

    /// A referenced entity (agent, execution, message) does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The request conflicts with already recorded state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A persistence backend failed.
    #[error("Store error: {0}")]
    Store(String),

    /// Invalid configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// An outbound HTTP call failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StewardError {
    /// Whether the error was caused by the caller's input rather than by the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            StewardError::Validation(_) | StewardError::NotFound(_) | StewardError::Conflict(_)
        )
    }
}
