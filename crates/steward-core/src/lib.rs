//! Core types and error definitions for the Steward agent router.
//!
//! This crate provides the value types shared across all Steward crates:
//! the per-request state threaded through the execution graph, execution
//! records, governance events, feedback records, and the unified error type.
//!
//! # Main types
//!
//! - [`StewardError`]: Unified error enum for all Steward subsystems.
//! - [`StewardResult`]: Convenience alias for `Result<T, StewardError>`.
//! - [`RequestState`]: Immutable-per-step request state.
//! - [`ExecutionRecord`]: Outcome of one agent run.
//! - [`Event`]: A topic plus JSON payload bound for the governance log.
//! - [`FeedbackRecord`]: A validated user rating tied to an execution.

/// Unified error type.
pub mod error;
/// Governance events and their payloads.
pub mod event;
/// User feedback types.
pub mod feedback;
/// Chat messages exchanged with the UI layer.
pub mod message;
/// Execution records and outcomes.
pub mod record;
/// Per-request state.
pub mod state;

pub use error::{StewardError, StewardResult};
pub use event::{
    Event, FeedbackPayload, MetricsPayload, Severity, Topic, TrustContext, TrustEventType,
    TrustPayload,
};
pub use feedback::{FeedbackRecord, FeedbackSubmission, FeedbackType};
pub use message::{ChatMessage, ChatRole};
pub use record::{ExecutionRecord, Outcome};
pub use state::{ErrorKind, RequestState, StateError};

/// Node id of the routing step; always the first entry of a completed execution path.
pub const SUPERVISOR_NODE: &str = "supervisor";
