//! Orchestration core for Steward.
//!
//! Routes each query to one specialized agent, runs it against its own copy of
//! the request state, and feeds the outcome into the trust engine and the
//! governance event log. Feedback on past executions flows through the
//! [`FeedbackIngestor`].
//!
//! # Main types
//!
//! - [`ExecutionGraph`]: Supervisor → agent → finalize, never fails a request.
//! - [`Supervisor`]: Deterministic routing policy with optional [`Reasoner`].
//! - [`AgentRegistry`]: Agents in declaration order.
//! - [`FeedbackIngestor`]: Validates feedback and derives trust deltas.
//! - [`PolicyGate`]: Pre-execution governance check.

/// Agent trait and descriptors.
pub mod agent;
/// Per-request caller context.
pub mod context;
/// Feedback validation, accounting and statistics.
pub mod feedback;
/// Feedback persistence.
pub mod feedback_store;
/// Governance policy gate.
pub mod governance;
/// The execution graph engine.
pub mod graph;
/// Recent executions for feedback lookups.
pub mod ledger;
/// OpenAI-compatible routing reasoner.
pub mod reasoner;
/// Agent registry.
pub mod registry;
/// Routing policy.
pub mod supervisor;

pub use agent::{Agent, AgentDescriptor, Capability};
pub use context::RequestContext;
pub use feedback::{
    validate_feedback, FeedbackIngestor, FeedbackReceipt, FeedbackStats, MAX_COMMENT_CHARS,
};
pub use feedback_store::{FeedbackStore, FileFeedbackStore, MemoryFeedbackStore};
pub use governance::{PolicyDecision, PolicyGate, PolicyRequest, StaticPolicyGate};
pub use graph::{ExecutionGraph, DEFAULT_AGENT_TIMEOUT};
pub use ledger::{ExecutionLedger, DEFAULT_LEDGER_CAPACITY};
pub use reasoner::{HttpReasoner, HttpReasonerConfig};
pub use registry::AgentRegistry;
pub use supervisor::{
    keyword_score, Reasoner, Route, RoutingDecision, RoutingPolicy, Supervisor,
    DEFAULT_FALLBACK_AGENT, DEFAULT_MIN_CONFIDENCE,
};
