//! Event Publisher for the Steward governance log.
//!
//! Execution metrics, trust deltas and user feedback are emitted as
//! [`steward_core::Event`]s. Publishing never blocks the request that produced
//! the event: a bounded queue feeds a single delivery worker that retries a
//! bounded number of times and then drops.
//!
//! # Main types
//!
//! - [`EventPublisher`]: Queue, worker and delivery statistics.
//! - [`EventSink`]: Delivery target (JSONL file, HTTP collector, memory, none).

/// Queueing, retry and drop policy.
pub mod publisher;
/// Delivery targets.
pub mod sink;

pub use publisher::{compute_backoff, EventPublisher, PublisherConfig, PublisherStats};
pub use sink::{EventSink, HttpEventSink, JsonlEventSink, MemoryEventSink, NullEventSink};
