//! Trust Score Engine for Steward agents.
//!
//! Every registered agent carries a reliability score in `[0, 1]`, starting at
//! [`INITIAL_TRUST`] and moved by [`TrustSignal`]s (execution outcomes, user
//! ratings, governance violations). Updates are atomic per agent and
//! independent across agents.
//!
//! # Main types
//!
//! - [`TrustEngine`]: Owns all scores; the only way to mutate them.
//! - [`TrustSignal`]: Outcome-to-delta table.
//! - [`TrustScore`]: Snapshot returned by reads and updates.
//! - [`TrustStore`]: Persistence contract (memory and file implementations).

/// The engine and per-agent locking.
pub mod engine;
/// Score snapshots and thresholds.
pub mod score;
/// Signals and their deltas.
pub mod signal;
/// Persistence backends.
pub mod store;

pub use engine::{TrustEngine, TrustUpdate};
pub use score::{TrustScore, GRADUATION_THRESHOLD, INITIAL_TRUST};
pub use signal::TrustSignal;
pub use store::{FileTrustStore, MemoryTrustStore, TrustStore};
