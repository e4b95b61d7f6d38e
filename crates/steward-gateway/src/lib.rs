//! HTTP gateway for Steward.
//!
//! Exposes chat, feedback, agent listing and health endpoints over axum,
//! with optional per-client rate limiting.

pub mod api;
pub mod messages;
pub mod middleware;
pub mod rate_limit;
pub mod server;

pub use messages::MessageIndex;
pub use rate_limit::{LimitWindow, RateDecision, RateLimiter, RateLimits};
pub use server::{AppState, GatewayServer};
