//! Built-in agents for Steward.
//!
//! Provides the default analytics agent set: charting, forecasting, anomaly
//! detection, brand/KPI performance and a conversational fallback.
//!
//! # Main entry points
//!
//! - [`register_builtins()`]: Register the default agents in routing priority order.
//! - [`DataAgent`]: File-backed analysis agent, one per [`DataTask`].
//! - [`GeneralAgent`]: Conversational fallback (`general_agent`).

/// File-backed analysis agents.
pub mod data;
/// Conversational fallback agent.
pub mod general;
/// Numeric series extraction from loaded file payloads.
pub mod series;

pub use data::{DataAgent, DataTask};
pub use general::GeneralAgent;
pub use series::Series;

use std::sync::Arc;
use steward_core::StewardResult;
use steward_orchestrator::AgentRegistry;

/// Register the default agents.
///
/// Order is routing priority: chart, forecasting, anomaly detection, brand
/// performance, then the general fallback. Fails if any id is already taken.
pub fn register_builtins(registry: &mut AgentRegistry) -> StewardResult<()> {
    for task in [
        DataTask::Chart,
        DataTask::Forecast,
        DataTask::AnomalyDetection,
        DataTask::BrandPerformance,
    ] {
        registry.register(Arc::new(DataAgent::new(task)))?;
    }
    registry.register(Arc::new(GeneralAgent::new()))
}
