#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Routing over the built-in agent set.

use serde_json::json;
use std::sync::Arc;
use steward_builtins::register_builtins;
use steward_core::{ErrorKind, StewardError};
use steward_events::{EventPublisher, MemoryEventSink, PublisherConfig};
use steward_orchestrator::{
    AgentRegistry, ExecutionGraph, RequestContext, RoutingPolicy, Supervisor,
};
use steward_trust::TrustEngine;

fn registry() -> AgentRegistry {
    let mut registry = AgentRegistry::new();
    register_builtins(&mut registry).unwrap();
    registry
}

async fn graph() -> ExecutionGraph {
    let publisher = Arc::new(EventPublisher::new(
        Arc::new(MemoryEventSink::new()),
        PublisherConfig::default(),
    ));
    let graph = ExecutionGraph::new(
        Arc::new(registry()),
        Supervisor::new(RoutingPolicy::default()),
        Arc::new(TrustEngine::in_memory()),
        publisher,
    );
    graph.register_trust().await.unwrap();
    graph
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

#[test]
fn test_declaration_order_is_routing_priority() {
    assert_eq!(
        registry().ids(),
        vec![
            "chart_agent",
            "forecasting_agent",
            "anomaly_detection_agent",
            "brand_performance_agent",
            "general_agent",
        ]
    );
}

#[test]
fn test_double_registration_conflicts() {
    let mut registry = registry();
    let err = register_builtins(&mut registry).unwrap_err();
    assert!(matches!(err, StewardError::Conflict(_)));
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_queries_reach_the_expected_agent() {
    let graph = graph().await;
    let cases = [
        ("show me a bar chart of sales", "chart_agent"),
        ("forecast revenue for next month", "forecasting_agent"),
        ("are there any outliers or anomalies?", "anomaly_detection_agent"),
        ("what is our market share and kpi growth rate", "brand_performance_agent"),
        ("hello there", "general_agent"),
        ("what's the weather", "general_agent"),
    ];
    for (query, expected) in cases {
        let state = graph.run(query, &RequestContext::new()).await;
        assert_eq!(state.selected_agent.as_deref(), Some(expected), "query: {query}");
    }
}

#[tokio::test]
async fn test_chart_with_file_data_succeeds() {
    let graph = graph().await;
    let ctx = RequestContext::new()
        .with_files(["sales.csv"])
        .with_file_data(
            "sales.csv",
            json!({"rows": [{"month": "Jan", "sales": 10}, {"month": "Feb", "sales": 14}]}),
        );
    let state = graph.run("plot a pie chart of sales", &ctx).await;
    assert!(!state.has_error());
    assert_eq!(state.execution_path(), ["supervisor", "chart_agent"]);
    let data = state.agent_data.unwrap();
    assert_eq!(data["chart_type"], "pie");
    assert_eq!(data["labels"], json!(["Jan", "Feb"]));
}

#[tokio::test]
async fn test_chart_without_files_is_handled_failure() {
    let graph = graph().await;
    let state = graph.run("show me a chart", &RequestContext::new()).await;
    assert_eq!(state.error.as_ref().unwrap().kind, ErrorKind::AgentExecution);
    assert_eq!(
        state.user_facing_response(),
        "I need at least one data file to create a chart. Please upload a CSV or Excel file."
    );
    let score = graph.trust().get("chart_agent").await.unwrap();
    assert!((score.value - 0.38).abs() < 1e-9);
}
