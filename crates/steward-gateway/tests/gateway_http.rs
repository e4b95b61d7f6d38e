#![allow(clippy::unwrap_used, clippy::expect_used)]

use serde_json::{json, Value};
use std::sync::Arc;
use steward_builtins::register_builtins;
use steward_events::{EventPublisher, MemoryEventSink, PublisherConfig};
use steward_gateway::{AppState, GatewayServer, RateLimiter, RateLimits};
use steward_orchestrator::{
    AgentRegistry, ExecutionGraph, FeedbackIngestor, MemoryFeedbackStore, RoutingPolicy,
    Supervisor,
};
use steward_trust::TrustEngine;
use tokio::net::TcpListener;

async fn app_state() -> AppState {
    let mut registry = AgentRegistry::new();
    register_builtins(&mut registry).unwrap();
    let publisher = Arc::new(EventPublisher::new(
        Arc::new(MemoryEventSink::new()),
        PublisherConfig::default(),
    ));
    let trust = Arc::new(TrustEngine::in_memory());
    let graph = ExecutionGraph::new(
        Arc::new(registry),
        Supervisor::new(RoutingPolicy::default()),
        trust.clone(),
        publisher.clone(),
    );
    graph.register_trust().await.unwrap();
    let feedback = FeedbackIngestor::new(
        Arc::new(MemoryFeedbackStore::new()),
        graph.ledger().clone(),
        trust,
        publisher,
    );
    AppState::new(Arc::new(graph), Arc::new(feedback))
}

/// Helper: serve the gateway on a random port, returning the base URL.
async fn start_test_server(rate_limiter: Option<Arc<RateLimiter>>) -> String {
    let app = GatewayServer::build_with_middleware(app_state().await, rate_limiter);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Small yield to let the server task start
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    format!("http://127.0.0.1:{}", addr.port())
}

async fn post(client: &reqwest::Client, url: String, body: Value) -> (u16, Value) {
    let resp = client.post(url).json(&body).send().await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

async fn get(url: String) -> (u16, Value) {
    let resp = reqwest::get(url).await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

async fn send_chart_request(client: &reqwest::Client, base: &str) -> Value {
    let (status, body) = post(
        client,
        format!("{base}/api/chat/send"),
        json!({
            "message": "show me a bar chart of sales",
            "session_id": "s-1",
            "files": ["sales.csv"],
            "file_data": {"sales.csv": [5, 8, 13]}
        }),
    )
    .await;
    assert_eq!(status, 200);
    body
}

// ---------------------------------------------------------------------------
// Health & agents
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_health_endpoint() {
    let base = start_test_server(None).await;
    let (status, body) = get(format!("{base}/health")).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "steward");
    assert_eq!(body["agents"], 5);
}

#[tokio::test]
async fn test_agent_listing_includes_trust() {
    let base = start_test_server(None).await;
    let (status, body) = get(format!("{base}/api/agents")).await;
    assert_eq!(status, 200);
    let agents = body["agents"].as_array().unwrap();
    assert_eq!(agents.len(), 5);
    assert_eq!(agents[0]["id"], "chart_agent");
    assert_eq!(agents[0]["requires_files"], true);
    assert_eq!(agents[4]["id"], "general_agent");
    assert_eq!(agents[4]["trust"]["value"], 0.4);
}

#[tokio::test]
async fn test_unknown_agent_trust_is_404() {
    let base = start_test_server(None).await;
    let (status, body) = get(format!("{base}/api/agents/nobody/trust")).await;
    assert_eq!(status, 404);
    assert!(body["detail"].as_str().unwrap().contains("nobody"));
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_chat_routes_and_reports_metadata() {
    let base = start_test_server(None).await;
    let client = reqwest::Client::new();
    let body = send_chart_request(&client, &base).await;

    assert_eq!(body["agent_used"], "chart_agent");
    assert_eq!(body["session_id"], "s-1");
    let message = &body["message"];
    assert_eq!(message["role"], "assistant");
    assert_eq!(message["agent_id"], "chart_agent");
    assert_eq!(message["metadata"]["message_id"], message["id"]);
    assert_eq!(message["metadata"]["execution_path"], json!(["supervisor", "chart_agent"]));
    assert_eq!(message["metadata"]["agent_data"]["chart_type"], "bar");
    assert!(message["metadata"]["execution_id"].is_string());

    let (_, trust) = get(format!("{base}/api/agents/chart_agent/trust")).await;
    assert!((trust["value"].as_f64().unwrap() - 0.42).abs() < 1e-9);
}

#[tokio::test]
async fn test_chat_without_files_explains_what_to_upload() {
    let base = start_test_server(None).await;
    let client = reqwest::Client::new();
    let (status, body) = post(
        &client,
        format!("{base}/api/chat/send"),
        json!({"message": "plot revenue"}),
    )
    .await;
    assert_eq!(status, 200);
    assert!(body["message"]["content"]
        .as_str()
        .unwrap()
        .contains("Please upload a CSV or Excel file"));
    assert_eq!(body["message"]["metadata"]["error"], "agent_execution_error");
}

#[tokio::test]
async fn test_empty_chat_message_is_400() {
    let base = start_test_server(None).await;
    let client = reqwest::Client::new();
    let (status, body) = post(&client, format!("{base}/api/chat/send"), json!({"message": "  "})).await;
    assert_eq!(status, 400);
    assert!(body["detail"].is_string());
}

// ---------------------------------------------------------------------------
// Feedback
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_feedback_round_trip() {
    let base = start_test_server(None).await;
    let client = reqwest::Client::new();
    let chat = send_chart_request(&client, &base).await;
    let message_id = chat["message"]["id"].as_str().unwrap().to_string();

    let (status, body) = post(
        &client,
        format!("{base}/api/feedback"),
        json!({
            "message_id": message_id,
            "feedback_type": "thumbs_up",
            "rating": 4,
            "comment": "nice chart",
            "user_id": "alice"
        }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "success");
    assert_eq!(body["agent_id"], "chart_agent");
    assert_eq!(body["trust_impact"], "+0.5% trust score");
    assert!((body["trust_score"]["value"].as_f64().unwrap() - 0.425).abs() < 1e-9);

    let (status, listing) = get(format!("{base}/api/feedback/message/{message_id}")).await;
    assert_eq!(status, 200);
    assert_eq!(listing["feedback_count"], 1);
    assert_eq!(listing["feedbacks"][0]["user_id"], "alice");
    assert_eq!(listing["feedbacks"][0]["rating"], 4);

    let (_, stats) = get(format!("{base}/api/feedback/stats")).await;
    assert_eq!(stats["status"], "success");
    assert_eq!(stats["total_feedback"], 1);
    assert_eq!(stats["thumbs_up"], 1);
    assert_eq!(stats["satisfaction_rate"], 1.0);
    assert_eq!(stats["average_rating"], 4.0);
    assert_eq!(stats["feedback_with_comments"], 1);
}

#[tokio::test]
async fn test_feedback_rejections() {
    let base = start_test_server(None).await;
    let client = reqwest::Client::new();
    let chat = send_chart_request(&client, &base).await;
    let message_id = chat["message"]["id"].as_str().unwrap().to_string();
    let url = format!("{base}/api/feedback");

    let (status, _) = post(
        &client,
        url.clone(),
        json!({"message_id": "no-such-message", "feedback_type": "thumbs_up"}),
    )
    .await;
    assert_eq!(status, 404);

    let (status, _) = post(
        &client,
        url.clone(),
        json!({"message_id": message_id, "feedback_type": "thumbs_up", "rating": 9}),
    )
    .await;
    assert_eq!(status, 400);

    let (status, _) = post(
        &client,
        url.clone(),
        json!({"message_id": message_id, "feedback_type": "meh"}),
    )
    .await;
    assert_eq!(status, 400);

    let first = json!({"message_id": message_id, "feedback_type": "thumbs_down"});
    let (status, body) = post(&client, url.clone(), first.clone()).await;
    assert_eq!(status, 200);
    assert_eq!(body["trust_impact"], "no trust impact");
    let (status, body) = post(&client, url, first).await;
    assert_eq!(status, 409);
    assert!(body["detail"].as_str().unwrap().contains("anonymous"));
}

// ---------------------------------------------------------------------------
// Rate limiting
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_rate_limit_returns_429() {
    let limiter = RateLimiter::new(RateLimits {
        requests_per_minute: 2,
        ..RateLimits::default()
    });
    let base = start_test_server(Some(Arc::new(limiter))).await;
    let client = reqwest::Client::new();
    let get = |user: &'static str| {
        client
            .get(format!("{base}/api/agents"))
            .header("x-user-id", user)
            .send()
    };

    let first = get("alice").await.unwrap();
    assert_eq!(first.status().as_u16(), 200);
    assert_eq!(first.headers()["x-ratelimit-limit-minute"], "2");
    assert_eq!(first.headers()["x-ratelimit-remaining-minute"], "1");
    assert_eq!(get("alice").await.unwrap().status().as_u16(), 200);

    let limited = get("alice").await.unwrap();
    assert_eq!(limited.status().as_u16(), 429);
    assert_eq!(limited.headers()["retry-after"], "60");
    let body: Value = limited.json().await.unwrap();
    assert_eq!(body["retry_after"], 60);
    assert!(body["detail"].as_str().unwrap().contains("per minute"));

    // A different client still has its own allowance.
    assert_eq!(get("bob").await.unwrap().status().as_u16(), 200);

    // Health checks are never limited.
    for _ in 0..3 {
        let resp = client
            .get(format!("{base}/health"))
            .header("x-user-id", "alice")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
    }
}
