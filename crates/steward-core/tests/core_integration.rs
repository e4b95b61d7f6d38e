#![allow(clippy::unwrap_used, clippy::expect_used)]

use steward_core::*;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// 1. State flows through successive steps without mutating earlier values
// ---------------------------------------------------------------------------

#[test]
fn state_steps_produce_new_values() {
    let entry = RequestState::new("show me a bar chart", "session-1", vec!["file-1".into()]);
    let routed = entry
        .clone()
        .with_execution_step(SUPERVISOR_NODE)
        .with_selected_agent("chart_agent");
    let executed = routed
        .clone()
        .with_execution_step("chart_agent")
        .with_response("Chart ready", 0.9, None);

    assert!(entry.execution_path().is_empty());
    assert_eq!(routed.execution_path(), [SUPERVISOR_NODE]);
    assert_eq!(executed.execution_path(), [SUPERVISOR_NODE, "chart_agent"]);
    assert_eq!(executed.agent_response.as_deref(), Some("Chart ready"));
    assert!(routed.agent_response.is_none());
}

// ---------------------------------------------------------------------------
// 2. Error Display and From impls
// ---------------------------------------------------------------------------

#[test]
fn error_display_and_from_impls() {
    let routing = StewardError::Routing("no default agent".to_string());
    assert_eq!(routing.to_string(), "Routing error: no default agent");

    let validation = StewardError::Validation("rating out of range".to_string());
    assert!(validation.is_client_error());
    assert!(!StewardError::Publish("down".to_string()).is_client_error());

    let json_err: StewardError = serde_json::from_str::<serde_json::Value>("{bad")
        .unwrap_err()
        .into();
    assert!(matches!(json_err, StewardError::Json(_)));

    let io_err: StewardError = std::io::Error::other("disk gone").into();
    assert!(io_err.to_string().contains("disk gone"));
}

// ---------------------------------------------------------------------------
// 3. Event payloads serialize to the documented wire shapes
// ---------------------------------------------------------------------------

#[test]
fn trust_payload_wire_shape() {
    let payload = TrustPayload {
        agent_id: "chart_agent".to_string(),
        event_type: TrustEventType::UserFeedback,
        severity: Severity::Positive,
        impact: 0.005,
        confidence: 1.0,
        context: TrustContext {
            execution_id: Uuid::new_v4(),
            user_id: Some("u-1".to_string()),
            rating: Some(5),
        },
        timestamp: chrono::Utc::now(),
    };
    let event = Event::from_payload(Topic::Trust, &payload).unwrap();
    assert_eq!(event.payload["event_type"], "user_feedback");
    assert_eq!(event.payload["severity"], "positive");
    assert_eq!(event.payload["context"]["rating"], 5);
    assert_eq!(event.payload["context"]["user_id"], "u-1");
}

#[test]
fn chat_message_serializes_role_lowercase() {
    let msg = ChatMessage::assistant("hi", Some("general_agent".to_string()));
    let json = serde_json::to_value(&msg).unwrap();
    assert_eq!(json["role"], "assistant");
    assert_eq!(json["agent_id"], "general_agent");
    let user = serde_json::to_value(ChatMessage::user("hello")).unwrap();
    assert!(user.get("agent_id").is_none());
}
