#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use steward_core::{Event, StewardResult, Topic};
use steward_events::*;
use tokio::sync::Notify;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn payload(agent: &str, n: u64) -> serde_json::Map<String, serde_json::Value> {
    let mut map = serde_json::Map::new();
    map.insert("agent_id".into(), agent.into());
    map.insert("n".into(), n.into());
    map
}

fn fast_config(queue_capacity: usize) -> PublisherConfig {
    PublisherConfig {
        queue_capacity,
        max_retries: 2,
        backoff_base_ms: 1,
        backoff_max_ms: 5,
    }
}

// ---------------------------------------------------------------------------
// HTTP sink
// ---------------------------------------------------------------------------

#[tokio::test]
async fn http_sink_posts_to_topic_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events/metrics"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let sink = Arc::new(HttpEventSink::new(server.uri(), Duration::from_secs(2)).unwrap());
    let publisher = EventPublisher::new(sink, fast_config(8));
    publisher.publish(Topic::Metrics, payload("chart_agent", 1));
    publisher.flush().await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = requests[0].body_json().unwrap();
    assert_eq!(body["topic"], "metrics");
    assert_eq!(body["payload"]["agent_id"], "chart_agent");
    assert_eq!(publisher.stats().published, 1);
}

#[tokio::test]
async fn http_sink_server_errors_retry_then_drop() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events/trust"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let sink = Arc::new(HttpEventSink::new(server.uri(), Duration::from_secs(2)).unwrap());
    let publisher = EventPublisher::new(sink, fast_config(8));
    publisher.publish(Topic::Trust, payload("chart_agent", 1));
    publisher.flush().await;

    // One initial attempt plus max_retries.
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
    let stats = publisher.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.retried, 2);
    assert_eq!(stats.published, 0);
}

#[tokio::test]
async fn unreachable_collector_never_reaches_caller() {
    let sink = Arc::new(HttpEventSink::new("http://127.0.0.1:1", Duration::from_millis(200)).unwrap());
    let publisher = EventPublisher::new(sink, fast_config(8));

    // publish returns immediately even though delivery will fail.
    let started = std::time::Instant::now();
    publisher.publish(Topic::Feedback, payload("general_agent", 1));
    assert!(started.elapsed() < Duration::from_millis(100));

    publisher.flush().await;
    assert_eq!(publisher.stats().failed, 1);
}

// ---------------------------------------------------------------------------
// Bounded queue: drop-newest under backpressure
// ---------------------------------------------------------------------------

/// Sink that holds every delivery until released.
struct GatedSink {
    inner: MemoryEventSink,
    open: Notify,
    entered: Notify,
}

#[async_trait]
impl EventSink for GatedSink {
    fn name(&self) -> &str {
        "gated"
    }

    async fn deliver(&self, event: &Event) -> StewardResult<()> {
        self.entered.notify_one();
        self.open.notified().await;
        self.inner.deliver(event).await
    }
}

#[tokio::test]
async fn full_queue_drops_newest_without_blocking() {
    let sink = Arc::new(GatedSink {
        inner: MemoryEventSink::new(),
        open: Notify::new(),
        entered: Notify::new(),
    });
    let publisher = EventPublisher::new(sink.clone(), fast_config(2));

    // First event is taken by the worker and parked inside the sink.
    publisher.publish(Topic::Metrics, payload("a", 0));
    sink.entered.notified().await;

    // Two fit in the queue; the rest are shed.
    for n in 1..=5 {
        publisher.publish(Topic::Metrics, payload("a", n));
    }
    assert_eq!(publisher.stats().dropped, 3);
    assert_eq!(publisher.queue_depth(), 2);

    let releaser = tokio::spawn({
        let sink = sink.clone();
        async move {
            loop {
                sink.open.notify_one();
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
    });
    publisher.flush().await;
    releaser.abort();

    let delivered: Vec<u64> = sink
        .inner
        .events()
        .iter()
        .map(|e| e.payload["n"].as_u64().unwrap())
        .collect();
    assert_eq!(delivered, vec![0, 1, 2]);
}

// ---------------------------------------------------------------------------
// Ordering and file sink
// ---------------------------------------------------------------------------

#[tokio::test]
async fn per_producer_order_is_preserved_per_topic() {
    let sink = Arc::new(MemoryEventSink::new());
    let publisher = EventPublisher::new(sink.clone(), fast_config(64));
    for n in 0..10 {
        publisher.publish(Topic::Metrics, payload("a", n));
        publisher.publish(Topic::Trust, payload("a", n));
    }
    publisher.flush().await;

    for topic in [Topic::Metrics, Topic::Trust] {
        let seq: Vec<u64> = sink
            .events_for(topic)
            .iter()
            .map(|e| e.payload["n"].as_u64().unwrap())
            .collect();
        assert_eq!(seq, (0..10).collect::<Vec<_>>());
    }
}

#[tokio::test]
async fn jsonl_sink_through_publisher() {
    let tmp = tempfile::tempdir().unwrap();
    let file = tmp.path().join("events.jsonl");
    let publisher = EventPublisher::new(Arc::new(JsonlEventSink::new(&file)), fast_config(8));
    publisher.publish(Topic::Feedback, payload("forecasting_agent", 7));
    publisher.shutdown().await;

    let content = tokio::fs::read_to_string(&file).await.unwrap();
    let line: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
    assert_eq!(line["stream"], "steward:events:feedback");
    assert_eq!(line["payload"]["n"], 7);
}
