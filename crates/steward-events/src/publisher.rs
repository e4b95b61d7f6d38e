use crate::sink::EventSink;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use steward_core::{Event, Topic};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Queue and retry settings for an [`EventPublisher`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// Maximum number of events waiting for delivery. Further events are dropped.
    pub queue_capacity: usize,
    /// Retries after the first failed attempt before an event is dropped.
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub backoff_base_ms: u64,
    /// Maximum delay in milliseconds (cap for exponential backoff).
    pub backoff_max_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            max_retries: 3,
            backoff_base_ms: 100,
            backoff_max_ms: 5_000,
        }
    }
}

/// Exponential backoff for `attempt` (0-based), capped at `backoff_max_ms`.
pub fn compute_backoff(config: &PublisherConfig, attempt: u32) -> u64 {
    let delay = config
        .backoff_base_ms
        .saturating_mul(2u64.saturating_pow(attempt));
    delay.min(config.backoff_max_ms)
}

/// Delivery counters since the publisher was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PublisherStats {
    /// Events the sink accepted.
    pub published: u64,
    /// Events shed because the queue was full or the publisher was shut down.
    pub dropped: u64,
    /// Events dropped after exhausting their retries.
    pub failed: u64,
    /// Individual retry attempts.
    pub retried: u64,
}

#[derive(Default)]
struct Counters {
    published: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
}

enum Envelope {
    Event(Event),
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Fire-and-forget publisher for governance events.
///
/// `publish` never waits on the sink: events go into a bounded queue drained by
/// a single background worker, so ordering is preserved for everything a
/// caller publishes. When the queue is full the event being published is
/// dropped with a warning.
pub struct EventPublisher {
    tx: mpsc::Sender<Envelope>,
    counters: Arc<Counters>,
    sink_name: String,
}

impl EventPublisher {
    /// Create a publisher and spawn its delivery worker on the current runtime.
    pub fn new(sink: Arc<dyn EventSink>, config: PublisherConfig) -> Self {
        let capacity = config.queue_capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let counters = Arc::new(Counters::default());
        let sink_name = sink.name().to_string();

        info!(
            sink = %sink_name,
            queue_capacity = capacity,
            max_retries = config.max_retries,
            "Event publisher started"
        );
        tokio::spawn(run_worker(rx, sink, config, counters.clone()));

        Self {
            tx,
            counters,
            sink_name,
        }
    }

    /// Queue `payload` for `topic`. Returns immediately.
    pub fn publish(&self, topic: Topic, payload: serde_json::Map<String, serde_json::Value>) {
        self.publish_event(Event::new(topic, payload));
    }

    /// Queue a typed payload. Payloads that do not serialize to a JSON object
    /// are logged and dropped.
    pub fn publish_payload<T: Serialize>(&self, topic: Topic, payload: &T) {
        match Event::from_payload(topic, payload) {
            Ok(event) => self.publish_event(event),
            Err(e) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(topic = %topic, error = %e, "Dropping unserializable event payload");
            }
        }
    }

    /// Queue an already built event. Returns immediately.
    pub fn publish_event(&self, event: Event) {
        let topic = event.topic;
        match self.tx.try_send(Envelope::Event(event)) {
            Ok(()) => debug!(topic = %topic, "Event queued"),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(topic = %topic, sink = %self.sink_name, "Event queue full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(topic = %topic, "Event publisher is shut down, dropping event");
            }
        }
    }

    /// Wait until every event queued before this call has been delivered or
    /// dropped.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Envelope::Flush(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// Deliver what is already queued, then stop the worker. Events published
    /// afterwards are dropped.
    pub async fn shutdown(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Envelope::Shutdown(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
        info!(stats = ?self.stats(), "Event publisher stopped");
    }

    /// Counters since the publisher started.
    pub fn stats(&self) -> PublisherStats {
        PublisherStats {
            published: self.counters.published.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            retried: self.counters.retried.load(Ordering::Relaxed),
        }
    }

    /// Number of envelopes currently waiting in the queue.
    pub fn queue_depth(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<Envelope>,
    sink: Arc<dyn EventSink>,
    config: PublisherConfig,
    counters: Arc<Counters>,
) {
    let mut shutdown_ack = None;
    while let Some(envelope) = rx.recv().await {
        match envelope {
            Envelope::Event(event) => {
                deliver_with_retry(sink.as_ref(), &event, &config, &counters).await;
            }
            Envelope::Flush(ack) => {
                let _ = ack.send(());
            }
            Envelope::Shutdown(ack) => {
                // Already buffered envelopes are still drained below.
                rx.close();
                shutdown_ack = Some(ack);
            }
        }
    }
    debug!("Event delivery worker exited");
    if let Some(ack) = shutdown_ack {
        let _ = ack.send(());
    }
}

async fn deliver_with_retry(
    sink: &dyn EventSink,
    event: &Event,
    config: &PublisherConfig,
    counters: &Counters,
) {
    for attempt in 0..=config.max_retries {
        match sink.deliver(event).await {
            Ok(()) => {
                counters.published.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Err(e) if attempt < config.max_retries => {
                let delay = compute_backoff(config, attempt);
                counters.retried.fetch_add(1, Ordering::Relaxed);
                warn!(
                    topic = %event.topic,
                    sink = sink.name(),
                    attempt = attempt + 1,
                    delay_ms = delay,
                    error = %e,
                    "Event delivery failed, retrying"
                );
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    topic = %event.topic,
                    sink = sink.name(),
                    attempts = attempt + 1,
                    error = %e,
                    "Event delivery failed, dropping event"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemoryEventSink;

    fn fast_config() -> PublisherConfig {
        PublisherConfig {
            queue_capacity: 16,
            max_retries: 2,
            backoff_base_ms: 1,
            backoff_max_ms: 4,
        }
    }

    fn payload(n: u64) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        map.insert("n".into(), n.into());
        map
    }

    #[test]
    fn test_compute_backoff_exponential_and_capped() {
        let config = PublisherConfig::default();
        assert_eq!(compute_backoff(&config, 0), 100);
        assert_eq!(compute_backoff(&config, 1), 200);
        assert_eq!(compute_backoff(&config, 3), 800);
        assert_eq!(compute_backoff(&config, 6), 5_000);
        assert_eq!(compute_backoff(&config, 40), 5_000);
    }

    #[tokio::test]
    async fn test_publish_then_flush_delivers_in_order() {
        let sink = Arc::new(MemoryEventSink::new());
        let publisher = EventPublisher::new(sink.clone(), fast_config());
        for n in 0..5 {
            publisher.publish(Topic::Metrics, payload(n));
        }
        publisher.flush().await;

        let seen: Vec<u64> = sink
            .events()
            .iter()
            .map(|e| e.payload["n"].as_u64().unwrap())
            .collect();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert_eq!(publisher.stats().published, 5);
        assert_eq!(publisher.queue_depth(), 0);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let sink = Arc::new(MemoryEventSink::failing_first(2));
        let publisher = EventPublisher::new(sink.clone(), fast_config());
        publisher.publish(Topic::Trust, payload(1));
        publisher.flush().await;

        let stats = publisher.stats();
        assert_eq!(stats.published, 1);
        assert_eq!(stats.retried, 2);
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test]
    async fn test_exhausted_retries_drop_event() {
        let sink = Arc::new(MemoryEventSink::failing_first(3));
        let publisher = EventPublisher::new(sink.clone(), fast_config());
        publisher.publish(Topic::Trust, payload(1));
        publisher.publish(Topic::Trust, payload(2));
        publisher.flush().await;

        let stats = publisher.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.published, 1);
        assert_eq!(sink.events()[0].payload["n"], 2);
    }

    #[tokio::test]
    async fn test_publish_after_shutdown_is_dropped() {
        let sink = Arc::new(MemoryEventSink::new());
        let publisher = EventPublisher::new(sink.clone(), fast_config());
        publisher.publish(Topic::Feedback, payload(1));
        publisher.shutdown().await;
        publisher.publish(Topic::Feedback, payload(2));

        assert_eq!(sink.events().len(), 1);
        assert_eq!(publisher.stats().dropped, 1);
    }

    #[tokio::test]
    async fn test_non_object_payload_is_dropped() {
        let sink = Arc::new(MemoryEventSink::new());
        let publisher = EventPublisher::new(sink.clone(), fast_config());
        publisher.publish_payload(Topic::Metrics, &"not an object");
        publisher.flush().await;
        assert!(sink.events().is_empty());
        assert_eq!(publisher.stats().dropped, 1);
    }
}
