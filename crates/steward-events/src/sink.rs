use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::time::Duration;
use steward_core::{Event, StewardError, StewardResult, Topic};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Destination of published events.
///
/// A sink performs a single delivery attempt; retries and backoff are the
/// publisher's job.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Deliver one event. An error marks this attempt as failed.
    async fn deliver(&self, event: &Event) -> StewardResult<()>;
}

/// Appends each event as one JSON line to a local file.
pub struct JsonlEventSink {
    path: PathBuf,
}

impl JsonlEventSink {
    /// Sink appending to `path`; the file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File the sink appends to.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl EventSink for JsonlEventSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn deliver(&self, event: &Event) -> StewardResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let line = serde_json::json!({
            "stream": event.topic.stream(),
            "topic": event.topic,
            "payload": event.payload,
            "timestamp": event.timestamp,
        });
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{line}\n").as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Posts events to an HTTP collector at `{base_url}/events/{topic}`.
pub struct HttpEventSink {
    base_url: String,
    http: reqwest::Client,
}

impl HttpEventSink {
    /// Sink posting to `base_url` with a per-request `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> StewardResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StewardError::Http(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }
}

#[async_trait]
impl EventSink for HttpEventSink {
    fn name(&self) -> &str {
        "http"
    }

    async fn deliver(&self, event: &Event) -> StewardResult<()> {
        let url = format!("{}/events/{}", self.base_url, event.topic);
        let resp = self
            .http
            .post(&url)
            .json(event)
            .send()
            .await
            .map_err(|e| StewardError::Publish(format!("POST {url}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(StewardError::Publish(format!(
                "Event collector returned {status} for {url}"
            )));
        }
        Ok(())
    }
}

/// Keeps delivered events in memory. Useful for tests and embedding.
#[derive(Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<Event>>,
    fail_next: Mutex<u32>,
}

impl MemoryEventSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink whose first `n` delivery attempts fail.
    pub fn failing_first(n: u32) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail_next: Mutex::new(n),
        }
    }

    /// Every event delivered so far, in delivery order.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Captured events for one topic, in delivery order.
    pub fn events_for(&self, topic: Topic) -> Vec<Event> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.topic == topic)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventSink for MemoryEventSink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn deliver(&self, event: &Event) -> StewardResult<()> {
        {
            let mut remaining = self.fail_next.lock();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StewardError::Publish("injected delivery failure".into()));
            }
        }
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Discards events after logging them at debug level.
pub struct NullEventSink;

#[async_trait]
impl EventSink for NullEventSink {
    fn name(&self) -> &str {
        "none"
    }

    async fn deliver(&self, event: &Event) -> StewardResult<()> {
        debug!(topic = %event.topic, "Event discarded (no sink configured)");
        Ok(())
    }
}
