use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::PathBuf;
use steward_core::{FeedbackRecord, StewardError, StewardResult};
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Durable feedback storage.
///
/// `insert` must check for a duplicate and store the record as one atomic
/// step: a user rates each message once and each execution once, whatever
/// message id the client attaches to it.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Store `record`, or fail with `Conflict` when it duplicates an earlier one.
    async fn insert(&self, record: &FeedbackRecord) -> StewardResult<()>;
    /// Records for one message, in insertion order.
    async fn for_message(&self, message_id: &str) -> StewardResult<Vec<FeedbackRecord>>;
    /// Every stored record, in insertion order.
    async fn all(&self) -> StewardResult<Vec<FeedbackRecord>>;
}

fn duplicate_error(record: &FeedbackRecord) -> StewardError {
    StewardError::Conflict(format!(
        "User '{}' already submitted feedback for message '{}' (execution {})",
        record.user_id, record.message_id, record.execution_id
    ))
}

fn is_duplicate(existing: &[FeedbackRecord], record: &FeedbackRecord) -> bool {
    existing.iter().any(|r| {
        r.user_id == record.user_id
            && (r.message_id == record.message_id || r.execution_id == record.execution_id)
    })
}

/// Process-local store.
#[derive(Default)]
pub struct MemoryFeedbackStore {
    records: Mutex<Vec<FeedbackRecord>>,
}

impl MemoryFeedbackStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FeedbackStore for MemoryFeedbackStore {
    async fn insert(&self, record: &FeedbackRecord) -> StewardResult<()> {
        let mut records = self.records.lock();
        if is_duplicate(&records, record) {
            return Err(duplicate_error(record));
        }
        records.push(record.clone());
        Ok(())
    }

    async fn for_message(&self, message_id: &str) -> StewardResult<Vec<FeedbackRecord>> {
        Ok(self
            .records
            .lock()
            .iter()
            .filter(|r| r.message_id == message_id)
            .cloned()
            .collect())
    }

    async fn all(&self) -> StewardResult<Vec<FeedbackRecord>> {
        Ok(self.records.lock().clone())
    }
}

/// Append-only JSONL file, mirrored in memory for queries.
pub struct FileFeedbackStore {
    path: PathBuf,
    records: tokio::sync::Mutex<Vec<FeedbackRecord>>,
}

impl FileFeedbackStore {
    /// Open (or create) the store at `path`, loading existing records.
    pub async fn open(path: impl Into<PathBuf>) -> StewardResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut records = Vec::new();
        if tokio::fs::try_exists(&path).await? {
            let content = tokio::fs::read_to_string(&path).await?;
            for (line_no, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<FeedbackRecord>(line) {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        warn!(path = %path.display(), line = line_no + 1, error = %e, "Skipping unreadable feedback record");
                    }
                }
            }
        }

        Ok(Self {
            path,
            records: tokio::sync::Mutex::new(records),
        })
    }
}

#[async_trait]
impl FeedbackStore for FileFeedbackStore {
    async fn insert(&self, record: &FeedbackRecord) -> StewardResult<()> {
        let mut records = self.records.lock().await;
        if is_duplicate(&records, record) {
            return Err(duplicate_error(record));
        }

        let line = serde_json::to_string(record)?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| StewardError::Store(format!("Failed to open feedback log: {e}")))?;
        file.write_all(format!("{line}\n").as_bytes())
            .await
            .map_err(|e| StewardError::Store(format!("Failed to append feedback: {e}")))?;
        file.flush().await?;

        records.push(record.clone());
        Ok(())
    }

    async fn for_message(&self, message_id: &str) -> StewardResult<Vec<FeedbackRecord>> {
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .filter(|r| r.message_id == message_id)
            .cloned()
            .collect())
    }

    async fn all(&self) -> StewardResult<Vec<FeedbackRecord>> {
        Ok(self.records.lock().await.clone())
    }
}
