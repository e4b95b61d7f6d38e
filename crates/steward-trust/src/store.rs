use crate::score::TrustScore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use steward_core::{StewardError, StewardResult};

/// Durable backing for trust scores.
///
/// The engine serializes every read-modify-write per agent, so implementations
/// only need last-writer-wins semantics for a single key.
#[async_trait]
pub trait TrustStore: Send + Sync {
    /// Persisted score for `agent_id`, if any.
    async fn load(&self, agent_id: &str) -> StewardResult<Option<TrustScore>>;
    /// Replace the persisted score for `score.agent_id`.
    async fn save(&self, score: &TrustScore) -> StewardResult<()>;
    /// Every persisted score.
    async fn list(&self) -> StewardResult<Vec<TrustScore>>;
}

/// Process-local store. Scores are lost on restart.
#[derive(Default)]
pub struct MemoryTrustStore {
    scores: RwLock<HashMap<String, TrustScore>>,
}

impl MemoryTrustStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TrustStore for MemoryTrustStore {
    async fn load(&self, agent_id: &str) -> StewardResult<Option<TrustScore>> {
        Ok(self.scores.read().get(agent_id).cloned())
    }

    async fn save(&self, score: &TrustScore) -> StewardResult<()> {
        self.scores
            .write()
            .insert(score.agent_id.clone(), score.clone());
        Ok(())
    }

    async fn list(&self) -> StewardResult<Vec<TrustScore>> {
        Ok(self.scores.read().values().cloned().collect())
    }
}

/// File-based store: one JSON document per agent.
pub struct FileTrustStore {
    dir: PathBuf,
}

impl FileTrustStore {
    /// Store writing one JSON file per agent under `dir`, created if missing.
    pub async fn new(dir: PathBuf) -> StewardResult<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn score_path(&self, agent_id: &str) -> PathBuf {
        let file_stem: String = agent_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{file_stem}.json"))
    }
}

#[async_trait]
impl TrustStore for FileTrustStore {
    async fn load(&self, agent_id: &str) -> StewardResult<Option<TrustScore>> {
        let path = self.score_path(agent_id);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        let data = tokio::fs::read_to_string(path).await?;
        let score: TrustScore = serde_json::from_str(&data)
            .map_err(|e| StewardError::Store(format!("Failed to parse trust score: {e}")))?;
        Ok(Some(score))
    }

    async fn save(&self, score: &TrustScore) -> StewardResult<()> {
        let path = self.score_path(&score.agent_id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(score)?;
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(tmp, path).await?;
        Ok(())
    }

    async fn list(&self) -> StewardResult<Vec<TrustScore>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut scores = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let data = tokio::fs::read_to_string(&path).await?;
            match serde_json::from_str::<TrustScore>(&data) {
                Ok(score) => scores.push(score),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable trust score");
                }
            }
        }
        Ok(scores)
    }
}
