use crate::score::{to_units, TrustScore, INITIAL_TRUST, SCALE};
use crate::signal::TrustSignal;
use crate::store::{MemoryTrustStore, TrustStore};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use steward_core::{StewardError, StewardResult};
use tokio::sync::Mutex;
use tracing::{debug, info};

struct ScoreCell {
    units: i64,
    updated_at: DateTime<Utc>,
}

/// Result of applying a [`TrustSignal`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrustUpdate {
    /// Signal that produced the update.
    pub signal: TrustSignal,
    /// Delta from the signal table, before clamping.
    pub delta: f64,
    /// Score before the delta was applied.
    pub previous: TrustScore,
    /// Score after clamping and persisting.
    pub current: TrustScore,
}

impl TrustUpdate {
    /// Whether the signal carried a non-zero delta.
    pub fn has_impact(&self) -> bool {
        self.delta != 0.0
    }

    /// Human-readable summary, e.g. `"+0.5% trust score"`.
    pub fn impact_summary(&self) -> String {
        if self.has_impact() {
            format!("{:+.1}% trust score", self.delta * 100.0)
        } else {
            "no trust impact".to_string()
        }
    }
}

/// Shared per-agent trust scores.
///
/// Each agent owns its own lock: updates for one agent serialize, updates for
/// different agents never wait on each other. The outer map lock is only held
/// long enough to look up or insert a cell.
pub struct TrustEngine {
    cells: RwLock<HashMap<String, Arc<Mutex<ScoreCell>>>>,
    store: Arc<dyn TrustStore>,
}

impl TrustEngine {
    /// Engine persisting through `store`.
    pub fn new(store: Arc<dyn TrustStore>) -> Self {
        Self {
            cells: RwLock::new(HashMap::new()),
            store,
        }
    }

    /// Engine backed by a [`MemoryTrustStore`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryTrustStore::new()))
    }

    /// Register an agent, restoring its persisted score or starting it at
    /// [`INITIAL_TRUST`]. Registering an already known agent is a no-op.
    pub async fn register(&self, agent_id: &str) -> StewardResult<TrustScore> {
        if self.is_registered(agent_id) {
            return self.get(agent_id).await;
        }

        let persisted = self.store.load(agent_id).await?;
        let (initial, is_new) = match persisted {
            Some(score) => (score, false),
            None => (TrustScore::initial(agent_id), true),
        };

        let inserted = {
            let mut cells = self.cells.write();
            if cells.contains_key(agent_id) {
                false
            } else {
                cells.insert(
                    agent_id.to_string(),
                    Arc::new(Mutex::new(ScoreCell {
                        units: initial.units(),
                        updated_at: initial.updated_at,
                    })),
                );
                true
            }
        };

        if inserted && is_new {
            self.store.save(&initial).await?;
        }
        if inserted {
            info!(agent_id = %agent_id, trust = initial.value, restored = !is_new, "Registered agent trust score");
        }
        self.get(agent_id).await
    }

    /// Whether `agent_id` has a score cell.
    pub fn is_registered(&self, agent_id: &str) -> bool {
        self.cells.read().contains_key(agent_id)
    }

    fn cell(&self, agent_id: &str) -> StewardResult<Arc<Mutex<ScoreCell>>> {
        self.cells
            .read()
            .get(agent_id)
            .cloned()
            .ok_or_else(|| StewardError::NotFound(format!("No trust score for agent '{agent_id}'")))
    }

    /// Current score of a registered agent.
    pub async fn get(&self, agent_id: &str) -> StewardResult<TrustScore> {
        let cell = self.cell(agent_id)?;
        let guard = cell.lock().await;
        Ok(TrustScore::from_units(agent_id, guard.units, guard.updated_at))
    }

    /// Apply `delta` to an agent's score, clamp to `[0, 1]` and persist.
    ///
    /// Non-finite deltas are rejected with `Validation`.
    pub async fn update(&self, agent_id: &str, delta: f64) -> StewardResult<TrustScore> {
        let (_, current) = self.commit(agent_id, delta).await?;
        debug!(agent_id = %agent_id, delta, trust = current.value, graduated = current.graduated, "Trust score updated");
        Ok(current)
    }

    /// Apply the delta for `signal` and report the before/after scores.
    pub async fn apply(&self, agent_id: &str, signal: TrustSignal) -> StewardResult<TrustUpdate> {
        let delta = signal.delta();
        let (previous, current) = self.commit(agent_id, delta).await?;

        if previous.graduated != current.graduated {
            info!(
                agent_id = %agent_id,
                trust = current.value,
                graduated = current.graduated,
                "Agent graduation changed"
            );
        }
        info!(agent_id = %agent_id, signal = ?signal, delta, trust = current.value, "Trust signal applied");

        Ok(TrustUpdate {
            signal,
            delta,
            previous,
            current,
        })
    }

    /// Read-modify-write under the agent's lock. The store write happens before
    /// the in-memory commit, so a failed write leaves the score unchanged.
    async fn commit(&self, agent_id: &str, delta: f64) -> StewardResult<(TrustScore, TrustScore)> {
        if !delta.is_finite() {
            return Err(StewardError::Validation(format!(
                "Trust delta must be finite, got {delta}"
            )));
        }
        let cell = self.cell(agent_id)?;
        let mut guard = cell.lock().await;

        let previous = TrustScore::from_units(agent_id, guard.units, guard.updated_at);
        let next_units = guard.units.saturating_add(to_units(delta)).clamp(0, SCALE);
        let now = Utc::now();
        let current = TrustScore::from_units(agent_id, next_units, now);
        self.store.save(&current).await?;

        guard.units = next_units;
        guard.updated_at = now;
        Ok((previous, current))
    }

    /// Scores of every registered agent, sorted by agent id.
    pub async fn snapshot(&self) -> Vec<TrustScore> {
        let cells: Vec<(String, Arc<Mutex<ScoreCell>>)> = self
            .cells
            .read()
            .iter()
            .map(|(id, cell)| (id.clone(), cell.clone()))
            .collect();

        let mut scores = Vec::with_capacity(cells.len());
        for (agent_id, cell) in cells {
            let guard = cell.lock().await;
            scores.push(TrustScore::from_units(&agent_id, guard.units, guard.updated_at));
        }
        scores.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        scores
    }
}

impl Default for TrustEngine {
    fn default() -> Self {
        Self::in_memory()
    }
}
