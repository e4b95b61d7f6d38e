use crate::feedback_store::FeedbackStore;
use crate::graph::trust_payload;
use crate::ledger::ExecutionLedger;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use steward_core::{
    FeedbackPayload, FeedbackRecord, FeedbackSubmission, FeedbackType, StewardError,
    StewardResult, Topic, TrustContext,
};
use steward_events::EventPublisher;
use steward_trust::{TrustEngine, TrustScore, TrustSignal, TrustUpdate};
use tracing::{error, info};
use uuid::Uuid;

/// Longest accepted feedback comment, in characters.
pub const MAX_COMMENT_CHARS: usize = 1000;
/// User id recorded when the client does not send one.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Confidence attached to trust events derived from user ratings.
const FEEDBACK_SIGNAL_CONFIDENCE: f64 = 1.0;

/// Result of a successful submission.
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackReceipt {
    /// The stored record.
    pub record: FeedbackRecord,
    /// Agent that produced the rated execution.
    pub agent_id: String,
    /// Delta applied to the agent's trust score (0 when none).
    pub trust_delta: f64,
    /// Human-readable delta, e.g. `"+0.5% trust score"`.
    pub trust_impact: String,
    /// The agent's score after the update, when one was applied.
    pub trust_score: Option<TrustScore>,
}

/// Aggregate feedback counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackStats {
    /// Number of stored records.
    pub total_feedback: usize,
    /// Records of type thumbs-up.
    pub thumbs_up: usize,
    /// Records of type thumbs-down.
    pub thumbs_down: usize,
    /// Share of thumbs-up in `[0, 1]`; `None` without feedback.
    pub satisfaction_rate: Option<f64>,
    /// Mean rating rounded to two decimals; `None` without ratings.
    pub average_rating: Option<f64>,
    /// Records with a non-blank comment.
    pub feedback_with_comments: usize,
}

impl FeedbackStats {
    /// Aggregate over `records`.
    pub fn from_records(records: &[FeedbackRecord]) -> Self {
        let total = records.len();
        let thumbs_up = records
            .iter()
            .filter(|r| r.feedback_type == FeedbackType::Positive)
            .count();
        let ratings: Vec<f64> = records
            .iter()
            .filter_map(|r| r.rating)
            .map(f64::from)
            .collect();
        let average_rating = if ratings.is_empty() {
            None
        } else {
            let mean = ratings.iter().sum::<f64>() / ratings.len() as f64;
            Some((mean * 100.0).round() / 100.0)
        };

        Self {
            total_feedback: total,
            thumbs_up,
            thumbs_down: total - thumbs_up,
            satisfaction_rate: (total > 0).then(|| thumbs_up as f64 / total as f64),
            average_rating,
            feedback_with_comments: records
                .iter()
                .filter(|r| r.comment.as_deref().is_some_and(|c| !c.trim().is_empty()))
                .count(),
        }
    }
}

/// Validates, stores and accounts user feedback on past executions.
pub struct FeedbackIngestor {
    store: Arc<dyn FeedbackStore>,
    ledger: Arc<ExecutionLedger>,
    trust: Arc<TrustEngine>,
    publisher: Arc<EventPublisher>,
}

impl FeedbackIngestor {
    /// Ingestor resolving executions through `ledger`.
    pub fn new(
        store: Arc<dyn FeedbackStore>,
        ledger: Arc<ExecutionLedger>,
        trust: Arc<TrustEngine>,
        publisher: Arc<EventPublisher>,
    ) -> Self {
        Self {
            store,
            ledger,
            trust,
            publisher,
        }
    }

    /// Record one piece of feedback.
    ///
    /// Fails with `Validation` for malformed input, `NotFound` when the
    /// execution is unknown and `Conflict` when this user already rated this
    /// message or execution. None of these change any state. Once the record
    /// is stored the submission succeeds and the feedback event is published,
    /// even if the trust update fails.
    pub async fn submit(&self, submission: FeedbackSubmission) -> StewardResult<FeedbackReceipt> {
        let (feedback_type, rating, comment) = validate(&submission)?;

        let execution = self.ledger.get(&submission.execution_id).ok_or_else(|| {
            StewardError::NotFound(format!("Execution '{}' not found", submission.execution_id))
        })?;

        let user_id = submission
            .user_id
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| ANONYMOUS_USER.to_string());
        let record = FeedbackRecord {
            feedback_id: Uuid::new_v4(),
            message_id: submission.message_id,
            execution_id: submission.execution_id,
            user_id,
            feedback_type,
            rating,
            comment,
            created_at: Utc::now(),
        };
        self.store.insert(&record).await?;

        // Stored: a failed trust write from here on is logged, not returned.
        let update = match rating {
            Some(r) => match self.apply_rating(&execution.agent_id, r).await {
                Ok(update) => Some(update),
                Err(e) => {
                    error!(
                        feedback_id = %record.feedback_id,
                        agent_id = %execution.agent_id,
                        error = %e,
                        "Failed to apply feedback to trust score"
                    );
                    None
                }
            },
            None => None,
        };

        self.publisher.publish_payload(
            Topic::Feedback,
            &FeedbackPayload {
                feedback_id: record.feedback_id,
                message_id: record.message_id.clone(),
                execution_id: record.execution_id,
                agent_id: execution.agent_id.clone(),
                user_id: record.user_id.clone(),
                feedback_type: record.feedback_type.to_string(),
                rating: record.rating,
                comment: record.comment.clone(),
                timestamp: record.created_at,
            },
        );

        let (trust_delta, trust_impact, trust_score) = match &update {
            Some(update) if update.has_impact() => {
                let payload = trust_payload(
                    &execution.agent_id,
                    update,
                    FEEDBACK_SIGNAL_CONFIDENCE,
                    TrustContext {
                        execution_id: record.execution_id,
                        user_id: Some(record.user_id.clone()),
                        rating: record.rating,
                    },
                );
                self.publisher.publish_payload(Topic::Trust, &payload);
                (update.delta, update.impact_summary(), Some(update.current.clone()))
            }
            Some(update) => (0.0, update.impact_summary(), Some(update.current.clone())),
            None => (0.0, "no trust impact".to_string(), None),
        };

        info!(
            feedback_id = %record.feedback_id,
            execution_id = %record.execution_id,
            agent_id = %execution.agent_id,
            feedback_type = %record.feedback_type,
            rating = ?record.rating,
            trust_delta,
            "Feedback recorded"
        );

        Ok(FeedbackReceipt {
            record,
            agent_id: execution.agent_id,
            trust_delta,
            trust_impact,
            trust_score,
        })
    }

    async fn apply_rating(&self, agent_id: &str, rating: u8) -> StewardResult<TrustUpdate> {
        if !self.trust.is_registered(agent_id) {
            self.trust.register(agent_id).await?;
        }
        self.trust
            .apply(agent_id, TrustSignal::FeedbackRating(rating))
            .await
    }

    /// Feedback for one message, newest first.
    pub async fn list_for_message(&self, message_id: &str) -> StewardResult<Vec<FeedbackRecord>> {
        let mut records = self.store.for_message(message_id).await?;
        // Reverse first so equal timestamps also come out newest first.
        records.reverse();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    /// Counters over every stored record.
    pub async fn stats(&self) -> StewardResult<FeedbackStats> {
        Ok(FeedbackStats::from_records(&self.store.all().await?))
    }
}

/// Check a submission's fields without touching any state.
pub fn validate_feedback(submission: &FeedbackSubmission) -> StewardResult<()> {
    validate(submission).map(|_| ())
}

fn validate(
    submission: &FeedbackSubmission,
) -> StewardResult<(FeedbackType, Option<u8>, Option<String>)> {
    if submission.message_id.trim().is_empty() {
        return Err(StewardError::Validation("message_id must not be empty".into()));
    }
    let feedback_type: FeedbackType = submission.feedback_type.parse()?;
    let rating = match submission.rating {
        None => None,
        Some(r) if (1..=5).contains(&r) => Some(r as u8),
        Some(r) => {
            return Err(StewardError::Validation(format!(
                "rating must be between 1 and 5, got {r}"
            )))
        }
    };
    let comment = match &submission.comment {
        Some(c) if c.chars().count() > MAX_COMMENT_CHARS => {
            return Err(StewardError::Validation(format!(
                "comment must be at most {MAX_COMMENT_CHARS} characters"
            )))
        }
        other => other.clone(),
    };
    Ok((feedback_type, rating, comment))
}
