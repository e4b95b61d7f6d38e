use crate::error::StewardError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Polarity of a piece of user feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedbackType {
    /// Thumbs up.
    #[serde(rename = "thumbs_up")]
    Positive,
    /// Thumbs down.
    #[serde(rename = "thumbs_down")]
    Negative,
}

impl FeedbackType {
    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackType::Positive => "thumbs_up",
            FeedbackType::Negative => "thumbs_down",
        }
    }
}

impl std::fmt::Display for FeedbackType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackType {
    type Err = StewardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "thumbs_up" | "positive" => Ok(FeedbackType::Positive),
            "thumbs_down" | "negative" => Ok(FeedbackType::Negative),
            other => Err(StewardError::Validation(format!(
                "feedback_type must be 'thumbs_up' or 'thumbs_down', got '{other}'"
            ))),
        }
    }
}

/// Raw feedback as received from a client, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackSubmission {
    /// Chat message being rated.
    pub message_id: String,
    /// Execution that produced the message.
    pub execution_id: Uuid,
    /// Submitting user; `anonymous` when absent.
    #[serde(default)]
    pub user_id: Option<String>,
    /// `thumbs_up` or `thumbs_down`.
    pub feedback_type: String,
    /// Optional star rating, validated to 1 to 5.
    #[serde(default)]
    pub rating: Option<i64>,
    /// Optional comment, at most 1000 characters.
    #[serde(default)]
    pub comment: Option<String>,
}

/// A stored, validated piece of feedback. Immutable once persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// Unique record id.
    pub feedback_id: Uuid,
    /// Rated chat message.
    pub message_id: String,
    /// Rated execution.
    pub execution_id: Uuid,
    /// Submitting user.
    pub user_id: String,
    /// Thumbs up or down.
    pub feedback_type: FeedbackType,
    /// Star rating, 1 to 5.
    pub rating: Option<u8>,
    /// Free-text comment.
    pub comment: Option<String>,
    /// When the record was stored.
    pub created_at: DateTime<Utc>,
}
