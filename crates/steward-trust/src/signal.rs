use serde::{Deserialize, Serialize};
use steward_core::{Outcome, Severity, TrustEventType};

/// Delta for a successful execution.
pub const SUCCESS_DELTA: f64 = 0.02;
/// Delta for a handled execution failure.
pub const FAILURE_DELTA: f64 = -0.02;
/// Delta for an internal fault or timeout.
pub const ERROR_DELTA: f64 = -0.03;
/// Delta for a user rating of 4 or 5.
pub const POSITIVE_RATING_DELTA: f64 = 0.005;
/// Delta for a governance policy violation.
pub const POLICY_VIOLATION_DELTA: f64 = -0.05;
/// Lowest rating that earns [`POSITIVE_RATING_DELTA`].
pub const POSITIVE_RATING_MIN: u8 = 4;

/// Something that happened to an agent and may move its trust score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "signal", content = "rating")]
pub enum TrustSignal {
    /// The agent completed without error.
    ExecutionSuccess,
    /// The agent returned a handled error.
    ExecutionFailure,
    /// The agent faulted internally.
    ExecutionError,
    /// The engine cancelled the agent after its deadline.
    ExecutionTimeout,
    /// A user rated one of the agent's responses (1-5).
    FeedbackRating(u8),
    /// The governance policy gate denied the agent.
    PolicyViolation,
}

impl TrustSignal {
    /// Trust delta for this signal, before clamping.
    pub fn delta(&self) -> f64 {
        match self {
            TrustSignal::ExecutionSuccess => SUCCESS_DELTA,
            TrustSignal::ExecutionFailure => FAILURE_DELTA,
            TrustSignal::ExecutionError | TrustSignal::ExecutionTimeout => ERROR_DELTA,
            TrustSignal::FeedbackRating(rating) if *rating >= POSITIVE_RATING_MIN => {
                POSITIVE_RATING_DELTA
            }
            TrustSignal::FeedbackRating(_) => 0.0,
            TrustSignal::PolicyViolation => POLICY_VIOLATION_DELTA,
        }
    }

    /// Signal for a finished execution.
    pub fn from_outcome(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => TrustSignal::ExecutionSuccess,
            Outcome::Failure => TrustSignal::ExecutionFailure,
            Outcome::Error => TrustSignal::ExecutionError,
        }
    }

    /// Event type reported to governance.
    pub fn event_type(&self) -> TrustEventType {
        match self {
            TrustSignal::ExecutionSuccess => TrustEventType::TaskCompleted,
            TrustSignal::ExecutionFailure | TrustSignal::ExecutionError => {
                TrustEventType::TaskFailed
            }
            TrustSignal::ExecutionTimeout => TrustEventType::TimeoutExceeded,
            TrustSignal::FeedbackRating(_) => TrustEventType::UserFeedback,
            TrustSignal::PolicyViolation => TrustEventType::PolicyViolation,
        }
    }

    /// Severity reported to governance.
    pub fn severity(&self) -> Severity {
        match self {
            TrustSignal::ExecutionSuccess => Severity::Positive,
            TrustSignal::ExecutionFailure => Severity::Negative,
            TrustSignal::ExecutionError
            | TrustSignal::ExecutionTimeout
            | TrustSignal::PolicyViolation => Severity::Critical,
            TrustSignal::FeedbackRating(_) if self.delta() > 0.0 => Severity::Positive,
            TrustSignal::FeedbackRating(_) => Severity::Neutral,
        }
    }
}
