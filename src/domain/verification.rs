use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status reported by the remote verification endpoint.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Pending,
    Confirmed,
    Failed,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone)]
pub struct VerificationResponse {
    pub status: VerificationStatus,
    /// Human-readable reason, surfaced to the user on failure.
    pub reason: Option<String>,
}

impl VerificationResponse {
    pub fn pending() -> Self {
        Self {
            status: VerificationStatus::Pending,
            reason: None,
        }
    }

    pub fn confirmed() -> Self {
        Self {
            status: VerificationStatus::Confirmed,
            reason: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: VerificationStatus::Failed,
            reason: Some(reason.into()),
        }
    }
}

/// Outcome of one poll attempt, as seen by the polling engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Pending,
    Confirmed,
    Failed,
    TransientError,
}

impl From<VerificationStatus> for PollOutcome {
    fn from(status: VerificationStatus) -> Self {
        match status {
            VerificationStatus::Pending => Self::Pending,
            VerificationStatus::Confirmed => Self::Confirmed,
            VerificationStatus::Failed => Self::Failed,
        }
    }
}

/// Ephemeral record of a single poll tick. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollAttempt {
    /// 1-based, monotonic within one payment intent.
    pub attempt_number: u32,
    pub observed_at: DateTime<Utc>,
    pub outcome: PollOutcome,
}

/// Final result of a polling run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollResult {
    Confirmed,
    Failed { reason: Option<String> },
    /// Budget exhausted while the endpoint kept answering `pending`.
    Timeout,
    /// Budget exhausted on a transient error.
    Error { last_error: String },
}
