use serde::{Deserialize, Serialize};
use std::fmt;

/// The single user-facing status of a payment session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    #[default]
    Idle,
    CreatingIntent,
    AwaitingPayment,
    /// Cosmetic sub-state of `AwaitingPayment`, entered on the first pending poll.
    Verifying,
    Confirmed,
    Failed,
    Expired,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed | Self::Expired)
    }

    /// True while a payment intent is being created or awaited.
    pub fn is_active(self) -> bool {
        !self.is_terminal() && self != Self::Idle
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::CreatingIntent => "creatingIntent",
            Self::AwaitingPayment => "awaitingPayment",
            Self::Verifying => "verifying",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reason code recorded alongside a terminal status.
///
/// `WallClockExpired` and `AttemptsExhausted` both present as `Expired` to the
/// user but stay distinct for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TerminalReason {
    Confirmed,
    VerificationFailed,
    SetupFailed,
    WallClockExpired,
    AttemptsExhausted,
}

impl TerminalReason {
    /// The terminal status this reason presents as.
    pub fn status(self) -> SessionStatus {
        match self {
            Self::Confirmed => SessionStatus::Confirmed,
            Self::VerificationFailed | Self::SetupFailed => SessionStatus::Failed,
            Self::WallClockExpired | Self::AttemptsExhausted => SessionStatus::Expired,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::VerificationFailed => "verificationFailed",
            Self::SetupFailed => "setupFailed",
            Self::WallClockExpired => "wallClockExpired",
            Self::AttemptsExhausted => "attemptsExhausted",
        }
    }
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
