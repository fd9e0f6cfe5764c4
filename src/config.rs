use crate::error::{PaymentError, Result};
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 60;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Tuning knobs for a payment session, fixed for the session's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Poll attempts allowed per payment intent.
    pub max_attempts: u32,
    pub poll_interval: Duration,
    /// Cadence of `seconds_remaining` updates.
    pub tick_interval: Duration,
    /// Upper bound on a single status check; `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            tick_interval: DEFAULT_TICK_INTERVAL,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }
}

impl SessionConfig {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Option<Duration>) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(PaymentError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(PaymentError::InvalidConfig(
                "poll_interval must be non-zero".to_string(),
            ));
        }
        if self.tick_interval.is_zero() {
            return Err(PaymentError::InvalidConfig(
                "tick_interval must be non-zero".to_string(),
            ));
        }
        if self.request_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(PaymentError::InvalidConfig(
                "request_timeout must be non-zero when set".to_string(),
            ));
        }
        Ok(())
    }
}
