use crate::domain::ports::Clock;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::time::Instant;

/// Real wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A deterministic clock for testing.
///
/// Wall time is derived from tokio's monotonic [`Instant`], so on a paused
/// runtime it only moves when tokio time is advanced (explicitly through
/// `tokio::time::advance` or by auto-advance while every task is idle).
/// [`ManualClock::jump`] shifts the wall clock alone, the way NTP corrections
/// or a user changing the device time would, leaving pending sleeps untouched.
#[derive(Debug)]
pub struct ManualClock {
    anchor_wall: DateTime<Utc>,
    anchor: Instant,
    skew_ms: AtomicI64,
}

impl ManualClock {
    pub fn starting_at(wall: DateTime<Utc>) -> Self {
        Self {
            anchor_wall: wall,
            anchor: Instant::now(),
            skew_ms: AtomicI64::new(0),
        }
    }

    /// Shifts the wall clock by `delta` without affecting pending sleeps.
    pub fn jump(&self, delta: TimeDelta) {
        self.skew_ms
            .fetch_add(delta.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::starting_at(DateTime::<Utc>::UNIX_EPOCH)
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = TimeDelta::from_std(self.anchor.elapsed()).unwrap_or_default();
        let skew = TimeDelta::milliseconds(self.skew_ms.load(Ordering::SeqCst));
        self.anchor_wall + elapsed + skew
    }
}
