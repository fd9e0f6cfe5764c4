use super::timer::{self, Timer};
use crate::domain::ports::ClockRef;
use chrono::{DateTime, Utc};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownEvent {
    /// Display update; never increases within one countdown.
    Tick { seconds_remaining: u64 },
    /// Emitted at most once, when the deadline passes.
    Expired,
}

/// Enforces a payment intent's absolute expiry independently of polling.
///
/// Expiry is driven by an exact one-shot timer; the per-second display ticks
/// run alongside it and also trip expiry if they observe the deadline has
/// passed, which covers forward jumps of the wall clock.
pub struct CountdownTimer {
    clock: ClockRef,
    tick_interval: Duration,
    expiry: Option<Timer>,
    ticker: Option<Timer>,
}

impl CountdownTimer {
    pub fn new(clock: ClockRef, tick_interval: Duration) -> Self {
        Self {
            clock,
            tick_interval,
            expiry: None,
            ticker: None,
        }
    }

    /// Starts counting down to `expires_at`, replacing any previous countdown.
    ///
    /// A deadline at or before `now()` emits [`CountdownEvent::Expired`]
    /// before this returns.
    pub fn start<E>(&mut self, expires_at: DateTime<Utc>, emit: E)
    where
        E: Fn(CountdownEvent) + Send + Sync + 'static,
    {
        self.stop();

        let emit = Arc::new(emit);
        let fired = Arc::new(AtomicBool::new(false));
        let expire = {
            let emit = emit.clone();
            Arc::new(move || {
                if !fired.swap(true, Ordering::SeqCst) {
                    emit(CountdownEvent::Expired);
                }
            })
        };

        let Some(remaining) = remaining_until(self.clock.now(), expires_at) else {
            debug!(%expires_at, "deadline already passed, expiring immediately");
            expire();
            return;
        };

        self.expiry = Some(timer::after(self.clock.clone(), remaining, {
            let expire = expire.clone();
            move || expire()
        }));

        let clock = self.clock.clone();
        let mut last_shown = u64::MAX;
        self.ticker = Some(timer::every(
            self.clock.clone(),
            self.tick_interval,
            move || {
                let flow = match remaining_until(clock.now(), expires_at) {
                    Some(remaining) => {
                        last_shown = last_shown.min(ceil_secs(remaining));
                        emit(CountdownEvent::Tick {
                            seconds_remaining: last_shown,
                        });
                        ControlFlow::Continue(())
                    }
                    None => {
                        expire();
                        ControlFlow::Break(())
                    }
                };
                std::future::ready(flow)
            },
        ));
    }

    /// Cancels all pending ticks and the expiry. Idempotent.
    pub fn stop(&mut self) {
        if let Some(expiry) = self.expiry.take() {
            expiry.cancel();
        }
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.expiry.as_ref().is_some_and(|timer| !timer.is_finished())
    }
}

fn remaining_until(now: DateTime<Utc>, deadline: DateTime<Utc>) -> Option<Duration> {
    // Negative deltas (clock skew, stale intents) fail `to_std` and read as expired.
    (deadline - now)
        .to_std()
        .ok()
        .filter(|remaining| !remaining.is_zero())
}

fn ceil_secs(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

/// Whole seconds left until `deadline`, rounded up; zero once it has passed.
pub fn seconds_until(now: DateTime<Utc>, deadline: DateTime<Utc>) -> u64 {
    remaining_until(now, deadline).map_or(0, ceil_secs)
}

/// Formats a countdown as `MM:SS`, or `H:MM:SS` from one hour up.
pub fn format_countdown(secs: u64) -> String {
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}
