//! Cancellable one-shot and repeating timers driven by a [`Clock`].
//!
//! Each timer runs as its own task. Cancellation is signalled over a `watch`
//! channel and preempts both the wait and any in-flight tick, so a cancelled
//! timer never has to wait out its remaining interval.
//!
//! [`Clock`]: crate::domain::ports::Clock

use crate::domain::ports::ClockRef;
use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Handle to a running timer. Dropping the handle cancels the timer.
#[derive(Debug)]
pub struct Timer {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Timer {
    fn spawn<B, F>(body: B) -> Self
    where
        B: FnOnce(watch::Receiver<bool>) -> F,
        F: Future<Output = ()> + Send + 'static,
    {
        let (cancel, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(body(cancel_rx));
        Self { cancel, task }
    }

    /// Stops future firings. A no-op once the timer has fired or been cancelled.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// True once the timer task has returned, whether it fired or was cancelled.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn cancelled(cancel_rx: &mut watch::Receiver<bool>) {
    // A dropped sender counts as cancellation.
    let _ = cancel_rx.wait_for(|cancelled| *cancelled).await;
}

/// Calls `on_fire` once after `delay`, unless cancelled first.
pub fn after<F>(clock: ClockRef, delay: Duration, on_fire: F) -> Timer
where
    F: FnOnce() + Send + 'static,
{
    Timer::spawn(move |mut cancel_rx| async move {
        tokio::select! {
            biased;
            _ = cancelled(&mut cancel_rx) => {}
            _ = clock.sleep(delay) => on_fire(),
        }
    })
}

/// Runs `on_tick` immediately and then every `period`, measured from the start
/// of each tick, until a tick returns [`ControlFlow::Break`] or the timer is
/// cancelled.
///
/// Ticks never overlap: a tick that overruns `period` is followed by the next
/// one straight away. A tick still in flight when the timer is cancelled is
/// dropped, so its effects never become visible.
pub fn every<F, Fut>(clock: ClockRef, period: Duration, mut on_tick: F) -> Timer
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ControlFlow<()>> + Send + 'static,
{
    Timer::spawn(move |mut cancel_rx| async move {
        loop {
            let started = Instant::now();
            let flow = tokio::select! {
                biased;
                _ = cancelled(&mut cancel_rx) => return,
                // `on_tick` runs only once this branch is polled, after the
                // cancellation check.
                flow = async { on_tick().await } => flow,
            };
            if flow.is_break() {
                return;
            }
            let wait = period.saturating_sub(started.elapsed());
            tokio::select! {
                biased;
                _ = cancelled(&mut cancel_rx) => return,
                _ = clock.sleep(wait) => {}
            }
        }
    })
}
