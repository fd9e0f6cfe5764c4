use super::timer::{self, Timer};
use crate::config::SessionConfig;
use crate::domain::intent::PaymentId;
use crate::domain::ports::{ClockRef, VerificationClientRef};
use crate::domain::verification::{
    PollAttempt, PollOutcome, PollResult, VerificationResponse, VerificationStatus,
};
use crate::error::{PaymentError, Result, VerificationError};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    /// Progress report for one completed attempt.
    Attempt(PollAttempt),
    /// Emitted exactly once per run, after which the loop has stopped.
    Finished(PollResult),
}

type EmitFn = Box<dyn Fn(PollEvent) + Send + Sync>;

/// Bounded, fixed-rate polling of the verification client for one payment.
///
/// Attempt #1 is issued as soon as the engine starts. Transient errors from the
/// client are retried silently within the same attempt budget; only the final
/// outcome is reported as terminal.
pub struct PollingEngine {
    payment_id: PaymentId,
    interval: Duration,
    max_attempts: u32,
    request_timeout: Option<Duration>,
    verifier: VerificationClientRef,
    clock: ClockRef,
    attempts: Arc<AtomicU32>,
    running: Arc<AtomicBool>,
    timer: Option<Timer>,
}

impl PollingEngine {
    pub fn new(
        payment_id: PaymentId,
        config: &SessionConfig,
        verifier: VerificationClientRef,
        clock: ClockRef,
    ) -> Self {
        Self {
            payment_id,
            interval: config.poll_interval,
            max_attempts: config.max_attempts,
            request_timeout: config.request_timeout,
            verifier,
            clock,
            attempts: Arc::new(AtomicU32::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            timer: None,
        }
    }

    /// Starts the polling loop.
    ///
    /// Fails with [`PaymentError::AlreadyRunning`] while a previous run has
    /// neither been stopped nor reached a final result. A restarted engine
    /// continues against the budget left over from earlier runs.
    pub fn start<E>(&mut self, emit: E) -> Result<()>
    where
        E: Fn(PollEvent) + Send + Sync + 'static,
    {
        if self.running.load(Ordering::SeqCst) {
            return Err(PaymentError::AlreadyRunning);
        }
        if let Some(previous) = self.timer.take() {
            previous.cancel();
        }

        // Each run owns its flag so a late finish from a stopped run cannot
        // clear the flag of the run that replaced it.
        let running = Arc::new(AtomicBool::new(true));
        self.running = running.clone();

        info!(
            payment_id = %self.payment_id,
            max_attempts = self.max_attempts,
            interval_ms = self.interval.as_millis() as u64,
            "polling started"
        );

        let run = Arc::new(PollRun {
            payment_id: self.payment_id.clone(),
            max_attempts: self.max_attempts,
            request_timeout: self.request_timeout,
            verifier: self.verifier.clone(),
            clock: self.clock.clone(),
            attempts: self.attempts.clone(),
            running,
            emit: Box::new(emit),
        });
        self.timer = Some(timer::every(self.clock.clone(), self.interval, move || {
            let run = run.clone();
            async move { run.attempt().await }
        }));
        Ok(())
    }

    /// Cancels the pending interval; an in-flight attempt is discarded.
    /// Safe to call when not running.
    pub fn stop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
            debug!(payment_id = %self.payment_id, "polling stopped");
        }
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Attempts issued so far. Never decreases.
    pub fn attempt_count(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

struct PollRun {
    payment_id: PaymentId,
    max_attempts: u32,
    request_timeout: Option<Duration>,
    verifier: VerificationClientRef,
    clock: ClockRef,
    attempts: Arc<AtomicU32>,
    running: Arc<AtomicBool>,
    emit: EmitFn,
}

impl PollRun {
    async fn attempt(&self) -> ControlFlow<()> {
        if self.attempts.load(Ordering::SeqCst) >= self.max_attempts {
            return self.finish(PollResult::Timeout);
        }
        let attempt_number = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        let response = self.check().await;
        let observed_at = self.clock.now();
        let budget_spent = attempt_number >= self.max_attempts;

        match response {
            Ok(VerificationResponse { status, reason }) => {
                self.report(attempt_number, observed_at, PollOutcome::from(status));
                match status {
                    VerificationStatus::Confirmed => self.finish(PollResult::Confirmed),
                    VerificationStatus::Failed => self.finish(PollResult::Failed { reason }),
                    VerificationStatus::Pending if budget_spent => {
                        self.finish(PollResult::Timeout)
                    }
                    VerificationStatus::Pending => ControlFlow::Continue(()),
                }
            }
            Err(error) => {
                debug!(
                    payment_id = %self.payment_id,
                    attempt = attempt_number,
                    error = %error,
                    "status check failed, will retry"
                );
                self.report(attempt_number, observed_at, PollOutcome::TransientError);
                if budget_spent {
                    self.finish(PollResult::Error {
                        last_error: error.to_string(),
                    })
                } else {
                    ControlFlow::Continue(())
                }
            }
        }
    }

    async fn check(&self) -> std::result::Result<VerificationResponse, VerificationError> {
        let call = self.verifier.check_payment_status(&self.payment_id);
        match self.request_timeout {
            Some(limit) => tokio::select! {
                response = call => response,
                _ = self.clock.sleep(limit) => Err(VerificationError::TimedOut(limit)),
            },
            None => call.await,
        }
    }

    fn report(
        &self,
        attempt_number: u32,
        observed_at: chrono::DateTime<chrono::Utc>,
        outcome: PollOutcome,
    ) {
        (self.emit)(PollEvent::Attempt(PollAttempt {
            attempt_number,
            observed_at,
            outcome,
        }));
    }

    fn finish(&self, result: PollResult) -> ControlFlow<()> {
        self.running.store(false, Ordering::SeqCst);
        info!(
            payment_id = %self.payment_id,
            attempts = self.attempts.load(Ordering::SeqCst),
            result = ?result,
            "polling finished"
        );
        (self.emit)(PollEvent::Finished(result));
        ControlFlow::Break(())
    }
}
