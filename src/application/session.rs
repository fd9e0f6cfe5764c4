use super::countdown::{self, CountdownEvent, CountdownTimer};
use super::poller::{PollEvent, PollingEngine};
use crate::config::SessionConfig;
use crate::domain::intent::{OrderId, PaymentId, PaymentIntent};
use crate::domain::ports::{ClockRef, IntentCreatorRef, VerificationClientRef};
use crate::domain::status::{SessionStatus, TerminalReason};
use crate::domain::verification::{PollAttempt, PollOutcome, PollResult};
use crate::error::{IntentError, PaymentError, Result};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const COMMAND_BUFFER: usize = 16;

/// Everything the UI layer observes about a payment session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    /// The live intent, kept after a terminal status for display.
    pub intent: Option<PaymentIntent>,
    pub seconds_remaining: Option<u64>,
    pub attempt: u32,
    pub max_attempts: u32,
    pub reason: Option<TerminalReason>,
    /// Creator error, verification failure reason, or last transient error.
    pub message: Option<String>,
}

impl SessionSnapshot {
    fn idle(max_attempts: u32) -> Self {
        Self {
            status: SessionStatus::Idle,
            intent: None,
            seconds_remaining: None,
            attempt: 0,
            max_attempts,
            reason: None,
            message: None,
        }
    }

    pub fn progress_percent(&self) -> f64 {
        if self.max_attempts == 0 {
            return 0.0;
        }
        f64::from(self.attempt) / f64::from(self.max_attempts) * 100.0
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// True for both wall-clock expiry and an exhausted attempt budget.
    pub fn is_expired(&self) -> bool {
        self.status == SessionStatus::Expired
    }

    pub fn payment_id(&self) -> Option<&PaymentId> {
        self.intent.as_ref().map(|intent| &intent.payment_id)
    }
}

enum Command {
    Start(oneshot::Sender<Result<()>>),
    Retry(oneshot::Sender<Result<()>>),
    Cancel(oneshot::Sender<Result<()>>),
}

/// A signal from one of the session's own tasks, tagged with the epoch of the
/// payment attempt that produced it.
#[derive(Debug)]
struct Signal {
    epoch: u64,
    kind: SignalKind,
}

#[derive(Debug)]
enum SignalKind {
    IntentCreated(std::result::Result<PaymentIntent, IntentError>),
    Poll(PollEvent),
    Countdown(CountdownEvent),
}

/// Handle to a payment session.
///
/// The session runs as an actor task that is the sole writer of the session
/// state. Commands from this handle and signals from the countdown and poller
/// are funnelled through it one at a time, so when several signals race the
/// first one delivered wins. Dropping the handle tears the session down.
pub struct PaymentSession {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<SessionSnapshot>,
    task: JoinHandle<()>,
}

impl PaymentSession {
    pub fn spawn(
        order_id: OrderId,
        config: SessionConfig,
        creator: IntentCreatorRef,
        verifier: VerificationClientRef,
        clock: ClockRef,
    ) -> Result<Self> {
        config.validate()?;

        let (commands, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (signals, signals_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(SessionSnapshot::idle(config.max_attempts));

        let actor = SessionActor {
            order_id,
            config,
            creator,
            verifier,
            clock,
            signals,
            state: state_tx,
            epoch: 0,
            countdown: None,
            poller: None,
            last_payment_id: None,
        };
        let task = tokio::spawn(actor.run(commands_rx, signals_rx));

        Ok(Self {
            commands,
            state,
            task,
        })
    }

    /// Creates a payment intent and starts waiting for the payment.
    ///
    /// Fails with [`PaymentError::AlreadyStarted`] while an attempt is in
    /// progress. From a terminal status this behaves like [`retry`](Self::retry).
    pub async fn start(&self) -> Result<()> {
        self.request(Command::Start).await
    }

    /// Replaces a finished attempt with a brand-new payment intent.
    pub async fn retry(&self) -> Result<()> {
        self.request(Command::Retry).await
    }

    /// Abandons the current attempt and returns to idle. Idempotent.
    pub async fn cancel(&self) -> Result<()> {
        self.request(Command::Cancel).await
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.clone()
    }

    /// Waits until the session state satisfies `predicate`.
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Result<SessionSnapshot> {
        let mut state = self.state.clone();
        let snapshot = state
            .wait_for(predicate)
            .await
            .map_err(|_| PaymentError::SessionClosed)?;
        Ok(snapshot.clone())
    }

    /// Waits for the current attempt to reach a terminal status.
    pub async fn settled(&self) -> Result<SessionSnapshot> {
        self.wait_for(SessionSnapshot::is_terminal).await
    }

    /// Stops all timers and waits for the session task to exit.
    pub async fn shutdown(self) {
        let Self { commands, task, .. } = self;
        drop(commands);
        let _ = task.await;
    }

    async fn request(&self, command: fn(oneshot::Sender<Result<()>>) -> Command) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| PaymentError::SessionClosed)?;
        response.await.map_err(|_| PaymentError::SessionClosed)?
    }
}

struct SessionActor {
    order_id: OrderId,
    config: SessionConfig,
    creator: IntentCreatorRef,
    verifier: VerificationClientRef,
    clock: ClockRef,
    signals: mpsc::UnboundedSender<Signal>,
    state: watch::Sender<SessionSnapshot>,
    /// Bumped whenever the live attempt is replaced or abandoned.
    epoch: u64,
    countdown: Option<CountdownTimer>,
    poller: Option<PollingEngine>,
    last_payment_id: Option<PaymentId>,
}

impl SessionActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut signals: mpsc::UnboundedReceiver<Signal>,
    ) {
        loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(signal) = signals.recv() => self.handle_signal(signal),
            }
        }
        self.stop_timers();
        self.epoch += 1;
        debug!(order_id = %self.order_id, "payment session closed");
    }

    fn status(&self) -> SessionStatus {
        self.state.borrow().status
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start(reply) => {
                let _ = reply.send(self.start());
            }
            Command::Retry(reply) => {
                let _ = reply.send(self.retry());
            }
            Command::Cancel(reply) => {
                self.cancel();
                let _ = reply.send(Ok(()));
            }
        }
    }

    fn start(&mut self) -> Result<()> {
        if self.status().is_active() {
            debug!(order_id = %self.order_id, "ignoring duplicate start");
            return Err(PaymentError::AlreadyStarted);
        }
        self.begin_attempt();
        Ok(())
    }

    fn retry(&mut self) -> Result<()> {
        let status = self.status();
        if !status.is_terminal() {
            return Err(PaymentError::NotRetryable(status));
        }
        self.begin_attempt();
        Ok(())
    }

    fn cancel(&mut self) {
        if !self.status().is_active() {
            return;
        }
        self.stop_timers();
        self.epoch += 1;
        self.update(|snapshot| *snapshot = SessionSnapshot::idle(snapshot.max_attempts));
    }

    /// Enters `creatingIntent` and requests a fresh intent in the background.
    fn begin_attempt(&mut self) {
        self.stop_timers();
        self.epoch += 1;
        self.update(|snapshot| {
            *snapshot = SessionSnapshot::idle(snapshot.max_attempts);
            snapshot.status = SessionStatus::CreatingIntent;
        });

        let creator = self.creator.clone();
        let order_id = self.order_id.clone();
        let emit = self.emitter(SignalKind::IntentCreated);
        tokio::spawn(async move {
            emit(creator.create_payment_intent(&order_id).await);
        });
    }

    fn handle_signal(&mut self, Signal { epoch, kind }: Signal) {
        let status = self.status();
        if epoch != self.epoch || !status.is_active() {
            debug!(epoch, current_epoch = self.epoch, %status, "discarding stale signal");
            return;
        }

        match kind {
            SignalKind::IntentCreated(result) if status == SessionStatus::CreatingIntent => {
                match result {
                    Ok(intent) => self.on_intent_created(intent),
                    Err(error) => {
                        warn!(
                            order_id = %self.order_id,
                            reason = %TerminalReason::SetupFailed,
                            error = %error,
                            "payment intent creation failed"
                        );
                        self.settle(TerminalReason::SetupFailed, Some(error.to_string()));
                    }
                }
            }
            SignalKind::Poll(PollEvent::Attempt(attempt)) => self.on_attempt(attempt),
            SignalKind::Poll(PollEvent::Finished(result)) => self.on_poll_finished(result),
            SignalKind::Countdown(CountdownEvent::Tick { seconds_remaining }) => {
                self.update(|snapshot| {
                    snapshot.seconds_remaining = Some(
                        snapshot
                            .seconds_remaining
                            .map_or(seconds_remaining, |shown| shown.min(seconds_remaining)),
                    );
                });
            }
            SignalKind::Countdown(CountdownEvent::Expired) => {
                self.settle(TerminalReason::WallClockExpired, None);
            }
            SignalKind::IntentCreated(_) => {
                debug!(%status, "discarding unexpected intent");
            }
        }
    }

    fn on_intent_created(&mut self, intent: PaymentIntent) {
        if self.last_payment_id.as_ref() == Some(&intent.payment_id) {
            warn!(
                payment_id = %intent.payment_id,
                "intent creator returned the previous payment id"
            );
            self.settle(
                TerminalReason::SetupFailed,
                Some(format!("payment id {} was reused", intent.payment_id)),
            );
            return;
        }
        self.last_payment_id = Some(intent.payment_id.clone());

        let seconds_remaining = countdown::seconds_until(self.clock.now(), intent.expires_at);
        info!(
            payment_id = %intent.payment_id,
            amount = %intent.amount,
            expires_at = %intent.expires_at,
            "payment intent created"
        );
        self.update(|snapshot| {
            snapshot.status = SessionStatus::AwaitingPayment;
            snapshot.intent = Some(intent.clone());
            snapshot.seconds_remaining = Some(seconds_remaining);
            snapshot.attempt = 0;
        });

        // The countdown goes first: an already-expired intent queues its
        // expiry ahead of any poll result.
        let mut timer = CountdownTimer::new(self.clock.clone(), self.config.tick_interval);
        timer.start(intent.expires_at, self.emitter(SignalKind::Countdown));
        self.countdown = Some(timer);

        let mut poller = PollingEngine::new(
            intent.payment_id,
            &self.config,
            self.verifier.clone(),
            self.clock.clone(),
        );
        if let Err(error) = poller.start(self.emitter(SignalKind::Poll)) {
            warn!(error = %error, "fresh polling engine refused to start");
        }
        self.poller = Some(poller);
    }

    fn on_attempt(&mut self, attempt: PollAttempt) {
        self.update(|snapshot| {
            snapshot.attempt = snapshot.attempt.max(attempt.attempt_number);
            if snapshot.status == SessionStatus::AwaitingPayment
                && attempt.outcome == PollOutcome::Pending
            {
                snapshot.status = SessionStatus::Verifying;
            }
        });
    }

    fn on_poll_finished(&mut self, result: PollResult) {
        match result {
            PollResult::Confirmed => self.settle(TerminalReason::Confirmed, None),
            PollResult::Failed { reason } => {
                self.settle(TerminalReason::VerificationFailed, reason)
            }
            PollResult::Timeout => {
                warn!(
                    payment_id = ?self.state.borrow().payment_id(),
                    reason = %TerminalReason::AttemptsExhausted,
                    "attempt budget exhausted while payment pending"
                );
                self.settle(TerminalReason::AttemptsExhausted, None);
            }
            PollResult::Error { last_error } => {
                warn!(
                    payment_id = ?self.state.borrow().payment_id(),
                    reason = %TerminalReason::AttemptsExhausted,
                    last_error = %last_error,
                    "attempt budget exhausted on a failing status check"
                );
                self.settle(TerminalReason::AttemptsExhausted, Some(last_error));
            }
        }
    }

    /// Moves to the terminal status for `reason` and stops both timers.
    fn settle(&mut self, reason: TerminalReason, message: Option<String>) {
        self.stop_timers();
        self.update(|snapshot| {
            snapshot.status = reason.status();
            snapshot.reason = Some(reason);
            snapshot.message = message;
            if reason == TerminalReason::WallClockExpired {
                snapshot.seconds_remaining = Some(0);
            }
        });
    }

    fn stop_timers(&mut self) {
        if let Some(mut timer) = self.countdown.take() {
            timer.stop();
        }
        if let Some(mut poller) = self.poller.take() {
            poller.stop();
        }
    }

    fn update(&self, apply: impl FnOnce(&mut SessionSnapshot)) {
        let mut from = SessionStatus::Idle;
        self.state.send_modify(|snapshot| {
            from = snapshot.status;
            apply(snapshot);
        });
        let snapshot = self.state.borrow();
        if snapshot.status != from {
            info!(
                order_id = %self.order_id,
                payment_id = ?snapshot.payment_id(),
                from = %from,
                to = %snapshot.status,
                reason = ?snapshot.reason,
                attempt = snapshot.attempt,
                "payment session status changed"
            );
        }
    }

    fn emitter<T: 'static>(
        &self,
        wrap: fn(T) -> SignalKind,
    ) -> impl Fn(T) + Send + Sync + use<T> {
        let signals = self.signals.clone();
        let epoch = self.epoch;
        move |event| {
            let _ = signals.send(Signal {
                epoch,
                kind: wrap(event),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::intent::Amount;
    use crate::domain::ports::Clock;
    use crate::infrastructure::clock::ManualClock;
    use crate::infrastructure::in_memory::{InMemoryIntentCreator, ScriptedVerifier};
    use chrono::{DateTime, TimeDelta, Utc};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    struct Harness {
        actor: SessionActor,
        state: watch::Receiver<SessionSnapshot>,
        clock: Arc<ManualClock>,
        _signals: mpsc::UnboundedReceiver<Signal>,
    }

    fn harness() -> Harness {
        let clock = Arc::new(ManualClock::default());
        let creator = InMemoryIntentCreator::new(
            clock.clone(),
            Amount::new(dec!(18.90)).unwrap(),
            TimeDelta::minutes(5),
        );
        let (signals, signals_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(SessionSnapshot::idle(60));
        let actor = SessionActor {
            order_id: OrderId::new("ord-1"),
            config: SessionConfig::default(),
            creator: Arc::new(creator),
            verifier: Arc::new(ScriptedVerifier::always_pending()),
            clock: clock.clone(),
            signals,
            state: state_tx,
            epoch: 0,
            countdown: None,
            poller: None,
            last_payment_id: None,
        };
        Harness {
            actor,
            state,
            clock,
            _signals: signals_rx,
        }
    }

    fn intent(clock: &ManualClock, id: &str) -> PaymentIntent {
        PaymentIntent::new(
            PaymentId::new(id),
            Amount::new(dec!(18.90)).unwrap(),
            "qr",
            clock.now() + TimeDelta::minutes(5),
        )
    }

    fn deliver(actor: &mut SessionActor, kind: SignalKind) {
        let epoch = actor.epoch;
        actor.handle_signal(Signal { epoch, kind });
    }

    fn awaiting(h: &mut Harness) {
        h.actor.start().unwrap();
        let intent = intent(&h.clock, "pay-1");
        deliver(&mut h.actor, SignalKind::IntentCreated(Ok(intent)));
        assert_eq!(h.state.borrow().status, SessionStatus::AwaitingPayment);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_delivered_first_preempts_expiry() {
        let mut h = harness();
        awaiting(&mut h);

        deliver(
            &mut h.actor,
            SignalKind::Poll(PollEvent::Finished(PollResult::Confirmed)),
        );
        deliver(&mut h.actor, SignalKind::Countdown(CountdownEvent::Expired));
        deliver(
            &mut h.actor,
            SignalKind::Countdown(CountdownEvent::Tick {
                seconds_remaining: 1,
            }),
        );

        let snapshot = h.state.borrow().clone();
        assert_eq!(snapshot.status, SessionStatus::Confirmed);
        assert_eq!(snapshot.reason, Some(TerminalReason::Confirmed));
        assert_eq!(snapshot.seconds_remaining, Some(300));
        assert!(h.actor.countdown.is_none());
        assert!(h.actor.poller.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_delivered_first_preempts_confirmation() {
        let mut h = harness();
        awaiting(&mut h);

        deliver(&mut h.actor, SignalKind::Countdown(CountdownEvent::Expired));
        deliver(
            &mut h.actor,
            SignalKind::Poll(PollEvent::Finished(PollResult::Confirmed)),
        );

        let snapshot = h.state.borrow().clone();
        assert_eq!(snapshot.status, SessionStatus::Expired);
        assert_eq!(snapshot.reason, Some(TerminalReason::WallClockExpired));
        assert_eq!(snapshot.seconds_remaining, Some(0));
        assert!(h.actor.poller.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_signals_from_previous_epoch_are_discarded() {
        let mut h = harness();
        awaiting(&mut h);
        let stale_epoch = h.actor.epoch;

        h.actor.cancel();
        h.actor.start().unwrap();
        h.actor.handle_signal(Signal {
            epoch: stale_epoch,
            kind: SignalKind::IntentCreated(Ok(intent(&h.clock, "pay-stale"))),
        });

        assert_eq!(h.state.borrow().status, SessionStatus::CreatingIntent);
        assert!(h.state.borrow().intent.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reused_payment_id_fails_setup() {
        let mut h = harness();
        awaiting(&mut h);
        deliver(
            &mut h.actor,
            SignalKind::Poll(PollEvent::Finished(PollResult::Failed { reason: None })),
        );

        h.actor.retry().unwrap();
        deliver(
            &mut h.actor,
            SignalKind::IntentCreated(Ok(intent(&h.clock, "pay-1"))),
        );

        let snapshot = h.state.borrow().clone();
        assert_eq!(snapshot.status, SessionStatus::Failed);
        assert_eq!(snapshot.reason, Some(TerminalReason::SetupFailed));
        assert!(h.actor.poller.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_count_is_monotonic() {
        let mut h = harness();
        awaiting(&mut h);
        let attempt = |n| {
            SignalKind::Poll(PollEvent::Attempt(PollAttempt {
                attempt_number: n,
                observed_at: DateTime::<Utc>::UNIX_EPOCH,
                outcome: PollOutcome::Pending,
            }))
        };

        deliver(&mut h.actor, attempt(2));
        deliver(&mut h.actor, attempt(1));

        let snapshot = h.state.borrow().clone();
        assert_eq!(snapshot.attempt, 2);
        assert_eq!(snapshot.status, SessionStatus::Verifying);
    }

    #[test]
    fn test_progress_percent() {
        let mut snapshot = SessionSnapshot::idle(60);
        assert_eq!(snapshot.progress_percent(), 0.0);
        snapshot.attempt = 15;
        assert_eq!(snapshot.progress_percent(), 25.0);
        snapshot.attempt = 60;
        assert_eq!(snapshot.progress_percent(), 100.0);
    }
}
