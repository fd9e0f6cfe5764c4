use crate::domain::intent::{Amount, OrderId, PaymentId, PaymentIntent};
use crate::domain::ports::{ClockRef, IntentCreator, VerificationClient};
use crate::domain::verification::VerificationResponse;
use crate::error::{IntentError, VerificationError};
use async_trait::async_trait;
use chrono::TimeDelta;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

/// An in-memory intent creator.
///
/// Mints a fresh `pay-<order>-<n>` identifier on every call and stamps the
/// intent with `now + ttl`. Orders can be marked paid or unknown to exercise
/// the structured setup errors, and one-off failures can be queued.
pub struct InMemoryIntentCreator {
    clock: ClockRef,
    amount: Amount,
    ttl: TimeDelta,
    latency: Duration,
    minted: AtomicU64,
    paid_orders: RwLock<HashSet<OrderId>>,
    unknown_orders: RwLock<HashSet<OrderId>>,
    injected_failures: Mutex<VecDeque<IntentError>>,
}

impl InMemoryIntentCreator {
    pub fn new(clock: ClockRef, amount: Amount, ttl: TimeDelta) -> Self {
        Self {
            clock,
            amount,
            ttl,
            latency: Duration::ZERO,
            minted: AtomicU64::new(0),
            paid_orders: RwLock::new(HashSet::new()),
            unknown_orders: RwLock::new(HashSet::new()),
            injected_failures: Mutex::new(VecDeque::new()),
        }
    }

    /// Delays every creation call, to model a slow backend.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub async fn mark_paid(&self, order_id: OrderId) {
        self.paid_orders.write().await.insert(order_id);
    }

    pub async fn mark_unknown(&self, order_id: OrderId) {
        self.unknown_orders.write().await.insert(order_id);
    }

    /// Makes the next creation call fail with `error`.
    pub async fn fail_next(&self, error: IntentError) {
        self.injected_failures.lock().await.push_back(error);
    }

    /// Number of intents successfully created so far.
    pub fn created_count(&self) -> u64 {
        self.minted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IntentCreator for InMemoryIntentCreator {
    async fn create_payment_intent(
        &self,
        order_id: &OrderId,
    ) -> Result<PaymentIntent, IntentError> {
        if !self.latency.is_zero() {
            self.clock.sleep(self.latency).await;
        }
        if let Some(error) = self.injected_failures.lock().await.pop_front() {
            return Err(error);
        }
        if self.unknown_orders.read().await.contains(order_id) {
            return Err(IntentError::InvalidOrder(order_id.clone()));
        }
        if self.paid_orders.read().await.contains(order_id) {
            return Err(IntentError::AlreadyPaid(order_id.clone()));
        }

        let sequence = self.minted.fetch_add(1, Ordering::SeqCst) + 1;
        let payment_id = PaymentId::new(format!("pay-{}-{}", order_id, sequence));
        let qr_payload = format!("QR|{}|{}|{}", payment_id, order_id, self.amount);
        Ok(PaymentIntent::new(
            payment_id,
            self.amount,
            qr_payload,
            self.clock.now() + self.ttl,
        ))
    }
}

pub type ScriptStep = Result<VerificationResponse, VerificationError>;

/// A verification client that replays a fixed script of responses.
///
/// Once the script runs out every further check answers `pending`.
#[derive(Clone, Default)]
pub struct ScriptedVerifier {
    script: Arc<Mutex<VecDeque<ScriptStep>>>,
    checked: Arc<Mutex<Vec<PaymentId>>>,
    calls: Arc<AtomicU32>,
    latency: Duration,
}

impl ScriptedVerifier {
    pub fn new(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        Self {
            script: Arc::new(Mutex::new(steps.into_iter().collect())),
            ..Self::default()
        }
    }

    /// A verifier that never leaves `pending`.
    pub fn always_pending() -> Self {
        Self::default()
    }

    /// Delays every response, keeping each check in flight for `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of checks started, including ones still in flight.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Payment identifiers checked so far, in call order.
    pub async fn checked_ids(&self) -> Vec<PaymentId> {
        self.checked.lock().await.clone()
    }
}

#[async_trait]
impl VerificationClient for ScriptedVerifier {
    async fn check_payment_status(
        &self,
        payment_id: &PaymentId,
    ) -> Result<VerificationResponse, VerificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.checked.lock().await.push(payment_id.clone());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(VerificationResponse::pending()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::Clock;
    use crate::infrastructure::clock::ManualClock;
    use rust_decimal_macros::dec;

    fn creator(clock: &Arc<ManualClock>) -> InMemoryIntentCreator {
        InMemoryIntentCreator::new(
            clock.clone(),
            Amount::new(dec!(42.50)).unwrap(),
            TimeDelta::minutes(5),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_creator_mints_unique_ids() {
        let clock = Arc::new(ManualClock::default());
        let creator = creator(&clock);
        let order = OrderId::new("ord-7");

        let first = creator.create_payment_intent(&order).await.unwrap();
        let second = creator.create_payment_intent(&order).await.unwrap();

        assert_ne!(first.payment_id, second.payment_id);
        assert_eq!(first.expires_at, clock.now() + TimeDelta::minutes(5));
        assert!(first.qr_payload.contains("ord-7"));
        assert_eq!(creator.created_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_creator_structured_errors() {
        let clock = Arc::new(ManualClock::default());
        let creator = creator(&clock);
        let paid = OrderId::new("ord-paid");
        let unknown = OrderId::new("ord-unknown");
        creator.mark_paid(paid.clone()).await;
        creator.mark_unknown(unknown.clone()).await;

        assert_eq!(
            creator.create_payment_intent(&paid).await,
            Err(IntentError::AlreadyPaid(paid))
        );
        assert_eq!(
            creator.create_payment_intent(&unknown).await,
            Err(IntentError::InvalidOrder(unknown))
        );

        creator
            .fail_next(IntentError::Unavailable("503".to_string()))
            .await;
        let order = OrderId::new("ord-1");
        assert!(creator.create_payment_intent(&order).await.is_err());
        assert!(creator.create_payment_intent(&order).await.is_ok());
        assert_eq!(creator.created_count(), 1);
    }

    #[tokio::test]
    async fn test_scripted_verifier_replays_then_pends() {
        let verifier = ScriptedVerifier::new([
            Err(VerificationError::Transport("reset".to_string())),
            Ok(VerificationResponse::confirmed()),
        ]);
        let id = PaymentId::new("pay-1");

        assert!(verifier.check_payment_status(&id).await.is_err());
        assert_eq!(
            verifier.check_payment_status(&id).await,
            Ok(VerificationResponse::confirmed())
        );
        assert_eq!(
            verifier.check_payment_status(&id).await,
            Ok(VerificationResponse::pending())
        );
        assert_eq!(verifier.calls(), 3);
        assert_eq!(verifier.checked_ids().await, vec![id.clone(), id.clone(), id]);
    }
}
