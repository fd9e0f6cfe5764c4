use super::intent::{OrderId, PaymentId, PaymentIntent};
use super::verification::VerificationResponse;
use crate::error::{IntentError, VerificationError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Creates payment intents for orders. Implemented by the payment backend.
#[async_trait]
pub trait IntentCreator: Send + Sync {
    async fn create_payment_intent(&self, order_id: &OrderId)
    -> Result<PaymentIntent, IntentError>;
}

/// Reports the current status of a payment. Must be safe to call repeatedly.
#[async_trait]
pub trait VerificationClient: Send + Sync {
    async fn check_payment_status(
        &self,
        payment_id: &PaymentId,
    ) -> Result<VerificationResponse, VerificationError>;
}

/// Source of wall-clock time and of cancellable waits.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Suspends for `duration`. Dropping the future cancels the wait.
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

pub type IntentCreatorRef = Arc<dyn IntentCreator>;
pub type VerificationClientRef = Arc<dyn VerificationClient>;
pub type ClockRef = Arc<dyn Clock>;
