use crate::error::PaymentError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of the order a payment is collected for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque payment identifier, unique per payment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(String);

impl PaymentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Represents a positive monetary amount to be collected.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, PaymentError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(PaymentError::ValidationError(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = PaymentError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A single payment attempt as returned by the intent creator.
///
/// Immutable once created. A retry supersedes it with a new intent carrying a
/// fresh `payment_id`; the old one is never mutated or reused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub payment_id: PaymentId,
    pub amount: Amount,
    /// Payload rendered as the QR code the customer scans.
    pub qr_payload: String,
    /// Absolute wall-clock instant after which the QR code is no longer valid.
    pub expires_at: DateTime<Utc>,
}

impl PaymentIntent {
    pub fn new(
        payment_id: PaymentId,
        amount: Amount,
        qr_payload: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            payment_id,
            amount,
            qr_payload: qr_payload.into(),
            expires_at,
        }
    }

    /// Time left until expiry, or `None` if the intent has already expired.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<std::time::Duration> {
        (self.expires_at - now)
            .to_std()
            .ok()
            .filter(|remaining| !remaining.is_zero())
    }
}
