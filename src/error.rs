use crate::domain::intent::OrderId;
use crate::domain::status::SessionStatus;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PaymentError>;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("payment session already started")]
    AlreadyStarted,
    #[error("polling engine already running")]
    AlreadyRunning,
    #[error("retry is only valid from a terminal status (current: {0})")]
    NotRetryable(SessionStatus),
    #[error("payment session is closed")]
    SessionClosed,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("validation error: {0}")]
    ValidationError(String),
    #[error("payment intent error: {0}")]
    Intent(#[from] IntentError),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Structured failure of the intent-creation collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntentError {
    #[error("invalid order {0}")]
    InvalidOrder(OrderId),
    #[error("order {0} is already paid")]
    AlreadyPaid(OrderId),
    #[error("intent service unavailable: {0}")]
    Unavailable(String),
}

/// Transient failure of a single status check. Never terminal by itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("verification service unavailable: {0}")]
    Unavailable(String),
    #[error("status check timed out after {0:?}")]
    TimedOut(std::time::Duration),
}
