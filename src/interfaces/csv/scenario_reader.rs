use crate::domain::verification::{VerificationResponse, VerificationStatus};
use crate::error::{PaymentError, Result, VerificationError};
use crate::infrastructure::in_memory::ScriptStep;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioStatus {
    Pending,
    Confirmed,
    Failed,
    /// The status check itself fails with a transient error.
    Error,
}

/// One scripted answer of the verification endpoint.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct ScenarioRow {
    pub status: ScenarioStatus,
    pub reason: Option<String>,
}

impl ScenarioRow {
    pub fn into_step(self) -> ScriptStep {
        let response = match self.status {
            ScenarioStatus::Pending => VerificationResponse::pending(),
            ScenarioStatus::Confirmed => VerificationResponse::confirmed(),
            ScenarioStatus::Failed => VerificationResponse {
                status: VerificationStatus::Failed,
                reason: self.reason,
            },
            ScenarioStatus::Error => {
                return Err(VerificationError::Transport(
                    self.reason
                        .unwrap_or_else(|| "scripted transport error".to_string()),
                ));
            }
        };
        Ok(response)
    }
}

/// Reads a verification scenario from a CSV source with a `status,reason` header.
pub struct ScenarioReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> ScenarioReader<R> {
    /// Creates a new `ScenarioReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes scenario rows.
    pub fn rows(self) -> impl Iterator<Item = Result<ScenarioRow>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(PaymentError::from))
    }
}
