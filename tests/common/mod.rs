#![allow(dead_code)]

use chrono::TimeDelta;
use payrecon::application::session::PaymentSession;
use payrecon::config::SessionConfig;
use payrecon::domain::intent::{Amount, OrderId};
use payrecon::infrastructure::clock::ManualClock;
use payrecon::infrastructure::in_memory::{InMemoryIntentCreator, ScriptedVerifier};
use rust_decimal_macros::dec;
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const ORDER: &str = "ord-1";

/// Collaborators of a session under test, kept so tests can inspect them.
pub struct Fixture {
    pub clock: Arc<ManualClock>,
    pub creator: Arc<InMemoryIntentCreator>,
    pub verifier: ScriptedVerifier,
    pub config: SessionConfig,
    ttl: TimeDelta,
}

impl Fixture {
    /// Intents live five minutes; the verifier answers `pending` forever.
    pub fn new() -> Self {
        Self::with_ttl(TimeDelta::minutes(5))
    }

    pub fn with_ttl(ttl: TimeDelta) -> Self {
        let clock = Arc::new(ManualClock::default());
        Self {
            creator: Arc::new(creator(&clock, ttl)),
            clock,
            verifier: ScriptedVerifier::always_pending(),
            config: SessionConfig::default(),
            ttl,
        }
    }

    /// Delays every intent creation by `latency`.
    pub fn creation_latency(mut self, latency: Duration) -> Self {
        self.creator = Arc::new(creator(&self.clock, self.ttl).with_latency(latency));
        self
    }

    pub fn verifier(mut self, verifier: ScriptedVerifier) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn spawn(&self) -> PaymentSession {
        PaymentSession::spawn(
            OrderId::new(ORDER),
            self.config.clone(),
            self.creator.clone(),
            Arc::new(self.verifier.clone()),
            self.clock.clone(),
        )
        .expect("valid session config")
    }
}

fn creator(clock: &Arc<ManualClock>, ttl: TimeDelta) -> InMemoryIntentCreator {
    InMemoryIntentCreator::new(clock.clone(), Amount::new(dec!(18.90)).unwrap(), ttl)
}

/// Writes a `status,reason` scenario file.
pub fn write_scenario(path: &Path, rows: &[(&str, &str)]) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(["status", "reason"])?;
    for (status, reason) in rows {
        wtr.write_record([status, reason])?;
    }

    wtr.flush()?;
    Ok(())
}
