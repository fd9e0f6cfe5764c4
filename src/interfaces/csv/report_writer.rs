use crate::application::session::SessionSnapshot;
use crate::domain::status::{SessionStatus, TerminalReason};
use crate::error::Result;
use serde::Serialize;
use std::io::{self, Write};

/// Flat, serializable summary of one payment intent's outcome.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct SessionReport {
    pub payment_id: Option<String>,
    pub status: SessionStatus,
    pub reason: Option<TerminalReason>,
    pub message: Option<String>,
    pub attempt: u32,
    pub max_attempts: u32,
    pub progress_percent: f64,
    pub seconds_remaining: Option<u64>,
}

impl From<&SessionSnapshot> for SessionReport {
    fn from(snapshot: &SessionSnapshot) -> Self {
        Self {
            payment_id: snapshot.payment_id().map(ToString::to_string),
            status: snapshot.status,
            reason: snapshot.reason,
            message: snapshot.message.clone(),
            attempt: snapshot.attempt,
            max_attempts: snapshot.max_attempts,
            progress_percent: (snapshot.progress_percent() * 10.0).round() / 10.0,
            seconds_remaining: snapshot.seconds_remaining,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Csv,
    /// One JSON object per line.
    JsonLines,
}

enum Sink<W: Write> {
    Csv(csv::Writer<W>),
    JsonLines(W),
}

/// Writes session reports to any `Write` sink (e.g., Stdout, File).
pub struct ReportWriter<W: Write> {
    sink: Sink<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(target: W, format: ReportFormat) -> Self {
        let sink = match format {
            ReportFormat::Csv => Sink::Csv(csv::Writer::from_writer(target)),
            ReportFormat::JsonLines => Sink::JsonLines(target),
        };
        Self { sink }
    }

    pub fn write_report(&mut self, report: &SessionReport) -> Result<()> {
        match &mut self.sink {
            Sink::Csv(writer) => writer.serialize(report)?,
            Sink::JsonLines(writer) => {
                serde_json::to_writer(&mut *writer, report).map_err(io::Error::from)?;
                writer.write_all(b"\n")?;
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        match &mut self.sink {
            Sink::Csv(writer) => writer.flush()?,
            Sink::JsonLines(writer) => writer.flush()?,
        }
        Ok(())
    }
}
