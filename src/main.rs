use chrono::TimeDelta;
use clap::Parser;
use miette::{IntoDiagnostic, Result, miette};
use payrecon::application::countdown::format_countdown;
use payrecon::application::session::{PaymentSession, SessionSnapshot};
use payrecon::config::SessionConfig;
use payrecon::domain::intent::{Amount, OrderId};
use payrecon::domain::ports::ClockRef;
use payrecon::domain::status::SessionStatus;
use payrecon::infrastructure::clock::SystemClock;
use payrecon::infrastructure::in_memory::{InMemoryIntentCreator, ScriptedVerifier};
use payrecon::interfaces::csv::report_writer::{ReportFormat, ReportWriter, SessionReport};
use payrecon::interfaces::csv::scenario_reader::ScenarioReader;
use payrecon::logging::init_tracing;
use rust_decimal::Decimal;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Scenario CSV of scripted verification responses (`status,reason`)
    scenario: PathBuf,

    /// Order the payment is collected for
    #[arg(long, default_value = "order-1")]
    order_id: String,

    /// Amount to collect
    #[arg(long, default_value = "10.00")]
    amount: Decimal,

    /// Lifetime of each QR code, in seconds
    #[arg(long, default_value_t = 300)]
    ttl_secs: i64,

    /// Poll attempts allowed per payment intent
    #[arg(long, default_value_t = 60)]
    max_attempts: u32,

    #[arg(long, default_value_t = 3_000)]
    poll_interval_ms: u64,

    #[arg(long, default_value_t = 1_000)]
    tick_interval_ms: u64,

    /// Per-check timeout in milliseconds; 0 disables it
    #[arg(long, default_value_t = 10_000)]
    request_timeout_ms: u64,

    /// New payment intents to try after a non-confirmed outcome
    #[arg(long, default_value_t = 0)]
    retries: u32,

    /// Emit JSON lines instead of CSV
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn session_config(&self) -> SessionConfig {
        SessionConfig::default()
            .with_max_attempts(self.max_attempts)
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
            .with_tick_interval(Duration::from_millis(self.tick_interval_ms))
            .with_request_timeout(
                Some(Duration::from_millis(self.request_timeout_ms))
                    .filter(|timeout| !timeout.is_zero()),
            )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let file = File::open(&cli.scenario).into_diagnostic()?;
    let mut steps = Vec::new();
    for row in ScenarioReader::new(file).rows() {
        match row {
            Ok(row) => steps.push(row.into_step()),
            Err(e) => warn!(error = %e, "skipping malformed scenario row"),
        }
    }

    let clock: ClockRef = Arc::new(SystemClock::new());
    let amount = Amount::new(cli.amount).into_diagnostic()?;
    let ttl = TimeDelta::try_seconds(cli.ttl_secs)
        .ok_or_else(|| miette!("ttl of {} seconds is out of range", cli.ttl_secs))?;
    let creator = InMemoryIntentCreator::new(clock.clone(), amount, ttl);
    let session = PaymentSession::spawn(
        OrderId::new(cli.order_id.clone()),
        cli.session_config(),
        Arc::new(creator),
        Arc::new(ScriptedVerifier::new(steps)),
        clock,
    )
    .into_diagnostic()?;

    let format = if cli.json {
        ReportFormat::JsonLines
    } else {
        ReportFormat::Csv
    };
    let mut writer = ReportWriter::new(io::stdout(), format);

    session.start().await.into_diagnostic()?;
    let mut snapshot = session.settled().await.into_diagnostic()?;
    log_outcome(&snapshot);
    writer
        .write_report(&SessionReport::from(&snapshot))
        .into_diagnostic()?;

    for _ in 0..cli.retries {
        if snapshot.status == SessionStatus::Confirmed {
            break;
        }
        session.retry().await.into_diagnostic()?;
        snapshot = session.settled().await.into_diagnostic()?;
        log_outcome(&snapshot);
        writer
            .write_report(&SessionReport::from(&snapshot))
            .into_diagnostic()?;
    }

    writer.flush().into_diagnostic()?;
    session.shutdown().await;

    Ok(())
}

fn log_outcome(snapshot: &SessionSnapshot) {
    info!(
        payment_id = ?snapshot.payment_id(),
        status = %snapshot.status,
        reason = ?snapshot.reason,
        time_left = %format_countdown(snapshot.seconds_remaining.unwrap_or(0)),
        "payment settled"
    );
}
