mod common;

use common::Fixture;
use payrecon::config::SessionConfig;
use payrecon::domain::status::{SessionStatus, TerminalReason};
use payrecon::domain::verification::VerificationResponse;
use payrecon::error::VerificationError;
use payrecon::infrastructure::in_memory::{ScriptStep, ScriptedVerifier};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn non_terminal_step(rng: &mut StdRng) -> ScriptStep {
    if rng.gen_bool(0.3) {
        Err(VerificationError::Unavailable("flaky".to_string()))
    } else {
        Ok(VerificationResponse::pending())
    }
}

#[tokio::test(start_paused = true)]
async fn test_random_scripts_never_exceed_budget() {
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for _ in 0..20 {
        let max_attempts = rng.gen_range(1..=8);
        let steps: Vec<ScriptStep> = (0..max_attempts + 4)
            .map(|_| non_terminal_step(&mut rng))
            .collect();
        let fixture = Fixture::new()
            .verifier(ScriptedVerifier::new(steps))
            .config(SessionConfig::default().with_max_attempts(max_attempts));
        let session = fixture.spawn();

        session.start().await.unwrap();
        let snapshot = session.settled().await.unwrap();
        session.shutdown().await;

        assert_eq!(snapshot.reason, Some(TerminalReason::AttemptsExhausted));
        assert_eq!(snapshot.attempt, max_attempts);
        assert_eq!(fixture.verifier.calls(), max_attempts);
    }
}

#[tokio::test(start_paused = true)]
async fn test_random_confirmation_point_is_reported_exactly() {
    let mut rng = StdRng::seed_from_u64(42);

    for _ in 0..20 {
        let max_attempts = rng.gen_range(1..=8);
        let confirm_at = rng.gen_range(1..=max_attempts);
        let mut steps: Vec<ScriptStep> = (1..confirm_at)
            .map(|_| non_terminal_step(&mut rng))
            .collect();
        steps.push(Ok(VerificationResponse::confirmed()));
        let fixture = Fixture::new()
            .verifier(ScriptedVerifier::new(steps))
            .config(SessionConfig::default().with_max_attempts(max_attempts));
        let session = fixture.spawn();

        session.start().await.unwrap();
        let snapshot = session.settled().await.unwrap();
        session.shutdown().await;

        assert_eq!(snapshot.status, SessionStatus::Confirmed);
        assert_eq!(snapshot.attempt, confirm_at);
        assert_eq!(fixture.verifier.calls(), confirm_at);
    }
}
