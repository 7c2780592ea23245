//! End-to-end tests for a tutoring session
//!
//! These tests drive the controller with the real CSV loader and the real
//! Gemini client, with the remote service replaced by a local mock server.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use mathcoach_core::{
    credential_missing_message, Action, Config, Controller, Credential, GeminiHintEngine,
    HintLevel, HintService, Outcome, Problem, ProblemBank, ProblemSet, SessionState, Verdict,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL: &str = "gemini-1.5-flash-latest";

/// Path to the fixtures directory.
fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

fn bank() -> ProblemBank {
    ProblemBank::new(Duration::from_secs(5)).expect("Failed to build problem bank")
}

fn engine(server: &MockServer, key: Option<&str>) -> Arc<dyn HintService> {
    Arc::new(GeminiHintEngine::new(
        key.and_then(Credential::new),
        MODEL,
        server.uri(),
        Duration::from_secs(5),
    ))
}

fn hint_body(text: &str) -> serde_json::Value {
    serde_json::json!({
        "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
    })
}

/// Tests that the sample config loads and points at the fixture bank.
#[test]
fn test_sample_config_loads() {
    let config = Config::load_from_dir(&fixture_path()).expect("Failed to load config");

    assert_eq!(config.problem_source, "problems.csv");
    assert_eq!(config.model, MODEL);
    assert_eq!(config.hint_timeout_secs, 5);
    assert_eq!(config.credential_env, "GEMINI_API_KEY");
}

/// Tests that a malformed row is skipped without failing the load.
#[tokio::test]
async fn test_fixture_bank_skips_malformed_row() {
    let source = fixture_path().join("problems.csv").display().to_string();

    let problems = bank().load(&source).await.expect("Failed to load fixture bank");

    assert_eq!(problems.len(), 5);
    let first = problems.get(0).expect("first problem");
    assert_eq!(first.text, "What is 2+2?");
    assert_eq!(first.answer, "4");
    assert_eq!(
        problems.get(1).map(|p| p.text.as_str()),
        Some("What is the sum of the interior angles of a triangle, in degrees?")
    );
}

/// Walks one problem from three hints through a correct answer and advance.
#[tokio::test]
async fn test_single_problem_scenario() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/v1beta/models/{MODEL}:generateContent")))
        .respond_with(ResponseTemplate::new(200).set_body_json(hint_body("What does 'sum' mean?")))
        .expect(3)
        .mount(&server)
        .await;

    let problems: ProblemSet = vec![Problem::new("2+2?", "4", "sum")].into();
    let mut controller = Controller::with_problems(problems, bank(), engine(&server, Some("k")));
    let mut session = SessionState::new();

    for level in 1..=3u8 {
        let outcome = controller.handle(&mut session, Action::RequestHint).await;
        assert!(
            matches!(&outcome, Outcome::HintGiven { level: l, hint } if l.get() == level && hint == "What does 'sum' mean?"),
            "unexpected outcome {outcome:?}"
        );
    }
    assert_eq!(session.hint_level, HintLevel::MAX);
    assert_eq!(session.transcript.len(), 6);

    // Fourth request is refused locally; the mock expects exactly three calls.
    assert_eq!(
        controller.handle(&mut session, Action::RequestHint).await,
        Outcome::NoMoreHints
    );
    assert_eq!(session.transcript.len(), 6);

    let outcome = controller
        .handle(&mut session, Action::SubmitAnswer("4".to_string()))
        .await;
    assert_eq!(
        outcome,
        Outcome::AnswerChecked {
            verdict: Verdict::Correct,
            explanation: Some("sum".to_string())
        }
    );

    assert_eq!(
        controller.handle(&mut session, Action::AdvanceProblem).await,
        Outcome::Advanced { index: 0 }
    );
    assert_eq!(session.current_index, 0);
    assert_eq!(session.hint_level, HintLevel::NONE);
    assert!(session.transcript.is_empty());
}

/// Each hint request replays the transcript so far before the final prompt.
#[tokio::test]
async fn test_hint_requests_replay_transcript() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hint_body("Think.")))
        .mount(&server)
        .await;

    let problems: ProblemSet = vec![Problem::new("2+2?", "4", "sum")].into();
    let mut controller = Controller::with_problems(problems, bank(), engine(&server, Some("k")));
    let mut session = SessionState::new();
    for _ in 0..3 {
        controller.handle(&mut session, Action::RequestHint).await;
    }

    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 3);
    for (i, request) in requests.iter().enumerate() {
        let body: serde_json::Value = serde_json::from_slice(&request.body).expect("json body");
        let contents = body["contents"].as_array().expect("contents array");
        assert_eq!(contents.len(), 2 * i + 1);

        let last = &contents[contents.len() - 1];
        assert_eq!(last["role"], "user");
        assert_eq!(
            last["parts"][0]["text"],
            format!("Problem: '2+2?'. I am stuck. Give me a Level {} hint.", i + 1)
        );
        let instruction = body["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .expect("system instruction");
        assert!(instruction.contains(&format!("Hint Level {}/3", i + 1)));
        assert_eq!(
            request.headers.get("x-goog-api-key").map(|v| v.as_bytes()),
            Some(b"k".as_slice())
        );
    }
}

/// Without a key no request is sent and the attempt is untouched.
#[tokio::test]
async fn test_no_credential_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(hint_body("unused")))
        .expect(0)
        .mount(&server)
        .await;

    let problems: ProblemSet = vec![Problem::new("2+2?", "4", "sum")].into();
    let mut controller = Controller::with_problems(problems, bank(), engine(&server, None));
    let mut session = SessionState::new();

    let outcome = controller.handle(&mut session, Action::RequestHint).await;

    assert_eq!(
        outcome,
        Outcome::HintUnavailable {
            message: credential_missing_message("GEMINI_API_KEY")
        }
    );
    assert_eq!(session.hint_level, HintLevel::NONE);
    assert!(session.transcript.is_empty());
}

/// A failing service still yields a recorded, level-consuming message.
#[tokio::test]
async fn test_remote_failure_is_recorded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "error": { "code": 403, "message": "API key not valid", "status": "PERMISSION_DENIED" }
        })))
        .mount(&server)
        .await;

    let problems: ProblemSet = vec![Problem::new("2+2?", "4", "sum")].into();
    let mut controller = Controller::with_problems(problems, bank(), engine(&server, Some("bad")));
    let mut session = SessionState::new();

    let outcome = controller.handle(&mut session, Action::RequestHint).await;

    let Outcome::HintGiven { level, hint } = outcome else {
        panic!("expected a recorded hint, got {outcome:?}");
    };
    assert_eq!(level.get(), 1);
    assert!(hint.contains(MODEL));
    assert!(hint.contains("API key not valid"));
    assert_eq!(session.transcript.messages()[1].content, hint);
}

/// Reloading the current source refetches it; switching back to a cached one does not.
#[tokio::test]
async fn test_reload_refreshes_current_source_only() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bank.csv"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("problem_text,answer,explanation\n1+1?,2,one\n2+3?,5,five\n"),
        )
        .expect(2)
        .mount(&server)
        .await;

    let remote = format!("{}/bank.csv", server.uri());
    let local = fixture_path().join("problems.csv").display().to_string();
    let mut controller = Controller::new(bank(), engine(&server, None));
    let mut session = SessionState::new();

    for source in [&remote, &remote, &local, &remote] {
        let outcome = controller
            .handle(&mut session, Action::ReloadProblemBank(source.clone()))
            .await;
        assert!(
            matches!(outcome, Outcome::BankReloaded { error: None, .. }),
            "unexpected outcome {outcome:?}"
        );
    }

    assert_eq!(controller.problems().len(), 2);
    assert_eq!(controller.source(), remote);
}

/// An unreachable source leaves an empty set and a visible message.
#[tokio::test]
async fn test_unreachable_source_shows_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut controller = Controller::new(bank(), engine(&server, None));
    let mut session = SessionState::new();

    let outcome = controller
        .handle(
            &mut session,
            Action::ReloadProblemBank(format!("{}/missing.csv", server.uri())),
        )
        .await;

    assert!(matches!(outcome, Outcome::BankReloaded { count: 0, error: Some(_) }));
    let view = controller.view(&session);
    assert_eq!(view.total, 0);
    assert!(view.problem_text.is_none());
    assert!(view.load_error.expect("load error").contains("missing.csv"));

    assert_eq!(
        controller.handle(&mut session, Action::RequestHint).await,
        Outcome::NoProblems
    );
}
