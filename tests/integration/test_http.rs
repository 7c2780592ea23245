//! End-to-end tests for the HTTP surface
//!
//! Serves the router on a local port and drives it with a real HTTP client,
//! with the hint service replaced by a local mock server.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use mathcoach_core::{
    create_router, Action, ActionResponse, AppState, Controller, Credential, GeminiHintEngine,
    Outcome, ProblemBank, SessionState, SessionView, Verdict,
};
use tokio::net::TcpListener;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fixture_bank() -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures/problems.csv")
        .display()
        .to_string()
}

/// Starts the API on an ephemeral port with the fixture bank loaded.
async fn start_server(gemini: &MockServer) -> SocketAddr {
    let hints = Arc::new(GeminiHintEngine::new(
        Credential::new("test-key"),
        "gemini-1.5-flash-latest",
        gemini.uri(),
        Duration::from_secs(5),
    ));
    let bank = ProblemBank::new(Duration::from_secs(5)).expect("Failed to build problem bank");
    let mut controller = Controller::new(bank, hints);
    let mut session = SessionState::new();
    controller
        .handle(&mut session, Action::ReloadProblemBank(fixture_bank()))
        .await;

    let router = create_router(AppState::with_session(controller, session));
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    addr
}

async fn post(
    client: &reqwest::Client,
    addr: SocketAddr,
    route: &str,
    body: Option<serde_json::Value>,
) -> ActionResponse {
    let mut request = client.post(format!("http://{addr}/api/{route}"));
    if let Some(body) = body {
        request = request.json(&body);
    }
    let response = request.send().await.expect("request failed");
    assert!(response.status().is_success(), "status {}", response.status());
    response.json().await.expect("action response")
}

/// Tests a full hint, answer, advance cycle over HTTP.
#[tokio::test]
async fn test_http_session_flow() {
    let gemini = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "What does 'plus' mean?" }] } }]
        })))
        .expect(1)
        .mount(&gemini)
        .await;
    let addr = start_server(&gemini).await;
    let client = reqwest::Client::new();

    let view: SessionView = client
        .get(format!("http://{addr}/api/session"))
        .send()
        .await
        .expect("request failed")
        .json()
        .await
        .expect("session view");
    assert_eq!(view.problem_number, Some(1));
    assert_eq!(view.total, 5);
    assert_eq!(view.problem_text.as_deref(), Some("What is 2+2?"));

    let response = post(&client, addr, "hint", None).await;
    assert!(matches!(response.outcome, Outcome::HintGiven { .. }));
    assert_eq!(response.view.hints_used, 1);
    assert_eq!(response.view.transcript[1].content, "What does 'plus' mean?");

    let response = post(&client, addr, "advance", None).await;
    assert_eq!(response.outcome, Outcome::AdvanceRejected);

    let response = post(&client, addr, "answer", Some(serde_json::json!({ "answer": "5" }))).await;
    assert!(matches!(
        response.outcome,
        Outcome::AnswerChecked { verdict: Verdict::Incorrect, explanation: None }
    ));

    let response = post(&client, addr, "answer", Some(serde_json::json!({ "answer": "4" }))).await;
    assert_eq!(
        response.view.explanation.as_deref(),
        Some("Two plus two is four.")
    );

    let response = post(&client, addr, "advance", None).await;
    assert_eq!(response.outcome, Outcome::Advanced { index: 1 });
    assert_eq!(response.view.problem_number, Some(2));
    assert_eq!(response.view.hints_used, 0);
    assert!(response.view.transcript.is_empty());
}

/// Tests that a bad source empties the bank and a good one restores it.
#[tokio::test]
async fn test_http_source_switch() {
    let gemini = MockServer::start().await;
    let addr = start_server(&gemini).await;
    let client = reqwest::Client::new();

    let response = post(
        &client,
        addr,
        "source",
        Some(serde_json::json!({ "source": "/nonexistent/bank.csv" })),
    )
    .await;
    assert!(matches!(
        response.outcome,
        Outcome::BankReloaded { count: 0, error: Some(_) }
    ));
    assert!(response.view.load_error.is_some());

    let response = post(&client, addr, "hint", None).await;
    assert_eq!(response.outcome, Outcome::NoProblems);

    let response = post(
        &client,
        addr,
        "source",
        Some(serde_json::json!({ "source": fixture_bank() })),
    )
    .await;
    assert_eq!(
        response.outcome,
        Outcome::BankReloaded { count: 5, error: None }
    );
    assert_eq!(response.view.load_error, None);
}
