//! HTTP API for driving a tutoring session from a browser or script.
//!
//! # Endpoints
//!
//! - `GET /api/session` - Current session view
//! - `POST /api/hint` - Request the next hint
//! - `POST /api/answer` - Submit an answer (`{"answer": "..."}`)
//! - `POST /api/advance` - Move on after a correct answer
//! - `POST /api/reset` - Clear the current attempt
//! - `POST /api/source` - Load a problem bank (`{"source": "..."}`)
//!
//! Every `POST` returns `{"outcome": ..., "view": ...}`. One action is fully
//! applied, remote hint round trip included, before the next is accepted.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use mathcoach_core::{create_router, AppState, Controller, GeminiHintEngine, ProblemBank};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let bank = ProblemBank::new(Duration::from_secs(30))?;
//! let hints = Arc::new(GeminiHintEngine::new(
//!     None,
//!     "gemini-1.5-flash-latest",
//!     "https://generativelanguage.googleapis.com",
//!     Duration::from_secs(30),
//! ));
//! let state = AppState::new(Controller::new(bank, hints));
//!
//! let router = create_router(state);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//! axum::serve(listener, router).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::controller::{Action, Controller, Outcome, SessionView};
use crate::session::SessionState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for the answer endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerRequest {
    /// The submitted answer text.
    pub answer: String,
}

/// Request body for the source endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceRequest {
    /// Locator (URL or path) of the problem bank to load.
    pub source: String,
}

/// Response body for every action endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    /// What the action did.
    pub outcome: Outcome,
    /// The session after the action.
    pub view: SessionView,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
}

// ============================================================================
// Application State
// ============================================================================

/// The controller together with the one session it drives.
#[derive(Debug)]
pub struct TutoringSession {
    /// Applies actions against the loaded problems.
    pub controller: Controller,
    /// The learner's state.
    pub session: SessionState,
}

/// Shared application state for the HTTP server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The tutoring session, locked for the whole of each action.
    pub tutor: Arc<Mutex<TutoringSession>>,
}

impl AppState {
    /// Creates state with a fresh session.
    #[must_use]
    pub fn new(controller: Controller) -> Self {
        Self::with_session(controller, SessionState::new())
    }

    /// Creates state around an existing session.
    #[must_use]
    pub fn with_session(controller: Controller, session: SessionState) -> Self {
        Self {
            tutor: Arc::new(Mutex::new(TutoringSession {
                controller,
                session,
            })),
        }
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Internal error type for API handlers.
#[derive(Debug)]
enum ApiError {
    /// The request body was well-formed JSON but unusable.
    InvalidRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::InvalidRequest(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all API endpoints.
///
/// Routes live under `/api`, with permissive CORS and request tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/session", get(handle_session))
        .route("/hint", post(handle_hint))
        .route("/answer", post(handle_answer))
        .route("/advance", post(handle_advance))
        .route("/reset", post(handle_reset))
        .route("/source", post(handle_source));

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

/// Applies one action while holding the session lock.
async fn apply(state: &AppState, action: Action) -> Json<ActionResponse> {
    let mut tutor = state.tutor.lock().await;
    let TutoringSession {
        controller,
        session,
    } = &mut *tutor;

    let outcome = controller.handle(session, action).await;
    let view = controller.view(session);
    Json(ActionResponse { outcome, view })
}

/// Handler for `GET /api/session`.
async fn handle_session(State(state): State<AppState>) -> Json<SessionView> {
    let tutor = state.tutor.lock().await;
    Json(tutor.controller.view(&tutor.session))
}

/// Handler for `POST /api/hint`.
async fn handle_hint(State(state): State<AppState>) -> Json<ActionResponse> {
    info!("Hint requested");
    apply(&state, Action::RequestHint).await
}

/// Handler for `POST /api/answer`.
async fn handle_answer(
    State(state): State<AppState>,
    Json(request): Json<AnswerRequest>,
) -> Json<ActionResponse> {
    info!(answer_len = request.answer.len(), "Answer submitted");
    apply(&state, Action::SubmitAnswer(request.answer)).await
}

/// Handler for `POST /api/advance`.
async fn handle_advance(State(state): State<AppState>) -> Json<ActionResponse> {
    apply(&state, Action::AdvanceProblem).await
}

/// Handler for `POST /api/reset`.
async fn handle_reset(State(state): State<AppState>) -> Json<ActionResponse> {
    apply(&state, Action::ResetSession).await
}

/// Handler for `POST /api/source`.
///
/// Rejects a blank locator; any other load failure is reported in the outcome.
async fn handle_source(
    State(state): State<AppState>,
    Json(request): Json<SourceRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    if request.source.trim().is_empty() {
        warn!("Rejected blank problem source");
        return Err(ApiError::InvalidRequest(
            "source must not be empty".to_string(),
        ));
    }

    info!(source = %request.source, "Problem source requested");
    Ok(apply(&state, Action::ReloadProblemBank(request.source)).await)
}

// ============================================================================
// Tests
// ============================================================================
