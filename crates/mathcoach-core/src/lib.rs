//! Math Coach session engine
//!
//! Loads a CSV problem bank, gates hints through three levels per attempt,
//! checks answers, and serves the session over an optional HTTP API.

pub mod answer;
pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod hint;
pub mod problem_bank;
pub mod session;

pub use answer::{check, Verdict};
pub use api::{
    create_router, ActionResponse, AnswerRequest, AppState, ErrorResponse, SourceRequest,
    TutoringSession,
};
pub use config::{Config, DEFAULT_MODEL};
pub use controller::{Action, Controller, Outcome, SessionView};
pub use error::{CoachError, Result, ServiceErrorKind};
pub use hint::{
    credential_missing_message, final_prompt, system_instruction, Credential, GeminiHintEngine,
    HintReply, HintRequest, HintService, Turn, TurnRole,
};
pub use problem_bank::{
    parse_csv, ParsedProblems, Problem, ProblemBank, ProblemSet, ProblemSource, MAX_SOURCE_SIZE,
    REQUIRED_COLUMNS,
};
pub use session::{
    AttemptStatus, ChatMessage, HintLevel, Role, SessionState, Transcript, STUCK_MARKER,
};
