//! Interaction controller.
//!
//! The [`Controller`] owns the loaded problem set and the hint service, and
//! applies one [`Action`] at a time to a caller-owned [`SessionState`]. Each
//! action either commits fully or changes nothing. The hint round trip runs
//! before any mutation, so a hint's level bump and both transcript entries
//! land together.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::answer::{check, Verdict};
use crate::hint::HintService;
use crate::problem_bank::{Problem, ProblemBank, ProblemSet};
use crate::session::{AttemptStatus, ChatMessage, HintLevel, SessionState};

// ============================================================================
// Actions and outcomes
// ============================================================================

/// A user intent to apply to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Ask for the next hint level on the current problem.
    RequestHint,
    /// Submit an answer to the current problem.
    SubmitAnswer(String),
    /// Move on after a correct answer.
    AdvanceProblem,
    /// Abandon the current attempt without moving.
    ResetSession,
    /// Load a problem bank from a new (or the same) locator.
    ReloadProblemBank(String),
}

/// What an action did, for the surface to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outcome {
    /// A hint request was made and its text was recorded at `level`.
    ///
    /// `hint` may describe a remote failure; it is recorded either way.
    HintGiven {
        /// The level now in effect.
        level: HintLevel,
        /// Text appended to the transcript.
        hint: String,
    },
    /// No request was possible; nothing was recorded.
    HintUnavailable {
        /// Why no hint could be requested.
        message: String,
    },
    /// All hint levels for this attempt are used.
    NoMoreHints,
    /// An answer was compared with the expected one.
    AnswerChecked {
        /// The comparison result.
        verdict: Verdict,
        /// The worked explanation, revealed only when correct.
        explanation: Option<String>,
    },
    /// The session moved to another problem.
    Advanced {
        /// Zero-based index of the new current problem.
        index: usize,
    },
    /// Advancing requires a correct answer first.
    AdvanceRejected,
    /// The current attempt was cleared.
    SessionReset,
    /// A problem bank load finished.
    BankReloaded {
        /// Number of problems now loaded.
        count: usize,
        /// Load failure message, if the load failed.
        error: Option<String>,
    },
    /// The action needs a problem but none are loaded.
    NoProblems,
}

// ============================================================================
// SessionView
// ============================================================================

/// Snapshot of everything a surface shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    /// Locator of the loaded problem bank.
    pub source: String,
    /// One-based number of the current problem; `None` with no problems.
    pub problem_number: Option<usize>,
    /// Number of loaded problems.
    pub total: usize,
    /// `problem_number / total`, or `0.0` with no problems.
    pub progress: f64,
    /// Statement of the current problem.
    pub problem_text: Option<String>,
    /// Where the current attempt stands.
    pub status: AttemptStatus,
    /// Conversation for the current attempt.
    pub transcript: Vec<ChatMessage>,
    /// Hint levels used in the current attempt.
    pub hints_used: u8,
    /// Hint levels still available.
    pub hints_remaining: u8,
    /// Verdict of the last submitted answer.
    pub last_verdict: Option<Verdict>,
    /// Explanation of the current problem, once answered correctly.
    pub explanation: Option<String>,
    /// Why the bank is empty, when a load failed.
    pub load_error: Option<String>,
}

// ============================================================================
// Controller
// ============================================================================

/// Applies actions to a session against the loaded problem set.
pub struct Controller {
    bank: ProblemBank,
    problems: ProblemSet,
    source: String,
    load_error: Option<String>,
    hints: Arc<dyn HintService>,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("source", &self.source)
            .field("problems", &self.problems.len())
            .field("load_error", &self.load_error)
            .finish_non_exhaustive()
    }
}

impl Controller {
    /// Creates a controller with nothing loaded yet.
    #[must_use]
    pub fn new(bank: ProblemBank, hints: Arc<dyn HintService>) -> Self {
        Self {
            bank,
            problems: ProblemSet::empty(),
            source: String::new(),
            load_error: None,
            hints,
        }
    }

    /// Creates a controller over an already loaded set.
    #[must_use]
    pub fn with_problems(
        problems: ProblemSet,
        bank: ProblemBank,
        hints: Arc<dyn HintService>,
    ) -> Self {
        Self {
            problems,
            ..Self::new(bank, hints)
        }
    }

    /// The loaded problem set.
    #[must_use]
    pub const fn problems(&self) -> &ProblemSet {
        &self.problems
    }

    /// Locator of the loaded problem bank.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Message from the last failed load, if the bank is empty because of it.
    #[must_use]
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    /// Applies `action` to `session`.
    pub async fn handle(&mut self, session: &mut SessionState, action: Action) -> Outcome {
        let outcome = match action {
            Action::RequestHint => self.request_hint(session).await,
            Action::SubmitAnswer(answer) => self.submit_answer(session, &answer),
            Action::AdvanceProblem => self.advance(session),
            Action::ResetSession => {
                session.reset_attempt();
                Outcome::SessionReset
            }
            Action::ReloadProblemBank(source) => self.reload(session, &source).await,
        };
        info!(
            index = session.current_index,
            hint_level = session.hint_level.get(),
            outcome = outcome_name(&outcome),
            "Action applied"
        );
        outcome
    }

    fn current_problem(&self, session: &mut SessionState) -> Option<&Problem> {
        session.clamp_index(self.problems.len());
        self.problems.get(session.current_index)
    }

    async fn request_hint(&self, session: &mut SessionState) -> Outcome {
        let Some(problem) = self.current_problem(session) else {
            return Outcome::NoProblems;
        };
        let Some(level) = session.hint_level.next() else {
            return Outcome::NoMoreHints;
        };

        let reply = self
            .hints
            .get_hint(problem, &session.transcript, level)
            .await;
        if !reply.consumes_attempt() {
            return Outcome::HintUnavailable {
                message: reply.text().to_string(),
            };
        }

        let hint = reply.text().to_string();
        session.record_hint(level, hint.clone());
        Outcome::HintGiven { level, hint }
    }

    fn submit_answer(&self, session: &mut SessionState, answer: &str) -> Outcome {
        let Some(problem) = self.current_problem(session) else {
            return Outcome::NoProblems;
        };

        let verdict = check(answer, &problem.answer);
        let explanation = verdict.is_correct().then(|| problem.explanation.clone());
        session.record_verdict(verdict);
        Outcome::AnswerChecked {
            verdict,
            explanation,
        }
    }

    fn advance(&self, session: &mut SessionState) -> Outcome {
        if self.current_problem(session).is_none() {
            return Outcome::NoProblems;
        }
        if !session.can_advance() {
            return Outcome::AdvanceRejected;
        }

        session.advance(self.problems.len());
        Outcome::Advanced {
            index: session.current_index,
        }
    }

    async fn reload(&mut self, session: &mut SessionState, source: &str) -> Outcome {
        let source = source.trim();
        if source == self.source && self.bank.invalidate(source) {
            info!(source, "Refreshing problem bank");
        }

        let error = match self.bank.load(source).await {
            Ok(problems) => {
                self.problems = problems;
                self.load_error = None;
                None
            }
            Err(e) => {
                warn!(source, error = %e, "Problem bank load failed");
                self.problems = ProblemSet::empty();
                let message = e.to_string();
                self.load_error = Some(message.clone());
                Some(message)
            }
        };
        self.source = source.to_string();

        // A reload re-presents the problem; a verdict belongs to the one it was given for.
        session.clamp_index(self.problems.len());
        session.last_verdict = None;

        Outcome::BankReloaded {
            count: self.problems.len(),
            error,
        }
    }

    /// Builds the render snapshot for `session`.
    #[must_use]
    pub fn view(&self, session: &SessionState) -> SessionView {
        let total = self.problems.len();
        let index = if total == 0 || session.current_index < total {
            session.current_index
        } else {
            0
        };
        let problem = self.problems.get(index);
        let problem_number = problem.map(|_| index + 1);

        #[allow(clippy::cast_precision_loss)]
        let progress = problem_number.map_or(0.0, |n| n as f64 / total as f64);

        SessionView {
            source: self.source.clone(),
            problem_number,
            total,
            progress,
            problem_text: problem.map(|p| p.text.clone()),
            status: session.attempt_status(),
            transcript: session.transcript.messages().to_vec(),
            hints_used: session.hint_level.get(),
            hints_remaining: session.hint_level.remaining(),
            last_verdict: session.last_verdict,
            explanation: problem
                .filter(|_| session.can_advance())
                .map(|p| p.explanation.clone()),
            load_error: self.load_error.clone(),
        }
    }
}

const fn outcome_name(outcome: &Outcome) -> &'static str {
    match outcome {
        Outcome::HintGiven { .. } => "hint_given",
        Outcome::HintUnavailable { .. } => "hint_unavailable",
        Outcome::NoMoreHints => "no_more_hints",
        Outcome::AnswerChecked { .. } => "answer_checked",
        Outcome::Advanced { .. } => "advanced",
        Outcome::AdvanceRejected => "advance_rejected",
        Outcome::SessionReset => "session_reset",
        Outcome::BankReloaded { .. } => "bank_reloaded",
        Outcome::NoProblems => "no_problems",
    }
}

// ============================================================================
// Tests
// ============================================================================
