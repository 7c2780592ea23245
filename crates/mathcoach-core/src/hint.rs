//! Hint generation through a remote language model.
//!
//! [`HintRequest::build`] turns a problem, the current transcript and the
//! requested level into the three parts the model sees: a level-specific
//! system instruction, the prior turns replayed in order, and a final
//! prompt. [`GeminiHintEngine`] sends that request to the Gemini
//! `generateContent` endpoint. Every failure comes back as a [`HintReply`]
//! carrying a readable message, never as an error the caller must handle.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::config::Config;
use crate::error::{CoachError, Result, ServiceErrorKind};
use crate::problem_bank::Problem;
use crate::session::{HintLevel, Role, Transcript};

/// Shown in place of a hint when no API key is configured.
///
/// `env_var` is the variable the key is read from.
#[must_use]
pub fn credential_missing_message(env_var: &str) -> String {
    format!("Please enter an API key to get hints (set {env_var} or supply one when prompted).")
}

// ============================================================================
// Credential
// ============================================================================

/// API key for the hint service.
///
/// The key is wiped from memory on drop and never appears in `Debug` output.
#[derive(Clone)]
pub struct Credential(Zeroizing<String>);

impl Credential {
    /// Wraps a key, returning `None` for a blank one.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            None
        } else {
            Some(Self(Zeroizing::new(key.trim().to_string())))
        }
    }

    /// Reads the key from the environment variable `var`.
    #[must_use]
    pub fn from_env(var: &str) -> Option<Self> {
        std::env::var(var).ok().and_then(Self::new)
    }

    fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

// ============================================================================
// Prompt construction
// ============================================================================

/// Speaker of a turn as the model service names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// The learner's side.
    User,
    /// The model's own earlier replies.
    Model,
}

impl From<Role> for TurnRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Student => Self::User,
            Role::Coach => Self::Model,
        }
    }
}

/// One replayed turn of conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    /// Who said it.
    pub role: TurnRole,
    /// What was said.
    pub text: String,
}

/// Everything the model sees for one hint request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintRequest {
    /// Tutoring policy for the requested level.
    pub system_instruction: String,
    /// The transcript so far, in order.
    pub prior_turns: Vec<Turn>,
    /// The closing request naming the problem and level.
    pub final_prompt: String,
}

impl HintRequest {
    /// Builds the request for `level` on `problem`, replaying `transcript`.
    #[must_use]
    pub fn build(problem: &Problem, transcript: &Transcript, level: HintLevel) -> Self {
        let prior_turns = transcript
            .iter()
            .map(|message| Turn {
                role: message.role.into(),
                text: message.content.clone(),
            })
            .collect();

        Self {
            system_instruction: system_instruction(level),
            prior_turns,
            final_prompt: final_prompt(problem, level),
        }
    }
}

/// Socratic tutoring policy, parameterized by the level being requested.
#[must_use]
pub fn system_instruction(level: HintLevel) -> String {
    format!(
        "You are a Socratic Math Coach for AMC 10.\n\
         GOAL: Help the student solve the problem WITHOUT giving the answer.\n\
         CURRENT STATUS: Student is at Hint Level {level}/{max}.\n\
         INSTRUCTIONS:\n\
         - Level 1: Ask a clarifying question about a definition in the problem.\n\
         - Level 2: Suggest the first step.\n\
         - Level 3: Give a formula or strong clue.\n\
         - NEVER reveal the final answer.\n\
         - Keep responses short.",
        max = HintLevel::MAX,
    )
}

/// The closing request sent after the replayed transcript.
///
/// # Examples
///
/// ```
/// use mathcoach_core::{final_prompt, HintLevel, Problem};
///
/// let problem = Problem::new("2+2?", "4", "sum");
/// let level = HintLevel::new(2).unwrap_or_default();
/// assert_eq!(
///     final_prompt(&problem, level),
///     "Problem: '2+2?'. I am stuck. Give me a Level 2 hint."
/// );
/// ```
#[must_use]
pub fn final_prompt(problem: &Problem, level: HintLevel) -> String {
    format!(
        "Problem: '{}'. I am stuck. Give me a Level {level} hint.",
        problem.text
    )
}

// ============================================================================
// HintService
// ============================================================================

/// What came back from a hint request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HintReply {
    /// The model produced a hint.
    Generated(String),
    /// The request was made and failed; holds a readable description.
    Failed(String),
    /// No request was made because no API key is configured; holds the
    /// instructions for supplying one.
    CredentialMissing(String),
}

impl HintReply {
    /// Text to show the learner.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Generated(text) | Self::Failed(text) | Self::CredentialMissing(text) => text,
        }
    }

    /// Returns `true` if a request was attempted, so the hint level is spent.
    #[must_use]
    pub const fn consumes_attempt(&self) -> bool {
        !matches!(self, Self::CredentialMissing(_))
    }
}

/// Source of hints for the controller.
#[async_trait]
pub trait HintService: Send + Sync {
    /// Produces a hint of `level` for `problem`, given the conversation so far.
    async fn get_hint(
        &self,
        problem: &Problem,
        transcript: &Transcript,
        level: HintLevel,
    ) -> HintReply;
}

// ============================================================================
// Gemini wire types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: SystemInstruction<'a>,
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: TurnRole,
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

impl<'a> GenerateContentRequest<'a> {
    fn from_hint_request(request: &'a HintRequest) -> Self {
        let mut contents: Vec<Content<'a>> = request
            .prior_turns
            .iter()
            .map(|turn| Content {
                role: turn.role,
                parts: [Part { text: &turn.text }],
            })
            .collect();
        contents.push(Content {
            role: TurnRole::User,
            parts: [Part {
                text: &request.final_prompt,
            }],
        });

        Self {
            system_instruction: SystemInstruction {
                parts: [Part {
                    text: &request.system_instruction,
                }],
            },
            contents,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

// ============================================================================
// GeminiHintEngine
// ============================================================================

/// Hint service backed by Google Gemini.
#[derive(Debug, Clone)]
pub struct GeminiHintEngine {
    client: reqwest::Client,
    credential: Option<Credential>,
    model: String,
    base_url: String,
    timeout: Duration,
    credential_env: String,
}

impl GeminiHintEngine {
    /// Creates an engine for `model` at `base_url`.
    ///
    /// Without a credential every request returns
    /// [`HintReply::CredentialMissing`] and nothing is sent.
    #[must_use]
    pub fn new(
        credential: Option<Credential>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            credential,
            model: model.into(),
            base_url: base_url.into(),
            timeout,
            credential_env: "GEMINI_API_KEY".to_string(),
        }
    }

    /// Creates an engine from the model, endpoint and timeout in `config`.
    #[must_use]
    pub fn from_config(config: &Config, credential: Option<Credential>) -> Self {
        let mut engine = Self::new(
            credential,
            &config.model,
            &config.api_base_url,
            config.hint_timeout(),
        );
        engine.credential_env.clone_from(&config.credential_env);
        engine
    }

    /// Model identifier this engine sends requests to.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns `true` if an API key is configured.
    #[must_use]
    pub const fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    /// Sends `request` and returns the model's text.
    ///
    /// # Errors
    ///
    /// Returns `CoachError::CredentialMissing` without sending anything when no
    /// key is configured, `CoachError::HintTimeout` when the round trip exceeds
    /// the timeout, and `CoachError::RemoteService` for every other failure.
    pub async fn generate(&self, request: &HintRequest) -> Result<String> {
        let credential = self
            .credential
            .as_ref()
            .ok_or_else(|| CoachError::credential_missing(&self.credential_env))?;

        let body = GenerateContentRequest::from_hint_request(request);
        debug!(
            model = %self.model,
            prior_turns = request.prior_turns.len(),
            "Sending hint request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", credential.expose())
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|envelope| envelope.error.message)
                .unwrap_or_else(|_| format!("HTTP {status}"));
            return Err(CoachError::remote_service(
                ServiceErrorKind::from_status(status.as_u16()),
                &self.model,
                message,
            ));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        let text = text.trim();
        if text.is_empty() {
            return Err(CoachError::remote_service(
                ServiceErrorKind::EmptyResponse,
                &self.model,
                "response contained no text",
            ));
        }
        Ok(text.to_string())
    }

    fn transport_error(&self, error: &reqwest::Error) -> CoachError {
        if error.is_timeout() {
            CoachError::hint_timeout(&self.model, self.timeout.as_secs())
        } else if error.is_decode() {
            CoachError::remote_service(ServiceErrorKind::Other, &self.model, error.to_string())
        } else {
            CoachError::remote_service(ServiceErrorKind::Network, &self.model, error.to_string())
        }
    }
}

#[async_trait]
impl HintService for GeminiHintEngine {
    async fn get_hint(
        &self,
        problem: &Problem,
        transcript: &Transcript,
        level: HintLevel,
    ) -> HintReply {
        if !self.has_credential() {
            warn!(env_var = %self.credential_env, "Hint requested without an API key");
            return HintReply::CredentialMissing(credential_missing_message(&self.credential_env));
        }

        let request = HintRequest::build(problem, transcript, level);
        match self.generate(&request).await {
            Ok(hint) => {
                info!(level = level.get(), model = %self.model, "Hint generated");
                HintReply::Generated(hint)
            }
            Err(e) => {
                warn!(
                    level = level.get(),
                    model = %self.model,
                    transient = e.is_transient(),
                    error = %e,
                    "Hint request failed"
                );
                HintReply::Failed(format!(
                    "Error contacting the hint service (model '{}'): {}",
                    self.model,
                    first_line(&e.to_string())
                ))
            }
        }
    }
}

/// The error line without its suggestion paragraph.
fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or(message)
}

// ============================================================================
// Tests
// ============================================================================
