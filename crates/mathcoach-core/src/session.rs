//! Session state types for a tutoring session.
//!
//! This module defines the per-learner state the controller mutates: the
//! current problem index, the hint level of the current attempt, the chat
//! transcript, and the verdict of the last submitted answer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::answer::Verdict;

/// Student message recorded each time a hint is requested.
pub const STUCK_MARKER: &str = "I'm stuck.";

// ============================================================================
// HintLevel
// ============================================================================

/// How much guidance has been unlocked for the current attempt.
///
/// `0` means no hint yet; [`HintLevel::MAX`] is the strongest hint allowed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct HintLevel(u8);

impl HintLevel {
    /// No hint requested yet.
    pub const NONE: Self = Self(0);

    /// Highest hint level.
    pub const MAX: Self = Self(3);

    /// Creates a level, returning `None` above [`HintLevel::MAX`].
    #[must_use]
    pub const fn new(level: u8) -> Option<Self> {
        if level <= Self::MAX.0 {
            Some(Self(level))
        } else {
            None
        }
    }

    /// The numeric level.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// The level a new hint request would unlock, or `None` at the maximum.
    ///
    /// # Examples
    ///
    /// ```
    /// use mathcoach_core::HintLevel;
    ///
    /// assert_eq!(HintLevel::NONE.next().map(HintLevel::get), Some(1));
    /// assert_eq!(HintLevel::MAX.next(), None);
    /// ```
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        Self::new(self.0 + 1)
    }

    /// Hints still available before the maximum is reached.
    #[must_use]
    pub const fn remaining(self) -> u8 {
        Self::MAX.0 - self.0
    }
}

impl TryFrom<u8> for HintLevel {
    type Error = String;

    fn try_from(level: u8) -> std::result::Result<Self, Self::Error> {
        Self::new(level).ok_or_else(|| {
            format!("hint level {level} is above the maximum of {}", Self::MAX.0)
        })
    }
}

impl From<HintLevel> for u8 {
    fn from(level: HintLevel) -> Self {
        level.0
    }
}

impl std::fmt::Display for HintLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Chat transcript
// ============================================================================

/// Who wrote a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The learner.
    Student,
    /// The hint service.
    Coach,
}

/// One turn of the conversation about the current problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author of the message.
    pub role: Role,

    /// Message text, shown verbatim.
    pub content: String,

    /// When the message was recorded.
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Creates a student message with the current timestamp.
    #[must_use]
    pub fn student(content: impl Into<String>) -> Self {
        Self {
            role: Role::Student,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Creates a coach message with the current timestamp.
    #[must_use]
    pub fn coach(content: impl Into<String>) -> Self {
        Self {
            role: Role::Coach,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Ordered record of the current attempt's conversation.
///
/// Append-only while an attempt lasts; cleared when it ends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript(Vec<ChatMessage>);

impl Transcript {
    /// Creates an empty transcript.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a message.
    pub fn push(&mut self, message: ChatMessage) {
        self.0.push(message);
    }

    /// All messages in order.
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.0
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if nothing has been said yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over messages in order.
    pub fn iter(&self) -> std::slice::Iter<'_, ChatMessage> {
        self.0.iter()
    }

    fn clear(&mut self) {
        self.0.clear();
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a ChatMessage;
    type IntoIter = std::slice::Iter<'a, ChatMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<ChatMessage> for Transcript {
    fn from_iter<I: IntoIterator<Item = ChatMessage>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ============================================================================
// AttemptStatus
// ============================================================================

/// Where the current problem attempt stands.
///
/// The status transitions through these states:
/// - `Fresh` -> `HintRequested(1)` -> `HintRequested(2)` -> `HintRequested(3)`
/// - From any of them the attempt ends by advancing (after a correct answer)
///   or by an explicit reset, both of which return to `Fresh`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// No hint requested and nothing said yet.
    Fresh,
    /// At least one hint has been given; holds the current level.
    HintRequested(HintLevel),
}

// ============================================================================
// SessionState
// ============================================================================

/// Complete state of one learner's session.
///
/// One instance per learner, owned by whoever drives the session and passed
/// by `&mut` into [`crate::Controller::handle`]. Serializes to JSON for the
/// HTTP surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Position of the current problem in the problem set.
    pub current_index: usize,

    /// Hint level of the current attempt.
    pub hint_level: HintLevel,

    /// Conversation for the current attempt.
    pub transcript: Transcript,

    /// Verdict of the most recent answer in the current attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_verdict: Option<Verdict>,

    /// When the session started.
    pub started_at: DateTime<Utc>,

    /// When the state was last changed.
    pub updated_at: DateTime<Utc>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    /// Creates a fresh session at the first problem.
    ///
    /// # Examples
    ///
    /// ```
    /// use mathcoach_core::{AttemptStatus, SessionState};
    ///
    /// let state = SessionState::new();
    /// assert_eq!(state.current_index, 0);
    /// assert_eq!(state.attempt_status(), AttemptStatus::Fresh);
    /// assert!(state.transcript.is_empty());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            current_index: 0,
            hint_level: HintLevel::NONE,
            transcript: Transcript::new(),
            last_verdict: None,
            started_at: now,
            updated_at: now,
        }
    }

    /// Status of the current attempt, derived from the hint level.
    #[must_use]
    pub fn attempt_status(&self) -> AttemptStatus {
        if self.hint_level == HintLevel::NONE {
            AttemptStatus::Fresh
        } else {
            AttemptStatus::HintRequested(self.hint_level)
        }
    }

    /// Returns `true` if the last submitted answer was correct.
    #[must_use]
    pub fn can_advance(&self) -> bool {
        self.last_verdict.is_some_and(Verdict::is_correct)
    }

    /// Updates the `updated_at` timestamp to the current time.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Commits a hint: raises the level and appends the stuck marker and the hint.
    ///
    /// Ignored unless `level` is exactly one above the current level, which
    /// keeps the level monotonic and capped at [`HintLevel::MAX`].
    pub fn record_hint(&mut self, level: HintLevel, hint: impl Into<String>) {
        if self.hint_level.next() != Some(level) {
            return;
        }
        self.hint_level = level;
        self.transcript.push(ChatMessage::student(STUCK_MARKER));
        self.transcript.push(ChatMessage::coach(hint));
        self.touch();
    }

    /// Records the verdict of a submitted answer.
    pub fn record_verdict(&mut self, verdict: Verdict) {
        self.last_verdict = Some(verdict);
        self.touch();
    }

    /// Ends the current attempt without moving: level 0, empty transcript.
    pub fn reset_attempt(&mut self) {
        self.hint_level = HintLevel::NONE;
        self.transcript.clear();
        self.last_verdict = None;
        self.touch();
    }

    /// Ends the current attempt and moves to the next problem.
    ///
    /// Wraps back to the first problem past the end of a set of `len` problems.
    pub fn advance(&mut self, len: usize) {
        self.current_index += 1;
        self.clamp_index(len);
        self.reset_attempt();
    }

    /// Coerces an out-of-range index back to 0.
    ///
    /// Returns `true` if the index changed. An empty set leaves the index alone.
    pub fn clamp_index(&mut self, len: usize) -> bool {
        if len > 0 && self.current_index >= len {
            self.current_index = 0;
            self.touch();
            return true;
        }
        false
    }

    /// Returns the duration since the session started.
    #[must_use]
    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }
}

// ============================================================================
// Tests
// ============================================================================
