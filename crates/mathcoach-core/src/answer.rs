//! Answer checking.

use serde::{Deserialize, Serialize};

/// Result of comparing a submitted answer with the expected one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// The answer matches.
    Correct,
    /// The answer does not match; the learner may try again.
    Incorrect,
}

impl Verdict {
    /// Returns `true` for [`Verdict::Correct`].
    #[must_use]
    pub const fn is_correct(self) -> bool {
        matches!(self, Self::Correct)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Correct => write!(f, "correct"),
            Self::Incorrect => write!(f, "incorrect"),
        }
    }
}

/// Compares `submitted` against `expected`.
///
/// Both sides are trimmed and then compared as text. There is no numeric
/// coercion: `"12.0"` does not match `"12"`.
///
/// # Examples
///
/// ```
/// use mathcoach_core::{check, Verdict};
///
/// assert_eq!(check(" 12 ", "12"), Verdict::Correct);
/// assert_eq!(check("12.0", "12"), Verdict::Incorrect);
/// ```
#[must_use]
pub fn check(submitted: &str, expected: &str) -> Verdict {
    if submitted.trim() == expected.trim() {
        Verdict::Correct
    } else {
        Verdict::Incorrect
    }
}
