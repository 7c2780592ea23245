//! Error types for the Math Coach session engine.
//!
//! This module defines the error hierarchy for configuration loading,
//! problem bank loading, and calls to the remote hint service. None of
//! these errors end a running session: the controller turns each of them
//! into a visible message and keeps the session usable.

use std::path::PathBuf;

/// A specialized `Result` type for Math Coach operations.
pub type Result<T> = std::result::Result<T, CoachError>;

/// Errors that can occur while running a tutoring session.
///
/// Error variants are organized by subsystem and include actionable suggestions
/// where possible to help the operator resolve issues.
#[derive(Debug, thiserror::Error)]
pub enum CoachError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your mathcoach.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Problem Bank Errors
    // ========================================================================
    /// The problem source could not be fetched or read.
    #[error("Problem source unreachable: '{source_locator}': {message}\n\nSuggestion: Check the path, or make sure the sheet is published to the web as CSV")]
    DataSourceUnreachable {
        /// Locator (URL or path) that was requested.
        source_locator: String,
        /// Description of the failure.
        message: String,
    },

    /// The problem source was readable but does not have the expected columns.
    #[error("Problem source '{source_locator}' has an invalid layout: {message}\n\nSuggestion: The first row must name the columns problem_text, answer and explanation")]
    DataSourceSchema {
        /// Locator (URL or path) that was requested.
        source_locator: String,
        /// Description of the layout problem.
        message: String,
    },

    // ========================================================================
    // Hint Service Errors
    // ========================================================================
    /// No credential is configured for the hint service.
    #[error("No API key configured for the hint service\n\nSuggestion: Set {env_var} or enter a key when prompted")]
    CredentialMissing {
        /// Environment variable the credential is read from.
        env_var: String,
    },

    /// The hint service rejected or failed the request.
    #[error("Hint service error ({kind}) using model '{model}': {message}\n\nSuggestion: {suggestion}")]
    RemoteService {
        /// The kind of failure.
        kind: ServiceErrorKind,
        /// Model identifier that was attempted.
        model: String,
        /// Detailed message from the service or transport.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    /// The hint service did not answer within the configured timeout.
    #[error("Hint service timed out after {timeout_secs}s using model '{model}'\n\nSuggestion: Retry, or raise hintTimeoutSecs in mathcoach.json")]
    HintTimeout {
        /// Model identifier that was attempted.
        model: String,
        /// The timeout duration in seconds.
        timeout_secs: u64,
    },

    // ========================================================================
    // General Errors
    // ========================================================================
    /// The HTTP client could not be built.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Categories of hint service failures for structured error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    /// Authentication failure (invalid or revoked API key).
    Authentication,
    /// The model identifier is unknown to the service.
    UnknownModel,
    /// Quota or rate limit exceeded.
    Quota,
    /// Server error (5xx responses).
    Server,
    /// Network connectivity issues.
    Network,
    /// The service answered but the body held no usable text.
    EmptyResponse,
    /// Other unclassified errors.
    Other,
}

impl std::fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::UnknownModel => write!(f, "unknown_model"),
            Self::Quota => write!(f, "quota"),
            Self::Server => write!(f, "server"),
            Self::Network => write!(f, "network"),
            Self::EmptyResponse => write!(f, "empty_response"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl ServiceErrorKind {
    /// Classifies a non-success HTTP status from the hint service.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Authentication,
            404 => Self::UnknownModel,
            429 => Self::Quota,
            500..=599 => Self::Server,
            _ => Self::Other,
        }
    }

    /// Returns a suggestion message for this error kind.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::Authentication => "Check your API key",
            Self::UnknownModel => "Set 'model' in mathcoach.json to a model your key can use",
            Self::Quota => "Wait a moment before asking for another hint",
            Self::Server => "Retry later; the hint service may be experiencing issues",
            Self::Network => "Check your network connection",
            Self::EmptyResponse => "Ask again; the model returned no text",
            Self::Other => "Check the hint service status page",
        }
    }
}

impl CoachError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `DataSourceUnreachable` error.
    #[must_use]
    pub fn data_source_unreachable(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataSourceUnreachable {
            source_locator: source.into(),
            message: message.into(),
        }
    }

    /// Creates a new `DataSourceSchema` error.
    #[must_use]
    pub fn data_source_schema(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataSourceSchema {
            source_locator: source.into(),
            message: message.into(),
        }
    }

    /// Creates a new `CredentialMissing` error.
    #[must_use]
    pub fn credential_missing(env_var: impl Into<String>) -> Self {
        Self::CredentialMissing {
            env_var: env_var.into(),
        }
    }

    /// Creates a new `RemoteService` error with automatic suggestion based on error kind.
    #[must_use]
    pub fn remote_service(
        kind: ServiceErrorKind,
        model: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::RemoteService {
            kind,
            model: model.into(),
            message: message.into(),
            suggestion: kind.suggestion().to_string(),
        }
    }

    /// Creates a new `HintTimeout` error.
    #[must_use]
    pub fn hint_timeout(model: impl Into<String>, timeout_secs: u64) -> Self {
        Self::HintTimeout {
            model: model.into(),
            timeout_secs,
        }
    }

    /// Returns `true` if asking again later may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RemoteService {
                kind: ServiceErrorKind::Quota
                    | ServiceErrorKind::Server
                    | ServiceErrorKind::Network
                    | ServiceErrorKind::EmptyResponse,
                ..
            } | Self::HintTimeout { .. }
                | Self::DataSourceUnreachable { .. }
        )
    }
}
