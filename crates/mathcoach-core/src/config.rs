//! Configuration types for Math Coach.
//!
//! Settings come from an optional `mathcoach.json` file. Every field has a
//! default, so a missing file yields a working configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoachError, Result};

/// The default config file name.
const CONFIG_FILE_NAME: &str = "mathcoach.json";

/// Model identifier used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";

/// Default problem bank: a spreadsheet published to the web as CSV.
fn default_problem_source() -> String {
    "https://docs.google.com/spreadsheets/d/e/2PACX-1vRk-iI5pGXbX-u7vnoxOQWj1_5oaCg3-wbN1DK7VwWjB4tPGFfOQc7B1XgLhXk1A/pub?output=csv".to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_api_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

/// Default timeout in seconds for one hint request.
const fn default_hint_timeout() -> u64 {
    30
}

/// Default timeout in seconds for fetching a remote problem source.
const fn default_source_timeout() -> u64 {
    30
}

/// Default environment variable holding the API key.
fn default_credential_env() -> String {
    "GEMINI_API_KEY".to_string()
}

/// Main configuration for Math Coach.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Locator (URL or path) of the CSV problem bank loaded at startup.
    #[serde(default = "default_problem_source")]
    pub problem_source: String,

    /// Model identifier sent to the hint service.
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the hint service.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Upper bound on one hint round trip, in seconds.
    #[serde(default = "default_hint_timeout")]
    pub hint_timeout_secs: u64,

    /// Upper bound on fetching a remote problem source, in seconds.
    #[serde(default = "default_source_timeout")]
    pub source_timeout_secs: u64,

    /// Environment variable the API key is read from.
    #[serde(default = "default_credential_env")]
    pub credential_env: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            problem_source: default_problem_source(),
            model: default_model(),
            api_base_url: default_api_base_url(),
            hint_timeout_secs: default_hint_timeout(),
            source_timeout_secs: default_source_timeout(),
            credential_env: default_credential_env(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `mathcoach.json`; returns defaults when it does not exist.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            CoachError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from `mathcoach.json` inside `dir`.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns `CoachError::ConfigParseError` if the file exists but cannot be
    /// read or parsed, and `CoachError::ConfigValidationError` if a value is
    /// out of range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(CoachError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| CoachError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `CoachError::ConfigValidationError` if any string field is blank
    /// or any timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.problem_source.trim().is_empty() {
            return Err(CoachError::config_validation(
                "problemSource must not be empty",
                "Provide a CSV URL or file path as problemSource in your mathcoach.json",
            ));
        }

        if self.model.trim().is_empty() {
            return Err(CoachError::config_validation(
                "model must not be empty",
                format!("Remove the model field from mathcoach.json to use {DEFAULT_MODEL}"),
            ));
        }

        if self.api_base_url.trim().is_empty() {
            return Err(CoachError::config_validation(
                "apiBaseUrl must not be empty",
                "Remove apiBaseUrl from mathcoach.json to use the public endpoint",
            ));
        }

        if self.hint_timeout_secs == 0 {
            return Err(CoachError::config_validation(
                "hintTimeoutSecs must be greater than 0",
                "Set hintTimeoutSecs to at least 1 second in your mathcoach.json",
            ));
        }

        if self.source_timeout_secs == 0 {
            return Err(CoachError::config_validation(
                "sourceTimeoutSecs must be greater than 0",
                "Set sourceTimeoutSecs to at least 1 second in your mathcoach.json",
            ));
        }

        if self.credential_env.trim().is_empty() {
            return Err(CoachError::config_validation(
                "credentialEnv must not be empty",
                "Remove credentialEnv from mathcoach.json to use GEMINI_API_KEY",
            ));
        }

        Ok(())
    }

    /// Hint request timeout as a `Duration`.
    #[must_use]
    pub const fn hint_timeout(&self) -> Duration {
        Duration::from_secs(self.hint_timeout_secs)
    }

    /// Problem source fetch timeout as a `Duration`.
    #[must_use]
    pub const fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_config_default_values() {
        let config = Config::default();

        assert!(config.problem_source.starts_with("https://docs.google.com/"));
        assert_eq!(config.model, "gemini-1.5-flash-latest");
        assert_eq!(config.api_base_url, "https://generativelanguage.googleapis.com");
        assert_eq!(config.hint_timeout_secs, 30);
        assert_eq!(config.source_timeout_secs, 30);
        assert_eq!(config.credential_env, "GEMINI_API_KEY");
    }

    #[test]
    fn test_config_deserialization_with_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.hint_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_config_deserialization_with_overrides() {
        let json = r#"{
            "problemSource": "problems.csv",
            "model": "gemini-2.0-flash",
            "hintTimeoutSecs": 10,
            "credentialEnv": "COACH_KEY"
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.problem_source, "problems.csv");
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.hint_timeout_secs, 10);
        assert_eq!(config.credential_env, "COACH_KEY");
        assert_eq!(config.source_timeout_secs, 30);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let json = r#"{"model": "m", "theme": "dark", "volume": 11}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.model, "m");
    }

    #[test]
    fn test_load_from_file_valid_json() {
        use std::io::Write;

        let config_path = std::env::temp_dir().join("test_mathcoach_valid.json");
        let mut file = std::fs::File::create(&config_path).unwrap();
        file.write_all(br#"{"problemSource": "bank.csv", "hintTimeoutSecs": 5}"#)
            .unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.problem_source, "bank.csv");
        assert_eq!(config.hint_timeout_secs, 5);
        assert_eq!(config.model, DEFAULT_MODEL);

        std::fs::remove_file(&config_path).ok();
    }

    #[test]
    fn test_load_from_file_invalid_json() {
        use std::io::Write;

        let config_path = std::env::temp_dir().join("test_mathcoach_invalid.json");
        let mut file = std::fs::File::create(&config_path).unwrap();
        file.write_all(b"{ not valid json }").unwrap();

        let err = Config::load_from_file(&config_path).unwrap_err();
        assert!(
            matches!(&err, CoachError::ConfigParseError { path, message } if *path == config_path && !message.is_empty()),
            "Expected ConfigParseError with correct path, got: {err:?}"
        );

        std::fs::remove_file(&config_path).ok();
    }

    #[test]
    fn test_load_from_file_nonexistent_returns_default() {
        let config = Config::load_from_file(&PathBuf::from("/nonexistent/mathcoach.json")).unwrap();
        assert_eq!(config.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_load_from_dir_finds_config() {
        use std::io::Write;

        let temp_dir = std::env::temp_dir().join("test_mathcoach_dir");
        std::fs::create_dir_all(&temp_dir).unwrap();
        let config_path = temp_dir.join("mathcoach.json");
        let mut file = std::fs::File::create(&config_path).unwrap();
        file.write_all(br#"{"model": "dir-model"}"#).unwrap();

        let config = Config::load_from_dir(&temp_dir).unwrap();
        assert_eq!(config.model, "dir-model");

        std::fs::remove_file(&config_path).ok();
        std::fs::remove_dir(&temp_dir).ok();
    }

    #[test]
    fn test_config_validation_blank_fields() {
        let cases = [
            (
                Config {
                    problem_source: "  ".to_string(),
                    ..Default::default()
                },
                "problemSource",
            ),
            (
                Config {
                    model: String::new(),
                    ..Default::default()
                },
                "model",
            ),
            (
                Config {
                    api_base_url: String::new(),
                    ..Default::default()
                },
                "apiBaseUrl",
            ),
            (
                Config {
                    credential_env: " ".to_string(),
                    ..Default::default()
                },
                "credentialEnv",
            ),
        ];

        for (config, field) in cases {
            let err = config.validate().unwrap_err();
            assert!(
                matches!(&err, CoachError::ConfigValidationError { message, .. } if message.contains(field)),
                "Expected ConfigValidationError about {field}, got: {err:?}"
            );
        }
    }

    #[test]
    fn test_config_validation_zero_timeouts() {
        let config = Config {
            hint_timeout_secs: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(&err, CoachError::ConfigValidationError { message, suggestion }
            if message.contains("hintTimeoutSecs") && suggestion.contains("hintTimeoutSecs")));

        let config = Config {
            source_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file_validates_after_parsing() {
        use std::io::Write;

        let config_path = std::env::temp_dir().join("test_mathcoach_validation.json");
        let mut file = std::fs::File::create(&config_path).unwrap();
        file.write_all(br#"{"hintTimeoutSecs": 0}"#).unwrap();

        let err = Config::load_from_file(&config_path).unwrap_err();
        assert!(
            matches!(&err, CoachError::ConfigValidationError { .. }),
            "Expected ConfigValidationError, got: {err:?}"
        );

        std::fs::remove_file(&config_path).ok();
    }
}
