//! Error handling with context and recovery suggestions
//!
//! This module provides structured error types with:
//! - Detailed error context
//! - Recovery suggestions
//! - Error codes for programmatic handling
//! - Serializable error reports

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Error codes for programmatic error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // General errors (1xxx)
    Internal = 1001,

    // IO errors (2xxx)
    IoError = 2000,
    FileNotFound = 2001,
    PermissionDenied = 2002,

    // Configuration errors (3xxx)
    ConfigError = 3000,
    ConfigNotFound = 3001,
    ConfigParseError = 3002,
    InvalidConfigValue = 3004,

    // Process errors (4xxx)
    ProcessError = 4000,
    CommandNotFound = 4001,
    CommandFailed = 4002,
    ProcessTimeout = 4003,

    // Image errors (5xxx)
    ImageError = 5000,
    MissingAsset = 5001,
    DecodeFailure = 5002,
    MetadataError = 5003,

    // Container errors (6xxx)
    ContainerError = 6000,
}

impl ErrorCode {
    /// Get the numeric code
    #[must_use]
    pub fn code(&self) -> u32 {
        *self as u32
    }

    /// Get a human-readable category
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self.code() / 1000 {
            1 => "General",
            2 => "IO",
            3 => "Configuration",
            4 => "Process",
            5 => "Image",
            6 => "Container",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:04}", self.code())
    }
}

/// Main error type with rich context
#[derive(Error, Debug)]
pub struct Error {
    /// Error code for programmatic handling
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Additional context
    pub context: Option<String>,
    /// Recovery suggestion
    pub suggestion: Option<String>,
    /// Source error
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(ctx) = &self.context {
            write!(f, "\n  Context: {ctx}")?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n  Suggestion: {suggestion}")?;
        }
        Ok(())
    }
}

impl Error {
    /// Create a new error
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
            suggestion: None,
            source: None,
        }
    }

    /// Add context to the error
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Add a recovery suggestion
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add a source error
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Whether this error is a process that ran out of time
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.code == ErrorCode::ProcessTimeout
    }

    /// Convert to a serializable report
    #[must_use]
    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code,
            code_str: self.code.to_string(),
            category: self.code.category().to_string(),
            message: self.message.clone(),
            context: self.context.clone(),
            suggestion: self.suggestion.clone(),
            source: self.source.as_ref().map(ToString::to_string),
        }
    }

    /// Process exit status for this error
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self.code {
            ErrorCode::ProcessTimeout => exit_codes::TIMEOUT,
            ErrorCode::CommandNotFound => exit_codes::COMMAND_NOT_FOUND,
            code => match code.code() / 1000 {
                3 => exit_codes::CONFIG_ERROR,
                6 => exit_codes::CONTAINER_ERROR,
                _ => exit_codes::FAILURE,
            },
        }
    }

    // Convenience constructors

    /// Generic IO failure
    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::IoError, message)
    }

    /// A required file does not exist
    pub fn file_not_found(path: impl AsRef<Path>) -> Self {
        Self::new(
            ErrorCode::FileNotFound,
            format!("File not found: {}", path.as_ref().display()),
        )
        .with_suggestion("Check that the file exists and you have read permissions")
    }

    /// Configuration problem
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// Configuration value out of range
    pub fn invalid_config(key: &str, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InvalidConfigValue,
            format!("Invalid value for `{key}`: {}", message.into()),
        )
    }

    /// Configuration file is missing
    pub fn config_not_found(path: impl AsRef<Path>) -> Self {
        Self::new(
            ErrorCode::ConfigNotFound,
            format!("Configuration file not found: {}", path.as_ref().display()),
        )
        .with_suggestion("Create a .deckslim.toml file or use --config to specify a path")
    }

    /// Process could not be spawned or waited on
    pub fn process(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProcessError, message)
    }

    /// Program is not on PATH
    pub fn command_not_found(cmd: &str) -> Self {
        Self::new(ErrorCode::CommandNotFound, format!("Command not found: {cmd}"))
            .with_suggestion(format!("Install {cmd} and ensure it's in your PATH"))
    }

    /// Process exited with a non-zero status
    pub fn command_failed(cmd: &str, exit_code: i32, stderr: &str) -> Self {
        let mut err = Self::new(
            ErrorCode::CommandFailed,
            format!("{cmd} exited with status {exit_code}"),
        );
        let stderr = stderr.trim();
        if !stderr.is_empty() {
            err = err.with_context(stderr.to_string());
        }
        err
    }

    /// Process was killed after exceeding its time budget
    pub fn timeout(cmd: &str, limit: Duration) -> Self {
        Self::new(
            ErrorCode::ProcessTimeout,
            format!("{cmd} did not finish within {:.1}s", limit.as_secs_f64()),
        )
    }
}

/// Serializable error report for logging and JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Error code
    pub code: ErrorCode,
    /// Code rendered as `E####`
    pub code_str: String,
    /// Category of the code
    pub category: String,
    /// Human-readable message
    pub message: String,
    /// Additional context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Recovery suggestion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Rendered source error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Exit codes for CLI commands
pub mod exit_codes {
    /// Any other failure
    pub const FAILURE: i32 = 1;
    /// Invalid or missing configuration
    pub const CONFIG_ERROR: i32 = 3;
    /// Document could not be unpacked or packed
    pub const CONTAINER_ERROR: i32 = 4;
    /// External tool timed out
    pub const TIMEOUT: i32 = 124;
    /// External tool not installed
    pub const COMMAND_NOT_FOUND: i32 = 127;
}

// Implement From for common error types

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::FileNotFound,
            std::io::ErrorKind::PermissionDenied => ErrorCode::PermissionDenied,
            _ => ErrorCode::IoError,
        };
        Error::new(code, err.to_string()).with_source(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::new(ErrorCode::ConfigParseError, format!("TOML parse error: {err}")).with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::FileNotFound.to_string(), "E2001");
        assert_eq!(ErrorCode::ProcessTimeout.to_string(), "E4003");
    }

    #[test]
    fn test_error_code_category() {
        assert_eq!(ErrorCode::IoError.category(), "IO");
        assert_eq!(ErrorCode::CommandFailed.category(), "Process");
        assert_eq!(ErrorCode::DecodeFailure.category(), "Image");
        assert_eq!(ErrorCode::ContainerError.category(), "Container");
        assert_eq!(ErrorCode::Internal.category(), "General");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::timeout("cjpeg", std::time::Duration::from_secs(20)).exit_code(), exit_codes::TIMEOUT);
        assert_eq!(Error::command_not_found("keynote-parser").exit_code(), exit_codes::COMMAND_NOT_FOUND);
        assert_eq!(Error::invalid_config("jpeg_quality", "too high").exit_code(), exit_codes::CONFIG_ERROR);
        assert_eq!(Error::new(ErrorCode::ContainerError, "bad zip").exit_code(), exit_codes::CONTAINER_ERROR);
        assert_eq!(Error::io("disk full").exit_code(), exit_codes::FAILURE);
    }

    #[test]
    fn test_error_with_context() {
        let err = Error::file_not_found("/path/to/Data/image.tiff")
            .with_context("While building the asset registry");

        assert_eq!(err.code, ErrorCode::FileNotFound);
        assert!(err.context.is_some());
        assert!(err.suggestion.is_some());
    }

    #[test]
    fn test_timeout_detection() {
        let err = Error::timeout("cjpeg", Duration::from_secs(20));
        assert!(err.is_timeout());
        assert!(err.message.contains("20.0s"));
        assert!(!Error::command_failed("cjpeg", 1, "").is_timeout());
    }

    #[test]
    fn test_command_failed_keeps_stderr() {
        let err = Error::command_failed("pdfsizeopt", 2, "  error: no such file\n");
        assert_eq!(err.context.as_deref(), Some("error: no such file"));
    }

    #[test]
    fn test_error_report_serialization() {
        let err = Error::config("bad jpeg quality").with_context("while loading .deckslim.toml");

        let report = err.to_report();
        let json = serde_json::to_string(&report).unwrap();

        assert!(json.contains("E3000"));
        assert!(json.contains("Configuration"));
    }
}
