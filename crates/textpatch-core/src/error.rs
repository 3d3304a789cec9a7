//! Error types and error code constants for textpatch.
//!
//! This module provides a unified error type (`PatchError`) that bridges
//! errors from the rule, config and file subsystems into a common format
//! suitable for JSON output.
//!
//! ## Error Code Mapping
//!
//! - `1`: Patterns not found (a required rule did not apply)
//! - `2`: Invalid arguments (bad CLI input, invalid rules, bad rule file)
//! - `3`: Target file not found
//! - `4`: Apply errors (failed to write, target changed mid-run)
//! - `10`: Internal errors (bugs, unexpected state)
//!
//! A rule that does not match is an outcome, not a `PatchError`; the CLI maps
//! it to [`OutputErrorCode::PatternNotFound`] after reporting the run.

use thiserror::Error;

use crate::config::ConfigError;
use crate::file::FileError;
use crate::rule::RuleError;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Error codes for JSON output and process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// One or more required rules did not apply.
    PatternNotFound = 1,
    /// Invalid arguments from caller (bad input, invalid rules).
    InvalidArguments = 2,
    /// Target file not found.
    FileNotFound = 3,
    /// Apply errors (failed to write changes, file changed mid-run).
    ApplyError = 4,
    /// Internal errors (bugs, unexpected state).
    InternalError = 10,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for CLI output.
#[derive(Debug, Error)]
pub enum PatchError {
    /// Invalid arguments from caller.
    #[error("invalid arguments: {message}")]
    InvalidArguments {
        message: String,
        details: Option<serde_json::Value>,
    },

    /// A rule violates a rule invariant (e.g. empty search pattern).
    #[error("invalid rule: {0}")]
    InvalidRule(#[from] RuleError),

    /// The rule file could not be loaded.
    #[error("rule file error: {message}")]
    Config { message: String },

    /// Target file not found.
    #[error("file not found: {path}")]
    FileNotFound { path: String },

    /// Failed to read or write the target.
    #[error("apply error: {message}")]
    ApplyError {
        message: String,
        file: Option<String>,
    },

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    InternalError { message: String },
}

// ============================================================================
// Error Code Mapping
// ============================================================================

impl From<&PatchError> for OutputErrorCode {
    fn from(err: &PatchError) -> Self {
        match err {
            PatchError::InvalidArguments { .. } => OutputErrorCode::InvalidArguments,
            PatchError::InvalidRule(_) => OutputErrorCode::InvalidArguments,
            PatchError::Config { .. } => OutputErrorCode::InvalidArguments,
            PatchError::FileNotFound { .. } => OutputErrorCode::FileNotFound,
            PatchError::ApplyError { .. } => OutputErrorCode::ApplyError,
            PatchError::InternalError { .. } => OutputErrorCode::InternalError,
        }
    }
}

// ============================================================================
// Bridges
// ============================================================================

impl From<ConfigError> for PatchError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Rule(rule_err) => PatchError::InvalidRule(rule_err),
            other => PatchError::Config {
                message: other.to_string(),
            },
        }
    }
}

impl From<FileError> for PatchError {
    fn from(err: FileError) -> Self {
        let file = err.path().display().to_string();
        match err {
            FileError::NotFound { .. } => PatchError::FileNotFound { path: file },
            other => PatchError::ApplyError {
                message: other.to_string(),
                file: Some(file),
            },
        }
    }
}

impl PatchError {
    /// Create an invalid arguments error with JSON details.
    pub fn invalid_args_with_details(
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        PatchError::InvalidArguments {
            message: message.into(),
            details: Some(details),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        PatchError::InternalError {
            message: message.into(),
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> OutputErrorCode {
        OutputErrorCode::from(self)
    }
}

// ============================================================================
// Tests
// ============================================================================
