//! Structured error output for the `toolcheck` CLI.
//!
//! Provides machine-parseable error information with:
//! - Error codes for categorization
//! - Hints for self-correction
//! - Context for debugging (log paths, offending lines)

use crate::error::HarnessError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Machine-readable error codes.
///
/// These codes are stable and can be used for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // === Tool Errors (exit code 2) ===
    /// Tool exited non-zero
    ExecutionFailed,
    /// Failure markers in the captured log
    ErrorLog,
    /// Invocation timed out
    Timeout,
    /// Tool executable missing
    ToolNotFound,
    /// Tool version could not be determined
    ToolVersionUnknown,
    /// Embedded mode without an entry point
    NoEmbeddedTool,

    // === Assertion Errors (exit code 3) ===
    /// Workspace state mismatch
    AssertionFailed,

    // === Version Errors (exit code 4) ===
    /// Malformed version
    InvalidVersion,
    /// Malformed version range
    InvalidRange,

    // === Fixture Errors (exit code 5) ===
    /// Template placeholder unbound
    TemplateResolution,
    /// Unencodable character
    EncodingError,
    /// Expected output missing
    OutputNotFound,
    /// Fixture directory missing
    FixtureNotFound,
    /// Suite manifest malformed
    ManifestError,

    // === Config Errors (exit code 7) ===
    /// Configuration error
    ConfigError,

    // === I/O Errors (exit code 8) ===
    /// File I/O error
    IoError,
    /// JSON serialization error
    JsonError,
    /// YAML parsing error
    YamlError,

    // === Internal Errors (exit code 1) ===
    /// Unexpected internal error
    InternalError,
}

impl ErrorCode {
    /// Get the string representation for JSON output.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ExecutionFailed => "EXECUTION_FAILED",
            Self::ErrorLog => "ERROR_LOG",
            Self::Timeout => "TIMEOUT",
            Self::ToolNotFound => "TOOL_NOT_FOUND",
            Self::ToolVersionUnknown => "TOOL_VERSION_UNKNOWN",
            Self::NoEmbeddedTool => "NO_EMBEDDED_TOOL",
            Self::AssertionFailed => "ASSERTION_FAILED",
            Self::InvalidVersion => "INVALID_VERSION",
            Self::InvalidRange => "INVALID_RANGE",
            Self::TemplateResolution => "TEMPLATE_RESOLUTION",
            Self::EncodingError => "ENCODING_ERROR",
            Self::OutputNotFound => "OUTPUT_NOT_FOUND",
            Self::FixtureNotFound => "FIXTURE_NOT_FOUND",
            Self::ManifestError => "MANIFEST_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::YamlError => "YAML_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Get the exit code for this error category.
    ///
    /// - 1: Internal/unknown errors
    /// - 2: Tool errors
    /// - 3: Assertion errors
    /// - 4: Version errors
    /// - 5: Fixture errors
    /// - 7: Config errors
    /// - 8: I/O errors
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::ExecutionFailed
            | Self::ErrorLog
            | Self::Timeout
            | Self::ToolNotFound
            | Self::ToolVersionUnknown
            | Self::NoEmbeddedTool => 2,
            Self::AssertionFailed => 3,
            Self::InvalidVersion | Self::InvalidRange => 4,
            Self::TemplateResolution
            | Self::EncodingError
            | Self::OutputNotFound
            | Self::FixtureNotFound
            | Self::ManifestError => 5,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError | Self::YamlError => 8,
            Self::InternalError => 1,
        }
    }
}

/// Structured error for machine-parseable output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Machine-readable error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional hint for fixing the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Failure class (execution, assertion, timeout, setup)
    pub class: crate::error::FailureClass,
    /// Additional context data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl StructuredError {
    /// Create a new structured error from a `HarnessError`.
    #[must_use]
    pub fn from_error(err: &HarnessError) -> Self {
        let (code, context) = Self::extract_code_and_context(err);

        Self {
            code,
            message: err.to_string(),
            hint: err.suggestion().map(str::to_string),
            class: err.class(),
            context,
        }
    }

    /// Convert to JSON value for output.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "error": {
                "code": self.code.as_str(),
                "message": self.message,
                "hint": self.hint,
                "class": self.class.as_str(),
                "context": self.context,
            }
        })
    }

    /// Format for human-readable output.
    #[must_use]
    pub fn to_human(&self, color: bool) -> String {
        let mut output = String::new();

        if color {
            output.push_str("\x1b[31mError:\x1b[0m ");
        } else {
            output.push_str("Error: ");
        }

        output.push_str(&self.message);

        if let Some(hint) = &self.hint {
            output.push('\n');
            if color {
                output.push_str("\x1b[33mHint:\x1b[0m ");
            } else {
                output.push_str("Hint: ");
            }
            output.push_str(hint);
        }

        output
    }

    fn extract_code_and_context(err: &HarnessError) -> (ErrorCode, Option<Value>) {
        match err {
            HarnessError::VersionParse { input, .. } => {
                (ErrorCode::InvalidVersion, Some(json!({"input": input})))
            }
            HarnessError::InvalidRange { range, .. } => {
                (ErrorCode::InvalidRange, Some(json!({"range": range})))
            }
            HarnessError::Execution {
                exit_code,
                log_path,
                tail,
            } => (
                ErrorCode::ExecutionFailed,
                Some(json!({
                    "exit_code": exit_code,
                    "log_path": log_path.display().to_string(),
                    "log_tail": tail,
                })),
            ),
            HarnessError::ErrorLog { log_path, lines } => (
                ErrorCode::ErrorLog,
                Some(json!({
                    "log_path": log_path.display().to_string(),
                    "lines": lines,
                })),
            ),
            HarnessError::Timeout {
                timeout,
                log_path,
                tail,
            } => (
                ErrorCode::Timeout,
                Some(json!({
                    "timeout_ms": timeout.as_millis(),
                    "log_path": log_path.display().to_string(),
                    "log_tail": tail,
                })),
            ),
            HarnessError::ToolNotFound { path } => (
                ErrorCode::ToolNotFound,
                Some(json!({"path": path.display().to_string()})),
            ),
            HarnessError::ToolVersionUnknown { .. } => (ErrorCode::ToolVersionUnknown, None),
            HarnessError::NoEmbeddedTool => (ErrorCode::NoEmbeddedTool, None),
            HarnessError::Assertion {
                expectation,
                path,
                workspace,
            } => (
                ErrorCode::AssertionFailed,
                Some(json!({
                    "expectation": expectation,
                    "path": path.display().to_string(),
                    "workspace": workspace.display().to_string(),
                })),
            ),
            HarnessError::LinesMismatch {
                expectation,
                path,
                actual,
            } => (
                ErrorCode::AssertionFailed,
                Some(json!({
                    "expectation": expectation,
                    "path": path.display().to_string(),
                    "actual": actual,
                })),
            ),
            HarnessError::TemplateResolution {
                template,
                placeholder,
            } => (
                ErrorCode::TemplateResolution,
                Some(json!({
                    "template": template.display().to_string(),
                    "placeholder": placeholder,
                })),
            ),
            HarnessError::Encoding { encoding, .. } => {
                (ErrorCode::EncodingError, Some(json!({"encoding": encoding})))
            }
            HarnessError::OutputNotFound { path } => (
                ErrorCode::OutputNotFound,
                Some(json!({"path": path.display().to_string()})),
            ),
            HarnessError::FixtureNotFound { path } => (
                ErrorCode::FixtureNotFound,
                Some(json!({"path": path.display().to_string()})),
            ),
            HarnessError::Manifest { path, .. } => (
                ErrorCode::ManifestError,
                Some(json!({"path": path.display().to_string()})),
            ),
            HarnessError::Config(_) => (ErrorCode::ConfigError, None),
            HarnessError::Io(_) => (ErrorCode::IoError, None),
            HarnessError::Json(_) => (ErrorCode::JsonError, None),
            HarnessError::Yaml(_) => (ErrorCode::YamlError, None),
            HarnessError::WithContext { .. } | HarnessError::Other(_) => {
                (ErrorCode::InternalError, None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_error_code_as_str() {
        assert_eq!(ErrorCode::ExecutionFailed.as_str(), "EXECUTION_FAILED");
        assert_eq!(ErrorCode::TemplateResolution.as_str(), "TEMPLATE_RESOLUTION");
    }

    #[test]
    fn test_error_code_exit_codes() {
        assert_eq!(ErrorCode::ErrorLog.exit_code(), 2);
        assert_eq!(ErrorCode::AssertionFailed.exit_code(), 3);
        assert_eq!(ErrorCode::InvalidRange.exit_code(), 4);
        assert_eq!(ErrorCode::OutputNotFound.exit_code(), 5);
        assert_eq!(ErrorCode::ConfigError.exit_code(), 7);
        assert_eq!(ErrorCode::IoError.exit_code(), 8);
        assert_eq!(ErrorCode::InternalError.exit_code(), 1);
    }

    #[test]
    fn test_structured_error_to_json() {
        let err = HarnessError::ErrorLog {
            log_path: PathBuf::from("log.txt"),
            lines: vec!["[ERROR] boom".to_string()],
        };
        let structured = StructuredError::from_error(&err);
        let json = structured.to_json();

        assert_eq!(json["error"]["code"], "ERROR_LOG");
        assert_eq!(json["error"]["class"], "execution");
        assert_eq!(json["error"]["context"]["lines"][0], "[ERROR] boom");
    }

    #[test]
    fn test_to_human_output() {
        let err = HarnessError::InvalidRange {
            range: "[1.0".to_string(),
            reason: "missing closing bracket".to_string(),
        };
        let human = StructuredError::from_error(&err).to_human(false);
        assert!(human.starts_with("Error: Invalid version range '[1.0'"));
        assert!(human.contains("Hint: "));
        assert!(!human.contains("\x1b["));
    }
}
