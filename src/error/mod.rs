//! Error types and handling for `toolcheck`.
//!
//! # Design
//!
//! - Uses `thiserror` for derive-based error types
//! - Supports `anyhow` integration through the `Other` variant
//! - Classifies every error into a [`FailureClass`] so the scenario layer can
//!   tell "the tool is wrong" apart from "the setup is broken"
//! - Provides structured JSON output for the CLI

mod structured;

pub use structured::{ErrorCode, StructuredError};

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Number of trailing log lines attached to execution failures.
pub const LOG_TAIL_LINES: usize = 20;

/// Primary error type for harness operations.
#[derive(Error, Debug)]
pub enum HarnessError {
    // === Version Errors ===
    /// Version string could not be parsed.
    #[error("Invalid version '{input}': {reason}")]
    VersionParse { input: String, reason: String },

    /// Version range expression could not be parsed.
    #[error("Invalid version range '{range}': {reason}")]
    InvalidRange { range: String, reason: String },

    // === Execution Errors ===
    /// The tool exited with a non-zero status.
    #[error(
        "Tool exited with status {exit_code} (log: {})\n{}",
        .log_path.display(),
        .tail.join("\n")
    )]
    Execution {
        exit_code: i32,
        log_path: PathBuf,
        tail: Vec<String>,
    },

    /// The captured log contains failure markers.
    #[error(
        "Error in execution log {}:\n{}",
        .log_path.display(),
        .lines.join("\n")
    )]
    ErrorLog { log_path: PathBuf, lines: Vec<String> },

    /// The invocation exceeded its wall-clock bound and was terminated.
    #[error(
        "Tool invocation timed out after {:?} (log: {})\n{}",
        .timeout,
        .log_path.display(),
        .tail.join("\n")
    )]
    Timeout {
        timeout: Duration,
        log_path: PathBuf,
        tail: Vec<String>,
    },

    /// Tool executable could not be found or launched.
    #[error("Tool not found: {}", .path.display())]
    ToolNotFound { path: PathBuf },

    /// The configured tool version could not be determined.
    #[error("Could not determine tool version: {reason}")]
    ToolVersionUnknown { reason: String },

    /// Embedded mode was requested without an in-process entry point.
    #[error("Embedded mode requires an in-process tool entry point")]
    NoEmbeddedTool,

    // === Assertion Errors ===
    /// Expected workspace state was not observed.
    #[error("Assertion failed: {expectation}: {} (workspace: {})", .path.display(), .workspace.display())]
    Assertion {
        expectation: String,
        path: PathBuf,
        workspace: PathBuf,
    },

    /// A line listing did not match expectations.
    #[error("Assertion failed: {expectation} in {}: {actual:?}", .path.display())]
    LinesMismatch {
        expectation: String,
        path: PathBuf,
        actual: Vec<String>,
    },

    // === Setup Errors ===
    /// A template placeholder had no bound value.
    #[error("Unresolved placeholder '@{placeholder}@' in template {}", .template.display())]
    TemplateResolution {
        template: PathBuf,
        placeholder: String,
    },

    /// A character could not be represented in the requested encoding.
    #[error("Cannot encode {character:?} as {encoding}")]
    Encoding { encoding: String, character: char },

    /// A generated output file the scenario expected does not exist.
    #[error("Expected output not found: {}", .path.display())]
    OutputNotFound { path: PathBuf },

    /// Fixture directory missing.
    #[error("Fixture not found: {}", .path.display())]
    FixtureNotFound { path: PathBuf },

    /// Suite manifest is malformed.
    #[error("Invalid manifest {}: {reason}", .path.display())]
    Manifest { path: PathBuf, reason: String },

    // === Configuration Errors ===
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    // === I/O Errors ===
    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Error with additional context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Wrapped anyhow error. Scenario bodies use anyhow for their own checks
    /// (`anyhow::ensure!`), so these count as assertion failures; a body
    /// that means "broken setup" returns a typed error instead.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// How a failure reflects on the tool under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Non-zero exit or failure markers in the log.
    Execution,
    /// Workspace state did not match expectations.
    Assertion,
    /// The tool did not finish in time.
    Timeout,
    /// Broken fixture, configuration or filesystem; not a tool regression.
    Setup,
}

impl FailureClass {
    /// Whether this class means "the tool is wrong".
    #[must_use]
    pub const fn implicates_tool(self) -> bool {
        !matches!(self, Self::Setup)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Execution => "execution",
            Self::Assertion => "assertion",
            Self::Timeout => "timeout",
            Self::Setup => "setup",
        }
    }
}

impl HarnessError {
    /// Classify the error for scenario outcome reporting.
    #[must_use]
    pub const fn class(&self) -> FailureClass {
        match self {
            Self::Execution { .. } | Self::ErrorLog { .. } => FailureClass::Execution,
            Self::Assertion { .. } | Self::LinesMismatch { .. } | Self::Other(_) => {
                FailureClass::Assertion
            }
            Self::Timeout { .. } => FailureClass::Timeout,
            _ => FailureClass::Setup,
        }
    }

    /// Human-friendly suggestion for fixing this error.
    #[must_use]
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::ToolNotFound { .. } => Some("Pass --tool or set TOOLCHECK_TOOL_EXECUTABLE"),
            Self::ToolVersionUnknown { .. } => {
                Some("Pass --tool-version or set TOOLCHECK_TOOL_VERSION")
            }
            Self::NoEmbeddedTool => Some("Use --mode isolated from the CLI"),
            Self::InvalidRange { .. } => Some("Ranges look like [2.0,) or (,3.0-alpha-3)"),
            Self::TemplateResolution { .. } => Some("Bind the placeholder with -D name=value"),
            Self::Timeout { .. } => Some("Raise --timeout or timeout-secs"),
            _ => None,
        }
    }

    /// Attach context to any error.
    #[must_use]
    pub fn with_context(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Create an assertion failure.
    #[must_use]
    pub fn assertion(
        expectation: impl Into<String>,
        path: impl Into<PathBuf>,
        workspace: impl Into<PathBuf>,
    ) -> Self {
        Self::Assertion {
            expectation: expectation.into(),
            path: path.into(),
            workspace: workspace.into(),
        }
    }
}

/// Keep the last `n` lines of a captured log.
#[must_use]
pub fn log_tail(lines: &[String], n: usize) -> Vec<String> {
    let start = lines.len().saturating_sub(n);
    lines[start..].to_vec()
}

/// Result type using `HarnessError`.
pub type Result<T> = std::result::Result<T, HarnessError>;
