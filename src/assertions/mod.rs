//! Checks over the workspace after an invocation.
//!
//! Relative paths resolve against the workspace root. Assertion failures
//! carry the expectation, the path and the workspace; a missing generated
//! file in [`load_lines`] is an I/O failure instead, because the scenario
//! could not observe anything.

use crate::error::{HarnessError, Result};
use crate::invoker::ExecutionResult;
use crate::template::TextEncoding;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

static ANSI_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("ansi regex"));

/// Default failure markers for Maven-style logs.
pub const DEFAULT_FAILURE_MARKERS: &[&str] = &["[ERROR]", "BUILD FAILURE"];

/// Substrings that mark a log line as a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureMarkers(Vec<String>);

impl Default for FailureMarkers {
    fn default() -> Self {
        Self(DEFAULT_FAILURE_MARKERS.iter().map(|m| (*m).to_string()).collect())
    }
}

impl FailureMarkers {
    #[must_use]
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            markers
                .into_iter()
                .map(Into::into)
                .filter(|m: &String| !m.is_empty())
                .collect(),
        )
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Whether `line` (with color codes removed) contains any marker.
    #[must_use]
    pub fn matches(&self, line: &str) -> bool {
        let plain = strip_ansi(line);
        self.0.iter().any(|marker| plain.contains(marker.as_str()))
    }

    /// Every offending line, in log order.
    #[must_use]
    pub fn offending_lines(&self, lines: &[String]) -> Vec<String> {
        lines
            .iter()
            .filter(|line| self.matches(line))
            .cloned()
            .collect()
    }
}

/// Remove ANSI color sequences.
#[must_use]
pub fn strip_ansi(line: &str) -> std::borrow::Cow<'_, str> {
    ANSI_ESCAPE.replace_all(line, "")
}

/// Fail if the captured log contains failure markers.
///
/// # Errors
///
/// Returns `ErrorLog` listing every offending line.
pub fn verify_error_free_log(result: &ExecutionResult, markers: &FailureMarkers) -> Result<()> {
    let offending = markers.offending_lines(&result.lines);
    if offending.is_empty() {
        Ok(())
    } else {
        Err(HarnessError::ErrorLog {
            log_path: result.log_path.clone(),
            lines: offending,
        })
    }
}

/// Workspace-rooted checks.
#[derive(Debug, Clone)]
pub struct WorkspaceAssertions {
    root: PathBuf,
}

impl WorkspaceAssertions {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// # Errors
    ///
    /// Returns `Assertion` if nothing exists at `path`.
    pub fn assert_file_present(&self, path: impl AsRef<Path>) -> Result<()> {
        let full = self.resolve(path);
        if full.exists() {
            Ok(())
        } else {
            Err(HarnessError::assertion(
                "expected file to be present",
                full,
                &self.root,
            ))
        }
    }

    /// # Errors
    ///
    /// Returns `Assertion` if something exists at `path`.
    pub fn assert_file_not_present(&self, path: impl AsRef<Path>) -> Result<()> {
        let full = self.resolve(path);
        if full.exists() {
            Err(HarnessError::assertion(
                "expected file to be absent",
                full,
                &self.root,
            ))
        } else {
            Ok(())
        }
    }

    /// Read a generated text file as its non-empty lines.
    ///
    /// # Errors
    ///
    /// `OutputNotFound` when the file does not exist, other I/O errors as-is.
    pub fn load_lines(&self, path: impl AsRef<Path>, encoding: TextEncoding) -> Result<Vec<String>> {
        load_lines(&self.resolve(path), encoding)
    }
}

/// Read `path` as non-empty lines in file order.
///
/// # Errors
///
/// `OutputNotFound` when the file does not exist, other I/O errors as-is.
pub fn load_lines(path: &Path, encoding: TextEncoding) -> Result<Vec<String>> {
    let bytes = fs::read(path).map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            HarnessError::OutputNotFound {
                path: path.to_path_buf(),
            }
        } else {
            HarnessError::with_context(format!("reading {}", path.display()), err)
        }
    })?;
    Ok(encoding
        .decode(&bytes)
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect())
}

/// Whether any line equals `entry` or ends with `/entry` (path listings).
#[must_use]
pub fn lines_mention(lines: &[String], entry: &str) -> bool {
    lines.iter().any(|line| {
        let line = line.trim();
        line == entry
            || line.ends_with(&format!("/{entry}"))
            || line.ends_with(&format!("\\{entry}"))
    })
}

/// # Errors
///
/// Returns `LinesMismatch` carrying the whole listing.
pub fn assert_lines_contain(lines: &[String], entry: &str, source: &Path) -> Result<()> {
    if lines_mention(lines, entry) {
        Ok(())
    } else {
        Err(HarnessError::LinesMismatch {
            expectation: format!("expected '{entry}'"),
            path: source.to_path_buf(),
            actual: lines.to_vec(),
        })
    }
}

/// # Errors
///
/// Returns `LinesMismatch` carrying the whole listing.
pub fn assert_lines_exclude(lines: &[String], entry: &str, source: &Path) -> Result<()> {
    if lines_mention(lines, entry) {
        Err(HarnessError::LinesMismatch {
            expectation: format!("unexpected '{entry}'"),
            path: source.to_path_buf(),
            actual: lines.to_vec(),
        })
    } else {
        Ok(())
    }
}
