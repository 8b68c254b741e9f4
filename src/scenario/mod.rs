//! Scenarios: a fixture, a version range and a body that drives a
//! [`Verifier`] and asserts on the result.

pub mod manifest;
pub mod report;
pub mod runner;

pub use manifest::SuiteManifest;
pub use report::{ScenarioResult, SuiteReport};
pub use runner::{ExecutionPlan, ParallelismMode, RunnerPolicy, ScenarioRunner};

use crate::error::{FailureClass, HarnessError, Result};
use crate::harness::Harness;
use crate::verifier::Verifier;
use crate::version::VersionRange;
use crate::workspace::{Workspace, copy_tree};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Body of a scenario.
pub type ScenarioBody = Arc<dyn Fn(&mut ScenarioContext<'_>) -> Result<()> + Send + Sync>;

/// One regression check.
#[derive(Clone)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub version_range: VersionRange,
    /// Reason the scenario is switched off, if it is.
    pub disabled: Option<String>,
    /// Directory copied into the workspace before the body runs.
    pub fixture: Option<PathBuf>,
    /// Never run alongside other scenarios, even when the runner is parallel.
    pub serial: bool,
    /// Cache groups the scenario cleans, installs into or resolves from.
    /// Two parallel scenarios with overlapping groups never run at once.
    pub shared_groups: Vec<String>,
    body: ScenarioBody,
}

impl Scenario {
    /// Scenario applying to every tool version.
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut ScenarioContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: None,
            tags: Vec::new(),
            version_range: VersionRange::all(),
            disabled: None,
            fixture: None,
            serial: false,
            shared_groups: Vec::new(),
            body: Arc::new(body),
        }
    }

    /// Gate on a version range expression.
    ///
    /// # Errors
    ///
    /// `InvalidRange` for malformed expressions.
    pub fn with_range(mut self, range: &str) -> Result<Self> {
        self.version_range = VersionRange::parse(range)?;
        Ok(self)
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_fixture(mut self, fixture: impl Into<PathBuf>) -> Self {
        self.fixture = Some(fixture.into());
        self
    }

    #[must_use]
    pub fn disabled(mut self, reason: impl Into<String>) -> Self {
        self.disabled = Some(reason.into());
        self
    }

    #[must_use]
    pub const fn serial(mut self, serial: bool) -> Self {
        self.serial = serial;
        self
    }

    #[must_use]
    pub fn sharing_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for group in groups {
            let group = group.into();
            if !self.shared_groups.contains(&group) {
                self.shared_groups.push(group);
            }
        }
        self
    }

    /// Whether this scenario and `other` touch a common cache group.
    ///
    /// `org.its` overlaps `org.its.mng4720`; `org.its` and `org.itsx` do not.
    #[must_use]
    pub fn shares_cache_with(&self, other: &Self) -> bool {
        self.shared_groups.iter().any(|a| {
            other
                .shared_groups
                .iter()
                .any(|b| group_contains(a, b) || group_contains(b, a))
        })
    }

    /// Run the body against a prepared context.
    ///
    /// # Errors
    ///
    /// Whatever the body returns.
    pub fn run_body(&self, ctx: &mut ScenarioContext<'_>) -> Result<()> {
        (self.body)(ctx)
    }
}

fn group_contains(outer: &str, inner: &str) -> bool {
    inner
        .strip_prefix(outer)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .field("version_range", &self.version_range.as_str())
            .field("disabled", &self.disabled)
            .field("fixture", &self.fixture)
            .field("serial", &self.serial)
            .field("shared_groups", &self.shared_groups)
            .finish_non_exhaustive()
    }
}

/// What the scenario body gets to work with.
pub struct ScenarioContext<'h> {
    harness: &'h Harness,
    workspace: Workspace,
    name: String,
}

impl<'h> ScenarioContext<'h> {
    #[must_use]
    pub fn new(harness: &'h Harness, workspace: Workspace, name: impl Into<String>) -> Self {
        Self {
            harness,
            workspace,
            name: name.into(),
        }
    }

    #[must_use]
    pub const fn harness(&self) -> &'h Harness {
        self.harness
    }

    #[must_use]
    pub const fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Verifier rooted at the workspace.
    #[must_use]
    pub fn verifier(&self) -> Verifier<'h> {
        self.harness.verifier(self.workspace.root())
    }

    /// Verifier rooted at a sub-directory of the workspace.
    ///
    /// # Errors
    ///
    /// `FixtureNotFound` if the directory does not exist.
    pub fn verifier_in(&self, rel: impl AsRef<Path>) -> Result<Verifier<'h>> {
        Ok(self.harness.verifier(self.workspace.subdir(rel)?))
    }

    /// Copy the current workspace into a sibling for an independent sub-case.
    ///
    /// # Errors
    ///
    /// I/O errors while copying.
    pub fn fork_workspace(&self, suffix: &str) -> Result<Workspace> {
        let root = self.workspace.root();
        let parent = root.parent().unwrap_or(root);
        let file_name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let fork = Workspace::empty(parent, &format!("{file_name}-{suffix}"))?;
        copy_tree(root, fork.root())?;
        Ok(fork)
    }

    /// Whether the installed tool falls in `range`.
    ///
    /// # Errors
    ///
    /// `InvalidRange` for malformed expressions.
    pub fn matches_version_range(&self, range: &str) -> Result<bool> {
        self.harness.matches_version_range(range)
    }
}

/// Final state of one scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScenarioOutcome {
    Passed,
    /// The tool misbehaved.
    Failed { class: FailureClass, message: String },
    /// Not applicable to this tool version, or switched off.
    Skipped { reason: String },
    /// Never started because fail-fast stopped the suite.
    NotRun { reason: String },
    /// Broken setup; says nothing about the tool.
    Aborted { message: String },
}

impl ScenarioOutcome {
    /// Map a body error onto an outcome.
    #[must_use]
    pub fn from_error(err: &HarnessError) -> Self {
        let class = err.class();
        if class.implicates_tool() {
            Self::Failed {
                class,
                message: err.to_string(),
            }
        } else {
            Self::Aborted {
                message: err.to_string(),
            }
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed { .. } => "failed",
            Self::Skipped { .. } => "skipped",
            Self::NotRun { .. } => "not_run",
            Self::Aborted { .. } => "aborted",
        }
    }

    /// Failed or aborted.
    #[must_use]
    pub const fn is_unsuccessful(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::Aborted { .. })
    }
}

impl fmt::Display for ScenarioOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => f.write_str("passed"),
            Self::Failed { class, message } => write!(f, "failed ({}): {message}", class.as_str()),
            Self::Skipped { reason } => write!(f, "skipped: {reason}"),
            Self::NotRun { reason } => write!(f, "not run: {reason}"),
            Self::Aborted { message } => write!(f, "aborted: {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn errors_map_to_outcomes() {
        let exec = HarnessError::Execution {
            exit_code: 1,
            log_path: PathBuf::from("log.txt"),
            tail: vec![],
        };
        assert!(matches!(
            ScenarioOutcome::from_error(&exec),
            ScenarioOutcome::Failed {
                class: FailureClass::Execution,
                ..
            }
        ));

        let timeout = HarnessError::Timeout {
            timeout: std::time::Duration::from_secs(1),
            log_path: PathBuf::from("log.txt"),
            tail: vec![],
        };
        assert!(matches!(
            ScenarioOutcome::from_error(&timeout),
            ScenarioOutcome::Failed {
                class: FailureClass::Timeout,
                ..
            }
        ));

        let template = HarnessError::TemplateResolution {
            template: PathBuf::from("settings-template.xml"),
            placeholder: "x".into(),
        };
        assert!(matches!(
            ScenarioOutcome::from_error(&template),
            ScenarioOutcome::Aborted { .. }
        ));
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(ScenarioOutcome::Skipped {
            reason: "tool 3.9.6 not in (,3.0-alpha-3)".into(),
        })
        .unwrap();
        assert_eq!(json["status"], "skipped");

        let json = serde_json::to_value(ScenarioOutcome::Failed {
            class: FailureClass::Assertion,
            message: "m".into(),
        })
        .unwrap();
        assert_eq!(json["class"], "assertion");

        let json = serde_json::to_value(ScenarioOutcome::NotRun {
            reason: "fail-fast".into(),
        })
        .unwrap();
        assert_eq!(json["status"], "not_run");
    }

    #[test]
    fn builder_sets_fields() {
        let scenario = Scenario::new("mng-0449", |_| Ok(()))
            .with_range("[2.0,)")
            .unwrap()
            .with_tags(["plugins"])
            .disabled("needs a newer fixture");
        assert_eq!(scenario.version_range.as_str(), "[2.0,)");
        assert_eq!(scenario.tags, vec!["plugins"]);
        assert!(scenario.disabled.is_some());
        assert!(Scenario::new("bad", |_| Ok(())).with_range("[2.0").is_err());
    }

    #[test]
    fn cache_group_overlap() {
        let group = Scenario::new("a", |_| Ok(())).sharing_groups(["org.its.mng4720"]);
        let parent = Scenario::new("b", |_| Ok(())).sharing_groups(["org.its"]);
        let sibling = Scenario::new("c", |_| Ok(())).sharing_groups(["org.its.mng0449"]);
        let lookalike = Scenario::new("d", |_| Ok(())).sharing_groups(["org.itsx"]);
        let none = Scenario::new("e", |_| Ok(()));

        assert!(group.shares_cache_with(&group));
        assert!(group.shares_cache_with(&parent));
        assert!(parent.shares_cache_with(&group));
        assert!(!group.shares_cache_with(&sibling));
        assert!(!parent.shares_cache_with(&lookalike));
        assert!(!group.shares_cache_with(&none));
    }
}
