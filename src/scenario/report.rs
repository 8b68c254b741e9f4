//! Suite results and their rendering.

use super::{Scenario, ScenarioOutcome};
use crate::invoker::ExecutionMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub range: String,
    pub outcome: ScenarioOutcome,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
}

impl ScenarioResult {
    #[must_use]
    pub fn new(
        scenario: &Scenario,
        outcome: ScenarioOutcome,
        duration: Duration,
        log_path: Option<PathBuf>,
    ) -> Self {
        Self {
            name: scenario.name.clone(),
            tags: scenario.tags.clone(),
            range: scenario.version_range.to_string(),
            outcome,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            log_path,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub tool_version: String,
    pub mode: ExecutionMode,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub aborted: usize,
    /// Scenarios fail-fast kept from starting.
    #[serde(default)]
    pub not_run: usize,
    pub results: Vec<ScenarioResult>,
}

impl SuiteReport {
    #[must_use]
    pub fn new(
        results: Vec<ScenarioResult>,
        tool_version: String,
        mode: ExecutionMode,
        elapsed: Duration,
    ) -> Self {
        let count = |label: &str| results.iter().filter(|r| r.outcome.label() == label).count();
        let started_at = chrono::Duration::from_std(elapsed)
            .ok()
            .and_then(|d| Utc::now().checked_sub_signed(d))
            .unwrap_or_else(Utc::now);
        Self {
            tool_version,
            mode,
            started_at,
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            passed: count("passed"),
            failed: count("failed"),
            skipped: count("skipped"),
            aborted: count("aborted"),
            not_run: count("not_run"),
            results,
        }
    }

    /// No scenario failed or aborted.
    #[must_use]
    pub fn success(&self) -> bool {
        self.failed == 0 && self.aborted == 0
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|err| {
            serde_json::json!({ "error": format!("report serialization failed: {err}") })
        })
    }

    /// Plain-text rendering for terminals.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Tool version {} ({} mode), started {}",
            self.tool_version,
            self.mode,
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        for result in &self.results {
            let _ = writeln!(
                out,
                "  {:<8} {} [{}] ({} ms)",
                result.outcome.label().to_uppercase(),
                result.name,
                result.range,
                result.duration_ms
            );
            match &result.outcome {
                ScenarioOutcome::Passed => {}
                ScenarioOutcome::Skipped { reason } | ScenarioOutcome::NotRun { reason } => {
                    let _ = writeln!(out, "           {reason}");
                }
                ScenarioOutcome::Failed { message, .. } | ScenarioOutcome::Aborted { message } => {
                    for line in message.lines() {
                        let _ = writeln!(out, "           {line}");
                    }
                    if let Some(log) = &result.log_path {
                        let _ = writeln!(out, "           log: {}", log.display());
                    }
                }
            }
        }
        let _ = writeln!(
            out,
            "{} passed, {} failed, {} skipped, {} aborted, {} not run in {} ms",
            self.passed, self.failed, self.skipped, self.aborted, self.not_run, self.duration_ms
        );
        out
    }
}
