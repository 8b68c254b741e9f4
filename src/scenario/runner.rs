//! Executes scenarios under a [`RunnerPolicy`].

use super::report::{ScenarioResult, SuiteReport};
use super::{Scenario, ScenarioContext, ScenarioOutcome};
use crate::harness::Harness;
use crate::workspace::Workspace;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Parallelism mode for scenario execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParallelismMode {
    /// Run scenarios one at a time (safest, default)
    #[default]
    Serial,
    /// Run scenarios in parallel with configurable worker count
    Parallel,
}

/// Execution policy for the scenario runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerPolicy {
    pub parallelism_mode: ParallelismMode,
    /// Number of parallel workers (only used in Parallel mode)
    pub max_parallel_workers: usize,
    /// Stop starting new scenarios after the first failure
    pub fail_fast: bool,
    /// Only run scenarios carrying one of these tags (empty = all)
    pub include_tags: Vec<String>,
    /// Never run scenarios carrying one of these tags
    pub exclude_tags: Vec<String>,
}

impl Default for RunnerPolicy {
    fn default() -> Self {
        Self {
            parallelism_mode: ParallelismMode::Serial,
            max_parallel_workers: std::thread::available_parallelism()
                .map(|p| p.get().min(8))
                .unwrap_or(4),
            fail_fast: false,
            include_tags: Vec::new(),
            exclude_tags: Vec::new(),
        }
    }
}

impl RunnerPolicy {
    /// Builder: set parallelism mode
    #[must_use]
    pub fn with_parallelism(mut self, mode: ParallelismMode, workers: usize) -> Self {
        self.parallelism_mode = mode;
        self.max_parallel_workers = workers.max(1);
        self
    }

    /// Builder: set fail fast
    #[must_use]
    pub const fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Builder: set tag filters
    #[must_use]
    pub fn with_tags(mut self, include: Vec<String>, exclude: Vec<String>) -> Self {
        self.include_tags = include;
        self.exclude_tags = exclude;
        self
    }

    /// Whether the tag filter selects `scenario`.
    #[must_use]
    pub fn selects(&self, scenario: &Scenario) -> bool {
        let has = |tag: &String| scenario.tags.iter().any(|t| t == tag);
        if self.exclude_tags.iter().any(has) {
            return false;
        }
        self.include_tags.is_empty() || self.include_tags.iter().any(has)
    }

    /// Convert to JSON for logging in summary
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "parallelism_mode": self.parallelism_mode,
            "max_parallel_workers": self.max_parallel_workers,
            "fail_fast": self.fail_fast,
            "include_tags": self.include_tags,
            "exclude_tags": self.exclude_tags,
        })
    }
}

/// How a parallel run would schedule a suite, by scenario name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionPlan {
    /// Run one at a time, in declaration order, before the pool starts.
    pub exclusive: Vec<String>,
    /// Handed to the worker pool.
    pub concurrent: Vec<String>,
}

impl ExecutionPlan {
    /// Plan `scenarios` for a parallel run.
    ///
    /// A scenario runs exclusively when it is flagged `serial` or shares a
    /// cache group with another scenario that would otherwise be pooled.
    #[must_use]
    pub fn for_parallel(scenarios: &[Scenario]) -> Self {
        let (exclusive, concurrent) = split_exclusive(scenarios.iter().enumerate().collect());
        let names = |lane: Lane<'_>| -> Vec<String> {
            lane.into_iter().map(|(_, s)| s.name.clone()).collect()
        };
        Self {
            exclusive: names(exclusive),
            concurrent: names(concurrent),
        }
    }
}

type Lane<'s> = Vec<(usize, &'s Scenario)>;

fn split_exclusive(selected: Lane<'_>) -> (Lane<'_>, Lane<'_>) {
    let conflicted: Vec<bool> = selected
        .iter()
        .map(|(idx, scenario)| {
            !scenario.serial
                && selected.iter().any(|(other_idx, other)| {
                    other_idx != idx && !other.serial && scenario.shares_cache_with(other)
                })
        })
        .collect();

    let mut exclusive = Vec::new();
    let mut concurrent = Vec::new();
    for ((idx, scenario), conflict) in selected.into_iter().zip(conflicted) {
        if conflict {
            debug!(
                scenario = %scenario.name,
                groups = ?scenario.shared_groups,
                "Shares cache groups with another scenario; running it alone"
            );
        }
        if scenario.serial || conflict {
            exclusive.push((idx, scenario));
        } else {
            concurrent.push((idx, scenario));
        }
    }
    (exclusive, concurrent)
}

pub struct ScenarioRunner<'h> {
    harness: &'h Harness,
    policy: RunnerPolicy,
}

impl<'h> ScenarioRunner<'h> {
    #[must_use]
    pub const fn new(harness: &'h Harness, policy: RunnerPolicy) -> Self {
        Self { harness, policy }
    }

    #[must_use]
    pub const fn policy(&self) -> &RunnerPolicy {
        &self.policy
    }

    /// Whether scenarios will actually run concurrently.
    #[must_use]
    pub fn runs_parallel(&self) -> bool {
        self.policy.parallelism_mode == ParallelismMode::Parallel
            && self.policy.max_parallel_workers > 1
            && self.harness.mode().allows_concurrent_invocation()
    }

    /// Run every selected scenario. Results keep declaration order.
    pub fn run(&self, scenarios: &[Scenario]) -> SuiteReport {
        self.run_with_progress(scenarios, |_| {})
    }

    /// Like [`Self::run`], calling `on_done` as each scenario finishes.
    pub fn run_with_progress<F>(&self, scenarios: &[Scenario], on_done: F) -> SuiteReport
    where
        F: Fn(&ScenarioResult) + Sync,
    {
        let started = Instant::now();
        let selected: Vec<(usize, &Scenario)> = scenarios
            .iter()
            .filter(|s| self.policy.selects(s))
            .enumerate()
            .collect();

        if self.policy.parallelism_mode == ParallelismMode::Parallel
            && !self.harness.mode().allows_concurrent_invocation()
        {
            warn!(
                mode = %self.harness.mode(),
                "Execution mode forbids concurrent invocations; running scenarios serially"
            );
        }

        let stop = AtomicBool::new(false);
        let mut indexed: Vec<(usize, ScenarioResult)> = Vec::with_capacity(selected.len());

        let (serial, parallel) = if self.runs_parallel() {
            split_exclusive(selected)
        } else {
            (selected, Vec::new())
        };

        for (idx, scenario) in serial {
            let result = self.run_guarded(scenario, &stop);
            on_done(&result);
            indexed.push((idx, result));
        }

        if !parallel.is_empty() {
            let run_all = || {
                parallel
                    .par_iter()
                    .map(|(idx, scenario)| {
                        let result = self.run_guarded(scenario, &stop);
                        on_done(&result);
                        (*idx, result)
                    })
                    .collect::<Vec<_>>()
            };
            let results = match rayon::ThreadPoolBuilder::new()
                .num_threads(self.policy.max_parallel_workers)
                .build()
            {
                Ok(pool) => pool.install(run_all),
                Err(err) => {
                    warn!(error = %err, "Could not build worker pool; using the global one");
                    run_all()
                }
            };
            indexed.extend(results);
        }

        indexed.sort_by_key(|(idx, _)| *idx);
        let report = SuiteReport::new(
            indexed.into_iter().map(|(_, r)| r).collect(),
            self.harness.tool_version().to_string(),
            self.harness.mode(),
            started.elapsed(),
        );
        info!(
            passed = report.passed,
            failed = report.failed,
            skipped = report.skipped,
            aborted = report.aborted,
            not_run = report.not_run,
            "Suite finished"
        );
        report
    }

    fn run_guarded(&self, scenario: &Scenario, stop: &AtomicBool) -> ScenarioResult {
        if stop.load(Ordering::SeqCst) {
            return ScenarioResult::new(
                scenario,
                ScenarioOutcome::NotRun {
                    reason: "an earlier scenario failed (fail-fast)".to_string(),
                },
                Duration::ZERO,
                None,
            );
        }
        let result = self.run_one(scenario);
        if self.policy.fail_fast && result.outcome.is_unsuccessful() {
            stop.store(true, Ordering::SeqCst);
        }
        result
    }

    /// Run a single scenario: gate, prepare the workspace, run the body.
    #[must_use]
    pub fn run_one(&self, scenario: &Scenario) -> ScenarioResult {
        let started = Instant::now();

        if let Some(reason) = &scenario.disabled {
            info!(scenario = %scenario.name, %reason, "Scenario disabled");
            return ScenarioResult::new(
                scenario,
                ScenarioOutcome::Skipped {
                    reason: format!("disabled: {reason}"),
                },
                started.elapsed(),
                None,
            );
        }

        let version = self.harness.tool_version();
        if !scenario.version_range.contains(version) {
            info!(
                scenario = %scenario.name,
                %version,
                range = %scenario.version_range,
                "Scenario does not apply to this tool version"
            );
            return ScenarioResult::new(
                scenario,
                ScenarioOutcome::Skipped {
                    reason: format!(
                        "tool version {version} not in {}",
                        scenario.version_range
                    ),
                },
                started.elapsed(),
                None,
            );
        }

        let work_dir = &self.harness.config().work_dir;
        let workspace = match &scenario.fixture {
            Some(fixture) => Workspace::from_fixture(fixture, work_dir, &scenario.name),
            None => Workspace::empty(work_dir, &scenario.name),
        };
        let workspace = match workspace {
            Ok(ws) => ws,
            Err(err) => {
                warn!(scenario = %scenario.name, error = %err, "Workspace setup failed");
                return ScenarioResult::new(
                    scenario,
                    ScenarioOutcome::from_error(&err),
                    started.elapsed(),
                    None,
                );
            }
        };

        info!(scenario = %scenario.name, workspace = %workspace.root().display(), "Running scenario");
        let log_path = workspace.path(&self.harness.config().log_file);
        let mut ctx = ScenarioContext::new(self.harness, workspace, scenario.name.clone());

        let outcome = match catch_unwind(AssertUnwindSafe(|| scenario.run_body(&mut ctx))) {
            Ok(Ok(())) => ScenarioOutcome::Passed,
            Ok(Err(err)) => {
                warn!(scenario = %scenario.name, error = %err, "Scenario did not pass");
                ScenarioOutcome::from_error(&err)
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "scenario body panicked".to_string());
                ScenarioOutcome::Aborted {
                    message: format!("panic: {message}"),
                }
            }
        };

        ScenarioResult::new(
            scenario,
            outcome,
            started.elapsed(),
            log_path.exists().then_some(log_path),
        )
    }
}
