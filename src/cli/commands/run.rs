//! Run command: execute a suite manifest and report the outcomes.

use crate::cli::RunArgs;
use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};
use crate::harness::Harness;
use crate::scenario::{ParallelismMode, RunnerPolicy, ScenarioRunner, SuiteManifest};
use crate::util::progress::{SuiteProgress, should_show_progress};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Build the runner policy. `--parallel N` opts in; the worker count
/// comes from the merged config.
fn policy_for(args: &RunArgs, config: &HarnessConfig) -> RunnerPolicy {
    let mode = if args.parallel.is_some_and(|n| n > 1) {
        ParallelismMode::Parallel
    } else {
        ParallelismMode::Serial
    };
    RunnerPolicy::default()
        .with_parallelism(mode, config.parallel_workers)
        .with_fail_fast(config.fail_fast)
        .with_tags(args.tags.clone(), args.exclude_tags.clone())
}

/// Execute the run command. Returns whether every scenario passed or was skipped.
///
/// # Errors
///
/// An invalid manifest, an unresolvable tool, or an unwritable report file.
/// Scenario failures are reported, not returned.
pub fn execute(args: &RunArgs, config: HarnessConfig, json: bool, quiet: bool) -> Result<bool> {
    let manifest = SuiteManifest::load(&args.manifest)?;
    let manifest_dir = args
        .manifest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let suite_name = manifest.name.clone().unwrap_or_else(|| args.manifest.display().to_string());
    let scenarios = manifest.into_scenarios(manifest_dir)?;

    let policy = policy_for(args, &config);
    let harness = Harness::from_config(config)?;
    info!(
        suite = %suite_name,
        scenarios = scenarios.len(),
        tool_version = %harness.tool_version(),
        mode = %harness.mode(),
        "Running suite"
    );
    debug!(policy = %policy.to_json(), "Runner policy");

    let runner = ScenarioRunner::new(&harness, policy);
    let progress = SuiteProgress::new(scenarios.len(), !json && !quiet && should_show_progress());
    let report = runner.run_with_progress(&scenarios, |result| progress.scenario_done(result));
    progress.finish();

    if let Some(path) = &args.report {
        let text = serde_json::to_string_pretty(&report.to_json())?;
        fs::write(path, text).map_err(|err| {
            HarnessError::with_context(format!("writing report {}", path.display()), err)
        })?;
        debug!(path = %path.display(), "Wrote JSON report");
    }

    if json {
        println!("{}", serde_json::to_string(&report.to_json())?);
    } else if !quiet || !report.success() {
        print!("{}", report.to_text());
    }

    Ok(report.success())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parallel_needs_explicit_opt_in() {
        let config = HarnessConfig {
            parallel_workers: 6,
            ..HarnessConfig::default()
        };
        let serial = policy_for(&RunArgs::default(), &config);
        assert_eq!(serial.parallelism_mode, ParallelismMode::Serial);

        let args = RunArgs {
            parallel: Some(6),
            tags: vec!["smoke".into()],
            ..RunArgs::default()
        };
        let parallel = policy_for(&args, &config);
        assert_eq!(parallel.parallelism_mode, ParallelismMode::Parallel);
        assert_eq!(parallel.max_parallel_workers, 6);
        assert_eq!(parallel.include_tags, vec!["smoke"]);

        let one = RunArgs {
            parallel: Some(1),
            ..RunArgs::default()
        };
        assert_eq!(policy_for(&one, &config).parallelism_mode, ParallelismMode::Serial);
    }
}
