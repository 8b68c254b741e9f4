//! Progress display for suite runs.
//!
//! Shown only when stderr is an interactive terminal, so piped output and
//! CI logs stay clean.

use crate::scenario::ScenarioResult;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{IsTerminal, stderr};

/// Check if we should show progress indicators.
#[must_use]
pub fn should_show_progress() -> bool {
    stderr().is_terminal()
}

/// Determinate bar counting finished scenarios.
#[must_use]
pub fn create_progress_bar(total: u64, message: &str, show: bool) -> ProgressBar {
    let pb = ProgressBar::new(total);

    if show {
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("=>-"));
        }
        pb.set_message(message.to_string());
    } else {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }

    pb
}

/// Progress over a suite, one tick per finished scenario.
pub struct SuiteProgress {
    bar: ProgressBar,
    showing: bool,
}

impl SuiteProgress {
    #[must_use]
    pub fn new(total: usize, show: bool) -> Self {
        let total = u64::try_from(total).unwrap_or(u64::MAX);
        Self {
            bar: create_progress_bar(total, "running scenarios", show),
            showing: show,
        }
    }

    /// Record a finished scenario.
    pub fn scenario_done(&self, result: &ScenarioResult) {
        self.bar
            .set_message(format!("{} {}", result.outcome.label(), result.name));
        self.bar.inc(1);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    #[must_use]
    pub const fn is_showing(&self) -> bool {
        self.showing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{Scenario, ScenarioOutcome};
    use std::time::Duration;

    #[test]
    fn hidden_bar_counts_scenarios() {
        let progress = SuiteProgress::new(2, false);
        assert!(!progress.is_showing());
        let scenario = Scenario::new("a", |_| Ok(()));
        let result = ScenarioResult::new(&scenario, ScenarioOutcome::Passed, Duration::ZERO, None);
        progress.scenario_done(&result);
        progress.scenario_done(&result);
        assert_eq!(progress.bar.position(), 2);
        progress.finish();
    }
}
