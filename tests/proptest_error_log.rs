//! Property-based tests for the error-free-log check.
//!
//! Uses proptest to verify that:
//! - the check fails exactly when some line carries a failure marker
//! - offending lines are reported verbatim and in log order
//! - color codes around or inside a marker do not hide it
//! - near-misses (`[error]`, `[WARNING]`, `BUILD SUCCESS`) never trip it

use proptest::prelude::*;
use std::path::PathBuf;
use std::time::Duration;
use toolcheck::HarnessError;
use toolcheck::assertions::{FailureMarkers, verify_error_free_log};
use toolcheck::invoker::ExecutionResult;

/// Text that can never spell a default marker on its own.
const PLAIN_TEXT: &str = "[a-z0-9 .:/-]{0,30}";

const DECOYS: &[&str] = &[
    "[error]",
    "[WARNING]",
    "ERROR",
    "BUILD SUCCESS",
    "[ERR OR]",
    "BUILD  FAILURE",
];

fn marker() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["[ERROR]", "BUILD FAILURE"])
}

/// A log line and whether it should be reported.
fn log_line() -> impl Strategy<Value = (String, bool)> {
    prop_oneof![
        3 => PLAIN_TEXT.prop_map(|text| (text, false)),
        2 => (PLAIN_TEXT, prop::sample::select(DECOYS.to_vec()), PLAIN_TEXT)
            .prop_map(|(before, decoy, after)| (format!("{before}{decoy}{after}"), false)),
        1 => (PLAIN_TEXT, marker(), PLAIN_TEXT)
            .prop_map(|(before, marker, after)| (format!("{before}{marker}{after}"), true)),
        1 => (marker(), PLAIN_TEXT)
            .prop_map(|(marker, after)| (format!("\x1b[1;31m{marker}\x1b[m {after}"), true)),
        1 => (marker(), 1usize..6).prop_map(|(marker, at)| {
            let at = at.min(marker.len() - 1);
            (format!("{}\x1b[0m{}", &marker[..at], &marker[at..]), true)
        }),
    ]
}

fn result_of(lines: Vec<String>) -> ExecutionResult {
    ExecutionResult {
        exit_code: 0,
        lines,
        duration: Duration::ZERO,
        log_path: PathBuf::from("log.txt"),
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 300,
        ..Default::default()
    })]

    /// Property: the check fails iff a marker line is present, and names exactly those lines
    #[test]
    fn fails_exactly_on_marker_lines(lines in prop::collection::vec(log_line(), 0..12)) {
        let expected: Vec<String> = lines
            .iter()
            .filter(|(_, flagged)| *flagged)
            .map(|(line, _)| line.clone())
            .collect();
        let result = result_of(lines.into_iter().map(|(line, _)| line).collect());

        match verify_error_free_log(&result, &FailureMarkers::default()) {
            Ok(()) => prop_assert!(expected.is_empty(), "missed {:?}", expected),
            Err(HarnessError::ErrorLog { lines, .. }) => prop_assert_eq!(lines, expected),
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }

    /// Property: checking the same log twice gives the same answer
    #[test]
    fn repeated_checks_agree(lines in prop::collection::vec(log_line(), 0..8)) {
        let result = result_of(lines.into_iter().map(|(line, _)| line).collect());
        let markers = FailureMarkers::default();
        let first = verify_error_free_log(&result, &markers).map_err(|e| e.to_string());
        let second = verify_error_free_log(&result, &markers).map_err(|e| e.to_string());
        prop_assert_eq!(first, second);
    }

    /// Property: custom markers replace the defaults
    #[test]
    fn custom_markers_replace_defaults(before in PLAIN_TEXT, after in PLAIN_TEXT) {
        let markers = FailureMarkers::new(["FATAL"]);
        let default_hit = result_of(vec![format!("{before}[ERROR]{after}")]);
        prop_assert!(verify_error_free_log(&default_hit, &markers).is_ok());

        let custom_hit = result_of(vec![format!("{before}FATAL{after}")]);
        prop_assert!(verify_error_free_log(&custom_hit, &markers).is_err());
    }
}
