//! Per-scenario driver: collects arguments, prepares the workspace, runs
//! the tool and checks what it left behind.

use crate::assertions::{self, FailureMarkers, WorkspaceAssertions};
use crate::cache::{ArtifactStoreCleaner, CleanupOutcome, Coordinate};
use crate::error::{HarnessError, Result};
use crate::harness::Harness;
use crate::invoker::{ExecutionResult, InvocationSpec, read_log_lines};
use crate::template::{self, FilterProperties, TemplateFilter, TextEncoding};
use crate::workspace;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// System property pointing the tool at the harness-managed cache.
const LOCAL_REPO_PROPERTY: &str = "maven.repo.local";

pub struct Verifier<'h> {
    harness: &'h Harness,
    base_dir: PathBuf,
    cli_args: Vec<String>,
    env: BTreeMap<String, String>,
    autoclean: bool,
    pass_local_repo: bool,
    log_file: String,
    timeout: Option<Duration>,
    markers: FailureMarkers,
    last_result: Option<ExecutionResult>,
}

impl<'h> Verifier<'h> {
    /// Settings start from the harness configuration.
    #[must_use]
    pub fn new(harness: &'h Harness, base_dir: impl Into<PathBuf>) -> Self {
        let config = harness.config();
        Self {
            harness,
            base_dir: base_dir.into(),
            cli_args: Vec::new(),
            env: BTreeMap::new(),
            autoclean: config.autoclean,
            pass_local_repo: true,
            log_file: config.log_file.clone(),
            timeout: config.timeout,
            markers: config.failure_markers.clone(),
            last_result: None,
        }
    }

    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[must_use]
    pub fn cli_arguments(&self) -> &[String] {
        &self.cli_args
    }

    pub fn add_cli_argument(&mut self, arg: impl Into<String>) -> &mut Self {
        self.cli_args.push(arg.into());
        self
    }

    pub fn add_cli_arguments<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cli_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Replace all arguments.
    pub fn set_cli_arguments<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cli_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn set_autoclean(&mut self, autoclean: bool) -> &mut Self {
        self.autoclean = autoclean;
        self
    }

    /// Whether `-Dmaven.repo.local=<cache>` is appended to every invocation.
    pub fn set_pass_local_repo(&mut self, pass: bool) -> &mut Self {
        self.pass_local_repo = pass;
        self
    }

    pub fn set_log_file_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.log_file = name.into();
        self
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.timeout = timeout;
        self
    }

    pub fn set_failure_markers(&mut self, markers: FailureMarkers) -> &mut Self {
        self.markers = markers;
        self
    }

    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.resolve(&self.log_file)
    }

    fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    fn assertions(&self) -> WorkspaceAssertions {
        WorkspaceAssertions::new(&self.base_dir)
    }

    // === Pre-steps ===

    /// Remove a directory relative to the base dir, if present.
    ///
    /// # Errors
    ///
    /// I/O errors other than "not found".
    pub fn delete_directory(&self, rel: impl AsRef<Path>) -> Result<()> {
        workspace::delete_directory(&self.resolve(rel))
    }

    fn cleaner(&self) -> ArtifactStoreCleaner<'h> {
        ArtifactStoreCleaner::new(
            self.harness.cache(),
            self.harness.mode().may_hold_cache_locks(),
        )
    }

    /// Remove every cached artifact of `group`.
    ///
    /// # Errors
    ///
    /// I/O errors; locked entries in isolated mode.
    pub fn delete_artifacts(&self, group: &str) -> Result<CleanupOutcome> {
        self.cleaner().delete_artifacts(group)
    }

    /// Remove one cached artifact version.
    ///
    /// # Errors
    ///
    /// Same as [`Self::delete_artifacts`].
    pub fn delete_artifact(&self, coord: &Coordinate) -> Result<CleanupOutcome> {
        self.cleaner().delete_artifact(coord)
    }

    /// `basedir`, `baseurl`, `localrepo`, `localrepourl` for this verifier.
    #[must_use]
    pub fn default_filter_properties(&self) -> FilterProperties {
        template::default_properties(&self.base_dir, &self.harness.config().local_repo)
    }

    /// Materialize a template; `overrides` win over the defaults.
    ///
    /// # Errors
    ///
    /// Unbound placeholders, encoding and I/O failures.
    pub fn filter_file(
        &self,
        source: impl AsRef<Path>,
        target: impl AsRef<Path>,
        encoding: TextEncoding,
        overrides: &FilterProperties,
    ) -> Result<PathBuf> {
        let mut props = self.default_filter_properties();
        props.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        TemplateFilter::new(&self.base_dir).filter_file(source, target, encoding, &props)
    }

    // === Execution ===

    fn invocation_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.cli_args.len() + 2);
        if self.autoclean {
            args.push(self.harness.config().clean_goal.clone());
        }
        args.extend(self.cli_args.iter().cloned());
        if self.pass_local_repo {
            args.push(format!(
                "-D{LOCAL_REPO_PROPERTY}={}",
                self.harness.config().local_repo.display()
            ));
        }
        args
    }

    /// Run the tool with the collected arguments.
    ///
    /// # Errors
    ///
    /// `Execution` on a non-zero exit (the result is still recorded),
    /// `Timeout`, launch and I/O failures.
    pub fn execute(&mut self) -> Result<()> {
        let mut spec = InvocationSpec::new(&self.base_dir)
            .args(self.invocation_args())
            .timeout(self.timeout)
            .log_path(&self.log_file);
        spec.env.clone_from(&self.env);
        debug!(args = ?spec.args, "Executing verifier");

        let result = self.harness.invoker().invoke(&spec)?;
        let outcome = if result.success() {
            Ok(())
        } else {
            warn!(exit_code = result.exit_code, log = %result.log_path.display(), "Tool failed");
            Err(HarnessError::Execution {
                exit_code: result.exit_code,
                log_path: result.log_path.clone(),
                tail: result.tail(),
            })
        };
        self.last_result = Some(result);
        outcome
    }

    #[must_use]
    pub const fn last_result(&self) -> Option<&ExecutionResult> {
        self.last_result.as_ref()
    }

    /// Forget arguments, environment and the last result.
    pub fn reset(&mut self) {
        self.cli_args.clear();
        self.env.clear();
        self.last_result = None;
    }

    // === Checks ===

    /// Scan the log of the last run for failure markers.
    ///
    /// Reads the log file when nothing has run through this verifier.
    ///
    /// # Errors
    ///
    /// `ErrorLog` listing offending lines, `OutputNotFound` without a log.
    pub fn verify_error_free_log(&self) -> Result<()> {
        if let Some(result) = &self.last_result {
            return assertions::verify_error_free_log(result, &self.markers);
        }
        let log_path = self.log_path();
        if !log_path.exists() {
            return Err(HarnessError::OutputNotFound { path: log_path });
        }
        let result = ExecutionResult {
            exit_code: 0,
            lines: read_log_lines(&log_path)?,
            duration: Duration::ZERO,
            log_path,
        };
        assertions::verify_error_free_log(&result, &self.markers)
    }

    /// # Errors
    ///
    /// `Assertion` when absent.
    pub fn assert_file_present(&self, path: impl AsRef<Path>) -> Result<()> {
        self.assertions().assert_file_present(path)
    }

    /// # Errors
    ///
    /// `Assertion` when present.
    pub fn assert_file_not_present(&self, path: impl AsRef<Path>) -> Result<()> {
        self.assertions().assert_file_not_present(path)
    }

    /// # Errors
    ///
    /// `OutputNotFound` when the file is missing.
    pub fn load_lines(&self, path: impl AsRef<Path>, encoding: TextEncoding) -> Result<Vec<String>> {
        self.assertions().load_lines(path, encoding)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarnessConfig;
    use crate::invoker::{EmbeddedTool, Launcher};
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    /// Writes `target/args.txt` and fails when asked to.
    struct RecordingTool;

    impl EmbeddedTool for RecordingTool {
        fn version(&self) -> String {
            "3.9.6".to_string()
        }

        fn run(
            &self,
            args: &[String],
            working_dir: &Path,
            env: &BTreeMap<String, String>,
            out: &mut dyn Write,
        ) -> i32 {
            let target = working_dir.join("target");
            let _ = fs::create_dir_all(&target);
            let _ = fs::write(target.join("args.txt"), args.join("\n"));
            if let Some(v) = env.get("GREETING") {
                let _ = writeln!(out, "[INFO] {v}");
            }
            if args.iter().any(|a| a == "broken") {
                let _ = writeln!(out, "[ERROR] broken goal");
                return 1;
            }
            if args.iter().any(|a| a == "noisy") {
                let _ = writeln!(out, "[ERROR] something odd");
            }
            let _ = writeln!(out, "[INFO] BUILD SUCCESS");
            0
        }
    }

    fn harness(local_repo: &Path) -> Harness {
        let config = HarnessConfig {
            local_repo: local_repo.to_path_buf(),
            ..HarnessConfig::default()
        };
        Harness::new(config, Launcher::embedded(RecordingTool)).unwrap()
    }

    #[test]
    fn autoclean_prepends_clean_goal() {
        let dir = TempDir::new().unwrap();
        let harness = harness(&dir.path().join("repo"));
        let mut verifier = harness.verifier(dir.path());
        verifier.set_autoclean(true).add_cli_argument("validate");
        verifier.execute().unwrap();

        let args = verifier.load_lines("target/args.txt", TextEncoding::Utf8).unwrap();
        assert_eq!(args[0], crate::config::DEFAULT_CLEAN_GOAL);
        assert_eq!(args[1], "validate");
        assert!(args[2].starts_with("-Dmaven.repo.local="));
    }

    #[test]
    fn nonzero_exit_is_execution_failure_with_result_kept() {
        let dir = TempDir::new().unwrap();
        let harness = harness(&dir.path().join("repo"));
        let mut verifier = harness.verifier(dir.path());
        verifier.set_pass_local_repo(false).add_cli_argument("broken");

        let err = verifier.execute().unwrap_err();
        match err {
            HarnessError::Execution { exit_code, tail, .. } => {
                assert_eq!(exit_code, 1);
                assert_eq!(tail, vec!["[ERROR] broken goal"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(verifier.last_result().map(|r| r.exit_code), Some(1));
    }

    #[test]
    fn zero_exit_can_still_have_error_lines() {
        let dir = TempDir::new().unwrap();
        let harness = harness(&dir.path().join("repo"));
        let mut verifier = harness.verifier(dir.path());
        verifier.add_cli_argument("noisy");
        verifier.execute().unwrap();
        assert!(verifier.verify_error_free_log().is_err());
    }

    #[test]
    fn verify_reads_log_from_disk_without_a_run() {
        let dir = TempDir::new().unwrap();
        let harness = harness(&dir.path().join("repo"));
        let verifier = harness.verifier(dir.path());
        assert!(matches!(
            verifier.verify_error_free_log(),
            Err(HarnessError::OutputNotFound { .. })
        ));
        fs::write(dir.path().join("log.txt"), "[INFO] ok\n").unwrap();
        verifier.verify_error_free_log().unwrap();
    }

    #[test]
    fn filter_file_uses_defaults_and_overrides() {
        let dir = TempDir::new().unwrap();
        let repo = dir.path().join("repo");
        let harness = harness(&repo);
        fs::write(
            dir.path().join("settings-template.xml"),
            "@localrepo@|@greeting@",
        )
        .unwrap();

        let verifier = harness.verifier(dir.path());
        let mut overrides = FilterProperties::new();
        overrides.insert("greeting".to_string(), "hi".to_string());
        let written = verifier
            .filter_file("settings-template.xml", "settings.xml", TextEncoding::Utf8, &overrides)
            .unwrap();

        assert_eq!(
            fs::read_to_string(written).unwrap(),
            format!("{}|hi", repo.display())
        );
    }

    #[test]
    fn env_and_reset() {
        let dir = TempDir::new().unwrap();
        let harness = harness(&dir.path().join("repo"));
        let mut verifier = harness.verifier(dir.path());
        verifier.set_env("GREETING", "hello").add_cli_argument("validate");
        verifier.execute().unwrap();
        assert_eq!(
            verifier.last_result().unwrap().lines[0],
            "[INFO] hello"
        );

        verifier.reset();
        assert!(verifier.cli_arguments().is_empty());
        assert!(verifier.last_result().is_none());
    }

    #[test]
    fn delete_artifacts_clears_group() {
        let dir = TempDir::new().unwrap();
        let repo = dir.path().join("repo");
        fs::create_dir_all(repo.join("org/its/mng4720/a/0.1")).unwrap();
        fs::write(repo.join("org/its/mng4720/a/0.1/a-0.1.jar"), "").unwrap();
        let harness = harness(&repo);

        let outcome = harness
            .verifier(dir.path())
            .delete_artifacts("org.its.mng4720")
            .unwrap();
        assert!(outcome.is_complete());
        assert!(!repo.join("org/its/mng4720").exists());
    }
}
