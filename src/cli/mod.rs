//! CLI definitions and entry point.

use crate::config::CliOverrides;
use crate::invoker::ExecutionMode;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// Cross-version acceptance-test harness for build tools
#[derive(Parser, Debug)]
#[command(name = "toolcheck", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: .toolcheck/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Tool executable (default: mvn on PATH)
    #[arg(long, global = true)]
    pub tool: Option<PathBuf>,

    /// Execution mode (isolated or embedded)
    #[arg(long, global = true)]
    pub mode: Option<ExecutionMode>,

    /// Tool version (skips the --version probe)
    #[arg(long, global = true)]
    pub tool_version: Option<String>,

    /// Local artifact repository
    #[arg(long, global = true)]
    pub local_repo: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Append harness logs to this file as JSON lines
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    #[must_use]
    pub fn overrides(&self) -> CliOverrides {
        let mut overrides = CliOverrides {
            tool: self.tool.clone(),
            tool_version: self.tool_version.clone(),
            mode: self.mode,
            local_repo: self.local_repo.clone(),
            ..CliOverrides::default()
        };
        if let Commands::Run(args) = &self.command {
            overrides.timeout_secs = args.timeout;
            overrides.parallel_workers = args.parallel;
            overrides.fail_fast = args.fail_fast.then_some(true);
            overrides.work_dir.clone_from(&args.work_dir);
        }
        overrides
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a suite manifest
    Run(RunArgs),

    /// Check a version against a range expression
    Range(RangeArgs),

    /// Materialize a settings template
    Filter(FilterArgs),

    /// Remove cached artifacts
    Clean(CleanArgs),

    /// Show version information
    Version,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Suite manifest (YAML)
    pub manifest: PathBuf,

    /// Only run scenarios with this tag (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Skip scenarios with this tag (repeatable)
    #[arg(long = "exclude-tag")]
    pub exclude_tags: Vec<String>,

    /// Run up to N scenarios at once (isolated mode only)
    #[arg(long, value_name = "N")]
    pub parallel: Option<usize>,

    /// Stop after the first failed scenario
    #[arg(long)]
    pub fail_fast: bool,

    /// Per-invocation timeout in seconds (0 = none)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Directory scenario workspaces are created in
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Also write the JSON report to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RangeArgs {
    /// Range expression, e.g. "[2.0.6,)" or "(,3.0-alpha-3)"
    pub expr: String,

    /// Version to test (default: configured or probed tool version)
    #[arg(long)]
    pub version: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Template file with @name@ placeholders
    pub template: PathBuf,

    /// Output file
    pub output: PathBuf,

    /// Bind a placeholder (repeatable)
    #[arg(short = 'D', long = "define", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub defines: Vec<(String, String)>,

    /// Text encoding (UTF-8, ISO-8859-1, US-ASCII)
    #[arg(long, default_value = "UTF-8")]
    pub encoding: String,

    /// Value of @basedir@ (default: current directory)
    #[arg(long)]
    pub basedir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CleanArgs {
    /// Group id, e.g. org.apache.maven.its.mng4720
    pub group: String,

    /// Only this artifact
    #[arg(long, requires = "version")]
    pub artifact: Option<String>,

    /// Only this version of the artifact
    #[arg(long, requires = "artifact")]
    pub version: Option<String>,
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_run_flags_into_overrides() {
        let cli = Cli::parse_from([
            "toolcheck",
            "--tool-version",
            "3.9.6",
            "run",
            "suite.yaml",
            "--tag",
            "plugins",
            "--parallel",
            "4",
            "--fail-fast",
            "--timeout",
            "120",
        ]);
        let overrides = cli.overrides();
        assert_eq!(overrides.tool_version.as_deref(), Some("3.9.6"));
        assert_eq!(overrides.parallel_workers, Some(4));
        assert_eq!(overrides.fail_fast, Some(true));
        assert_eq!(overrides.timeout_secs, Some(120));
        match cli.command {
            Commands::Run(args) => assert_eq!(args.tags, vec!["plugins"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_defines() {
        let cli = Cli::parse_from([
            "toolcheck",
            "filter",
            "in.xml",
            "out.xml",
            "-D",
            "localrepo=/m2",
            "--define",
            "empty=",
        ]);
        match cli.command {
            Commands::Filter(args) => assert_eq!(
                args.defines,
                vec![
                    ("localrepo".to_string(), "/m2".to_string()),
                    ("empty".to_string(), String::new())
                ]
            ),
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn clean_artifact_needs_version() {
        assert!(Cli::try_parse_from(["toolcheck", "clean", "org.x", "--artifact", "a"]).is_err());
        assert!(
            Cli::try_parse_from(["toolcheck", "clean", "org.x", "--artifact", "a", "--version", "1"])
                .is_ok()
        );
    }
}
