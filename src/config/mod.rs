//! Configuration management for `toolcheck`.
//!
//! Layers, lowest to highest precedence:
//! 1. Built-in defaults
//! 2. User config (`~/.config/toolcheck/config.yaml`)
//! 3. Project config (`.toolcheck/config.yaml`, or `--config <path>`)
//! 4. Environment (`TOOLCHECK_*`)
//! 5. CLI overrides
//!
//! YAML files are flattened to dotted keys, so `tool: { mode: embedded }`
//! and `tool.mode: embedded` are the same setting.

use crate::assertions::FailureMarkers;
use crate::error::{HarnessError, Result};
use crate::invoker::ExecutionMode;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory holding the project config file.
pub const PROJECT_CONFIG_DIR: &str = ".toolcheck";
const CONFIG_FILENAME: &str = "config.yaml";
const ENV_PREFIX: &str = "TOOLCHECK_";

/// Goal run before the main invocation when autoclean is on.
pub const DEFAULT_CLEAN_GOAL: &str = "org.apache.maven.plugins:maven-clean-plugin:clean";
pub const DEFAULT_LOG_FILE: &str = "log.txt";

pub mod keys {
    pub const TOOL_EXECUTABLE: &str = "tool.executable";
    pub const TOOL_VERSION: &str = "tool.version";
    pub const TOOL_MODE: &str = "tool.mode";
    pub const LOCAL_REPO: &str = "local-repo";
    pub const TIMEOUT_SECS: &str = "timeout-secs";
    pub const LOG_FILE: &str = "log-file";
    pub const AUTOCLEAN: &str = "autoclean";
    pub const CLEAN_GOAL: &str = "clean-goal";
    pub const FAILURE_MARKERS: &str = "failure-markers";
    pub const PARALLEL_WORKERS: &str = "parallel-workers";
    pub const FAIL_FAST: &str = "fail-fast";
    pub const WORK_DIR: &str = "work-dir";
}

/// A flat set of configuration values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigLayer {
    pub values: HashMap<String, String>,
}

impl ConfigLayer {
    /// Merge another layer on top of this one (higher precedence wins).
    pub fn merge_from(&mut self, other: &Self) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Merge multiple layers in precedence order (lowest to highest).
    #[must_use]
    pub fn merge_layers(layers: &[Self]) -> Self {
        let mut merged = Self::default();
        for layer in layers {
            merged.merge_from(layer);
        }
        merged
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(normalize_key(key), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(&normalize_key(key))
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Build a layer from a YAML file path. Missing files return empty config.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn from_yaml(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let value: serde_yaml::Value = serde_yaml::from_str(&contents)?;
        Ok(layer_from_yaml_value(&value))
    }

    /// Build a layer from `TOOLCHECK_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(env::vars())
    }

    fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut layer = Self::default();
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                for variant in env_key_variants(stripped) {
                    layer.set(&variant, value.clone());
                }
            }
        }
        layer
    }
}

/// CLI overrides for config loading (optional).
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub tool: Option<PathBuf>,
    pub tool_version: Option<String>,
    pub mode: Option<ExecutionMode>,
    pub local_repo: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub parallel_workers: Option<usize>,
    pub fail_fast: Option<bool>,
    pub work_dir: Option<PathBuf>,
}

impl CliOverrides {
    #[must_use]
    pub fn as_layer(&self) -> ConfigLayer {
        let mut layer = ConfigLayer::default();

        if let Some(tool) = &self.tool {
            layer.set(keys::TOOL_EXECUTABLE, tool.to_string_lossy());
        }
        if let Some(version) = &self.tool_version {
            layer.set(keys::TOOL_VERSION, version.clone());
        }
        if let Some(mode) = self.mode {
            layer.set(keys::TOOL_MODE, mode.as_str());
        }
        if let Some(repo) = &self.local_repo {
            layer.set(keys::LOCAL_REPO, repo.to_string_lossy());
        }
        if let Some(timeout) = self.timeout_secs {
            layer.set(keys::TIMEOUT_SECS, timeout.to_string());
        }
        if let Some(workers) = self.parallel_workers {
            layer.set(keys::PARALLEL_WORKERS, workers.to_string());
        }
        if let Some(fail_fast) = self.fail_fast {
            layer.set(keys::FAIL_FAST, fail_fast.to_string());
        }
        if let Some(dir) = &self.work_dir {
            layer.set(keys::WORK_DIR, dir.to_string_lossy());
        }

        layer
    }
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

/// Load project config from `explicit` or `<project_dir>/.toolcheck/config.yaml`.
///
/// # Errors
///
/// Returns an error if an explicit file is missing, or any file exists but
/// cannot be read or parsed.
pub fn load_project_config(project_dir: &Path, explicit: Option<&Path>) -> Result<ConfigLayer> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(HarnessError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        return ConfigLayer::from_yaml(path);
    }
    ConfigLayer::from_yaml(&project_dir.join(PROJECT_CONFIG_DIR).join(CONFIG_FILENAME))
}

/// Load user config (`~/.config/toolcheck/config.yaml`).
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<ConfigLayer> {
    let Some(home) = home_dir() else {
        return Ok(ConfigLayer::default());
    };
    ConfigLayer::from_yaml(
        &home
            .join(".config")
            .join("toolcheck")
            .join(CONFIG_FILENAME),
    )
}

/// Default config layer (lowest precedence).
#[must_use]
pub fn default_config_layer() -> ConfigLayer {
    let mut layer = ConfigLayer::default();
    layer.set(keys::TOOL_MODE, ExecutionMode::Isolated.as_str());
    layer.set(keys::LOG_FILE, DEFAULT_LOG_FILE);
    layer.set(keys::AUTOCLEAN, "false");
    layer.set(keys::CLEAN_GOAL, DEFAULT_CLEAN_GOAL);
    layer.set(keys::FAIL_FAST, "false");
    layer.set(keys::TIMEOUT_SECS, "0");
    if let Some(home) = home_dir() {
        layer.set(
            keys::LOCAL_REPO,
            home.join(".m2").join("repository").to_string_lossy(),
        );
    }
    layer.set(
        keys::WORK_DIR,
        env::temp_dir().join("toolcheck").to_string_lossy(),
    );
    layer
}

/// Load configuration with classic precedence order.
///
/// # Errors
///
/// Returns an error if any config file cannot be read or parsed.
pub fn load_config(
    project_dir: &Path,
    explicit: Option<&Path>,
    cli: &CliOverrides,
) -> Result<ConfigLayer> {
    Ok(ConfigLayer::merge_layers(&[
        default_config_layer(),
        load_user_config()?,
        load_project_config(project_dir, explicit)?,
        ConfigLayer::from_env(),
        cli.as_layer(),
    ]))
}

/// Typed view of a merged configuration.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub tool_executable: Option<PathBuf>,
    pub tool_version: Option<String>,
    pub mode: ExecutionMode,
    pub local_repo: PathBuf,
    /// `None` means unbounded.
    pub timeout: Option<Duration>,
    pub log_file: String,
    pub autoclean: bool,
    pub clean_goal: String,
    pub failure_markers: FailureMarkers,
    pub parallel_workers: usize,
    pub fail_fast: bool,
    pub work_dir: PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            tool_executable: None,
            tool_version: None,
            mode: ExecutionMode::Isolated,
            local_repo: home_dir()
                .map(|home| home.join(".m2").join("repository"))
                .unwrap_or_else(|| PathBuf::from(".m2/repository")),
            timeout: None,
            log_file: DEFAULT_LOG_FILE.to_string(),
            autoclean: false,
            clean_goal: DEFAULT_CLEAN_GOAL.to_string(),
            failure_markers: FailureMarkers::default(),
            parallel_workers: default_workers(),
            fail_fast: false,
            work_dir: env::temp_dir().join("toolcheck"),
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get().min(8))
        .unwrap_or(4)
}

impl HarnessConfig {
    /// Interpret a merged layer. Unset keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `Config` for values that do not parse.
    pub fn from_layer(layer: &ConfigLayer) -> Result<Self> {
        let mut config = Self::default();

        if let Some(exe) = layer.get(keys::TOOL_EXECUTABLE) {
            config.tool_executable = Some(PathBuf::from(exe.trim()));
        }
        if let Some(version) = layer.get(keys::TOOL_VERSION) {
            config.tool_version = Some(version.trim().to_string());
        }
        if let Some(mode) = layer.get(keys::TOOL_MODE) {
            config.mode = mode.parse()?;
        }
        if let Some(repo) = layer.get(keys::LOCAL_REPO) {
            config.local_repo = PathBuf::from(repo.trim());
        }
        if let Some(secs) = layer.get(keys::TIMEOUT_SECS) {
            let secs = parse_number::<u64>(keys::TIMEOUT_SECS, secs)?;
            config.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(file) = layer.get(keys::LOG_FILE) {
            config.log_file = file.trim().to_string();
        }
        if let Some(value) = layer.get(keys::AUTOCLEAN) {
            config.autoclean = require_bool(keys::AUTOCLEAN, value)?;
        }
        if let Some(goal) = layer.get(keys::CLEAN_GOAL) {
            config.clean_goal = goal.trim().to_string();
        }
        if let Some(markers) = layer.get(keys::FAILURE_MARKERS) {
            config.failure_markers = FailureMarkers::new(markers.split(',').map(str::trim));
        }
        if let Some(workers) = layer.get(keys::PARALLEL_WORKERS) {
            config.parallel_workers = parse_number::<usize>(keys::PARALLEL_WORKERS, workers)?.max(1);
        }
        if let Some(value) = layer.get(keys::FAIL_FAST) {
            config.fail_fast = require_bool(keys::FAIL_FAST, value)?;
        }
        if let Some(dir) = layer.get(keys::WORK_DIR) {
            config.work_dir = PathBuf::from(dir.trim());
        }

        Ok(config)
    }

    /// Load and interpret all layers.
    ///
    /// # Errors
    ///
    /// Returns an error if any layer cannot be read or a value is invalid.
    pub fn load(project_dir: &Path, explicit: Option<&Path>, cli: &CliOverrides) -> Result<Self> {
        Self::from_layer(&load_config(project_dir, explicit, cli)?)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| HarnessError::Config(format!("{key}: expected a number, got '{value}'")))
}

fn require_bool(key: &str, value: &str) -> Result<bool> {
    parse_bool(value)
        .ok_or_else(|| HarnessError::Config(format!("{key}: expected a boolean, got '{value}'")))
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase().replace('_', "-")
}

fn env_key_variants(raw: &str) -> Vec<String> {
    let raw_lower = raw.to_lowercase();
    vec![
        raw_lower.clone(),
        raw_lower.replace('_', "."),
        raw_lower.replacen('_', ".", 1),
    ]
}

/// Parse common boolean spellings.
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

fn layer_from_yaml_value(value: &serde_yaml::Value) -> ConfigLayer {
    let mut layer = ConfigLayer::default();
    let mut flat = HashMap::new();
    flatten_yaml(value, "", &mut flat);

    for (key, value) in flat {
        layer.set(&key, value);
    }

    layer
}

fn flatten_yaml(value: &serde_yaml::Value, prefix: &str, out: &mut HashMap<String, String>) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (key, value) in map {
                let Some(key_str) = key.as_str() else {
                    continue;
                };
                let next_prefix = if prefix.is_empty() {
                    key_str.to_string()
                } else {
                    format!("{prefix}.{key_str}")
                };
                flatten_yaml(value, &next_prefix, out);
            }
        }
        serde_yaml::Value::Sequence(values) => {
            let joined = values
                .iter()
                .filter_map(yaml_scalar_to_string)
                .collect::<Vec<_>>()
                .join(",");
            out.insert(prefix.to_string(), joined);
        }
        _ => {
            if let Some(value) = yaml_scalar_to_string(value) {
                out.insert(prefix.to_string(), value);
            }
        }
    }
}

fn yaml_scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::Bool(v) => Some(v.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Null
        | serde_yaml::Value::Sequence(_)
        | serde_yaml::Value::Mapping(_) => None,
        serde_yaml::Value::Tagged(tagged) => yaml_scalar_to_string(&tagged.value),
    }
}
