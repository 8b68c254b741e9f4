//! Locating the tool executable and finding out which version it is.

use crate::error::{HarnessError, Result};
use crate::version::ToolVersion;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Executable looked up on `PATH` when none is configured.
pub const DEFAULT_TOOL: &str = "mvn";

static VERSION_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d+(?:\.\d+)+(?:-[A-Za-z0-9]+(?:[.\-][A-Za-z0-9]+)*)?)")
        .expect("version token regex")
});

/// Find an executable on `PATH`.
#[must_use]
pub fn which(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    let candidates: Vec<String> = if cfg!(windows) {
        vec![
            format!("{name}.cmd"),
            format!("{name}.exe"),
            format!("{name}.bat"),
            name.to_string(),
        ]
    } else {
        vec![name.to_string()]
    };
    std::env::split_paths(&path).find_map(|dir| {
        candidates
            .iter()
            .map(|candidate| dir.join(candidate))
            .find(|full| full.is_file())
    })
}

/// Resolve the executable from configuration or `PATH`.
///
/// # Errors
///
/// Returns `ToolNotFound` when the configured path does not exist or nothing
/// is found on `PATH`.
pub fn resolve_executable(configured: Option<&Path>) -> Result<PathBuf> {
    match configured {
        Some(path) if path.components().count() > 1 || path.is_absolute() => {
            if path.exists() {
                Ok(path.to_path_buf())
            } else {
                Err(HarnessError::ToolNotFound {
                    path: path.to_path_buf(),
                })
            }
        }
        Some(name) => {
            let name = name.to_string_lossy();
            which(&name).ok_or_else(|| HarnessError::ToolNotFound {
                path: PathBuf::from(name.as_ref()),
            })
        }
        None => which(DEFAULT_TOOL).ok_or_else(|| HarnessError::ToolNotFound {
            path: PathBuf::from(DEFAULT_TOOL),
        }),
    }
}

/// First version-shaped token in `--version` output.
///
/// `Apache Maven 3.9.6 (bc0240f3c744dd6b6ec2920b3cd08dcc295161ae)` yields
/// `3.9.6`.
#[must_use]
pub fn extract_version(output: &str) -> Option<String> {
    VERSION_TOKEN
        .captures(output)
        .map(|caps| caps[1].to_string())
}

/// Run `<executable> --version` and parse the reported version.
///
/// # Errors
///
/// Returns `ToolNotFound` if the probe cannot run and `ToolVersionUnknown`
/// if the output has no version in it.
pub fn probe_version(executable: &Path) -> Result<ToolVersion> {
    let output = Command::new(executable)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .map_err(|_| HarnessError::ToolNotFound {
            path: executable.to_path_buf(),
        })?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push('\n');
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    let raw = extract_version(&text).ok_or_else(|| HarnessError::ToolVersionUnknown {
        reason: format!(
            "no version in `{} --version` output: {}",
            executable.display(),
            text.lines().next().unwrap_or_default().trim()
        ),
    })?;
    debug!(executable = %executable.display(), version = %raw, "Probed tool version");
    ToolVersion::parse(&raw)
}
