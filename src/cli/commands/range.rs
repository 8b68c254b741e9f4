//! Range command: evaluate a version range against a tool version.

use crate::cli::RangeArgs;
use crate::config::HarnessConfig;
use crate::error::Result;
use crate::invoker::discovery;
use crate::version::{ToolVersion, VersionRange};
use serde_json::json;
use tracing::debug;

/// Version to test: `--version`, then `tool.version`, then a probe.
fn resolve_version(args: &RangeArgs, config: &HarnessConfig) -> Result<ToolVersion> {
    if let Some(version) = args.version.as_deref().or(config.tool_version.as_deref()) {
        return ToolVersion::parse(version);
    }
    let executable = discovery::resolve_executable(config.tool_executable.as_deref())?;
    debug!(executable = %executable.display(), "Probing tool version");
    discovery::probe_version(&executable)
}

/// Execute the range command. Returns whether the version matched.
///
/// # Errors
///
/// Malformed range or version, or a failed version probe.
pub fn execute(args: &RangeArgs, config: &HarnessConfig, json: bool) -> Result<bool> {
    let range = VersionRange::parse(&args.expr)?;
    let version = resolve_version(args, config)?;
    let matches = range.contains(&version);

    if json {
        let restrictions: Vec<String> = range.restrictions().iter().map(ToString::to_string).collect();
        let payload = json!({
            "range": range.as_str(),
            "version": version.as_str(),
            "canonical": version.canonical(),
            "restrictions": restrictions,
            "matches": matches,
        });
        println!("{}", serde_json::to_string(&payload)?);
    } else {
        println!(
            "{}: {version} {} {range}",
            if matches { "match" } else { "no match" },
            if matches { "is in" } else { "is not in" }
        );
    }
    Ok(matches)
}
