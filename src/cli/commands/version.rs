//! Version command: report the harness build, not the tool under test.

use crate::error::Result;
use crate::invoker::ExecutionMode;
use crate::invoker::discovery::DEFAULT_TOOL;
use serde::Serialize;

#[derive(Serialize)]
struct VersionOutput<'a> {
    version: &'a str,
    build: &'a str,
    default_tool: &'a str,
    modes: [ExecutionMode; 2],
}

/// Execute the version command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let output = VersionOutput {
        version: env!("CARGO_PKG_VERSION"),
        build: if cfg!(debug_assertions) { "dev" } else { "release" },
        default_tool: DEFAULT_TOOL,
        modes: [ExecutionMode::Isolated, ExecutionMode::Embedded],
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!(
            "toolcheck version {} ({}), default tool '{}'",
            output.version, output.build, output.default_tool
        );
    }
    Ok(())
}
