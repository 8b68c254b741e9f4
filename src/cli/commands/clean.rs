//! Clean command: remove cached artifacts from the local repository.

use crate::cache::{ArtifactStoreCleaner, CleanupOutcome, Coordinate, LocalArtifactCache};
use crate::cli::CleanArgs;
use crate::config::HarnessConfig;
use crate::error::Result;
use serde_json::json;

/// Execute the clean command.
///
/// Locks are not tolerated here: nothing in this process holds artifacts.
///
/// # Errors
///
/// I/O failures while deleting.
pub fn execute(args: &CleanArgs, config: &HarnessConfig, json: bool) -> Result<()> {
    let cache = LocalArtifactCache::new(config.local_repo.clone());
    let cleaner = ArtifactStoreCleaner::new(&cache, false);

    let (target, outcome) = match (&args.artifact, &args.version) {
        (Some(artifact), Some(version)) => {
            let coord = Coordinate::new(args.group.clone(), artifact.clone(), version.clone());
            (coord.to_string(), cleaner.delete_artifact(&coord)?)
        }
        _ => (args.group.clone(), cleaner.delete_artifacts(&args.group)?),
    };

    let removed = match &outcome {
        CleanupOutcome::Removed { entries } => *entries,
        CleanupOutcome::Skipped { removed, .. } => *removed,
    };

    if json {
        let payload = json!({
            "target": target,
            "local_repo": config.local_repo,
            "removed": removed,
            "complete": outcome.is_complete(),
        });
        println!("{}", serde_json::to_string(&payload)?);
    } else {
        println!(
            "Removed {removed} entr{} for {target} from {}",
            if removed == 1 { "y" } else { "ies" },
            config.local_repo.display()
        );
    }
    Ok(())
}
