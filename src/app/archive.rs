//! Moving fully consumed inputs into the move folder

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::ReplayResult;
use crate::planner::{OutputVideo, RunLedger};

/// Release `output`'s inputs and move those no later output still needs.
/// Returns the new locations.
pub async fn archive_inputs(output: &OutputVideo, ledger: &mut RunLedger, folder: &Path) -> ReplayResult<Vec<PathBuf>> {
    let mut moved = Vec::new();
    for input in &output.inputs {
        if !ledger.release_input(&input.path) {
            debug!("{} is still used by a later output", input.path.display());
            continue;
        }
        if tokio::fs::metadata(&input.path).await.is_err() {
            continue;
        }
        let Some(name) = input.path.file_name() else {
            continue;
        };

        tokio::fs::create_dir_all(folder).await?;
        let destination = folder.join(name);
        move_file(&input.path, &destination).await?;
        info!("Moved {} to {}", input.path.display(), destination.display());
        moved.push(destination);
    }
    Ok(moved)
}

/// Rename, falling back to copy and delete across filesystems
pub async fn move_file(from: &Path, to: &Path) -> ReplayResult<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to).await?;
    tokio::fs::remove_file(from).await?;
    Ok(())
}
