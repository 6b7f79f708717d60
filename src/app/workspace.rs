//! Per-output working directories under the temp folder

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::ReplayResult;

/// `<temp_dir>/<output stem>`, recreated empty for every build attempt
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
}

impl Workspace {
    /// Delete whatever a previous run left behind and start empty
    pub async fn prepare(temp_dir: &Path, stem: &str) -> ReplayResult<Self> {
        let path = temp_dir.join(stem);
        if tokio::fs::metadata(&path).await.is_ok() {
            debug!("Clearing old working directory {}", path.display());
            tokio::fs::remove_dir_all(&path).await?;
        }
        tokio::fs::create_dir_all(&path).await?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory unless `keep` is set
    pub async fn finish(self, keep: bool) {
        if keep {
            debug!("Keeping working directory {}", self.path.display());
            return;
        }
        if let Err(e) = tokio::fs::remove_dir_all(&self.path).await {
            warn!("Could not remove working directory {}: {}", self.path.display(), e);
        }
    }
}

/// Working directories left in `temp_dir` by earlier runs
pub fn stale_workspaces(temp_dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(temp_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| entry.into_path())
        .collect()
}
