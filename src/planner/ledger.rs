//! Run-wide bookkeeping shared by the assembler and the archiver

use std::path::{Path, PathBuf};

/// Lists that live for a whole run. Owned by the orchestrator and lent to
/// the stages that read or extend them.
#[derive(Debug, Default, Clone)]
pub struct RunLedger {
    search_paths_seen: Vec<PathBuf>,
    referenced_inputs: Vec<PathBuf>,
}

impl RunLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a search path for the end-of-run report
    pub fn note_search_path(&mut self, path: &Path) {
        if !self.search_paths_seen.iter().any(|p| p == path) {
            self.search_paths_seen.push(path.to_path_buf());
        }
    }

    pub fn search_paths_seen(&self) -> &[PathBuf] {
        &self.search_paths_seen
    }

    /// Count one more output that reads `path`
    pub fn reference_input(&mut self, path: &Path) {
        self.referenced_inputs.push(path.to_path_buf());
    }

    /// Drop one reference to `path`. Returns true when no output still
    /// needs the file.
    pub fn release_input(&mut self, path: &Path) -> bool {
        if let Some(index) = self.referenced_inputs.iter().position(|p| p == path) {
            self.referenced_inputs.remove(index);
        }
        !self.is_referenced(path)
    }

    pub fn is_referenced(&self, path: &Path) -> bool {
        self.referenced_inputs.iter().any(|p| p == path)
    }
}
