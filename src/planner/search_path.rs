//! Ordered search paths for locating source files by bare name

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::ledger::RunLedger;
use crate::error::{ReplayError, ReplayResult};
use crate::utils::path::{normalize_lexically, resolve_against};

/// Ordered, de-duplicated directory list. Earlier entries win.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPathSet {
    paths: Vec<PathBuf>,
}

impl SearchPathSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Append a directory. Returns false, with a warning, when it is
    /// already registered.
    pub fn add(&mut self, dir: PathBuf, ledger: &mut RunLedger) -> bool {
        ledger.note_search_path(&dir);
        if self.paths.contains(&dir) {
            warn!("Search path already used: {}", dir.display());
            return false;
        }
        debug!("Added search path {}", dir.display());
        self.paths.push(dir);
        true
    }

    /// Remove a directory. Returns false, with a warning, when it was not
    /// registered.
    pub fn remove(&mut self, dir: &Path) -> bool {
        match self.paths.iter().position(|p| p == dir) {
            Some(index) => {
                self.paths.remove(index);
                debug!("Removed search path {}", dir.display());
                true
            }
            None => {
                warn!("Search path not found for removal: {}", dir.display());
                false
            }
        }
    }

    /// Handle `$addSearchPath` / `$rmSearchPath`. Relative values resolve
    /// against `config_dir`. Returns false for any other key.
    pub fn apply_directive(
        &mut self,
        key: &str,
        value: &str,
        config_dir: &Path,
        ledger: &mut RunLedger,
    ) -> bool {
        match key {
            "$addSearchPath" => {
                self.add(resolve_against(config_dir, value), ledger);
                true
            }
            "$rmSearchPath" => {
                self.remove(&resolve_against(config_dir, value));
                true
            }
            _ => false,
        }
    }

    /// Locate `name`. Absolute names must name a file as given; bare and relative
    /// names are tried under each search path in registration order.
    pub fn resolve(&self, name: &str) -> ReplayResult<PathBuf> {
        let candidate = Path::new(name);
        if candidate.is_absolute() {
            let normalized = normalize_lexically(candidate);
            return if normalized.is_file() {
                Ok(normalized)
            } else {
                Err(ReplayError::NotFound {
                    name: name.to_string(),
                })
            };
        }

        self.paths
            .iter()
            .map(|dir| normalize_lexically(&dir.join(candidate)))
            .find(|path| path.is_file())
            .ok_or_else(|| ReplayError::NotFound {
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_first_registered_path_wins() {
        let root = TempDir::new().unwrap();
        let a = root.path().join("A");
        let b = root.path().join("B");
        for dir in [&a, &b] {
            fs::create_dir(dir).unwrap();
            fs::write(dir.join("x"), b"clip").unwrap();
        }

        let mut ledger = RunLedger::new();
        let mut paths = SearchPathSet::new();
        paths.add(a.clone(), &mut ledger);
        paths.add(b, &mut ledger);

        assert_eq!(paths.resolve("x").unwrap(), a.join("x"));
    }

    #[test]
    fn test_missing_names() {
        let root = TempDir::new().unwrap();
        let mut ledger = RunLedger::new();
        let mut paths = SearchPathSet::new();
        paths.add(root.path().to_path_buf(), &mut ledger);

        assert!(matches!(paths.resolve("nope.mp4"), Err(ReplayError::NotFound { .. })));
        let absolute = root.path().join("nope.mp4");
        assert!(matches!(
            paths.resolve(&absolute.to_string_lossy()),
            Err(ReplayError::NotFound { .. })
        ));
    }

    #[test]
    fn test_absolute_name_bypasses_paths() {
        let root = TempDir::new().unwrap();
        let file = root.path().join("abs.mp4");
        fs::write(&file, b"clip").unwrap();
        let paths = SearchPathSet::new();
        assert_eq!(paths.resolve(&file.to_string_lossy()).unwrap(), file);
    }

    #[test]
    fn test_absolute_directory_is_not_found() {
        let root = TempDir::new().unwrap();
        let paths = SearchPathSet::new();
        assert!(matches!(
            paths.resolve(&root.path().to_string_lossy()),
            Err(ReplayError::NotFound { .. })
        ));
    }

    #[test]
    fn test_directives_and_duplicates() {
        let mut ledger = RunLedger::new();
        let mut paths = SearchPathSet::new();
        let config_dir = Path::new("/cfg");

        assert!(paths.apply_directive("$addSearchPath", "clips", config_dir, &mut ledger));
        assert!(paths.apply_directive("$addSearchPath", "./clips", config_dir, &mut ledger));
        assert_eq!(paths.paths(), &[PathBuf::from("/cfg/clips")]);

        assert!(paths.apply_directive("$rmSearchPath", "clips", config_dir, &mut ledger));
        assert!(paths.paths().is_empty());
        assert!(!paths.apply_directive("$cmd", "x", config_dir, &mut ledger));
        assert_eq!(ledger.search_paths_seen(), &[PathBuf::from("/cfg/clips")]);
    }
}
