//! Incremental build cache
//!
//! Each output gets an ordered list of MD5 fingerprints covering everything
//! that shapes its bytes. The list is stored in `<dir>/<md5(final path)>.hash`
//! after a successful build and compared element-wise on the next run.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::OutputVideo;
use crate::error::ReplayResult;

fn md5_hex(text: &str) -> String {
    format!("{:x}", md5::compute(text.as_bytes()))
}

/// Ordered fingerprints of an output's build inputs: mode, naming, then per
/// input its path, active command and every time range.
pub fn fingerprints(output: &OutputVideo) -> Vec<String> {
    let mode = output.mode;
    let mut hashes = vec![
        md5_hex(mode.tag()),
        md5_hex(&format!(
            "{}|{}",
            output.settings.naming.prefix(mode),
            output.settings.naming.ext(mode)
        )),
    ];

    for input in &output.inputs {
        hashes.push(md5_hex(&input.path.to_string_lossy()));
        hashes.push(md5_hex(input.settings.active_command(mode).unwrap_or("")));
        hashes.extend(input.ranges.iter().map(|range| md5_hex(&range.to_string())));
    }

    hashes
}

/// On-disk fingerprint records
#[derive(Debug, Clone)]
pub struct BuildCache {
    dir: PathBuf,
}

impl BuildCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Record file for an output, keyed by its final path
    pub fn record_path(&self, output: &OutputVideo) -> PathBuf {
        let key = md5_hex(&output.final_path().to_string_lossy());
        self.dir.join(format!("{}.hash", key))
    }

    /// Previously stored fingerprints, `None` when there is no record
    pub fn load(&self, output: &OutputVideo) -> ReplayResult<Option<Vec<String>>> {
        let path = self.record_path(output);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content.lines().map(str::to_string).collect())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// True unless the stored record matches the output's fingerprints
    /// exactly, element by element
    pub fn should_rebuild(&self, output: &OutputVideo) -> bool {
        match self.load(output) {
            Ok(Some(previous)) => {
                let changed = previous != output.hash_list;
                debug!(
                    "Cache record for {} {}",
                    output.name,
                    if changed { "differs" } else { "matches" }
                );
                changed
            }
            Ok(None) => true,
            Err(e) => {
                warn!("Could not read cache record for {}: {}", output.name, e);
                true
            }
        }
    }

    /// Persist the output's fingerprints, replacing any earlier record
    pub fn record(&self, output: &OutputVideo) -> ReplayResult<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.record_path(output), output.hash_list.join("\n"))?;
        Ok(())
    }
}
