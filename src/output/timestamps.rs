//! File time inheritance for finished outputs

use filetime::FileTime;
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, warn};

use crate::domain::settings::TimeSource;
use crate::error::ReplayResult;
use crate::planner::OutputVideo;
use crate::utils::time::local_system_time;

/// Access and modification times to stamp on an output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileTimes {
    pub accessed: FileTime,
    pub modified: FileTime,
}

impl FileTimes {
    /// Times of an existing file. The modification time is the oldest the
    /// filesystem reports, so a copied recording keeps its capture date.
    pub fn of(path: &Path) -> ReplayResult<Self> {
        let meta = std::fs::metadata(path)?;
        let accessed = FileTime::from_last_access_time(&meta);
        let mut modified = FileTime::from_last_modification_time(&meta);
        if let Some(created) = FileTime::from_creation_time(&meta) {
            modified = modified.min(created);
        }
        Ok(Self { accessed, modified })
    }

    pub fn fixed(time: SystemTime) -> Self {
        let time = FileTime::from_system_time(time);
        Self {
            accessed: time,
            modified: time,
        }
    }

    pub fn modified_system_time(&self) -> SystemTime {
        let seconds = self.modified.unix_seconds();
        let nanos = self.modified.nanoseconds();
        if seconds >= 0 {
            SystemTime::UNIX_EPOCH + std::time::Duration::new(seconds as u64, nanos)
        } else {
            SystemTime::UNIX_EPOCH - std::time::Duration::from_secs(seconds.unsigned_abs())
        }
    }

    pub fn apply(&self, path: &Path) -> ReplayResult<()> {
        filetime::set_file_times(path, self.accessed, self.modified)?;
        Ok(())
    }
}

/// Times the output should carry, `None` when its time source is `none` or
/// names nothing usable
pub fn resolve_file_times(output: &OutputVideo) -> ReplayResult<Option<FileTimes>> {
    match &output.settings.time_source {
        TimeSource::None => Ok(None),
        TimeSource::Input(index) => {
            let Some(source) = output.time_source_path() else {
                warn!("{}: $time v{} names a missing input, keeping current file times", output.name, index);
                return Ok(None);
            };
            debug!("{}: taking file times from {}", output.name, source.display());
            FileTimes::of(source).map(Some)
        }
        TimeSource::Fixed(datetime) => match local_system_time(datetime) {
            Some(time) => Ok(Some(FileTimes::fixed(time))),
            None => {
                warn!("{}: {} does not exist in the local timezone", output.name, datetime);
                Ok(None)
            }
        },
    }
}
