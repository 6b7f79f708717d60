//! Build planning: config resolution into output video plans
//!
//! The assembler walks a parsed config document and produces a
//! [`BuildPlan`]: every output video with its inputs, time ranges, markers
//! and cache fingerprints.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::warn;

pub mod assembler;
pub mod cache;
pub mod ledger;
pub mod search_path;

pub use assembler::{AssemblerOptions, PlanAssembler};
pub use cache::BuildCache;
pub use ledger::RunLedger;
pub use search_path::SearchPathSet;

use crate::domain::model::*;
use crate::domain::rules::remap_markers;
use crate::domain::settings::{Settings, TimeSource};
use crate::error::ReplayResult;
use crate::utils::path::parent_dir;

/// Source file contributing one or more time ranges to an output
#[derive(Debug, Clone, Serialize)]
pub struct InputVideo {
    pub path: PathBuf,
    pub probe: MediaProbe,
    #[serde(skip)]
    pub settings: Settings,
    pub ranges: Vec<TimeRange>,
    /// Markers in this input's own timeline, placed when the output is finalized
    pub pending_markers: Vec<Marker>,
    /// Created for bare time ranges on the output's own source file
    pub implicit: bool,
}

impl InputVideo {
    pub fn new(path: PathBuf, probe: MediaProbe, settings: Settings, implicit: bool) -> Self {
        Self {
            path,
            probe,
            settings,
            ranges: Vec::new(),
            pending_markers: Vec::new(),
            implicit,
        }
    }

    /// Parse a `start` / `end` pair. An empty end means the end of the file.
    pub fn parse_range(&self, start: &str, end: &str) -> ReplayResult<TimeRange> {
        let start = TimeSpec::parse(start)?;
        let end = if end.trim().is_empty() {
            self.probe.duration
        } else {
            TimeSpec::parse(end)?
        };
        TimeRange::new(start, end)
    }

    pub fn add_range(&mut self, start: &str, end: &str) -> ReplayResult<()> {
        let range = self.parse_range(start, end)?;
        self.ranges.push(range);
        Ok(())
    }

    pub fn duration(&self) -> TimeSpec {
        self.ranges.iter().map(TimeRange::duration).sum()
    }
}

/// One artifact to produce
#[derive(Debug, Clone, Serialize)]
pub struct OutputVideo {
    /// Config key naming the output's source file
    pub name: String,
    /// Config key resolved against the declaring document's folder
    pub declared_path: PathBuf,
    pub mode: BuildMode,
    #[serde(skip)]
    pub settings: Settings,
    pub inputs: Vec<InputVideo>,
    /// Markers in the concatenated output timeline
    pub markers: Vec<Marker>,
    /// Set when the build cache finds nothing changed
    pub skip: bool,
    #[serde(skip)]
    pub hash_list: Vec<String>,
}

impl OutputVideo {
    pub fn new(name: String, declared_path: PathBuf, mode: BuildMode, settings: Settings) -> Self {
        Self {
            name,
            declared_path,
            mode,
            settings,
            inputs: Vec::new(),
            markers: Vec::new(),
            skip: false,
            hash_list: Vec::new(),
        }
    }

    pub fn stem(&self) -> String {
        file_stem(&self.declared_path)
    }

    /// Container extension for the mode, falling back to the key's own
    pub fn extension(&self) -> String {
        let configured = self.settings.naming.ext(self.mode);
        if configured.is_empty() {
            dotted_extension(&self.declared_path)
        } else {
            configured.to_string()
        }
    }

    pub fn file_name(&self) -> String {
        format!(
            "{}{}{}",
            self.settings.naming.prefix(self.mode),
            self.stem(),
            self.extension()
        )
    }

    pub fn final_path(&self) -> PathBuf {
        parent_dir(&self.declared_path).join(self.file_name())
    }

    pub fn duration(&self) -> TimeSpec {
        self.inputs.iter().map(InputVideo::duration).sum()
    }

    /// Every (input, range) pair in declared order
    pub fn segments(&self) -> Vec<Segment> {
        self.inputs
            .iter()
            .enumerate()
            .flat_map(|(input_index, input)| {
                input
                    .ranges
                    .iter()
                    .enumerate()
                    .map(move |(range_index, range)| Segment {
                        input_index,
                        range_index,
                        source: input.path.clone(),
                        range: *range,
                        probe: input.probe.clone(),
                    })
            })
            .collect()
    }

    pub fn segment_count(&self) -> usize {
        self.inputs.iter().map(|i| i.ranges.len()).sum()
    }

    /// Input whose file times the finished output inherits
    pub fn time_source_path(&self) -> Option<&Path> {
        match self.settings.time_source {
            TimeSource::Input(index) => self.inputs.get(index).map(|i| i.path.as_path()),
            _ => None,
        }
    }

    /// Place pending markers on the output timeline and compute the cache
    /// fingerprints. Called once all inputs are known.
    pub fn finalize(&mut self) {
        let remap = remap_markers(
            self.inputs
                .iter()
                .map(|i| (i.ranges.as_slice(), i.pending_markers.as_slice())),
        );
        for marker in &remap.dropped {
            warn!(
                "{}: marker '{}' ({} - {}) is not inside any time range, dropping it",
                self.name, marker.name, marker.start, marker.end
            );
        }
        self.markers.extend(remap.placed);
        self.markers.sort_by_key(|m| m.start);
        self.hash_list = cache::fingerprints(self);
    }
}

/// Ordered outputs from one config parse
#[derive(Debug, Clone, Serialize)]
pub struct BuildPlan {
    pub mode: BuildMode,
    pub outputs: Vec<OutputVideo>,
    /// Where fully consumed inputs are archived
    pub move_folder: Option<PathBuf>,
}

impl BuildPlan {
    pub fn new(mode: BuildMode) -> Self {
        Self {
            mode,
            outputs: Vec::new(),
            move_folder: None,
        }
    }

    pub fn pending(&self) -> impl Iterator<Item = &OutputVideo> {
        self.outputs.iter().filter(|o| !o.skip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output_with(prefix: &str, ext: &str) -> OutputVideo {
        let mut settings = Settings::default();
        settings.naming.prefix = prefix.to_string();
        settings.naming.ext = ext.to_string();
        OutputVideo::new(
            "match.mkv".into(),
            PathBuf::from("/videos/match.mkv"),
            BuildMode::Encoded,
            settings,
        )
    }

    #[test]
    fn test_final_path_uses_prefix_and_extension() {
        assert_eq!(
            output_with("small_", ".mp4").final_path(),
            PathBuf::from("/videos/small_match.mp4")
        );
        assert_eq!(
            output_with("", "").final_path(),
            PathBuf::from("/videos/match.mkv")
        );
    }

    #[test]
    fn test_empty_end_uses_probed_duration() {
        let probe = MediaProbe {
            duration: TimeSpec::from_seconds(42.0),
            ..MediaProbe::default()
        };
        let mut input = InputVideo::new("/v/a.mp4".into(), probe, Settings::default(), false);
        input.add_range("30", "").unwrap();
        assert_eq!(input.ranges[0].end, TimeSpec::from_seconds(42.0));
        assert!(input.add_range("50", "").is_err());
    }

    #[test]
    fn test_segments_flatten_in_order() {
        let mut output = output_with("", "");
        let probe = MediaProbe {
            duration: TimeSpec::from_seconds(100.0),
            ..MediaProbe::default()
        };
        let mut first = InputVideo::new("/v/a.mp4".into(), probe.clone(), Settings::default(), false);
        first.add_range("0", "10").unwrap();
        first.add_range("20", "25").unwrap();
        let mut second = InputVideo::new("/v/b.mp4".into(), probe, Settings::default(), false);
        second.add_range("5", "6").unwrap();
        output.inputs = vec![first, second];

        let segments = output.segments();
        let order: Vec<(usize, usize)> = segments.iter().map(|s| (s.input_index, s.range_index)).collect();
        assert_eq!(order, vec![(0, 0), (0, 1), (1, 0)]);
        assert_eq!(output.duration(), TimeSpec::from_seconds(16.0));
    }
}
