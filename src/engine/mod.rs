//! Segment encoding engine
//!
//! Encoded builds go through the bitrate convergence loop in
//! [`convergence`]; raw builds encode every segment once through [`raw`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod convergence;
pub mod raw;

pub use convergence::{ConvergenceEngine, ConvergenceState, SizeState, Verdict};
pub use raw::RawEncoder;

use crate::domain::model::Segment;
use crate::error::{ReplayError, ReplayResult};
use crate::planner::OutputVideo;

/// Size window and correction thresholds for the convergence loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceTuning {
    /// Attempts before giving up on an output
    pub max_attempts: u32,
    /// Smallest acceptable output in bytes
    pub min_output_bytes: u64,
    /// Largest acceptable output in bytes
    pub max_output_bytes: u64,
    /// Kill a second-pass encode whose file grows past this; defaults to
    /// `max_output_bytes`
    pub size_ceiling_bytes: Option<u64>,
    /// Corrections below this are clamped up to it
    pub ratio_floor: f64,
    /// Corrections below this abandon the output
    pub ratio_abort: f64,
    /// Corrections above this accept the current files
    pub ratio_accept: f64,
    /// Targets at or below this abandon the output, in kbps
    pub min_bitrate_kbps: f64,
}

impl Default for ConvergenceTuning {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            min_output_bytes: 22_020_096,
            max_output_bytes: 26_214_400,
            size_ceiling_bytes: None,
            ratio_floor: 0.2,
            ratio_abort: 0.1,
            ratio_accept: 4.0,
            min_bitrate_kbps: 0.01,
        }
    }
}

impl ConvergenceTuning {
    pub fn accepts(&self, total_bytes: u64) -> bool {
        (self.min_output_bytes..=self.max_output_bytes).contains(&total_bytes)
    }

    pub fn window_midpoint(&self) -> u64 {
        self.min_output_bytes + (self.max_output_bytes - self.min_output_bytes) / 2
    }

    pub fn size_ceiling(&self) -> u64 {
        self.size_ceiling_bytes.unwrap_or(self.max_output_bytes)
    }

    /// Reject windows and thresholds the loop cannot work with
    pub fn validate(&self) -> ReplayResult<()> {
        let problem = if self.max_attempts == 0 {
            Some("max_attempts must be at least 1")
        } else if self.min_output_bytes > self.max_output_bytes {
            Some("min_output_bytes is larger than max_output_bytes")
        } else if !(0.0 < self.ratio_abort && self.ratio_abort <= self.ratio_floor && self.ratio_floor <= 1.0) {
            Some("ratios must satisfy 0 < ratio_abort <= ratio_floor <= 1")
        } else if self.ratio_accept <= 1.0 {
            Some("ratio_accept must be greater than 1")
        } else {
            None
        };

        match problem {
            Some(message) => Err(ReplayError::Config {
                message: message.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Everything needed to encode one segment of an output
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentJob {
    pub segment: Segment,
    /// Active command fragment for the build mode, if any
    pub command: Option<String>,
    pub first_pass: Vec<String>,
    pub second_pass: Vec<String>,
    pub audio_kbps: u32,
    /// Segment file inside the output's working directory
    pub output: PathBuf,
    /// Two-pass log prefix inside the working directory
    pub pass_log: PathBuf,
}

impl SegmentJob {
    /// One job per segment of `output`, writing into `workspace`
    pub fn plan(output: &OutputVideo, workspace: &Path) -> Vec<SegmentJob> {
        let mode = output.mode;
        let ext = output.extension();
        output
            .segments()
            .into_iter()
            .map(|segment| {
                let settings = &output.inputs[segment.input_index].settings;
                let file_name = segment.file_name(mode, &ext);
                SegmentJob {
                    command: settings.active_command(mode).map(str::to_string),
                    first_pass: settings.first_pass_commands.clone(),
                    second_pass: settings.second_pass_commands.clone(),
                    audio_kbps: settings.audio_bitrate,
                    output: workspace.join(&file_name),
                    pass_log: workspace.join(format!("{}.passlog", file_name)),
                    segment,
                }
            })
            .collect()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.segment.range.duration().as_seconds()
    }

    /// Command fragments for a pass: the active command, then extras
    pub fn fragments(&self, extra: &[String]) -> Vec<String> {
        self.command.iter().cloned().chain(extra.iter().cloned()).collect()
    }
}

/// Remove a segment left by an earlier attempt so only fresh output is measured
pub async fn clear_stale(path: &Path) -> ReplayResult<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

/// Size of a produced file, failing when it is missing or empty
pub async fn ensure_produced(path: &Path, output_name: &str) -> ReplayResult<u64> {
    let size = tokio::fs::metadata(path).await.map(|m| m.len()).unwrap_or(0);
    if size == 0 {
        return Err(ReplayError::EncodeFailure {
            output: output_name.to_string(),
            message: format!("encoder produced no data in {}", path.display()),
        });
    }
    Ok(size)
}

/// First guess at per-segment video bitrates in kbps.
///
/// The video budget is the target size spread over the total duration minus
/// audio. Segments share it in proportion to their source pixel rate, scaled
/// so that `Σ target_i × duration_i` equals the budget.
pub fn initial_targets(
    jobs: &[SegmentJob],
    target_bytes: u64,
    audio_kbps: u32,
    tuning: &ConvergenceTuning,
) -> ReplayResult<Vec<f64>> {
    let failure = |reason: String| ReplayError::ConvergenceFailure { attempts: 0, reason };

    let target_bytes = if target_bytes == 0 {
        tuning.window_midpoint()
    } else {
        target_bytes
    };
    let total_seconds: f64 = jobs.iter().map(SegmentJob::duration_seconds).sum();
    if total_seconds <= 0.0 {
        return Err(failure("nothing to encode".to_string()));
    }

    let budget = target_bytes as f64 * 8.0 / 1000.0 / total_seconds - audio_kbps as f64;
    if budget <= tuning.min_bitrate_kbps {
        return Err(failure(format!(
            "{} kbps of audio leaves no room for video in {} bytes",
            audio_kbps, target_bytes
        )));
    }

    let use_pixels = jobs.iter().all(|j| j.segment.probe.pixel_rate() > 0.0);
    let weight = |job: &SegmentJob| {
        if use_pixels {
            job.segment.probe.pixel_rate()
        } else {
            1.0
        }
    };
    let weighted_seconds: f64 = jobs.iter().map(|j| weight(j) * j.duration_seconds()).sum();

    Ok(jobs
        .iter()
        .map(|job| budget * weight(job) * total_seconds / weighted_seconds)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{MediaProbe, TimeRange, TimeSpec};

    fn job(seconds: f64, width: u32, height: u32) -> SegmentJob {
        SegmentJob {
            segment: Segment {
                input_index: 0,
                range_index: 0,
                source: PathBuf::from("/v/a.mp4"),
                range: TimeRange::new(TimeSpec::ZERO, TimeSpec::from_seconds(seconds)).unwrap(),
                probe: MediaProbe {
                    width,
                    height,
                    fps: 30.0,
                    ..MediaProbe::default()
                },
            },
            command: None,
            first_pass: vec![],
            second_pass: vec![],
            audio_kbps: 0,
            output: PathBuf::from("/tmp/x.mp4"),
            pass_log: PathBuf::from("/tmp/x.passlog"),
        }
    }

    #[test]
    fn test_initial_targets_fill_budget() {
        let jobs = vec![job(10.0, 1920, 1080), job(20.0, 1280, 720)];
        let targets = initial_targets(&jobs, 1_000_000, 0, &ConvergenceTuning::default()).unwrap();
        let bits: f64 = targets.iter().zip(&jobs).map(|(t, j)| t * j.duration_seconds()).sum();
        assert!((bits - 8000.0).abs() < 1e-6);
        assert!(targets[0] > targets[1]);
    }

    #[test]
    fn test_initial_targets_subtract_audio() {
        let jobs = vec![job(8.0, 0, 0)];
        let targets = initial_targets(&jobs, 100_000, 60, &ConvergenceTuning::default()).unwrap();
        assert!((targets[0] - 40.0).abs() < 1e-9);
        assert!(initial_targets(&jobs, 100_000, 100, &ConvergenceTuning::default()).is_err());
    }

    #[test]
    fn test_zero_target_uses_window_midpoint() {
        let tuning = ConvergenceTuning {
            min_output_bytes: 1000,
            max_output_bytes: 3000,
            ..ConvergenceTuning::default()
        };
        let targets = initial_targets(&[job(1.0, 0, 0)], 0, 0, &tuning).unwrap();
        assert!((targets[0] - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_tuning_validation() {
        assert!(ConvergenceTuning::default().validate().is_ok());
        let inverted = ConvergenceTuning {
            min_output_bytes: 10,
            max_output_bytes: 5,
            ..ConvergenceTuning::default()
        };
        assert!(inverted.validate().is_err());
        let loose = ConvergenceTuning {
            ratio_abort: 0.5,
            ..ConvergenceTuning::default()
        };
        assert!(loose.validate().is_err());
    }

    #[test]
    fn test_fragments_put_active_command_first() {
        let mut job = job(1.0, 0, 0);
        job.command = Some("-c:v libx264".into());
        assert_eq!(
            job.fragments(&["-pass 1".to_string()]),
            vec!["-c:v libx264".to_string(), "-pass 1".to_string()]
        );
    }
}
