//! Bitrate convergence loop
//!
//! The encoder's size/bitrate relationship is treated as a black box. Each
//! attempt encodes every segment, measures the total size and the achieved
//! bitrates, and corrects the targets multiplicatively until an attempt
//! overshoots in the opposite direction from the previous one. From then on
//! the targets bisect the bracket observed so far.

use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::{clear_stale, ensure_produced, ConvergenceTuning, SegmentJob};
use crate::error::{ReplayError, ReplayResult};
use crate::ports::{EncodeRequest, ExecutePort, ProbePort, RateControl};
use crate::utils::time::format_file_size;

/// Where the last out-of-window attempt landed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SizeState {
    None,
    TooSmall,
    TooBig,
}

impl SizeState {
    fn is_opposite(&self, other: SizeState) -> bool {
        matches!(
            (self, other),
            (SizeState::TooSmall, SizeState::TooBig) | (SizeState::TooBig, SizeState::TooSmall)
        )
    }
}

/// How the next targets are derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Multiplicative,
    Bisection,
}

/// Outcome of evaluating one attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Verdict {
    /// Total size landed inside the window
    InWindow,
    /// Targets were adjusted, encode again
    Retry,
    /// Correction so large the current files are kept as they are
    GoodEnough,
    /// No further attempts
    Fail(String),
}

/// Per-output controller state, free of any I/O
#[derive(Debug, Clone)]
pub struct ConvergenceState {
    targets: Vec<f64>,
    min_bitrate: Vec<f64>,
    max_bitrate: Vec<f64>,
    last_state: SizeState,
    previous_total: Option<u64>,
    bisecting: bool,
    attempts: u32,
}

impl ConvergenceState {
    pub fn new(initial_targets: Vec<f64>) -> Self {
        let count = initial_targets.len();
        Self {
            targets: initial_targets,
            min_bitrate: vec![0.0; count],
            max_bitrate: vec![f64::INFINITY; count],
            last_state: SizeState::None,
            previous_total: None,
            bisecting: false,
            attempts: 0,
        }
    }

    /// Video bitrates in kbps for the next attempt
    pub fn targets(&self) -> &[f64] {
        &self.targets
    }

    pub fn last_state(&self) -> SizeState {
        self.last_state
    }

    pub fn phase(&self) -> Phase {
        if self.bisecting {
            Phase::Bisection
        } else {
            Phase::Multiplicative
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Judge one attempt's measurements and prepare the next targets
    pub fn evaluate(&mut self, total_bytes: u64, achieved_kbps: &[f64], tuning: &ConvergenceTuning) -> Verdict {
        self.attempts += 1;

        if tuning.accepts(total_bytes) {
            return Verdict::InWindow;
        }
        if self.previous_total == Some(total_bytes) {
            return Verdict::Fail(format!("output size stuck at {} bytes", total_bytes));
        }
        if self.attempts >= tuning.max_attempts {
            return Verdict::Fail(format!("still outside the size window after {} attempts", self.attempts));
        }

        let state = if total_bytes < tuning.min_output_bytes {
            SizeState::TooSmall
        } else {
            SizeState::TooBig
        };

        if !self.bisecting && self.last_state.is_opposite(state) {
            debug!("Size flipped from {:?} to {:?}, bisecting from now on", self.last_state, state);
            self.bisecting = true;
        }

        for (i, &target) in self.targets.iter().enumerate() {
            match state {
                SizeState::TooBig => self.max_bitrate[i] = self.max_bitrate[i].min(target),
                _ => self.min_bitrate[i] = self.min_bitrate[i].max(target),
            }
        }

        let next = if self.bisecting {
            self.bisected()
        } else {
            match self.corrected(state, achieved_kbps, tuning) {
                Ok(next) => next,
                Err(verdict) => return verdict,
            }
        };

        self.targets = next;
        self.last_state = state;
        self.previous_total = Some(total_bytes);
        Verdict::Retry
    }

    fn bisected(&self) -> Vec<f64> {
        self.min_bitrate
            .iter()
            .zip(&self.max_bitrate)
            .zip(&self.targets)
            .map(|((&low, &high), &target)| {
                if high.is_finite() {
                    (low + high) / 2.0
                } else {
                    target
                }
            })
            .collect()
    }

    fn corrected(&self, state: SizeState, achieved_kbps: &[f64], tuning: &ConvergenceTuning) -> Result<Vec<f64>, Verdict> {
        let mut next = Vec::with_capacity(self.targets.len());

        for (i, (&target, &achieved)) in self.targets.iter().zip(achieved_kbps).enumerate() {
            if achieved <= 0.0 {
                return Err(Verdict::Fail(format!("segment {} reported no bitrate", i)));
            }

            let (low, high) = (achieved.min(target), achieved.max(target));
            let ratio = match state {
                SizeState::TooBig => low / high,
                _ => high / low,
            };

            if ratio < tuning.ratio_abort {
                return Err(Verdict::Fail(format!(
                    "segment {} needs a correction of {:.3}, below {}",
                    i, ratio, tuning.ratio_abort
                )));
            }
            if ratio > tuning.ratio_accept {
                return Err(Verdict::GoodEnough);
            }
            let ratio = if ratio < tuning.ratio_floor {
                warn!("Segment {} correction {:.3} clamped to {}", i, ratio, tuning.ratio_floor);
                tuning.ratio_floor
            } else {
                ratio
            };

            let adjusted = target * ratio;
            if adjusted <= tuning.min_bitrate_kbps {
                return Err(Verdict::Fail(format!(
                    "segment {} target fell to {:.4} kbps",
                    i, adjusted
                )));
            }
            next.push(adjusted);
        }

        Ok(next)
    }
}

/// One row of the attempt history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub targets: Vec<f64>,
    pub achieved: Vec<f64>,
    pub total_bytes: u64,
    pub state_after: SizeState,
    pub phase_after: Phase,
    pub verdict: Verdict,
    pub next_targets: Vec<f64>,
}

/// Drives encoder and prober through the convergence loop for one output
pub struct ConvergenceEngine<'a> {
    execute: &'a dyn ExecutePort,
    probe: &'a dyn ProbePort,
    tuning: &'a ConvergenceTuning,
    two_pass: bool,
    history: Vec<AttemptRecord>,
}

impl<'a> ConvergenceEngine<'a> {
    pub fn new(execute: &'a dyn ExecutePort, probe: &'a dyn ProbePort, tuning: &'a ConvergenceTuning) -> Self {
        Self {
            execute,
            probe,
            tuning,
            two_pass: false,
            history: Vec::new(),
        }
    }

    /// Encode with an analysis pass before each final pass
    pub fn with_two_pass(mut self, enabled: bool) -> Self {
        self.two_pass = enabled;
        self
    }

    pub fn history(&self) -> &[AttemptRecord] {
        &self.history
    }

    /// Encode `jobs` until their total size lands in the window. Returns the
    /// segment files in job order.
    pub async fn run(&mut self, output_name: &str, jobs: &[SegmentJob], initial_targets: Vec<f64>) -> ReplayResult<Vec<PathBuf>> {
        let mut state = ConvergenceState::new(initial_targets);

        loop {
            let attempt = state.attempts() + 1;
            let targets = state.targets().to_vec();
            info!(
                "{}: encode attempt {}/{} ({} segment(s))",
                output_name,
                attempt,
                self.tuning.max_attempts,
                jobs.len()
            );

            for (job, &target) in jobs.iter().zip(&targets) {
                self.encode(job, target).await.map_err(|e| match e {
                    ReplayError::EncodeFailure { output, message } => ReplayError::EncodeFailure {
                        output,
                        message: format!("attempt {}: {}", attempt, message),
                    },
                    other => other,
                })?;
            }

            let mut total_bytes = 0;
            let mut achieved = Vec::with_capacity(jobs.len());
            for job in jobs {
                total_bytes += ensure_produced(&job.output, output_name).await?;
                let bits_per_second = self.probe.probe_bitrate(&job.output).await.map_err(|e| {
                    ReplayError::ConvergenceFailure {
                        attempts: attempt,
                        reason: e.to_string(),
                    }
                })?;
                achieved.push(bits_per_second / 1000.0);
            }

            for (i, (target, got)) in targets.iter().zip(&achieved).enumerate() {
                debug!("{}: segment {} target {:.1} kbps, achieved {:.1} kbps", output_name, i, target, got);
            }
            info!(
                "{}: attempt {} produced {} (window {} - {})",
                output_name,
                attempt,
                format_file_size(total_bytes),
                format_file_size(self.tuning.min_output_bytes),
                format_file_size(self.tuning.max_output_bytes)
            );

            let verdict = state.evaluate(total_bytes, &achieved, self.tuning);
            self.history.push(AttemptRecord {
                attempt,
                targets,
                achieved,
                total_bytes,
                state_after: state.last_state(),
                phase_after: state.phase(),
                verdict: verdict.clone(),
                next_targets: state.targets().to_vec(),
            });

            match verdict {
                Verdict::InWindow => {
                    info!("{}: size converged after {} attempt(s)", output_name, attempt);
                    return Ok(jobs.iter().map(|j| j.output.clone()).collect());
                }
                Verdict::GoodEnough => {
                    warn!(
                        "{}: correction too large to continue, keeping attempt {} at {}",
                        output_name,
                        attempt,
                        format_file_size(total_bytes)
                    );
                    return Ok(jobs.iter().map(|j| j.output.clone()).collect());
                }
                Verdict::Fail(reason) => {
                    return Err(ReplayError::ConvergenceFailure {
                        attempts: attempt,
                        reason,
                    })
                }
                Verdict::Retry => {}
            }
        }
    }

    async fn encode(&self, job: &SegmentJob, video_kbps: f64) -> ReplayResult<()> {
        let request = |fragments: Vec<String>, rate: RateControl, size_ceiling: Option<u64>| EncodeRequest {
            source: job.segment.source.clone(),
            range: job.segment.range,
            fragments,
            rate,
            output: job.output.clone(),
            size_ceiling,
        };
        clear_stale(&job.output).await?;

        if self.two_pass {
            let first = request(
                job.fragments(&job.first_pass),
                RateControl::FirstPass {
                    video_kbps,
                    pass_log: job.pass_log.clone(),
                },
                None,
            );
            self.execute.encode_segment(&first).await?;

            let second = request(
                job.fragments(&job.second_pass),
                RateControl::SecondPass {
                    video_kbps,
                    audio_kbps: job.audio_kbps,
                    pass_log: job.pass_log.clone(),
                },
                Some(self.tuning.size_ceiling()),
            );
            self.execute.encode_segment(&second).await
        } else {
            let single = request(
                job.fragments(&[]),
                RateControl::Single {
                    video_kbps,
                    audio_kbps: job.audio_kbps,
                },
                None,
            );
            self.execute.encode_segment(&single).await
        }
    }
}
