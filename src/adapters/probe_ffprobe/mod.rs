//! FFprobe adapter for media file probing
//!
//! Runs `ffprobe` with JSON output and maps the first video stream and the
//! container format onto [`MediaProbe`].

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::domain::model::*;
use crate::error::{ReplayError, ReplayResult};
use crate::ports::ProbePort;

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
    size: Option<String>,
}

/// FFprobe-based probe adapter
pub struct FfprobeAdapter {
    program: PathBuf,
}

impl FfprobeAdapter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, path: &Path) -> ReplayResult<FfprobeOutput> {
        if !path.is_file() {
            return Err(ReplayError::NotFound {
                name: path.display().to_string(),
            });
        }

        let output = Command::new(&self.program)
            .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| failure(path, format!("could not run {}: {}", self.program.display(), e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failure(path, format!("{} ({})", stderr.trim(), output.status)));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| failure(path, format!("unreadable output: {}", e)))
    }
}

fn failure(path: &Path, message: String) -> ReplayError {
    ReplayError::ProbeFailure {
        path: path.display().to_string(),
        message,
    }
}

#[async_trait]
impl ProbePort for FfprobeAdapter {
    async fn probe_media(&self, path: &Path) -> ReplayResult<MediaProbe> {
        let output = self.run(path).await?;
        let probe = media_probe(&output).map_err(|message| failure(path, message))?;
        debug!(
            "Probed {}: {} {}x{} @ {:.2} fps",
            path.display(),
            probe.duration,
            probe.width,
            probe.height,
            probe.fps
        );
        Ok(probe)
    }

    async fn probe_bitrate(&self, path: &Path) -> ReplayResult<f64> {
        let output = self.run(path).await?;
        output
            .format
            .bit_rate
            .as_deref()
            .and_then(|rate| rate.parse::<f64>().ok())
            .ok_or_else(|| failure(path, "no overall bitrate reported".to_string()))
    }
}

fn media_probe(output: &FfprobeOutput) -> Result<MediaProbe, String> {
    let seconds = output
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or("no duration reported")?;

    let video = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));
    let fps = video
        .and_then(|s| {
            s.avg_frame_rate
                .as_deref()
                .and_then(parse_frame_rate)
                .or_else(|| s.r_frame_rate.as_deref().and_then(parse_frame_rate))
        })
        .unwrap_or(0.0);

    Ok(MediaProbe {
        duration: TimeSpec::from_seconds(seconds),
        width: video.and_then(|s| s.width).unwrap_or(0),
        height: video.and_then(|s| s.height).unwrap_or(0),
        fps,
        bitrate: output
            .format
            .bit_rate
            .as_deref()
            .and_then(|r| r.parse().ok())
            .unwrap_or(0.0),
        size: output.format.size.as_deref().and_then(|s| s.parse().ok()).unwrap_or(0),
    })
}

/// `30000/1001` style rates; `0/0` counts as unknown
fn parse_frame_rate(rate: &str) -> Option<f64> {
    let (num, den) = rate.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    (den > 0.0 && num > 0.0).then(|| num / den)
}
