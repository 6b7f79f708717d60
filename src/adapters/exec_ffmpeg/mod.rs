//! FFmpeg execution adapter
//!
//! Builds ffmpeg argument lists for segment encodes and concatenation and
//! runs them as child processes. Second-pass encodes with a size ceiling are
//! watched and killed once their output outgrows it.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Child;
use tracing::{debug, warn};

use crate::adapters::process_env::ProcessHints;
use crate::error::{ReplayError, ReplayResult};
use crate::ports::*;
use crate::utils::split_args;
use crate::utils::time::format_file_size;

#[cfg(windows)]
const NULL_SINK: &str = "NUL";
#[cfg(not(windows))]
const NULL_SINK: &str = "/dev/null";

const WATCH_INTERVAL: Duration = Duration::from_millis(100);

/// FFmpeg-based execution adapter
pub struct FfmpegAdapter {
    program: PathBuf,
    hints: ProcessHints,
}

impl FfmpegAdapter {
    pub fn new(program: impl Into<PathBuf>, hints: ProcessHints) -> Self {
        Self {
            program: program.into(),
            hints,
        }
    }

    async fn run(&self, name: &str, args: Vec<OsString>, affinity: bool, ceiling: Option<(&Path, u64)>) -> ReplayResult<()> {
        debug!("{} {:?}", self.program.display(), args);

        let mut command = self.hints.command(&self.program, affinity);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let mut child = self.hints.spawn(&mut command, affinity).map_err(|e| ReplayError::EncodeFailure {
            output: name.to_string(),
            message: format!("could not start {}: {}", self.program.display(), e),
        })?;

        let stderr = child.stderr.take().map(|mut pipe| {
            tokio::spawn(async move {
                let mut text = String::new();
                let _ = pipe.read_to_string(&mut text).await;
                text
            })
        });

        let (status, killed) = match ceiling {
            Some((output, limit)) => watch_size(&mut child, output, limit).await?,
            None => (child.wait().await?, false),
        };

        let stderr = match stderr {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };
        if let (true, Some((_, limit))) = (killed, ceiling) {
            return Err(ReplayError::EncodeFailure {
                output: name.to_string(),
                message: format!("size ceiling of {} exceeded", format_file_size(limit)),
            });
        }
        if !status.success() {
            let detail = stderr.lines().last().unwrap_or("").trim().to_string();
            warn!("{}: ffmpeg exited with {}: {}", name, status, detail);
        }
        Ok(())
    }
}

/// Wait for `child`, killing it once `output` grows past `limit` bytes
async fn watch_size(child: &mut Child, output: &Path, limit: u64) -> ReplayResult<(ExitStatus, bool)> {
    let mut ticker = tokio::time::interval(WATCH_INTERVAL);
    loop {
        tokio::select! {
            status = child.wait() => return Ok((status?, false)),
            _ = ticker.tick() => {
                let size = tokio::fs::metadata(output).await.map(|m| m.len()).unwrap_or(0);
                if size > limit {
                    warn!(
                        "{} reached {} (ceiling {}), stopping encoder",
                        output.display(),
                        format_file_size(size),
                        format_file_size(limit)
                    );
                    child.kill().await?;
                    return Ok((child.wait().await?, true));
                }
            }
        }
    }
}

fn os(value: impl Into<OsString>) -> OsString {
    value.into()
}

/// Arguments for one encode pass
pub fn encode_args(request: &EncodeRequest) -> Vec<OsString> {
    let mut args = vec![
        os("-y"),
        os("-hide_banner"),
        os("-loglevel"),
        os("error"),
        os("-ss"),
        os(request.range.start.to_string()),
        os("-to"),
        os(request.range.end.to_string()),
        os("-i"),
        os(request.source.clone()),
    ];
    args.extend(request.fragments.iter().flat_map(|f| split_args(f)).map(os));

    let video = |kbps: f64| os(format!("{:.3}k", kbps));
    let audio = |kbps: u32| os(format!("{}k", kbps));
    match &request.rate {
        RateControl::Unconstrained => args.push(os(request.output.clone())),
        RateControl::Single { video_kbps, audio_kbps } => {
            args.extend([os("-b:v"), video(*video_kbps), os("-b:a"), audio(*audio_kbps)]);
            args.push(os(request.output.clone()));
        }
        RateControl::FirstPass { video_kbps, pass_log } => {
            args.extend([os("-b:v"), video(*video_kbps)]);
            args.extend([os("-pass"), os("1"), os("-passlogfile"), os(pass_log.clone())]);
            args.extend([os("-an"), os("-f"), os("null"), os(NULL_SINK)]);
        }
        RateControl::SecondPass {
            video_kbps,
            audio_kbps,
            pass_log,
        } => {
            args.extend([os("-b:v"), video(*video_kbps), os("-b:a"), audio(*audio_kbps)]);
            args.extend([os("-pass"), os("2"), os("-passlogfile"), os(pass_log.clone())]);
            args.push(os(request.output.clone()));
        }
    }
    args
}

/// Arguments for stream-copy concatenation
pub fn concat_args(request: &ConcatRequest) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-y", "-hide_banner", "-loglevel", "error", "-f", "concat", "-safe", "0", "-i"]
        .into_iter()
        .map(os)
        .collect();
    args.push(os(request.list_file.clone()));
    if let Some(chapters) = &request.chapters {
        args.extend([os("-i"), os(chapters.clone()), os("-map_metadata"), os("1")]);
    }
    args.extend([os("-map"), os("0"), os("-c"), os("copy")]);
    args.push(os(request.output.clone()));
    args
}

#[async_trait]
impl ExecutePort for FfmpegAdapter {
    async fn encode_segment(&self, request: &EncodeRequest) -> ReplayResult<()> {
        let name = request.output.display().to_string();
        let ceiling = match (&request.rate, request.size_ceiling) {
            (RateControl::SecondPass { .. }, Some(limit)) => Some((request.output.as_path(), limit)),
            _ => None,
        };
        self.run(&name, encode_args(request), true, ceiling).await
    }

    async fn concat_segments(&self, request: &ConcatRequest) -> ReplayResult<()> {
        let name = request.output.display().to_string();
        self.run(&name, concat_args(request), false, None).await
    }
}
