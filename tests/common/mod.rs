//! Fake prober and encoder shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use replay_maker::domain::model::{MediaProbe, TimeSpec};
use replay_maker::error::{ReplayError, ReplayResult};
use replay_maker::ports::{ConcatRequest, EncodeRequest, ExecutePort, ProbePort, RateControl};

/// Decides what one encode produces: file size in bytes and the bitrate the
/// prober will report in kbps. `None` produces nothing.
pub type EncodeBehavior = Box<dyn FnMut(&EncodeRequest, u32) -> Option<(u64, f64)> + Send>;

/// In-memory stand-in for ffprobe and ffmpeg
pub struct FakeMedia {
    pub probe: MediaProbe,
    behavior: Mutex<EncodeBehavior>,
    bitrates: Mutex<HashMap<PathBuf, f64>>,
    pub encodes: Mutex<Vec<EncodeRequest>>,
    pub concats: Mutex<Vec<ConcatRequest>>,
    pub probed: Mutex<Vec<PathBuf>>,
}

impl FakeMedia {
    pub fn new(behavior: EncodeBehavior) -> Self {
        Self {
            probe: MediaProbe {
                duration: TimeSpec::from_seconds(600.0),
                width: 1920,
                height: 1080,
                fps: 30.0,
                bitrate: 8_000_000.0,
                size: 600_000_000,
            },
            behavior: Mutex::new(behavior),
            bitrates: Mutex::new(HashMap::new()),
            encodes: Mutex::new(Vec::new()),
            concats: Mutex::new(Vec::new()),
            probed: Mutex::new(Vec::new()),
        }
    }

    /// Encoder that hits `factor` times the requested bitrate exactly
    pub fn scaled(factor: f64) -> Self {
        Self::new(Box::new(move |request, _| {
            let kbps = request.rate.video_kbps().unwrap_or(1000.0) * factor;
            Some((bytes_for(kbps, request), kbps))
        }))
    }

    pub fn encode_requests(&self) -> Vec<EncodeRequest> {
        self.encodes.lock().unwrap().clone()
    }

    pub fn concat_requests(&self) -> Vec<ConcatRequest> {
        self.concats.lock().unwrap().clone()
    }
}

/// Bytes a segment takes at `kbps` over its range
pub fn bytes_for(kbps: f64, request: &EncodeRequest) -> u64 {
    (kbps * 1000.0 / 8.0 * request.range.duration().as_seconds()).round() as u64
}

#[async_trait]
impl ProbePort for FakeMedia {
    async fn probe_media(&self, path: &Path) -> ReplayResult<MediaProbe> {
        self.probed.lock().unwrap().push(path.to_path_buf());
        if !path.exists() {
            return Err(ReplayError::ProbeFailure {
                path: path.display().to_string(),
                message: "missing".into(),
            });
        }
        Ok(self.probe.clone())
    }

    async fn probe_bitrate(&self, path: &Path) -> ReplayResult<f64> {
        self.bitrates
            .lock()
            .unwrap()
            .get(path)
            .map(|kbps| kbps * 1000.0)
            .ok_or_else(|| ReplayError::ProbeFailure {
                path: path.display().to_string(),
                message: "never encoded".into(),
            })
    }
}

#[async_trait]
impl ExecutePort for FakeMedia {
    async fn encode_segment(&self, request: &EncodeRequest) -> ReplayResult<()> {
        let attempt = {
            let mut encodes = self.encodes.lock().unwrap();
            encodes.push(request.clone());
            encodes
                .iter()
                .filter(|r| r.output == request.output && r.rate.produces_output())
                .count() as u32
        };
        if !request.rate.produces_output() {
            return Ok(());
        }

        let outcome = {
            let mut behavior = self.behavior.lock().unwrap();
            (*behavior)(request, attempt)
        };
        if let Some((bytes, kbps)) = outcome {
            std::fs::write(&request.output, vec![0u8; bytes as usize])?;
            self.bitrates.lock().unwrap().insert(request.output.clone(), kbps);
        }
        Ok(())
    }

    async fn concat_segments(&self, request: &ConcatRequest) -> ReplayResult<()> {
        self.concats.lock().unwrap().push(request.clone());
        let mut joined = Vec::new();
        for segment in &request.segments {
            joined.extend(std::fs::read(segment)?);
        }
        std::fs::write(&request.output, joined)?;
        Ok(())
    }
}

/// Create an empty placeholder file, making parent folders
pub fn touch(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, b"source").unwrap();
}

/// Write a build config file
pub fn write_config(path: &Path, text: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, text).unwrap();
}
