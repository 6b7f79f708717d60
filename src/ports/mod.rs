// Ports - Boundaries to the external prober and encoder

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::domain::model::*;
use crate::error::ReplayResult;

/// Media inspection
#[async_trait]
pub trait ProbePort: Send + Sync {
    /// Duration, dimensions, frame rate, bitrate and size of a file
    async fn probe_media(&self, path: &Path) -> ReplayResult<MediaProbe>;

    /// Overall bitrate of a produced file in bits per second
    async fn probe_bitrate(&self, path: &Path) -> ReplayResult<f64>;
}

/// How an encode pass spends bits
#[derive(Debug, Clone, PartialEq)]
pub enum RateControl {
    /// Raw mode: command fragments only, no bitrate target
    Unconstrained,
    /// Single pass at a video bitrate
    Single { video_kbps: f64, audio_kbps: u32 },
    /// Analysis pass of a two-pass encode, writes only the pass log
    FirstPass { video_kbps: f64, pass_log: PathBuf },
    /// Final pass of a two-pass encode
    SecondPass {
        video_kbps: f64,
        audio_kbps: u32,
        pass_log: PathBuf,
    },
}

impl RateControl {
    pub fn video_kbps(&self) -> Option<f64> {
        match self {
            RateControl::Unconstrained => None,
            RateControl::Single { video_kbps, .. }
            | RateControl::FirstPass { video_kbps, .. }
            | RateControl::SecondPass { video_kbps, .. } => Some(*video_kbps),
        }
    }

    /// Passes that write the segment file
    pub fn produces_output(&self) -> bool {
        !matches!(self, RateControl::FirstPass { .. })
    }
}

/// One encoder invocation for one segment
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeRequest {
    pub source: PathBuf,
    pub range: TimeRange,
    /// Command fragments in order, each possibly holding several arguments
    pub fragments: Vec<String>,
    pub rate: RateControl,
    pub output: PathBuf,
    /// Kill the encoder once the partial output grows past this many bytes
    pub size_ceiling: Option<u64>,
}

/// Stream-copy concatenation of finished segments
#[derive(Debug, Clone, PartialEq)]
pub struct ConcatRequest {
    pub segments: Vec<PathBuf>,
    /// Concat list already written by the caller
    pub list_file: PathBuf,
    /// FFMETADATA chapter sheet, when the output has markers
    pub chapters: Option<PathBuf>,
    pub output: PathBuf,
}

/// Encoder process execution
#[async_trait]
pub trait ExecutePort: Send + Sync {
    /// Run one encode pass. Success only means the process ran; callers
    /// check the produced file.
    async fn encode_segment(&self, request: &EncodeRequest) -> ReplayResult<()>;

    /// Join segments into the final container without re-encoding
    async fn concat_segments(&self, request: &ConcatRequest) -> ReplayResult<()>;
}
