//! Raw builds: every segment encoded once with its command fragments only

use std::path::PathBuf;
use tracing::{debug, info};

use super::{clear_stale, ensure_produced, SegmentJob};
use crate::error::ReplayResult;
use crate::ports::{EncodeRequest, ExecutePort, RateControl};

pub struct RawEncoder<'a> {
    execute: &'a dyn ExecutePort,
}

impl<'a> RawEncoder<'a> {
    pub fn new(execute: &'a dyn ExecutePort) -> Self {
        Self { execute }
    }

    /// Encode each job in order, returning the produced segment files
    pub async fn run(&self, output_name: &str, jobs: &[SegmentJob]) -> ReplayResult<Vec<PathBuf>> {
        info!("{}: encoding {} raw segment(s)", output_name, jobs.len());
        let mut files = Vec::with_capacity(jobs.len());

        for job in jobs {
            let request = EncodeRequest {
                source: job.segment.source.clone(),
                range: job.segment.range,
                fragments: job.fragments(&[]),
                rate: RateControl::Unconstrained,
                output: job.output.clone(),
                size_ceiling: None,
            };
            clear_stale(&job.output).await?;
            self.execute.encode_segment(&request).await?;
            let size = ensure_produced(&job.output, output_name).await?;
            debug!("{}: segment {} is {} bytes", output_name, job.output.display(), size);
            files.push(job.output.clone());
        }

        Ok(files)
    }
}
