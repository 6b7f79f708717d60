//! Output file writer

use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::chapters::ChapterSheet;
use super::timestamps::resolve_file_times;
use crate::engine::ensure_produced;
use crate::error::{ReplayError, ReplayResult};
use crate::planner::OutputVideo;
use crate::ports::{ConcatRequest, ExecutePort};
use crate::utils::time::{format_file_size, format_system_time};

const LIST_FILE: &str = "concat.txt";
const CHAPTER_FILE: &str = "chapters.txt";

/// Joins finished segment files into the output's final path
pub struct OutputWriter<'a> {
    execute: &'a dyn ExecutePort,
}

impl<'a> OutputWriter<'a> {
    pub fn new(execute: &'a dyn ExecutePort) -> Self {
        Self { execute }
    }

    /// Write the concat list and chapter sheet into `workspace`, concatenate,
    /// then stamp file times. Returns the final path.
    pub async fn assemble(&self, output: &OutputVideo, segments: &[PathBuf], workspace: &Path) -> ReplayResult<PathBuf> {
        let final_path = output.final_path();
        info!("{}: writing {}", output.name, final_path.display());

        let list_file = workspace.join(LIST_FILE);
        tokio::fs::write(&list_file, concat_list(segments)).await?;

        let times = resolve_file_times(output)?;
        let sheet = ChapterSheet {
            markers: output.markers.clone(),
            date_encoded: Some(Local::now().format("%Y-%m-%d %H:%M:%S").to_string()),
            date_modified: times.map(|t| format_system_time(t.modified_system_time())),
        };
        let chapters = workspace.join(CHAPTER_FILE);
        tokio::fs::write(&chapters, sheet.render()).await?;

        if let Some(parent) = final_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let request = ConcatRequest {
            segments: segments.to_vec(),
            list_file,
            chapters: Some(chapters),
            output: final_path.clone(),
        };
        let produced = match self.execute.concat_segments(&request).await {
            Ok(()) => ensure_produced(&final_path, &output.name).await,
            Err(e) => Err(e),
        };
        let size = match produced {
            Ok(size) => size,
            Err(e) => {
                if tokio::fs::remove_file(&final_path).await.is_ok() {
                    warn!("{}: removed partial output {}", output.name, final_path.display());
                }
                return Err(match e {
                    failure @ ReplayError::EncodeFailure { .. } => failure,
                    other => ReplayError::EncodeFailure {
                        output: output.name.clone(),
                        message: format!("concatenation failed: {}", other),
                    },
                });
            }
        };

        if let Some(times) = times {
            times.apply(&final_path)?;
        }
        info!("{}: finished, {}", output.name, format_file_size(size));
        Ok(final_path)
    }
}

/// Concat demuxer list, one `file '...'` line per segment
pub fn concat_list(segments: &[PathBuf]) -> String {
    segments
        .iter()
        .map(|path| format!("file '{}'\n", path.to_string_lossy().replace('\'', "'\\''")))
        .collect()
}
