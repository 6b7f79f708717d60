//! Configuration initialization and hierarchy management
//!
//! Tool settings resolve with the precedence CLI > environment > file >
//! defaults. Environment variables reach us through clap's `env` support,
//! so both arrive here as [`ToolOverrides`].

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::adapters::toml_config::{FileConfig, TomlConfigAdapter};
use crate::engine::ConvergenceTuning;
use crate::error::ReplayResult;
use crate::utils::logging::LogLevel;
use crate::utils::path::parent_dir;

/// Values given on the command line or through `REPLAYMAKER_*` variables
#[derive(Debug, Clone, Default)]
pub struct ToolOverrides {
    pub config_file: Option<PathBuf>,
    pub ffmpeg: Option<PathBuf>,
    pub ffprobe: Option<PathBuf>,
    pub temp_dir: Option<PathBuf>,
    pub hash_dir: Option<PathBuf>,
    pub log_level: Option<LogLevel>,
}

/// Fully resolved tool settings for one run
#[derive(Debug, Clone, PartialEq)]
pub struct ToolConfig {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub temp_dir: PathBuf,
    pub hash_dir: PathBuf,
    pub log_level: LogLevel,
    pub convergence: ConvergenceTuning,
    /// Config file that contributed, if any
    pub source: Option<PathBuf>,
}

impl ToolConfig {
    /// Built-in defaults for a build config at `build_config`
    pub fn defaults_for(build_config: &Path) -> Self {
        let base = parent_dir(build_config);
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            temp_dir: base.join("TEMP"),
            hash_dir: base.join("hashes"),
            log_level: LogLevel::Info,
            convergence: ConvergenceTuning::default(),
            source: None,
        }
    }

    fn merge_file(mut self, file: FileConfig) -> Self {
        if let Some(ffmpeg) = file.ffmpeg {
            self.ffmpeg = ffmpeg;
        }
        if let Some(ffprobe) = file.ffprobe {
            self.ffprobe = ffprobe;
        }
        if let Some(temp_dir) = file.temp_dir {
            self.temp_dir = temp_dir;
        }
        if let Some(hash_dir) = file.hash_dir {
            self.hash_dir = hash_dir;
        }
        if let Some(level) = file.log_level {
            self.log_level = level;
        }
        self.convergence = file.convergence;
        self
    }

    fn merge_overrides(mut self, overrides: &ToolOverrides) -> Self {
        if let Some(ffmpeg) = &overrides.ffmpeg {
            self.ffmpeg = ffmpeg.clone();
        }
        if let Some(ffprobe) = &overrides.ffprobe {
            self.ffprobe = ffprobe.clone();
        }
        if let Some(temp_dir) = &overrides.temp_dir {
            self.temp_dir = temp_dir.clone();
        }
        if let Some(hash_dir) = &overrides.hash_dir {
            self.hash_dir = hash_dir.clone();
        }
        if let Some(level) = overrides.log_level {
            self.log_level = level;
        }
        self
    }
}

/// Initialize configuration hierarchy following precedence: CLI > Env > File > Defaults
pub fn initialize_tool_config(build_config: &Path, overrides: &ToolOverrides) -> ReplayResult<ToolConfig> {
    let (source, file) = TomlConfigAdapter::discover(overrides.config_file.as_deref(), build_config)?;

    let mut config = ToolConfig::defaults_for(build_config)
        .merge_file(file)
        .merge_overrides(overrides);
    config.convergence.validate()?;
    config.source = source;
    Ok(config)
}

/// Log where the settings came from, once logging is up
pub fn report_tool_config(config: &ToolConfig) {
    match &config.source {
        Some(path) => info!("Loaded tool settings from {}", path.display()),
        None => debug!("No tool settings file found, using defaults"),
    }
    debug!(
        "ffmpeg: {}, ffprobe: {}, temp: {}, hashes: {}",
        config.ffmpeg.display(),
        config.ffprobe.display(),
        config.temp_dir.display(),
        config.hash_dir.display()
    );
    debug!(
        "Size window {} - {} bytes, {} attempts",
        config.convergence.min_output_bytes, config.convergence.max_output_bytes, config.convergence.max_attempts
    );
}
