// TOML config adapter - Tool settings read from replaymaker.toml

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::engine::ConvergenceTuning;
use crate::error::{ReplayError, ReplayResult};
use crate::utils::logging::LogLevel;
use crate::utils::path::parent_dir;

pub const CONFIG_FILE_NAME: &str = "replaymaker.toml";

/// Contents of the `[replaymaker]` table. Relative paths are resolved
/// against the file's folder on load.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub ffmpeg: Option<PathBuf>,
    pub ffprobe: Option<PathBuf>,
    pub temp_dir: Option<PathBuf>,
    pub hash_dir: Option<PathBuf>,
    pub log_level: Option<LogLevel>,
    pub convergence: ConvergenceTuning,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigRoot {
    #[serde(default)]
    replaymaker: FileConfig,
}

/// TOML configuration adapter
pub struct TomlConfigAdapter;

impl TomlConfigAdapter {
    /// Parse config text; `base` anchors relative directories
    pub fn parse(text: &str, base: &Path) -> ReplayResult<FileConfig> {
        let root: ConfigRoot = toml::from_str(text).map_err(|e| ReplayError::Config {
            message: format!("invalid TOML: {}", e),
        })?;
        let mut config = root.replaymaker;
        for dir in [&mut config.temp_dir, &mut config.hash_dir].into_iter().flatten() {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> ReplayResult<FileConfig> {
        let text = std::fs::read_to_string(path).map_err(|e| ReplayError::Config {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        Self::parse(&text, &parent_dir(path)).map_err(|e| match e {
            ReplayError::Config { message } => ReplayError::Config {
                message: format!("{}: {}", path.display(), message),
            },
            other => other,
        })
    }

    /// Explicit file if given, else `replaymaker.toml` next to the build
    /// config, else in the working directory. Returns the file used.
    pub fn discover(explicit: Option<&Path>, build_config: &Path) -> ReplayResult<(Option<PathBuf>, FileConfig)> {
        if let Some(path) = explicit {
            return Ok((Some(path.to_path_buf()), Self::load(path)?));
        }

        let candidates = [parent_dir(build_config).join(CONFIG_FILE_NAME), PathBuf::from(CONFIG_FILE_NAME)];
        match candidates.into_iter().find(|p| p.is_file()) {
            Some(path) => {
                let config = Self::load(&path)?;
                Ok((Some(path), config))
            }
            None => Ok((None, FileConfig::default())),
        }
    }
}
