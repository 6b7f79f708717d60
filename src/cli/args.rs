//! Command-line argument definitions

use clap::{Args, ValueEnum};
use std::path::PathBuf;

/// External tool and directory overrides shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct ToolArgs {
    /// ffmpeg executable
    #[arg(long, env = "REPLAYMAKER_FFMPEG")]
    pub ffmpeg: Option<PathBuf>,

    /// ffprobe executable
    #[arg(long, env = "REPLAYMAKER_FFPROBE")]
    pub ffprobe: Option<PathBuf>,

    /// Folder for per-output working directories
    #[arg(long, env = "REPLAYMAKER_TEMP_DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Folder for build cache records
    #[arg(long, env = "REPLAYMAKER_HASH_DIR")]
    pub hash_dir: Option<PathBuf>,
}

/// Arguments for the build command
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Build config file
    #[arg(short, long, default_value = "timestamps.txt")]
    pub input: PathBuf,

    /// Encode outputs instead of only listing them
    #[arg(short, long)]
    pub encode: bool,

    /// Two-pass encoding
    #[arg(short = '2', long)]
    pub two_pass: bool,

    /// Raw mode: single pass with the raw command, no size target
    #[arg(short, long)]
    pub raw: bool,

    /// Move inputs into the $moveFolder once no later output needs them
    #[arg(short, long)]
    pub move_files: bool,

    /// Keep working directories after each output
    #[arg(short, long)]
    pub keep_temp: bool,

    /// Run encoders at high priority
    #[arg(long, conflicts_with = "below_normal")]
    pub high: bool,

    /// Run encoders below normal priority
    #[arg(long)]
    pub below_normal: bool,

    /// Pin encoders to CPUs START..END (END exclusive)
    #[arg(short, long, num_args = 2, value_names = ["START", "END"], value_parser = cpu_index)]
    pub cpus: Option<Vec<usize>>,

    #[command(flatten)]
    pub tools: ToolArgs,
}

/// Plan output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlanFormat {
    Text,
    Json,
    Yaml,
}

/// Arguments for the plan command
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Build config file
    #[arg(short, long, default_value = "timestamps.txt")]
    pub input: PathBuf,

    /// Plan the raw variant
    #[arg(short, long)]
    pub raw: bool,

    /// Plan as an encoding run would, leaving out opposite-mode outputs
    #[arg(long)]
    pub encode: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: PlanFormat,

    #[command(flatten)]
    pub tools: ToolArgs,
}

fn cpu_index(value: &str) -> Result<usize, String> {
    clap_num::number_range(value, 0, 1023)
}
