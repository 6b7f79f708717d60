//! CLI module for replay-maker
//!
//! This module handles command-line argument parsing and command execution.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::utils::logging::{LogFormat, LogLevel};

pub mod args;
pub mod commands;

pub use args::{BuildArgs, PlanArgs, PlanFormat, ToolArgs};

/// Replay Maker
///
/// Builds compilation videos from time ranges listed in a build config,
/// re-encoding each output into a target size window.
#[derive(Parser, Debug)]
#[command(name = "replaymaker")]
#[command(about = "Replay Maker - compilation videos from timestamp lists")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Logging level (RUST_LOG takes precedence)
    #[arg(long, value_enum, global = true, env = "REPLAYMAKER_LOG_LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Log output format
    #[arg(long, value_enum, default_value = "compact", global = true)]
    pub log_format: LogFormat,

    /// Shorthand for --log-level debug
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Tool settings file (default: replaymaker.toml next to the build config)
    #[arg(long, global = true, env = "REPLAYMAKER_CONFIG")]
    pub config: Option<PathBuf>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Plan outputs and, with --encode, build them
    Build(args::BuildArgs),
    /// Print the resolved build plan without encoding
    Plan(args::PlanArgs),
}

impl Cli {
    /// Level from --log-level, then --verbose
    pub fn requested_log_level(&self) -> Option<LogLevel> {
        self.log_level.or(self.verbose.then_some(LogLevel::Debug))
    }
}
