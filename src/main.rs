//! Replay Maker
//!
//! Builds compilation videos from a build config listing source files and
//! time ranges. Each output is re-encoded segment by segment until its size
//! lands in the target window, then the segments are joined by stream copy.
//!
//! # Usage
//!
//! ```bash
//! replaymaker plan -i timestamps.txt
//! replaymaker build -i timestamps.txt --encode
//! replaymaker build -i timestamps.txt --encode --raw --move-files
//! ```

use anyhow::Result;
use clap::Parser;

use replay_maker::cli::{commands, Cli, Commands};

/// Main entry point for the replaymaker CLI
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Build(args) => commands::build(&cli, args).await,
        Commands::Plan(args) => commands::plan(&cli, args).await,
    }
}
