//! Command implementations

use anyhow::{bail, Context, Result};
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

use crate::adapters::{CpuRange, Priority, ProcessHints};
use crate::app::{AppContainer, BuildRequest, DefaultAppContainer};
use crate::cli::args::{BuildArgs, PlanArgs, PlanFormat, ToolArgs};
use crate::cli::Cli;
use crate::config_initialization::{initialize_tool_config, report_tool_config, ToolConfig, ToolOverrides};
use crate::domain::model::BuildMode;
use crate::planner::{BuildPlan, RunLedger};
use crate::utils::logging::{LoggingConfig, LoggingSystem};

/// Resolve tool settings and start logging
fn prepare(cli: &Cli, build_config: &Path, tools: &ToolArgs) -> Result<ToolConfig> {
    let overrides = ToolOverrides {
        config_file: cli.config.clone(),
        ffmpeg: tools.ffmpeg.clone(),
        ffprobe: tools.ffprobe.clone(),
        temp_dir: tools.temp_dir.clone(),
        hash_dir: tools.hash_dir.clone(),
        log_level: cli.requested_log_level(),
    };
    let config = initialize_tool_config(build_config, &overrides).context("Failed to load tool settings")?;

    LoggingSystem::new(LoggingConfig {
        level: config.log_level,
        format: cli.log_format,
        target: false,
    })
    .initialize()?;
    report_tool_config(&config);
    Ok(config)
}

fn process_hints(args: &BuildArgs) -> Result<ProcessHints> {
    let cpus = match args.cpus.as_deref() {
        Some([start, end]) => Some(CpuRange::new(*start, *end).context("Invalid --cpus range")?),
        Some(_) => bail!("--cpus takes exactly two values"),
        None => None,
    };
    Ok(ProcessHints {
        priority: Priority::from_flags(args.high, args.below_normal),
        cpus,
    })
}

/// Execute the build command
pub async fn build(cli: &Cli, args: &BuildArgs) -> Result<()> {
    let config = prepare(cli, &args.input, &args.tools)?;
    let hints = process_hints(args)?;
    let container = DefaultAppContainer::new(config, hints);
    let interactor = container.build_interactor();

    let request = BuildRequest {
        encode: args.encode,
        two_pass: args.two_pass,
        move_files: args.move_files,
        keep_temp: args.keep_temp,
        ..BuildRequest::new(&args.input, BuildMode::from_raw_flag(args.raw))
    };

    let mut ledger = RunLedger::new();
    let plan = interactor
        .plan(&request, &mut ledger)
        .await
        .with_context(|| format!("Failed to plan {}", args.input.display()))?;
    print!("{}", render_plan(&plan));

    let report = interactor.execute(&request, &plan, ledger).await.context("Build aborted")?;
    report.log_summary();
    if report.has_failures() {
        bail!("{} output(s) failed", report.failed.len());
    }
    info!("Done");
    Ok(())
}

/// Execute the plan command
pub async fn plan(cli: &Cli, args: &PlanArgs) -> Result<()> {
    let config = prepare(cli, &args.input, &args.tools)?;
    let container = DefaultAppContainer::new(config, ProcessHints::default());
    let interactor = container.build_interactor();

    let request = BuildRequest {
        encode: args.encode,
        ..BuildRequest::new(&args.input, BuildMode::from_raw_flag(args.raw))
    };
    let mut ledger = RunLedger::new();
    let plan = interactor
        .plan(&request, &mut ledger)
        .await
        .with_context(|| format!("Failed to plan {}", args.input.display()))?;

    match args.format {
        PlanFormat::Text => print!("{}", render_plan(&plan)),
        PlanFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&plan).context("Failed to serialize plan to JSON")?
        ),
        PlanFormat::Yaml => print!(
            "{}",
            serde_yaml::to_string(&plan).context("Failed to serialize plan to YAML")?
        ),
    }
    Ok(())
}

/// Human-readable plan listing
pub fn render_plan(plan: &BuildPlan) -> String {
    let mut text = String::new();
    for output in &plan.outputs {
        let _ = writeln!(
            text,
            "{} -> {}{}",
            output.name,
            output.final_path().display(),
            if output.skip { " [SKIPPED]" } else { "" }
        );
        for input in &output.inputs {
            let _ = writeln!(text, "    {}", input.path.display());
            for range in &input.ranges {
                let _ = writeln!(text, "        {}", range);
            }
        }
        let _ = writeln!(text, "    duration {}", output.duration());
        if !output.markers.is_empty() {
            let _ = writeln!(text, "    markers:");
            for marker in &output.markers {
                if marker.start == marker.end {
                    let _ = writeln!(text, "        {} {}", marker.start, marker.name);
                } else {
                    let _ = writeln!(text, "        {} - {} {}", marker.start, marker.end, marker.name);
                }
            }
        }
    }
    if let Some(folder) = &plan.move_folder {
        let _ = writeln!(text, "move folder: {}", folder.display());
    }
    text
}
