// Build interactor - Orchestrates planning, encoding and assembly of outputs

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::app::archive::archive_inputs;
use crate::app::workspace::{stale_workspaces, Workspace};
use crate::config_initialization::ToolConfig;
use crate::domain::model::BuildMode;
use crate::engine::{initial_targets, ConvergenceEngine, RawEncoder, SegmentJob};
use crate::error::{ReplayError, ReplayResult};
use crate::kv::Document;
use crate::output::OutputWriter;
use crate::planner::{AssemblerOptions, BuildCache, BuildPlan, OutputVideo, PlanAssembler, RunLedger};
use crate::ports::{ExecutePort, ProbePort};

/// What one run should do
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub config_path: PathBuf,
    pub mode: BuildMode,
    /// Encode outputs; without it the run only lists them
    pub encode: bool,
    pub two_pass: bool,
    pub move_files: bool,
    pub keep_temp: bool,
}

impl BuildRequest {
    pub fn new(config_path: impl Into<PathBuf>, mode: BuildMode) -> Self {
        Self {
            config_path: config_path.into(),
            mode,
            encode: false,
            two_pass: false,
            move_files: false,
            keep_temp: false,
        }
    }

    fn assembler_options(&self) -> AssemblerOptions {
        AssemblerOptions {
            mode: self.mode,
            include_opposite: !self.encode,
        }
    }
}

/// An output that was abandoned
#[derive(Debug, Clone, Serialize)]
pub struct FailedOutput {
    pub name: String,
    pub reason: String,
}

/// End-of-run summary
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub built: Vec<PathBuf>,
    pub skipped: Vec<String>,
    pub listed: Vec<String>,
    pub failed: Vec<FailedOutput>,
    pub moved: Vec<PathBuf>,
    pub search_paths: Vec<PathBuf>,
}

impl RunReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn log_summary(&self) {
        info!(
            "Built {}, skipped {}, listed {}, failed {}",
            self.built.len(),
            self.skipped.len(),
            self.listed.len(),
            self.failed.len()
        );
        for failure in &self.failed {
            warn!("Failed: {} ({})", failure.name, failure.reason);
        }
        for path in &self.search_paths {
            info!("Search path: {}", path.display());
        }
    }
}

enum Outcome {
    Built(PathBuf),
    Skipped,
    Listed,
}

/// Interactor for the build use case
pub struct BuildInteractor {
    probe_port: Arc<dyn ProbePort>,
    execute_port: Arc<dyn ExecutePort>,
    config: Arc<ToolConfig>,
}

impl BuildInteractor {
    /// Create new build interactor with injected ports
    pub fn new(probe_port: Arc<dyn ProbePort>, execute_port: Arc<dyn ExecutePort>, config: Arc<ToolConfig>) -> Self {
        Self {
            probe_port,
            execute_port,
            config,
        }
    }

    fn cache(&self) -> BuildCache {
        BuildCache::new(&self.config.hash_dir)
    }

    /// Parse the build config into a plan and mark outputs the cache says
    /// are up to date
    pub async fn plan(&self, request: &BuildRequest, ledger: &mut RunLedger) -> ReplayResult<BuildPlan> {
        let root = Document::load(&request.config_path)?;
        let mut plan = PlanAssembler::new(self.probe_port.as_ref(), ledger, request.assembler_options())
            .assemble(root)
            .await?;

        let cache = self.cache();
        for output in &mut plan.outputs {
            output.skip = !cache.should_rebuild(output);
            if output.skip {
                debug!("{} is up to date", output.name);
            }
        }
        Ok(plan)
    }

    /// Handle every output of `plan` in order
    pub async fn execute(&self, request: &BuildRequest, plan: &BuildPlan, mut ledger: RunLedger) -> ReplayResult<RunReport> {
        let mut report = RunReport::default();

        if request.encode {
            let stale = stale_workspaces(&self.config.temp_dir);
            if !stale.is_empty() {
                info!(
                    "{} working director{} left over in {}",
                    stale.len(),
                    if stale.len() == 1 { "y" } else { "ies" },
                    self.config.temp_dir.display()
                );
            }
        }

        for output in &plan.outputs {
            let outcome = if output.skip {
                info!("Skipping {}: nothing changed", output.name);
                Ok(Outcome::Skipped)
            } else if !request.encode {
                Ok(Outcome::Listed)
            } else if output.segment_count() == 0 {
                warn!("Skipping {}: no time ranges", output.name);
                Ok(Outcome::Skipped)
            } else {
                self.build_output(request, output).await.map(Outcome::Built)
            };

            match outcome {
                Ok(outcome) => {
                    match outcome {
                        Outcome::Built(path) => report.built.push(path),
                        Outcome::Skipped => report.skipped.push(output.name.clone()),
                        Outcome::Listed => report.listed.push(output.name.clone()),
                    }
                    if let (true, Some(folder)) = (request.move_files, &plan.move_folder) {
                        match archive_inputs(output, &mut ledger, folder).await {
                            Ok(moved) => report.moved.extend(moved),
                            Err(e) => warn!("{}: could not move inputs: {}", output.name, e),
                        }
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("{}: {}", output.name, e);
                    report.failed.push(FailedOutput {
                        name: output.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if request.encode && !request.keep_temp {
            // only succeeds once every working directory is gone
            let _ = tokio::fs::remove_dir(&self.config.temp_dir).await;
        }
        report.search_paths = ledger.search_paths_seen().to_vec();
        Ok(report)
    }

    /// Plan, then execute
    pub async fn run(&self, request: &BuildRequest) -> ReplayResult<(BuildPlan, RunReport)> {
        let mut ledger = RunLedger::new();
        let plan = self.plan(request, &mut ledger).await?;
        let report = self.execute(request, &plan, ledger).await?;
        Ok((plan, report))
    }

    async fn build_output(&self, request: &BuildRequest, output: &OutputVideo) -> ReplayResult<PathBuf> {
        info!(
            "Building {} ({} segment(s), {})",
            output.name,
            output.segment_count(),
            output.duration()
        );
        let workspace = Workspace::prepare(&self.config.temp_dir, &output.stem()).await?;
        let result = self.encode_and_assemble(request, output, &workspace).await;
        workspace.finish(request.keep_temp).await;
        let final_path = result?;

        if let Err(e) = self.cache().record(output) {
            warn!("{}: could not write cache record: {}", output.name, e);
        }
        Ok(final_path)
    }

    async fn encode_and_assemble(&self, request: &BuildRequest, output: &OutputVideo, workspace: &Workspace) -> ReplayResult<PathBuf> {
        let execute = self.execute_port.as_ref();
        let jobs = SegmentJob::plan(output, workspace.path());

        let segments = match output.mode {
            BuildMode::Raw => RawEncoder::new(execute).run(&output.name, &jobs).await?,
            BuildMode::Encoded => {
                let tuning = &self.config.convergence;
                let targets = initial_targets(&jobs, output.settings.target_size, output.settings.audio_bitrate, tuning)?;
                let mut engine = ConvergenceEngine::new(execute, self.probe_port.as_ref(), tuning)
                    .with_two_pass(request.two_pass);
                engine.run(&output.name, &jobs, targets).await?
            }
        };

        if segments.len() != jobs.len() {
            return Err(ReplayError::EncodeFailure {
                output: output.name.clone(),
                message: format!("{} of {} segments produced", segments.len(), jobs.len()),
            });
        }

        OutputWriter::new(execute).assemble(output, &segments, workspace.path()).await
    }
}
