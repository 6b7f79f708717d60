use std::sync::Arc;

use crate::adapters::{FfmpegAdapter, FfprobeAdapter, ProcessHints};
use crate::app::build_interactor::BuildInteractor;
use crate::config_initialization::ToolConfig;
use crate::ports::{ExecutePort, ProbePort};

pub trait AppContainer: Send + Sync {
    fn build_interactor(&self) -> Arc<BuildInteractor>;
}

pub struct DefaultAppContainer {
    build_interactor: Arc<BuildInteractor>,
}

impl DefaultAppContainer {
    /// Wire the ffprobe and ffmpeg adapters named in `config`
    pub fn new(config: ToolConfig, hints: ProcessHints) -> Self {
        let probe_port = Arc::new(FfprobeAdapter::new(config.ffprobe.clone()));
        let execute_port = Arc::new(FfmpegAdapter::new(config.ffmpeg.clone(), hints));
        Self::with_ports(config, probe_port, execute_port)
    }

    /// Wire caller-supplied ports, used by tests and embedders
    pub fn with_ports(config: ToolConfig, probe_port: Arc<dyn ProbePort>, execute_port: Arc<dyn ExecutePort>) -> Self {
        let build_interactor = Arc::new(BuildInteractor::new(
            Arc::clone(&probe_port),
            Arc::clone(&execute_port),
            Arc::new(config),
        ));
        Self { build_interactor }
    }
}

impl AppContainer for DefaultAppContainer {
    fn build_interactor(&self) -> Arc<BuildInteractor> {
        Arc::clone(&self.build_interactor)
    }
}
