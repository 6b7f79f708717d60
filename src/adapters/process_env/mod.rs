// Process environment adapter - Priority and CPU affinity for encoder processes

use std::ffi::OsStr;
use std::io;
use std::path::Path;
use tokio::process::{Child, Command};
use tracing::debug;

use crate::error::{ReplayError, ReplayResult};

/// Scheduling priority for encoder processes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Priority {
    #[default]
    Normal,
    High,
    BelowNormal,
}

impl Priority {
    pub fn from_flags(high: bool, below_normal: bool) -> Self {
        match (high, below_normal) {
            (true, _) => Priority::High,
            (false, true) => Priority::BelowNormal,
            _ => Priority::Normal,
        }
    }

    #[cfg(target_os = "linux")]
    fn niceness(&self) -> Option<&'static str> {
        match self {
            Priority::Normal => None,
            Priority::High => Some("-5"),
            Priority::BelowNormal => Some("10"),
        }
    }
}

/// CPUs `start..end` an encoder may run on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuRange {
    start: usize,
    end: usize,
}

impl CpuRange {
    /// Validate against the CPUs this machine has
    pub fn new(start: usize, end: usize) -> ReplayResult<Self> {
        let available = num_cpus::get();
        if start >= end || end > available {
            return Err(ReplayError::Config {
                message: format!(
                    "CPU range {}..{} is not valid on a machine with {} CPUs",
                    start, end, available
                ),
            });
        }
        Ok(Self { start, end })
    }

    /// `taskset` list syntax, inclusive
    pub fn cpu_list(&self) -> String {
        format!("{}-{}", self.start, self.end - 1)
    }

    #[cfg(any(windows, test))]
    fn mask(&self) -> usize {
        (self.start..self.end).fold(0usize, |mask, cpu| mask | (1usize << cpu))
    }
}

/// Hints applied to every spawned encoder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessHints {
    pub priority: Priority,
    pub cpus: Option<CpuRange>,
}

impl ProcessHints {
    /// Command for `program`. With `affinity` unset the CPU range is ignored.
    pub fn command(&self, program: &Path, affinity: bool) -> Command {
        let cpus = self.cpus.filter(|_| affinity);
        self.platform_command(program.as_os_str(), cpus)
    }

    #[cfg(target_os = "linux")]
    fn platform_command(&self, program: &OsStr, cpus: Option<CpuRange>) -> Command {
        let cpu_list = cpus.map(|range| range.cpu_list());
        let mut wrapper: Vec<&OsStr> = Vec::new();
        if let Some(list) = &cpu_list {
            wrapper.extend([OsStr::new("taskset"), OsStr::new("--cpu-list"), OsStr::new(list.as_str())]);
        }
        if let Some(level) = self.priority.niceness() {
            wrapper.extend([OsStr::new("nice"), OsStr::new("-n"), OsStr::new(level)]);
        }

        match wrapper.split_first() {
            Some((first, rest)) => {
                debug!("Wrapping encoder in {:?}", wrapper);
                let mut command = Command::new(first);
                command.args(rest).arg(program);
                command
            }
            None => Command::new(program),
        }
    }

    #[cfg(windows)]
    fn platform_command(&self, program: &OsStr, _cpus: Option<CpuRange>) -> Command {
        use winapi::um::winbase::{BELOW_NORMAL_PRIORITY_CLASS, HIGH_PRIORITY_CLASS};

        let mut command = Command::new(program);
        match self.priority {
            Priority::High => {
                command.creation_flags(HIGH_PRIORITY_CLASS);
            }
            Priority::BelowNormal => {
                command.creation_flags(BELOW_NORMAL_PRIORITY_CLASS);
            }
            Priority::Normal => {}
        }
        command
    }

    #[cfg(not(any(target_os = "linux", windows)))]
    fn platform_command(&self, program: &OsStr, _cpus: Option<CpuRange>) -> Command {
        if *self != ProcessHints::default() {
            debug!("Process priority and affinity are not supported on this platform");
        }
        Command::new(program)
    }

    /// Spawn `command`, pinning it to the CPU range afterwards where the
    /// platform needs that
    pub fn spawn(&self, command: &mut Command, affinity: bool) -> io::Result<Child> {
        let child = command.spawn()?;
        #[cfg(windows)]
        if affinity {
            if let (Some(range), Some(handle)) = (self.cpus, child.raw_handle()) {
                // SAFETY: the handle belongs to the child we just spawned and
                // stays open while `child` is alive.
                let pinned = unsafe { winapi::um::winbase::SetProcessAffinityMask(handle as _, range.mask()) };
                if pinned == 0 {
                    debug!("Could not set encoder CPU affinity: {}", io::Error::last_os_error());
                }
            }
        }
        #[cfg(not(windows))]
        let _ = affinity;
        Ok(child)
    }
}
