//! Replay Maker Library
//!
//! Plans and produces compilation videos: a key/value build config is
//! resolved into output plans, each output is encoded under a size budget
//! through a bitrate convergence loop, and finished segments are joined
//! with chapter markers.

pub mod adapters;
pub mod app;
pub mod cli;
pub mod config_initialization;
pub mod domain;
pub mod engine;
pub mod error;
pub mod kv;
pub mod output;
pub mod planner;
pub mod ports;
pub mod utils;

// Re-export commonly used types
pub use domain::model::{BuildMode, Marker, MediaProbe, TimeRange, TimeSpec};
pub use error::{ReplayError, ReplayResult};
pub use planner::{BuildPlan, OutputVideo};
