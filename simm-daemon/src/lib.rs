//! Mediation engine lifecycle: process lookup, launch/stop, readiness polling.

pub mod engine;
mod error;
pub mod paths;
pub mod poll;
pub mod process;

pub use engine::{handle_join, truncate_log, EngineHandle, EngineSpec};
pub use error::DaemonError;
pub use poll::{
    scan_log, wait_log_ready, wait_queue_drain, wait_work_dirs_drain, LogMarkers, LogState,
    PollSettings,
};
pub use process::{
    find, terminate, ProcessInfo, ProcessInspector, SysinfoInspector, TerminateStatus,
};
