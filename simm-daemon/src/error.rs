use std::path::PathBuf;

use thiserror::Error;

/// Error surface for engine lifecycle and readiness polling.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start engine {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The connect log reported a fatal error.
    #[error("engine reported a fatal error: {line}")]
    EngineFatal { line: String },

    #[error("engine exited before becoming ready ({status})")]
    EngineExited { status: String },

    #[error("engine instance for '{instance}' still running after terminate: pids {pids:?}")]
    StillRunning { instance: String, pids: Vec<u32> },

    #[error("{task} task join failure: {reason}")]
    Join { task: &'static str, reason: String },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
