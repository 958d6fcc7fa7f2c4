//! Error types for simm-workflow.

use std::path::PathBuf;

use thiserror::Error;

use simm_core::{ConfigError, LibraryName};
use simm_daemon::DaemonError;
use simm_db::DbError;
use simm_parser::ParseError;

use crate::stage::Stage;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("database error: {0}")]
    Db(#[from] DbError),

    #[error("engine error: {0}")]
    Daemon(#[from] DaemonError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("input directory {path} does not exist")]
    InputDirMissing { path: PathBuf },

    #[error("no file in {dir} matches '{mask}'")]
    NoInputFiles { dir: PathBuf, mask: String },

    #[error("connect script {path} not found")]
    ConnectScriptMissing { path: PathBuf },

    #[error("library '{library}' is not known to the database")]
    UnknownLibrary { library: LibraryName },

    /// Wraps the first failure of a run with the stage it happened in.
    #[error("{stage} stage failed")]
    StageFailed {
        stage: Stage,
        #[source]
        source: Box<WorkflowError>,
    },
}

impl WorkflowError {
    /// The innermost error, past any stage wrapper.
    pub fn root(&self) -> &WorkflowError {
        match self {
            WorkflowError::StageFailed { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Convenience constructor for [`WorkflowError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> WorkflowError {
    WorkflowError::Io {
        path: path.into(),
        source,
    }
}
