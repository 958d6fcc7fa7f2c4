//! Error types for simm-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while assembling a run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A required environment variable is unset or empty.
    #[error("environment variable {key} is not set")]
    MissingEnv { key: &'static str },

    /// An environment variable is present but cannot be interpreted.
    #[error("environment variable {key} has invalid value '{value}'")]
    InvalidEnv { key: &'static str, value: String },

    /// The database password is not base64-encoded UTF-8.
    #[error("{key} is not valid base64-encoded UTF-8")]
    InvalidPassword { key: &'static str },

    /// JSON parse error on load: includes the file path.
    #[error("failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid file mask '{mask}': {reason}")]
    InvalidMask { mask: String, reason: String },

    #[error("config field '{field}' must not be empty")]
    EmptyField { field: &'static str },

    /// `dirs::home_dir()` returned `None` and no log directory was configured.
    #[error("cannot determine home directory; set SIMM_LOG_DIR")]
    HomeNotFound,
}

/// Convenience constructor for [`ConfigError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
