//! Error types for simm-parser.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("connect script {script} does not reference a dbl file")]
    DblReferenceNotFound { script: PathBuf },

    /// None of the raw-data files yielded a parseable timestamp.
    #[error("no DATETIME keys could be extracted from {files} raw-data file(s)")]
    NoDatetimeKeys { files: usize },
}

/// Convenience constructor for [`ParseError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ParseError {
    ParseError::Io {
        path: path.into(),
        source,
    }
}
