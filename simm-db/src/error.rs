//! Error types for simm-db.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from database operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// The SQL client could not be started or fed.
    #[error("failed to run SQL client {program}: {source}")]
    Client {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The client reported an error; `statement` is truncated for logging.
    #[error("database statement failed: {statement}\n{output}")]
    Statement { statement: String, output: String },

    /// The statement ran but its output was not what we asked for.
    #[error("unexpected output for statement: {statement}\n{output}")]
    UnexpectedOutput { statement: String, output: String },

    #[error("invalid SQL identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("statement references bind :{index} but only {provided} value(s) were given")]
    MissingBind { index: usize, provided: usize },

    #[error("access '{name}' not found after creation")]
    AccessNotFound { name: String },
}
