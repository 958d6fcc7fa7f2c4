//! Standalone cleanup: remove rows a previous run seeded.

use serde::Serialize;
use simm_core::{AccessId, LibraryName, RunConfig};
use simm_db::{Gateway, SqlClient};

use crate::error::WorkflowError;
use crate::inspect::inspect_library;
use crate::pipeline::{datetime_keys, input_files};

#[derive(Debug, Clone, Serialize)]
pub struct CleanupSummary {
    pub library: LibraryName,
    pub tables: Vec<String>,
    pub keys: usize,
    pub rows_deleted: u64,
    pub deactivated: Option<AccessId>,
}

/// Delete the rows keyed by the configured input files, then deactivate
/// `access` when one is given.
pub fn run_cleanup<C: SqlClient>(
    config: &RunConfig,
    gateway: &Gateway<C>,
    access: Option<AccessId>,
) -> Result<CleanupSummary, WorkflowError> {
    let files = input_files(config)?;
    let profile = inspect_library(&config.env, &config.library)?.profile;

    let (keys, rows_deleted) = match datetime_keys(config, &files)? {
        Some(keys) => {
            let deleted =
                gateway.delete_rows(&profile.tables, &keys, config.ne_name.as_deref())?;
            (keys.len(), deleted)
        }
        None => {
            tracing::warn!(
                library = %config.library,
                "run file has no DATETIME spec; no rows to delete"
            );
            (0, 0)
        }
    };

    if let Some(id) = access {
        gateway.deactivate_access(id)?;
    }

    Ok(CleanupSummary {
        library: config.library.clone(),
        tables: profile.tables.iter().map(ToString::to_string).collect(),
        keys,
        rows_deleted,
        deactivated: access,
    })
}
