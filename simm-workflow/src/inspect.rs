//! Library resolution: connect script → dbl file → profile.

use std::path::PathBuf;

use serde::Serialize;
use simm_core::{DblProfile, Environment, LibraryName};
use simm_daemon::paths;

use crate::error::WorkflowError;

/// Everything the vendor files say about one library.
#[derive(Debug, Clone, Serialize)]
pub struct LibraryReport {
    pub library: LibraryName,
    pub connect_script: PathBuf,
    pub dbl_file: PathBuf,
    pub queue_dir: PathBuf,
    pub profile: DblProfile,
}

pub fn inspect_library(
    env: &Environment,
    library: &LibraryName,
) -> Result<LibraryReport, WorkflowError> {
    let connect_script = paths::connect_script(&env.mediation_home, library);
    if !connect_script.is_file() {
        return Err(WorkflowError::ConnectScriptMissing {
            path: connect_script,
        });
    }
    let dbl_file = simm_parser::resolve_dbl_path(&connect_script)?;
    let profile = simm_parser::load_dbl(&dbl_file)?;
    tracing::info!(
        library = %library,
        dbl = %dbl_file.display(),
        tables = profile.tables.len(),
        work_dirs = profile.work_dirs.len(),
        batch_every = ?profile.batch_every,
        "dbl profile loaded"
    );

    Ok(LibraryReport {
        library: library.clone(),
        queue_dir: paths::queue_dir(&env.mediation_data, library),
        connect_script,
        dbl_file,
        profile,
    })
}
