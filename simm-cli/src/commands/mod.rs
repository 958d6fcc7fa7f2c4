pub mod cleanup;
pub mod inspect;
pub mod run;
pub mod stop;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use simm_core::{Environment, RunConfig, RunOverrides, SimulationFile};
use simm_db::{Gateway, SqlPlus};

pub(crate) fn load_environment() -> Result<Environment> {
    Environment::from_env().context("incomplete environment")
}

/// Run file from `--config`, or the flag-only form.
pub(crate) fn load_run_file(
    config: Option<&Path>,
    input: Option<PathBuf>,
    lib: Option<String>,
    mask: Option<String>,
) -> Result<SimulationFile> {
    if let Some(path) = config {
        return SimulationFile::load(path)
            .with_context(|| format!("failed to load run file {}", path.display()));
    }
    match (input, lib, mask) {
        (Some(input), Some(lib), Some(mask)) => Ok(SimulationFile::from_args(input, lib, mask)),
        _ => anyhow::bail!("provide --config, or all of --input, --lib and --mask"),
    }
}

pub(crate) fn build_config(
    env: Environment,
    file: SimulationFile,
    overrides: RunOverrides,
) -> Result<RunConfig> {
    RunConfig::build(env, file, overrides).context("invalid run configuration")
}

pub(crate) fn gateway(env: &Environment) -> Gateway<SqlPlus> {
    Gateway::new(SqlPlus::new(&env.sqlplus), env.db.clone())
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")
}
