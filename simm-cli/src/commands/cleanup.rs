use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use simm_core::{AccessId, RunOverrides};
use simm_workflow::run_cleanup;

/// Arguments for `simm cleanup`.
#[derive(Args, Debug)]
pub struct CleanupArgs {
    /// JSON run file of the run being cleaned up.
    #[arg(long, short = 'c')]
    pub config: PathBuf,

    /// Access to deactivate once the rows are gone.
    #[arg(long, short = 'a')]
    pub access: Option<u64>,

    /// Print the summary as JSON.
    #[arg(long)]
    pub json: bool,
}

impl CleanupArgs {
    pub fn run(self) -> Result<()> {
        let file = super::load_run_file(Some(&self.config), None, None, None)?;
        let env = super::load_environment()?;
        let config = super::build_config(env, file, RunOverrides::default())?;
        let gateway = super::gateway(&config.env);

        let summary = run_cleanup(&config, &gateway, self.access.map(AccessId))
            .with_context(|| format!("cleanup of '{}' failed", config.library))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("failed to serialize summary")?
            );
            return Ok(());
        }
        println!(
            "{} deleted {} rows for {} keys from {} tables",
            "✓".green().bold(),
            summary.rows_deleted,
            summary.keys,
            summary.tables.len()
        );
        if let Some(id) = summary.deactivated {
            println!("  access {id} deactivated");
        }
        Ok(())
    }
}
