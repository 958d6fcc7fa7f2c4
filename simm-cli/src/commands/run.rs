//! `simm run`: the full provisioning and readiness workflow.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use simm_core::{AccessId, RunOverrides};
use simm_daemon::{paths, PollSettings, SysinfoInspector};
use simm_workflow::{RunSummary, StageOutcome, Workflow};

use crate::logging::RunLog;

/// Arguments for `simm run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSON run file.
    #[arg(long, short = 'c', conflicts_with_all = ["input", "lib", "mask"])]
    pub config: Option<PathBuf>,

    /// Raw-data directory (flag-only form).
    #[arg(long, short = 'i', requires_all = ["lib", "mask"])]
    pub input: Option<PathBuf>,

    /// Library name (flag-only form).
    #[arg(long, short = 'l', requires = "input")]
    pub lib: Option<String>,

    /// File mask, e.g. `*.dat` (flag-only form).
    #[arg(long, short = 'm', requires = "input")]
    pub mask: Option<String>,

    /// Reuse an existing access instead of creating one.
    #[arg(long, short = 'a')]
    pub access: Option<u64>,

    /// Override the dbl batch interval, in seconds.
    #[arg(long, short = 't')]
    pub dbl_time: Option<u64>,

    /// Delete the seeded rows and deactivate the access afterwards.
    #[arg(long)]
    pub cleanup: bool,

    /// Seconds between readiness checks.
    #[arg(long, default_value_t = 10)]
    pub poll_interval: u64,

    /// Print the run summary as JSON.
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    pub fn run(self, run_log: &RunLog) -> Result<()> {
        let file = super::load_run_file(
            self.config.as_deref(),
            self.input.clone(),
            self.lib.clone(),
            self.mask.clone(),
        )?;
        let env = super::load_environment()?;
        let overrides = RunOverrides {
            access: self.access.map(AccessId),
            dbl_time: self.dbl_time,
            cleanup: self.cleanup,
        };
        let config = super::build_config(env, file, overrides)?;

        let log_path = paths::run_log(
            &config.env.log_dir,
            &config.library,
            chrono::Local::now().naive_local(),
        );
        run_log.attach(&log_path)?;
        tracing::info!(log = %log_path.display(), "run log opened");

        let settings = PollSettings {
            interval: Duration::from_secs(self.poll_interval.max(1)),
            ..PollSettings::default()
        };
        let workflow = Workflow::new(&config, super::gateway(&config.env), SysinfoInspector::new())
            .with_settings(settings);

        let summary = super::runtime()?
            .block_on(workflow.run())
            .with_context(|| format!("simulation of '{}' failed", config.library))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("failed to serialize run summary")?
            );
        } else {
            print_summary(&summary);
        }
        Ok(())
    }
}

#[derive(Tabled)]
struct StageRow {
    #[tabled(rename = "stage")]
    stage: String,
    #[tabled(rename = "outcome")]
    outcome: String,
    #[tabled(rename = "duration")]
    duration: String,
}

fn print_summary(summary: &RunSummary) {
    let access = if summary.access_created {
        format!("{} (created)", summary.access_id)
    } else {
        format!("{} (reused)", summary.access_id)
    };
    println!(
        "{} '{}' via access {} {}",
        "✓".green().bold(),
        summary.library,
        summary.access_name,
        access
    );
    println!(
        "  {} files seeded, {} keys, {} rows deleted before",
        summary.files_seeded, summary.keys, summary.rows_deleted_before
    );
    if let Some(after) = summary.rows_deleted_after {
        println!("  {after} rows deleted during cleanup");
    }
    if summary.access_deactivated {
        println!("  access {} deactivated", summary.access_id);
    }
    if !summary.tables.is_empty() {
        println!("  tables: {}", summary.tables.join(", "));
    }
    for file in &summary.error_files {
        println!("  {} error file: {}", "!".yellow().bold(), file.display());
    }

    let rows: Vec<StageRow> = summary
        .stages
        .iter()
        .map(|s| StageRow {
            stage: s.stage.to_string(),
            outcome: match s.outcome {
                StageOutcome::Completed => "completed".to_string(),
                StageOutcome::Skipped => "skipped".bright_black().to_string(),
            },
            duration: format!("{:.1}s", s.duration_ms as f64 / 1000.0),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    println!("finished in {:.1}s", summary.duration_ms as f64 / 1000.0);
}
