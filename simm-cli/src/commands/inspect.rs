use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use simm_core::LibraryName;
use simm_workflow::{inspect_library, LibraryReport};

/// Arguments for `simm inspect`.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Library name.
    #[arg(long, short = 'l')]
    pub lib: String,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct TableRow {
    #[tabled(rename = "profile")]
    profile: String,
    #[tabled(rename = "table")]
    table: String,
}

impl InspectArgs {
    pub fn run(self) -> Result<()> {
        let env = super::load_environment()?;
        let library = LibraryName::from(self.lib);
        let report = inspect_library(&env, &library)
            .with_context(|| format!("failed to inspect library '{library}'"))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize report")?
            );
        } else {
            print_report(&report);
        }
        Ok(())
    }
}

fn print_report(report: &LibraryReport) {
    println!("{} {}", "Library".bold(), report.library);
    println!("  connect  {}", report.connect_script.display());
    println!("  dbl      {}", report.dbl_file.display());
    println!("  queue    {}", report.queue_dir.display());
    match report.profile.batch_every {
        Some(secs) => println!("  batch    every {secs}s"),
        None => println!("  batch    {}", "none".bright_black()),
    }
    for dir in &report.profile.work_dirs {
        println!("  work     {}", dir.display());
    }
    for dir in &report.profile.error_dirs {
        println!("  error    {}", dir.display());
    }

    if report.profile.tables.is_empty() {
        println!("{}", "No target tables declared.".bright_black());
        return;
    }
    let rows: Vec<TableRow> = report
        .profile
        .tables
        .iter()
        .map(|t| TableRow {
            profile: t.profile.clone(),
            table: t.table.clone(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}
