use anyhow::Result;
use clap::Args;
use colored::Colorize;

use simm_core::LibraryName;
use simm_daemon::{paths, terminate, SysinfoInspector, TerminateStatus};

/// Arguments for `simm stop`.
#[derive(Args, Debug)]
pub struct StopArgs {
    /// Library whose engine instance should be stopped.
    #[arg(long, short = 'l')]
    pub lib: String,
}

impl StopArgs {
    pub fn run(self) -> Result<()> {
        let env = super::load_environment()?;
        let library = LibraryName::from(self.lib);
        let program = paths::program_fragment(&paths::engine_binary(&env));
        let instance = paths::instance_fragment(&library);

        match terminate(&SysinfoInspector::new(), &program, &instance) {
            TerminateStatus::Terminated { pids } => {
                let pids: Vec<String> = pids.iter().map(u32::to_string).collect();
                println!(
                    "{} stopped '{}' (pid {})",
                    "✓".green().bold(),
                    library,
                    pids.join(", ")
                );
            }
            TerminateStatus::NotFound => {
                println!("{}", format!("no running engine for '{library}'").bright_black());
            }
        }
        Ok(())
    }
}
