use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDateTime;
use simm_core::{Environment, LibraryName};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(30);
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(10);

pub const ENGINE_BINARY: &str = "connect";
pub const CONNECT_SCRIPT_EXT: &str = "connect";
pub const QUEUE_SUBDIR: &str = "simm";

pub fn libraries_root(mediation_home: &Path) -> PathBuf {
    mediation_home.join("libraries")
}

pub fn library_dir(mediation_home: &Path, library: &LibraryName) -> PathBuf {
    libraries_root(mediation_home).join(library.as_str())
}

/// `<home>/libraries/<lib>/<lib>.connect`
pub fn connect_script(mediation_home: &Path, library: &LibraryName) -> PathBuf {
    library_dir(mediation_home, library).join(format!("{library}.{CONNECT_SCRIPT_EXT}"))
}

/// File-name fragment that identifies an engine instance on its command line.
pub fn instance_fragment(library: &LibraryName) -> String {
    format!("{library}.{CONNECT_SCRIPT_EXT}")
}

pub fn engine_binary(env: &Environment) -> PathBuf {
    env.engine_bin
        .clone()
        .unwrap_or_else(|| env.mediation_home.join("bin").join(ENGINE_BINARY))
}

/// Command-line fragment for the engine binary: its file name.
pub fn program_fragment(program: &Path) -> String {
    program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.to_string_lossy().into_owned())
}

/// Directory the access consumes: `<data>/<lib>/simm`.
pub fn queue_dir(mediation_data: &Path, library: &LibraryName) -> PathBuf {
    mediation_data.join(library.as_str()).join(QUEUE_SUBDIR)
}

pub fn connect_log(log_dir: &Path, library: &LibraryName) -> PathBuf {
    log_dir.join(format!("{library}.connect.log"))
}

/// `<log dir>/simm_<lib>_<YYYYmmdd_HHMMSS>.log`
pub fn run_log(log_dir: &Path, library: &LibraryName, started: NaiveDateTime) -> PathBuf {
    log_dir.join(format!(
        "simm_{library}_{}.log",
        started.format("%Y%m%d_%H%M%S")
    ))
}
