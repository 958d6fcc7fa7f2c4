//! Readiness pollers.
//!
//! All loops are unbounded and sleep-based. The only early exit is a fatal
//! line in the connect log.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use simm_core::FileMask;

use crate::error::{io_err, DaemonError};
use crate::paths::{DEFAULT_POLL_INTERVAL, DEFAULT_SETTLE, DEFAULT_STOP_GRACE};

pub const DEFAULT_READY_MARKER: &str = "Subscription successful";
pub const DEFAULT_FATAL_MARKER: &str = "FATAL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Delay between checks.
    pub interval: Duration,
    /// Fixed wait after the queue drains and after stale-instance cleanup.
    pub settle: Duration,
    /// How long a stopped engine may take before it is killed.
    pub stop_grace: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            settle: DEFAULT_SETTLE,
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMarkers {
    pub ready: String,
    pub fatal: String,
}

impl Default for LogMarkers {
    fn default() -> Self {
        Self {
            ready: DEFAULT_READY_MARKER.to_string(),
            fatal: DEFAULT_FATAL_MARKER.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogState {
    Pending,
    Ready,
    Fatal(String),
}

/// Classify a full log read. A fatal line wins over a ready line anywhere.
pub fn scan_log(content: &str, markers: &LogMarkers) -> LogState {
    if let Some(line) = content.lines().find(|l| l.contains(markers.fatal.as_str())) {
        return LogState::Fatal(line.trim().to_string());
    }
    if content.lines().any(|l| l.contains(markers.ready.as_str())) {
        LogState::Ready
    } else {
        LogState::Pending
    }
}

/// Wait for the engine to report a subscription in its log.
pub async fn wait_log_ready(
    log: &Path,
    markers: &LogMarkers,
    interval: Duration,
) -> Result<(), DaemonError> {
    loop {
        let state = match fs::read(log) {
            Ok(bytes) => scan_log(&String::from_utf8_lossy(&bytes), markers),
            Err(err) if err.kind() == ErrorKind::NotFound => LogState::Pending,
            Err(err) => return Err(io_err(log, err)),
        };
        match state {
            LogState::Ready => {
                tracing::info!(log = %log.display(), "engine ready");
                return Ok(());
            }
            LogState::Fatal(line) => {
                tracing::error!(log = %log.display(), line = %line, "engine reported fatal error");
                return Err(DaemonError::EngineFatal { line });
            }
            LogState::Pending => {
                tracing::debug!(log = %log.display(), "engine not ready yet");
                tokio::time::sleep(interval).await;
            }
        }
    }
}

/// Wait until no file in `dir` matches `mask`, then sleep `settle`.
pub async fn wait_queue_drain(
    dir: &Path,
    mask: &FileMask,
    interval: Duration,
    settle: Duration,
) -> Result<(), DaemonError> {
    loop {
        let remaining = match mask.matching_files(dir) {
            Ok(files) => files.len(),
            Err(err) if err.kind() == ErrorKind::NotFound => 0,
            Err(err) => return Err(io_err(dir, err)),
        };
        if remaining == 0 {
            break;
        }
        tracing::info!(dir = %dir.display(), remaining, "waiting for queue to drain");
        tokio::time::sleep(interval).await;
    }
    tracing::info!(dir = %dir.display(), settle_secs = settle.as_secs(), "queue drained; settling");
    tokio::time::sleep(settle).await;
    Ok(())
}

/// Wait until none of `dirs` holds a file whose name ends with `suffix`.
/// Missing directories count as empty.
pub async fn wait_work_dirs_drain(
    dirs: &[PathBuf],
    suffix: &str,
    interval: Duration,
) -> Result<(), DaemonError> {
    loop {
        let mut remaining = 0usize;
        for dir in dirs {
            remaining += count_with_suffix(dir, suffix)?;
        }
        if remaining == 0 {
            tracing::info!(dirs = dirs.len(), suffix, "work directories drained");
            return Ok(());
        }
        tracing::info!(remaining, suffix, "waiting for work files");
        tokio::time::sleep(interval).await;
    }
}

/// Files in `dir` whose name ends with `suffix`; zero for a missing dir.
pub fn count_with_suffix(dir: &Path, suffix: &str) -> Result<usize, DaemonError> {
    Ok(files_with_suffix(dir, suffix)?.len())
}

pub fn files_with_suffix(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>, DaemonError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(io_err(dir, err)),
    };
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if is_file && entry.file_name().to_string_lossy().ends_with(suffix) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::time::Instant;

    #[test]
    fn fatal_wins_regardless_of_order() {
        let markers = LogMarkers::default();
        assert_eq!(
            scan_log("starting\nSubscription successful\nFATAL: lost db\n", &markers),
            LogState::Fatal("FATAL: lost db".into())
        );
        assert_eq!(
            scan_log("FATAL: bad script\nSubscription successful\n", &markers),
            LogState::Fatal("FATAL: bad script".into())
        );
        assert_eq!(scan_log("Subscription successful\n", &markers), LogState::Ready);
        assert_eq!(scan_log("starting\n", &markers), LogState::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn log_ready_waits_for_marker() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("gsm.connect.log");
        let writer = {
            let log = log.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(25)).await;
                fs::write(&log, "booting\nSubscription successful\n").unwrap();
            })
        };

        let start = Instant::now();
        wait_log_ready(&log, &LogMarkers::default(), Duration::from_secs(10))
            .await
            .expect("ready");
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(30) && elapsed < Duration::from_secs(31));
        writer.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn log_fatal_fails_immediately() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("gsm.connect.log");
        fs::write(&log, "Subscription successful\nFATAL ERROR: cannot open dbl\n").unwrap();

        let start = Instant::now();
        let err = wait_log_ready(&log, &LogMarkers::default(), Duration::from_secs(10))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DaemonError::EngineFatal { ref line } if line.contains("cannot open dbl")
        ));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_queue_dir_counts_as_drained() {
        let dir = TempDir::new().unwrap();
        let mask = FileMask::new("*.dat").unwrap();
        let start = Instant::now();
        wait_queue_drain(
            &dir.path().join("missing"),
            &mask,
            Duration::from_secs(10),
            Duration::from_secs(3),
        )
        .await
        .unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn work_dirs_drain_only_counts_suffix() {
        let dir = TempDir::new().unwrap();
        let work = dir.path().join("work");
        fs::create_dir(&work).unwrap();
        fs::write(work.join("cell.bcp.8"), "").unwrap();
        let pending = work.join("cell.bcp.7");
        fs::write(&pending, "").unwrap();

        let remover = {
            let pending = pending.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(15)).await;
                fs::remove_file(&pending).unwrap();
            })
        };

        let start = Instant::now();
        let dirs = vec![work.clone(), dir.path().join("absent")];
        wait_work_dirs_drain(&dirs, ".7", Duration::from_secs(10))
            .await
            .unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(20) && elapsed < Duration::from_secs(21));
        assert!(work.join("cell.bcp.8").exists());
        remover.await.unwrap();
    }
}
