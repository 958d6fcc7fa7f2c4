//! Mediation engine child process.
//!
//! The engine runs on its own tokio task which owns the `Child`. The
//! orchestrator keeps an [`EngineHandle`]: a oneshot to force a kill and a
//! watch channel that reports the exit status once the child is gone.

use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use simm_core::AccessId;
use tokio::process::Command;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::error::{io_err, DaemonError};

/// How to launch one engine instance.
#[derive(Debug, Clone)]
pub struct EngineSpec {
    pub program: PathBuf,
    pub connect_script: PathBuf,
    pub access: AccessId,
    /// stdout and stderr are appended here.
    pub log: PathBuf,
}

impl EngineSpec {
    pub fn args(&self) -> Vec<OsString> {
        vec![
            self.connect_script.clone().into_os_string(),
            OsString::from("-a"),
            OsString::from(self.access.to_string()),
        ]
    }
}

/// Empty the connect log so readiness polling only sees this run.
pub fn truncate_log(path: &Path) -> Result<(), DaemonError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .map(drop)
        .map_err(|e| io_err(path, e))
}

pub struct EngineHandle {
    pid: Option<u32>,
    kill_tx: Option<oneshot::Sender<()>>,
    exit_rx: watch::Receiver<Option<String>>,
    task: JoinHandle<Result<String, DaemonError>>,
}

impl EngineHandle {
    /// Start the engine. Must be called from within a tokio runtime.
    pub fn spawn(spec: &EngineSpec) -> Result<Self, DaemonError> {
        let stdout = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&spec.log)
            .map_err(|e| io_err(&spec.log, e))?;
        let stderr = stdout.try_clone().map_err(|e| io_err(&spec.log, e))?;

        let mut child = Command::new(&spec.program)
            .args(spec.args())
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DaemonError::Spawn {
                program: spec.program.clone(),
                source,
            })?;

        let pid = child.id();
        tracing::info!(
            pid = ?pid,
            program = %spec.program.display(),
            script = %spec.connect_script.display(),
            access = %spec.access,
            "engine started"
        );

        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        let (exit_tx, exit_rx) = watch::channel(None);
        let program = spec.program.clone();

        let task = tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                _ = kill_rx => {
                    tracing::warn!(pid = ?pid, "killing engine");
                    if let Err(err) = child.start_kill() {
                        tracing::debug!(error = %err, "engine already gone");
                    }
                    child.wait().await
                }
            };
            let status = status.map_err(|e| io_err(&program, e))?.to_string();
            tracing::info!(pid = ?pid, status = %status, "engine exited");
            let _ = exit_tx.send(Some(status.clone()));
            Ok(status)
        });

        Ok(Self {
            pid,
            kill_tx: Some(kill_tx),
            exit_rx,
            task,
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Resolves with the exit status once the child has exited.
    pub async fn exited(&self) -> String {
        let mut rx = self.exit_rx.clone();
        let status = match rx.wait_for(Option::is_some).await {
            Ok(status) => status.clone().unwrap_or_default(),
            // Sender dropped without a status: the task failed to wait.
            Err(_) => "unknown".to_string(),
        };
        status
    }

    /// Wait up to `grace` for the engine to exit, then kill it.
    pub async fn stop(mut self, grace: Duration) -> Result<String, DaemonError> {
        if let Ok(joined) = tokio::time::timeout(grace, &mut self.task).await {
            return handle_join("engine", joined);
        }
        tracing::warn!(
            pid = ?self.pid,
            grace_secs = grace.as_secs(),
            "engine still running after grace period"
        );
        if let Some(kill) = self.kill_tx.take() {
            let _ = kill.send(());
        }
        handle_join("engine", self.task.await)
    }
}

pub fn handle_join<T>(
    task: &'static str,
    result: Result<Result<T, DaemonError>, tokio::task::JoinError>,
) -> Result<T, DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Join {
            task,
            reason: err.to_string(),
        }),
    }
}
