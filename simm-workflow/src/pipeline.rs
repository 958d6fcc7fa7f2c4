//! The simulation run.
//!
//! ```text
//! validate_inputs → create_access → parse_config → extract_keys
//!   → delete_existing_rows → start_daemon → wait_daemon_ready
//!   → copy_raw_data → wait_queue_drain → wait_work_dir_drain
//!   → stop_daemon → cleanup
//! ```
//!
//! Every stage is a precondition for the next; the first failure ends the
//! run. Once the engine is up, a failure still stops it before the error is
//! returned. The engine child lives on its own task; this task only talks
//! to it through the connect log and the shared directories.

use std::fs;
use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use simm_core::{Access, AccessId, DatetimeKeys, DblProfile, LibraryName, RunConfig};
use simm_daemon::{
    find, paths, poll, scan_log, terminate, truncate_log, DaemonError, EngineHandle, EngineSpec,
    LogMarkers, LogState, PollSettings, ProcessInspector, TerminateStatus,
};
use simm_db::{Gateway, SqlClient};
use simm_parser::ExtractOptions;

use crate::error::{io_err, WorkflowError};
use crate::inspect::inspect_library;
use crate::seed::seed_queue;
use crate::stage::{Stage, StageOutcome, StageTiming};

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Result of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub library: LibraryName,
    pub access_name: String,
    pub access_id: AccessId,
    /// `false` when an existing access was reused.
    pub access_created: bool,
    pub tables: Vec<String>,
    pub batch_every: Option<u64>,
    pub keys: usize,
    pub files_seeded: usize,
    pub rows_deleted_before: u64,
    /// Set only when cleanup ran with DATETIME keys.
    pub rows_deleted_after: Option<u64>,
    /// Only an access this run created is ever deactivated.
    pub access_deactivated: bool,
    /// Leftovers in the dbl error directories.
    pub error_files: Vec<PathBuf>,
    pub stages: Vec<StageTiming>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u128,
}

// ---------------------------------------------------------------------------
// Stage bookkeeping
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StageLog {
    rows: Vec<StageTiming>,
}

impl StageLog {
    fn sync<T>(
        &mut self,
        stage: Stage,
        f: impl FnOnce() -> Result<T, WorkflowError>,
    ) -> Result<T, WorkflowError> {
        let start = Self::begin(stage);
        let result = f();
        self.finish(stage, start, result)
    }

    async fn run<T>(
        &mut self,
        stage: Stage,
        fut: impl Future<Output = Result<T, WorkflowError>>,
    ) -> Result<T, WorkflowError> {
        let start = Self::begin(stage);
        let result = fut.await;
        self.finish(stage, start, result)
    }

    fn skip(&mut self, stage: Stage, reason: &str) {
        tracing::info!(stage = %stage, reason, "stage skipped");
        self.rows.push(StageTiming {
            stage,
            outcome: StageOutcome::Skipped,
            duration_ms: 0,
        });
    }

    fn begin(stage: Stage) -> Instant {
        tracing::info!(stage = %stage, "stage started");
        Instant::now()
    }

    fn finish<T>(
        &mut self,
        stage: Stage,
        start: Instant,
        result: Result<T, WorkflowError>,
    ) -> Result<T, WorkflowError> {
        let duration_ms = start.elapsed().as_millis();
        match result {
            Ok(value) => {
                tracing::info!(stage = %stage, duration_ms = duration_ms as u64, "stage completed");
                self.rows.push(StageTiming {
                    stage,
                    outcome: StageOutcome::Completed,
                    duration_ms,
                });
                Ok(value)
            }
            Err(err) => {
                tracing::error!(stage = %stage, error = %err, "stage failed");
                Err(WorkflowError::StageFailed {
                    stage,
                    source: Box::new(err),
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Input files matching the mask; errors when the directory is missing or
/// nothing matches.
pub(crate) fn input_files(config: &RunConfig) -> Result<Vec<PathBuf>, WorkflowError> {
    if !config.input_dir.is_dir() {
        return Err(WorkflowError::InputDirMissing {
            path: config.input_dir.clone(),
        });
    }
    let files = config
        .mask
        .matching_files(&config.input_dir)
        .map_err(|e| io_err(&config.input_dir, e))?;
    if files.is_empty() {
        return Err(WorkflowError::NoInputFiles {
            dir: config.input_dir.clone(),
            mask: config.mask.to_string(),
        });
    }
    Ok(files)
}

/// DATETIME keys of `files`, or `None` when the run has no DATETIME spec.
pub(crate) fn datetime_keys(
    config: &RunConfig,
    files: &[PathBuf],
) -> Result<Option<DatetimeKeys>, WorkflowError> {
    let Some(spec) = &config.datetime else {
        return Ok(None);
    };
    let options = ExtractOptions {
        delimiter: &config.delimiter,
        post_tag: config.post_tag.as_deref(),
    };
    Ok(Some(simm_parser::extract_keys(spec, files, &options)?))
}

struct EngineIdentity {
    program: PathBuf,
    fragment: String,
    instance: String,
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

pub struct Workflow<'a, C, I> {
    config: &'a RunConfig,
    gateway: Gateway<C>,
    inspector: I,
    settings: PollSettings,
    markers: LogMarkers,
}

impl<'a, C: SqlClient, I: ProcessInspector> Workflow<'a, C, I> {
    pub fn new(config: &'a RunConfig, gateway: Gateway<C>, inspector: I) -> Self {
        Self {
            config,
            gateway,
            inspector,
            settings: PollSettings::default(),
            markers: LogMarkers::default(),
        }
    }

    pub fn with_settings(mut self, settings: PollSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_markers(mut self, markers: LogMarkers) -> Self {
        self.markers = markers;
        self
    }

    pub fn gateway(&self) -> &Gateway<C> {
        &self.gateway
    }

    /// Run every stage in order.
    pub async fn run(&self) -> Result<RunSummary, WorkflowError> {
        let cfg = self.config;
        let started_at = Utc::now();
        let clock = Instant::now();
        let mut log = StageLog::default();
        tracing::info!(
            library = %cfg.library,
            access = %cfg.access_name,
            "simulation run starting"
        );

        let files = log.sync(Stage::ValidateInputs, || self.validate_inputs())?;
        let (access, created) = log.sync(Stage::CreateAccess, || self.create_access())?;
        let profile = log.sync(Stage::ParseConfig, || self.parse_config())?;

        let keys = if cfg.datetime.is_some() {
            log.sync(Stage::ExtractKeys, || datetime_keys(cfg, &files))?
        } else {
            log.skip(Stage::ExtractKeys, "no DATETIME spec");
            None
        };

        let rows_deleted_before = match &keys {
            Some(keys) => log.sync(Stage::DeleteExistingRows, || {
                Ok(self
                    .gateway
                    .delete_rows(&profile.tables, keys, cfg.ne_name.as_deref())?)
            })?,
            None => {
                log.skip(Stage::DeleteExistingRows, "no DATETIME keys");
                0
            }
        };

        let engine = log.run(Stage::StartDaemon, self.start_daemon(access)).await?;
        let (files_seeded, error_files) = self
            .serve(&mut log, engine, &files, &profile, access)
            .await?;

        let (rows_deleted_after, access_deactivated) = if cfg.cleanup {
            log.sync(Stage::Cleanup, || {
                self.cleanup(&profile, keys.as_ref(), access, created)
            })?
        } else {
            log.skip(Stage::Cleanup, "not requested");
            (None, false)
        };

        let summary = RunSummary {
            library: cfg.library.clone(),
            access_name: cfg.access_name.clone(),
            access_id: access,
            access_created: created,
            tables: profile.tables.iter().map(ToString::to_string).collect(),
            batch_every: profile.batch_every,
            keys: keys.as_ref().map_or(0, DatetimeKeys::len),
            files_seeded,
            rows_deleted_before,
            rows_deleted_after,
            access_deactivated,
            error_files,
            stages: log.rows,
            started_at,
            duration_ms: clock.elapsed().as_millis(),
        };
        tracing::info!(
            library = %summary.library,
            access_id = %summary.access_id,
            files = summary.files_seeded,
            duration_ms = summary.duration_ms as u64,
            "simulation run finished"
        );
        Ok(summary)
    }

    // -----------------------------------------------------------------------
    // Stages
    // -----------------------------------------------------------------------

    fn validate_inputs(&self) -> Result<Vec<PathBuf>, WorkflowError> {
        let cfg = self.config;
        let files = input_files(cfg)?;

        let script = paths::connect_script(&cfg.env.mediation_home, &cfg.library);
        if !script.is_file() {
            return Err(WorkflowError::ConnectScriptMissing { path: script });
        }
        if !self.gateway.library_exists(&cfg.library)? {
            return Err(WorkflowError::UnknownLibrary {
                library: cfg.library.clone(),
            });
        }
        tracing::info!(files = files.len(), dir = %cfg.input_dir.display(), "inputs validated");
        Ok(files)
    }

    fn create_access(&self) -> Result<(AccessId, bool), WorkflowError> {
        let cfg = self.config;
        let queue = paths::queue_dir(&cfg.env.mediation_data, &cfg.library);
        fs::create_dir_all(&queue).map_err(|e| io_err(&queue, e))?;

        if let Some(id) = cfg.access_override {
            tracing::info!(id = %id, "reusing existing access");
            return Ok((id, false));
        }

        let access = Access {
            name: cfg.access_name.clone(),
            library: cfg.library.clone(),
            local_dir: queue,
            file_mask: cfg.mask.as_str().to_string(),
            cycle_interval_secs: cfg.cycle_interval_secs,
            retry_on_error: cfg.retry_on_error,
            keep_processed: false,
        };
        Ok((self.gateway.provision_access(&access)?, true))
    }

    fn parse_config(&self) -> Result<DblProfile, WorkflowError> {
        let cfg = self.config;
        let mut profile = inspect_library(&cfg.env, &cfg.library)?.profile;
        if let Some(secs) = cfg.dbl_time {
            tracing::info!(
                dbl = ?profile.batch_every,
                override_secs = secs,
                "batch interval overridden"
            );
            profile.batch_every = Some(secs);
        }
        Ok(profile)
    }

    fn engine_identity(&self) -> EngineIdentity {
        let program = paths::engine_binary(&self.config.env);
        EngineIdentity {
            fragment: paths::program_fragment(&program),
            instance: paths::instance_fragment(&self.config.library),
            program,
        }
    }

    fn connect_log(&self) -> PathBuf {
        paths::connect_log(&self.config.env.log_dir, &self.config.library)
    }

    async fn start_daemon(&self, access: AccessId) -> Result<EngineHandle, WorkflowError> {
        let cfg = self.config;
        let id = self.engine_identity();

        if let TerminateStatus::Terminated { pids } =
            terminate(&self.inspector, &id.fragment, &id.instance)
        {
            tracing::warn!(?pids, instance = %id.instance, "stopped stale engine instance");
            tokio::time::sleep(self.settings.settle).await;
            let survivors: Vec<u32> = find(&self.inspector, &id.fragment, &id.instance)
                .into_iter()
                .map(|p| p.pid)
                .collect();
            if !survivors.is_empty() {
                return Err(DaemonError::StillRunning {
                    instance: id.instance,
                    pids: survivors,
                }
                .into());
            }
        }

        let log = self.connect_log();
        truncate_log(&log)?;
        let spec = EngineSpec {
            program: id.program,
            connect_script: paths::connect_script(&cfg.env.mediation_home, &cfg.library),
            access,
            log,
        };
        Ok(EngineHandle::spawn(&spec)?)
    }

    /// Stages that run while the engine is up. The engine is stopped on
    /// every path out.
    async fn serve(
        &self,
        log: &mut StageLog,
        engine: EngineHandle,
        files: &[PathBuf],
        profile: &DblProfile,
        access: AccessId,
    ) -> Result<(usize, Vec<PathBuf>), WorkflowError> {
        let outcome = self.drive(log, &engine, files, profile, access).await;
        match outcome {
            Ok(outcome) => {
                log.run(Stage::StopDaemon, self.stop_daemon(engine)).await?;
                Ok(outcome)
            }
            Err(err) => {
                tracing::warn!(pid = ?engine.pid(), "stopping engine after failure");
                if let Err(stop_err) = engine.stop(Duration::ZERO).await {
                    tracing::warn!(error = %stop_err, "engine stop failed");
                }
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        log: &mut StageLog,
        engine: &EngineHandle,
        files: &[PathBuf],
        profile: &DblProfile,
        access: AccessId,
    ) -> Result<(usize, Vec<PathBuf>), WorkflowError> {
        let cfg = self.config;
        let queue = paths::queue_dir(&cfg.env.mediation_data, &cfg.library);
        let suffix = format!(".{access}");

        log.run(Stage::WaitDaemonReady, self.wait_daemon_ready(engine))
            .await?;
        let seeded = log.sync(Stage::CopyRawData, || seed_queue(files, &queue))?;

        let settle = self.settings.settle + Duration::from_secs(profile.batch_every.unwrap_or(0));
        log.run(Stage::WaitQueueDrain, async {
            poll::wait_queue_drain(&queue, &cfg.mask, self.settings.interval, settle).await?;
            Ok::<_, WorkflowError>(())
        })
        .await?;

        let error_files = log
            .run(Stage::WaitWorkDirDrain, async {
                poll::wait_work_dirs_drain(&profile.work_dirs, &suffix, self.settings.interval)
                    .await?;
                let mut leftovers = Vec::new();
                for dir in &profile.error_dirs {
                    leftovers.extend(poll::files_with_suffix(dir, &suffix)?);
                }
                for file in &leftovers {
                    tracing::warn!(file = %file.display(), "error file left by the engine");
                }
                Ok::<_, WorkflowError>(leftovers)
            })
            .await?;

        Ok((seeded.len(), error_files))
    }

    async fn wait_daemon_ready(&self, engine: &EngineHandle) -> Result<(), WorkflowError> {
        let log = self.connect_log();
        tokio::select! {
            biased;
            ready = poll::wait_log_ready(&log, &self.markers, self.settings.interval) => Ok(ready?),
            status = engine.exited() => {
                // The marker may have been written just before the exit.
                let content = fs::read(&log).map_err(|e| io_err(&log, e))?;
                match scan_log(&String::from_utf8_lossy(&content), &self.markers) {
                    LogState::Ready => Ok(()),
                    LogState::Fatal(line) => Err(DaemonError::EngineFatal { line }.into()),
                    LogState::Pending => Err(DaemonError::EngineExited { status }.into()),
                }
            }
        }
    }

    async fn stop_daemon(&self, engine: EngineHandle) -> Result<(), WorkflowError> {
        let id = self.engine_identity();
        match terminate(&self.inspector, &id.fragment, &id.instance) {
            TerminateStatus::Terminated { pids } => {
                tracing::info!(?pids, "terminate signal sent")
            }
            TerminateStatus::NotFound => {
                tracing::info!(instance = %id.instance, "no engine found by command line")
            }
        }
        let status = engine.stop(self.settings.stop_grace).await?;
        tracing::info!(status = %status, "engine stopped");
        Ok(())
    }

    fn cleanup(
        &self,
        profile: &DblProfile,
        keys: Option<&DatetimeKeys>,
        access: AccessId,
        created: bool,
    ) -> Result<(Option<u64>, bool), WorkflowError> {
        let deleted = match keys {
            Some(keys) => Some(self.gateway.delete_rows(
                &profile.tables,
                keys,
                self.config.ne_name.as_deref(),
            )?),
            None => None,
        };
        if !created {
            tracing::info!(id = %access, "access was reused; leaving it active");
            return Ok((deleted, false));
        }
        self.gateway.deactivate_access(access)?;
        Ok((deleted, true))
    }
}
