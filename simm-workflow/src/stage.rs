use std::fmt;

use serde::Serialize;

/// Workflow stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ValidateInputs,
    CreateAccess,
    ParseConfig,
    ExtractKeys,
    DeleteExistingRows,
    StartDaemon,
    WaitDaemonReady,
    CopyRawData,
    WaitQueueDrain,
    WaitWorkDirDrain,
    StopDaemon,
    Cleanup,
}

impl Stage {
    pub const ALL: [Stage; 12] = [
        Stage::ValidateInputs,
        Stage::CreateAccess,
        Stage::ParseConfig,
        Stage::ExtractKeys,
        Stage::DeleteExistingRows,
        Stage::StartDaemon,
        Stage::WaitDaemonReady,
        Stage::CopyRawData,
        Stage::WaitQueueDrain,
        Stage::WaitWorkDirDrain,
        Stage::StopDaemon,
        Stage::Cleanup,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::ValidateInputs => "validate_inputs",
            Stage::CreateAccess => "create_access",
            Stage::ParseConfig => "parse_config",
            Stage::ExtractKeys => "extract_keys",
            Stage::DeleteExistingRows => "delete_existing_rows",
            Stage::StartDaemon => "start_daemon",
            Stage::WaitDaemonReady => "wait_daemon_ready",
            Stage::CopyRawData => "copy_raw_data",
            Stage::WaitQueueDrain => "wait_queue_drain",
            Stage::WaitWorkDirDrain => "wait_work_dir_drain",
            Stage::StopDaemon => "stop_daemon",
            Stage::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Completed,
    Skipped,
}

/// One row of the run summary's stage table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub outcome: StageOutcome,
    pub duration_ms: u128,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_serialized_name() {
        for stage in Stage::ALL {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{stage}\""));
        }
    }
}
