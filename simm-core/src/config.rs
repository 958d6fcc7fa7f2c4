//! Run configuration: environment + JSON run file, assembled once.
//!
//! # Sources
//!
//! ```text
//! environment   SIMM_DB_USER, SIMM_DB_PASSWORD (base64), SIMM_DB_SID,
//!               SIMM_DB_HOST, SIMM_DB_PORT, SIMM_LOG_DIR, MEDIATION_HOME,
//!               MEDIATION_DATA, SIMM_SQLPLUS, SIMM_ENGINE_BIN
//! run file      { "library", "mask", "input_rd_path", "DATETIME", ... }
//! CLI           --access, --dbl-time, --cleanup
//! ```
//!
//! [`RunConfig::build`] folds the three into one immutable value that every
//! workflow stage borrows. Tests use [`Environment::from_lookup`] with a map
//! instead of the process environment.

use std::fmt;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use regex::Regex;
use serde::Deserialize;

use crate::error::{io_err, ConfigError};
use crate::mask::FileMask;
use crate::types::{Access, AccessId, LibraryName};

pub const ENV_DB_USER: &str = "SIMM_DB_USER";
pub const ENV_DB_PASSWORD: &str = "SIMM_DB_PASSWORD";
pub const ENV_DB_SID: &str = "SIMM_DB_SID";
pub const ENV_DB_HOST: &str = "SIMM_DB_HOST";
pub const ENV_DB_PORT: &str = "SIMM_DB_PORT";
pub const ENV_LOG_DIR: &str = "SIMM_LOG_DIR";
pub const ENV_MEDIATION_HOME: &str = "MEDIATION_HOME";
pub const ENV_MEDIATION_DATA: &str = "MEDIATION_DATA";
pub const ENV_SQLPLUS: &str = "SIMM_SQLPLUS";
pub const ENV_ENGINE_BIN: &str = "SIMM_ENGINE_BIN";

pub const DEFAULT_DB_PORT: u16 = 1521;
pub const DEFAULT_CYCLE_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_DELIMITER: &str = ",";

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Database login. The password is held decoded; `Debug` never prints it.
#[derive(Clone, PartialEq, Eq)]
pub struct DbCredentials {
    pub user: String,
    pub password: String,
    pub sid: String,
    pub host: String,
    pub port: u16,
}

impl DbCredentials {
    /// `user/password@//host:port/sid`, as accepted by SQL*Plus `CONNECT`.
    pub fn connect_string(&self) -> String {
        format!(
            "{}/\"{}\"@//{}:{}/{}",
            self.user, self.password, self.host, self.port, self.sid
        )
    }
}

impl fmt::Debug for DbCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbCredentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("sid", &self.sid)
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

/// Everything the run takes from the process environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub db: DbCredentials,
    pub log_dir: PathBuf,
    /// Platform installation root (`bin/`, `libraries/<lib>/`).
    pub mediation_home: PathBuf,
    /// Platform data root (per-library queue directories).
    pub mediation_data: PathBuf,
    /// SQL*Plus binary.
    pub sqlplus: PathBuf,
    /// Engine binary override; defaults to `<mediation_home>/bin/connect`.
    pub engine_bin: Option<PathBuf>,
}

impl Environment {
    /// Read from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read through an arbitrary lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &'static str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::MissingEnv { key });

        let password = decode_password(&required(ENV_DB_PASSWORD)?)?;
        let port = match get(ENV_DB_PORT) {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                key: ENV_DB_PORT,
                value: raw,
            })?,
            None => DEFAULT_DB_PORT,
        };

        let log_dir = match get(ENV_LOG_DIR) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::home_dir()
                .ok_or(ConfigError::HomeNotFound)?
                .join(".simm")
                .join("logs"),
        };

        Ok(Self {
            db: DbCredentials {
                user: required(ENV_DB_USER)?,
                password,
                sid: required(ENV_DB_SID)?,
                host: required(ENV_DB_HOST)?,
                port,
            },
            log_dir,
            mediation_home: PathBuf::from(required(ENV_MEDIATION_HOME)?),
            mediation_data: PathBuf::from(required(ENV_MEDIATION_DATA)?),
            sqlplus: get(ENV_SQLPLUS)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("sqlplus")),
            engine_bin: get(ENV_ENGINE_BIN).map(PathBuf::from),
        })
    }
}

fn decode_password(encoded: &str) -> Result<String, ConfigError> {
    let invalid = || ConfigError::InvalidPassword {
        key: ENV_DB_PASSWORD,
    };
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|_| invalid())?;
    String::from_utf8(bytes).map_err(|_| invalid())
}

// ---------------------------------------------------------------------------
// DATETIME extraction spec
// ---------------------------------------------------------------------------

/// Where in a raw-data file the timestamp field lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatetimeSource {
    /// The file name itself.
    Filename,
    /// Text following `tag` on any line containing it.
    Tag { tag: String },
    /// Zero-based column of each delimited line.
    Column { index: usize },
}

/// Narrows the located field down to the timestamp text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transform {
    /// Character range `[start, end)`; open-ended when `end` is absent.
    Slice {
        start: usize,
        #[serde(default)]
        end: Option<usize>,
    },
    /// Capture group 1 of the pattern, or the whole match if it has none.
    Regex(String),
}

/// How to derive one timestamp from a raw-data file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawDatetimeSpec")]
pub struct DatetimeSpec {
    pub source: DatetimeSource,
    pub transform: Option<Transform>,
    /// chrono `strftime` format for the final text.
    pub format: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum SourceKind {
    Filename,
    Tag,
    Column,
}

#[derive(Deserialize)]
struct RawDatetimeSpec {
    source: SourceKind,
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    column: Option<usize>,
    #[serde(default)]
    transform: Option<Transform>,
    format: String,
}

impl TryFrom<RawDatetimeSpec> for DatetimeSpec {
    type Error = String;

    fn try_from(raw: RawDatetimeSpec) -> Result<Self, Self::Error> {
        let source = match raw.source {
            SourceKind::Filename => DatetimeSource::Filename,
            SourceKind::Tag => match raw.tag {
                Some(tag) if !tag.is_empty() => DatetimeSource::Tag { tag },
                _ => return Err("DATETIME source 'tag' requires a non-empty \"tag\"".into()),
            },
            SourceKind::Column => match raw.column {
                Some(index) => DatetimeSource::Column { index },
                None => return Err("DATETIME source 'column' requires \"column\"".into()),
            },
        };

        match &raw.transform {
            Some(Transform::Regex(pattern)) => {
                Regex::new(pattern).map_err(|e| format!("DATETIME transform regex: {e}"))?;
            }
            Some(Transform::Slice { start, end: Some(end) }) if end <= start => {
                return Err(format!("DATETIME slice end {end} must exceed start {start}"));
            }
            _ => {}
        }

        if raw.format.trim().is_empty() {
            return Err("DATETIME \"format\" must not be empty".into());
        }

        Ok(Self {
            source,
            transform: raw.transform,
            format: raw.format,
        })
    }
}

// ---------------------------------------------------------------------------
// Run file
// ---------------------------------------------------------------------------

fn default_delimiter() -> String {
    DEFAULT_DELIMITER.to_string()
}

fn default_cycle_interval() -> u64 {
    DEFAULT_CYCLE_INTERVAL_SECS
}

fn default_true() -> bool {
    true
}

/// The JSON run file, as written by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationFile {
    pub library: String,
    pub mask: String,
    pub input_rd_path: PathBuf,
    #[serde(rename = "DATETIME", default)]
    pub datetime: Option<DatetimeSpec>,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Terminates a tagged field; the rest of the line when absent.
    #[serde(default)]
    pub post_tag: Option<String>,
    #[serde(rename = "NE_NAME", default)]
    pub ne_name: Option<String>,
    #[serde(default)]
    pub access_name: Option<String>,
    #[serde(default = "default_cycle_interval")]
    pub cycle_interval: u64,
    #[serde(default = "default_true")]
    pub retry_on_error: bool,
    /// Batch interval override in seconds.
    #[serde(default)]
    pub dbl_time: Option<u64>,
}

impl SimulationFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Run file equivalent of the flag-only invocation (no DATETIME spec).
    pub fn from_args(input_rd_path: PathBuf, library: String, mask: String) -> Self {
        Self {
            library,
            mask,
            input_rd_path,
            datetime: None,
            delimiter: default_delimiter(),
            post_tag: None,
            ne_name: None,
            access_name: None,
            cycle_interval: default_cycle_interval(),
            retry_on_error: true,
            dbl_time: None,
        }
    }
}

// ---------------------------------------------------------------------------
// RunConfig
// ---------------------------------------------------------------------------

/// Command-line adjustments layered over the run file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOverrides {
    /// Reuse this access instead of creating one.
    pub access: Option<AccessId>,
    pub dbl_time: Option<u64>,
    /// Delete seeded rows after the run and deactivate the access when
    /// this run created it.
    pub cleanup: bool,
}

/// Immutable configuration for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub env: Environment,
    pub library: LibraryName,
    pub mask: FileMask,
    pub input_dir: PathBuf,
    pub datetime: Option<DatetimeSpec>,
    pub delimiter: String,
    pub post_tag: Option<String>,
    pub ne_name: Option<String>,
    pub access_name: String,
    pub cycle_interval_secs: u64,
    pub retry_on_error: bool,
    pub access_override: Option<AccessId>,
    pub dbl_time: Option<u64>,
    pub cleanup: bool,
}

impl RunConfig {
    pub fn build(
        env: Environment,
        file: SimulationFile,
        overrides: RunOverrides,
    ) -> Result<Self, ConfigError> {
        let library = file.library.trim();
        if library.is_empty() {
            return Err(ConfigError::EmptyField { field: "library" });
        }
        if file.delimiter.is_empty() {
            return Err(ConfigError::EmptyField { field: "delimiter" });
        }
        let library = LibraryName::from(library);
        let mask = FileMask::new(&file.mask)?;
        let access_name = file
            .access_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| Access::default_name(&library));

        Ok(Self {
            env,
            library,
            mask,
            input_dir: file.input_rd_path,
            datetime: file.datetime,
            delimiter: file.delimiter,
            post_tag: file.post_tag.filter(|t| !t.is_empty()),
            ne_name: file.ne_name.filter(|n| !n.trim().is_empty()),
            access_name,
            cycle_interval_secs: file.cycle_interval,
            retry_on_error: file.retry_on_error,
            access_override: overrides.access,
            dbl_time: overrides.dbl_time.or(file.dbl_time),
            cleanup: overrides.cleanup,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
