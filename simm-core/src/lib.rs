//! simm core library: domain types, run configuration, errors.
//!
//! Public API surface:
//! - [`types`]: newtypes and domain structs (access, dbl profile, keys)
//! - [`config`]: environment + JSON run configuration
//! - [`mask`]: shell-style file masks
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod mask;
pub mod types;

pub use config::{
    DatetimeSource, DatetimeSpec, DbCredentials, Environment, RunConfig, RunOverrides,
    SimulationFile, Transform,
};
pub use error::ConfigError;
pub use mask::FileMask;
pub use types::{Access, AccessId, DatetimeKeys, DblProfile, LibraryName, TableRef};
