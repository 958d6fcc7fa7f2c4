//! # simm-workflow
//!
//! The provisioning-and-readiness run that ties the other crates together.
//!
//! [`Workflow::run`] executes every [`Stage`] in order and returns a
//! [`RunSummary`]. [`run_cleanup`] and [`inspect_library`] back the
//! standalone `cleanup` and `inspect` commands.

pub mod cleanup;
pub mod error;
pub mod inspect;
pub mod pipeline;
pub mod seed;
pub mod stage;

pub use cleanup::{run_cleanup, CleanupSummary};
pub use error::WorkflowError;
pub use inspect::{inspect_library, LibraryReport};
pub use pipeline::{RunSummary, Workflow};
pub use stage::{Stage, StageOutcome, StageTiming};
