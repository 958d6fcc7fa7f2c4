//! # simm-db
//!
//! Database gateway for access provisioning and row cleanup.
//!
//! Every statement travels through a [`SqlClient`]; production uses
//! [`SqlPlus`], which feeds a generated script to the command-line client
//! over stdin. [`Gateway`] hands out scoped [`Session`]s and implements the
//! provisioning operations on top of them.

pub mod client;
pub mod error;
pub mod gateway;
pub mod session;

pub use client::{ScriptOutput, SqlClient, SqlPlus};
pub use error::DbError;
pub use gateway::Gateway;
pub use session::{Param, Session};
