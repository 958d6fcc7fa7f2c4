//! # simm-parser
//!
//! Best-effort scrapers for the vendor files a library is described by, plus
//! timestamp extraction from raw-data files.
//!
//! - [`connect`]: find the dbl file a connect script references
//! - [`dbl`]: tables, directories and batch interval from a dbl profile
//! - [`datetime`]: [`DatetimeKeys`](simm_core::DatetimeKeys) from raw data
//! - [`expand`]: `$VAR` / `${VAR}` expansion in directory values

pub mod connect;
pub mod datetime;
pub mod dbl;
pub mod error;
pub mod expand;

pub use connect::{find_dbl_reference, resolve_dbl_path};
pub use datetime::{extract_keys, ExtractOptions};
pub use dbl::{load_dbl, parse_dbl};
pub use error::ParseError;
