//! Domain types for the simulator.
//!
//! Everything here is transient: built once per run, never persisted by us.
//! All path fields use `PathBuf`.

use std::collections::BTreeSet;
use std::fmt;
use std::num::ParseIntError;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed mediation library name. One engine instance per library.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LibraryName(pub String);

impl LibraryName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LibraryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for LibraryName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for LibraryName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Numeric identifier the database assigns to an access on creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccessId(pub u64);

impl fmt::Display for AccessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for AccessId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

// ---------------------------------------------------------------------------
// Access
// ---------------------------------------------------------------------------

/// A data-ingestion subscription record, as handed to the creation procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Access {
    pub name: String,
    pub library: LibraryName,
    /// Directory the engine consumes raw-data files from.
    pub local_dir: PathBuf,
    pub file_mask: String,
    pub cycle_interval_secs: u64,
    pub retry_on_error: bool,
    pub keep_processed: bool,
}

impl Access {
    /// Name used when the run file does not pick one: `SIMM_<LIBRARY>`.
    pub fn default_name(library: &LibraryName) -> String {
        format!("SIMM_{}", library.0.to_ascii_uppercase())
    }
}

// ---------------------------------------------------------------------------
// Dbl profile
// ---------------------------------------------------------------------------

/// A target table qualified by the dbl profile that loads it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TableRef {
    pub profile: String,
    pub table: String,
}

impl TableRef {
    pub fn new(profile: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.profile.is_empty() {
            write!(f, "{}", self.table)
        } else {
            write!(f, "{}.{}", self.profile, self.table)
        }
    }
}

/// What a library's dbl file tells us about where its data lands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DblProfile {
    /// Profile ids in file order, deduplicated.
    pub profile_ids: Vec<String>,
    pub tables: BTreeSet<TableRef>,
    /// Largest `BatchEvery` seen, in seconds.
    pub batch_every: Option<u64>,
    pub work_dirs: Vec<PathBuf>,
    pub error_dirs: Vec<PathBuf>,
}

// ---------------------------------------------------------------------------
// Datetime keys
// ---------------------------------------------------------------------------

/// Timestamps extracted from the seeded raw-data files; scopes row deletion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatetimeKeys(BTreeSet<NaiveDateTime>);

impl DatetimeKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the key was not already present.
    pub fn insert(&mut self, key: NaiveDateTime) -> bool {
        self.0.insert(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NaiveDateTime> {
        self.0.iter()
    }

    pub fn contains(&self, key: &NaiveDateTime) -> bool {
        self.0.contains(key)
    }
}

impl FromIterator<NaiveDateTime> for DatetimeKeys {
    fn from_iter<I: IntoIterator<Item = NaiveDateTime>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn newtype_display() {
        assert_eq!(LibraryName::from("gsm_bss").to_string(), "gsm_bss");
        assert_eq!(AccessId(42).to_string(), "42");
    }

    #[test]
    fn access_id_parses_trimmed_numeric_text() {
        assert_eq!(" 1207\n".parse::<AccessId>().unwrap(), AccessId(1207));
        assert!("".parse::<AccessId>().is_err());
        assert!("12a".parse::<AccessId>().is_err());
    }

    #[test]
    fn table_ref_display_qualifies_with_profile() {
        assert_eq!(TableRef::new("P1", "T_CELL").to_string(), "P1.T_CELL");
        assert_eq!(TableRef::new("", "T_CELL").to_string(), "T_CELL");
    }

    #[test]
    fn default_access_name_is_uppercased() {
        assert_eq!(
            Access::default_name(&LibraryName::from("gsm_bss")),
            "SIMM_GSM_BSS"
        );
    }

    #[test]
    fn datetime_keys_deduplicate_and_order() {
        let keys: DatetimeKeys = [ts(3), ts(1), ts(3)].into_iter().collect();
        assert_eq!(keys.len(), 2);
        let ordered: Vec<_> = keys.iter().copied().collect();
        assert_eq!(ordered, vec![ts(1), ts(3)]);
    }
}
