//! Dbl-profile scraping.
//!
//! A dbl file is a flat `Key=Value` listing. Only these keys matter:
//!
//! ```text
//! ProfileId=<id>        starts a profile; following tables belong to it
//! TargetTable=<table>   recorded as <id>.<table>
//! BatchEvery=<secs>     largest value wins
//! WorkDir=<dir>         BCP working directory ($VAR expanded)
//! ErrorDir=<dir>        BCP error directory ($VAR expanded)
//! ```
//!
//! Keys are case-insensitive. Everything else, including `#` and `;`
//! comments, is ignored.

use std::fs;
use std::path::{Path, PathBuf};

use simm_core::{DblProfile, TableRef};

use crate::error::{io_err, ParseError};
use crate::expand::expand_with;

/// Parse dbl content, expanding directory variables through `lookup`.
pub fn parse_dbl<F>(content: &str, lookup: F) -> DblProfile
where
    F: Fn(&str) -> Option<String>,
{
    let mut profile = DblProfile::default();
    let mut current_profile = String::new();
    let mut lexical_max: Option<String> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = unquote(value.trim());
        if value.is_empty() {
            continue;
        }

        match key.trim().to_ascii_lowercase().as_str() {
            "profileid" => {
                current_profile = value.to_string();
                if !profile.profile_ids.iter().any(|p| p == value) {
                    profile.profile_ids.push(value.to_string());
                }
            }
            "targettable" => {
                profile
                    .tables
                    .insert(TableRef::new(current_profile.clone(), value));
            }
            "batchevery" => {
                match value.parse::<u64>() {
                    Ok(secs) => {
                        profile.batch_every =
                            Some(profile.batch_every.map_or(secs, |m| m.max(secs)));
                    }
                    Err(_) => {
                        tracing::warn!(value, "ignoring non-numeric BatchEvery");
                        continue;
                    }
                }
                if lexical_max.as_deref().map_or(true, |m| value > m) {
                    lexical_max = Some(value.to_string());
                }
            }
            "workdir" => push_unique(&mut profile.work_dirs, expand_with(value, &lookup)),
            "errordir" => push_unique(&mut profile.error_dirs, expand_with(value, &lookup)),
            _ => {}
        }
    }

    let lexical = lexical_max.and_then(|v| v.parse::<u64>().ok());
    if lexical != profile.batch_every {
        tracing::warn!(
            numeric = ?profile.batch_every,
            lexical = ?lexical,
            "BatchEvery maximum differs between numeric and text comparison; using numeric",
        );
    }

    profile
}

/// Read and parse a dbl file, expanding from the process environment.
pub fn load_dbl(path: &Path) -> Result<DblProfile, ParseError> {
    let content = fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let profile = parse_dbl(&content, |name| std::env::var(name).ok());
    tracing::debug!(
        path = %path.display(),
        tables = profile.tables.len(),
        batch_every = ?profile.batch_every,
        "parsed dbl profile",
    );
    Ok(profile)
}

fn push_unique(dirs: &mut Vec<PathBuf>, dir: String) {
    let dir = PathBuf::from(dir);
    if !dirs.contains(&dir) {
        dirs.push(dir);
    }
}

fn unquote(value: &str) -> &str {
    let stripped = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')));
    stripped.unwrap_or(value).trim()
}
