//! Shell-style file masks (`*.dat`, `A?_*.csv`).
//!
//! A mask is matched against bare file names, never full paths. `*` matches
//! any run of characters, `?` exactly one; everything else is literal.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct FileMask {
    raw: String,
    regex: Regex,
}

impl FileMask {
    pub fn new(mask: &str) -> Result<Self, ConfigError> {
        let mask = mask.trim();
        if mask.is_empty() {
            return Err(ConfigError::EmptyField { field: "mask" });
        }

        let mut pattern = String::with_capacity(mask.len() + 8);
        pattern.push('^');
        for c in mask.chars() {
            match c {
                '*' => pattern.push_str(".*"),
                '?' => pattern.push('.'),
                other => pattern.push_str(&regex::escape(&other.to_string())),
            }
        }
        pattern.push('$');

        let regex = Regex::new(&pattern).map_err(|e| ConfigError::InvalidMask {
            mask: mask.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            raw: mask.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, file_name: &str) -> bool {
        self.regex.is_match(file_name)
    }

    /// Regular files directly under `dir` whose names match, sorted by path.
    ///
    /// Entries that disappear while listing are skipped.
    pub fn matching_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        for entry in fs::read_dir(dir)? {
            let Ok(entry) = entry else { continue };
            let Ok(file_type) = entry.file_type() else { continue };
            if !file_type.is_file() {
                continue;
            }
            let name = entry.file_name();
            if name.to_str().is_some_and(|n| self.matches(n)) {
                found.push(entry.path());
            }
        }
        found.sort();
        Ok(found)
    }
}

impl PartialEq for FileMask {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl std::fmt::Display for FileMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.raw.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case("*.dat", "A1.dat", true)]
    #[case("*.dat", "A1.dat.tmp", false)]
    #[case("*.dat", "A1.DAT", false)]
    #[case("A?_*.csv", "AB_2024.csv", true)]
    #[case("A?_*.csv", "ABC_2024.csv", false)]
    #[case("file.1+2", "file.1+2", true)]
    #[case("file.1+2", "fileX1+2", false)]
    fn mask_matching(#[case] mask: &str, #[case] name: &str, #[case] expected: bool) {
        let mask = FileMask::new(mask).expect("mask");
        assert_eq!(mask.matches(name), expected, "{mask} vs {name}");
    }

    #[test]
    fn empty_mask_is_rejected() {
        assert!(matches!(
            FileMask::new("  "),
            Err(ConfigError::EmptyField { field: "mask" })
        ));
    }

    #[test]
    fn matching_files_skips_directories_and_sorts() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("b.dat"), "x").unwrap();
        fs::write(dir.path().join("a.dat"), "x").unwrap();
        fs::write(dir.path().join("c.txt"), "x").unwrap();
        fs::create_dir(dir.path().join("d.dat")).unwrap();

        let mask = FileMask::new("*.dat").unwrap();
        let files = mask.matching_files(dir.path()).expect("list");
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.dat", "b.dat"]);
    }
}
