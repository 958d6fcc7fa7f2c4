//! Connect-script scraping.
//!
//! The connect language itself is opaque to us. All we need is the dbl
//! profile the script loads, which always appears as a quoted file name
//! ending in `.dbl`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{io_err, ParseError};

/// Substring that identifies the dbl reference line.
pub const DBL_REFERENCE_MARKER: &str = ".dbl";

/// Return the first quoted token containing [`DBL_REFERENCE_MARKER`].
///
/// Lines are scanned in order; a marker line without a quoted token is
/// skipped. Scanning stops at the first hit.
pub fn find_dbl_reference(content: &str) -> Option<String> {
    content
        .lines()
        .filter(|line| line.contains(DBL_REFERENCE_MARKER))
        .find_map(|line| {
            quoted_tokens(line)
                .into_iter()
                .find(|token| token.contains(DBL_REFERENCE_MARKER))
                .map(str::to_string)
        })
}

/// Read `connect_script` and resolve its dbl reference to a path.
///
/// Relative references are taken relative to the script's directory.
pub fn resolve_dbl_path(connect_script: &Path) -> Result<PathBuf, ParseError> {
    let content = fs::read_to_string(connect_script).map_err(|e| io_err(connect_script, e))?;
    let reference =
        find_dbl_reference(&content).ok_or_else(|| ParseError::DblReferenceNotFound {
            script: connect_script.to_path_buf(),
        })?;

    let reference = PathBuf::from(reference);
    if reference.is_absolute() {
        return Ok(reference);
    }
    let base = connect_script.parent().unwrap_or_else(|| Path::new("."));
    Ok(base.join(reference))
}

/// Contents of every `"..."` / `'...'` pair on the line. Unterminated quotes
/// are ignored.
fn quoted_tokens(line: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut rest = line;
    while let Some(open) = rest.find(|c: char| c == '"' || c == '\'') {
        let quote = rest[open..].chars().next().unwrap_or('"');
        let after = &rest[open + 1..];
        match after.find(quote) {
            Some(close) => {
                tokens.push(&after[..close]);
                rest = &after[close + 1..];
            }
            None => break,
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn finds_double_quoted_reference() {
        let script = "init();\nload_profile(\"gsm_bss.dbl\", 1);\nload_profile(\"other.dbl\");\n";
        assert_eq!(find_dbl_reference(script).as_deref(), Some("gsm_bss.dbl"));
    }

    #[test]
    fn finds_single_quoted_reference_among_other_tokens() {
        let script = "use 'common' with 'cfg/umts.dbl' mode 'fast'";
        assert_eq!(find_dbl_reference(script).as_deref(), Some("cfg/umts.dbl"));
    }

    #[test]
    fn skips_marker_lines_without_quotes() {
        let script = "# see gsm.dbl for details\nprofile = \"gsm.dbl\"\n";
        assert_eq!(find_dbl_reference(script).as_deref(), Some("gsm.dbl"));
    }

    #[test]
    fn none_when_no_reference() {
        assert_eq!(find_dbl_reference("connect();\n\"x.cfg\"\n"), None);
        assert_eq!(find_dbl_reference("open(\"broken.dbl)"), None);
    }

    #[test]
    fn resolve_relative_to_script_directory() {
        let dir = TempDir::new().expect("tempdir");
        let script = dir.path().join("gsm_bss.connect");
        std::fs::write(&script, "profile \"profiles/gsm_bss.dbl\"\n").unwrap();

        let resolved = resolve_dbl_path(&script).expect("resolve");
        assert_eq!(resolved, dir.path().join("profiles/gsm_bss.dbl"));
    }

    #[test]
    fn resolve_reports_missing_reference() {
        let dir = TempDir::new().expect("tempdir");
        let script = dir.path().join("empty.connect");
        std::fs::write(&script, "nothing here\n").unwrap();

        assert!(matches!(
            resolve_dbl_path(&script),
            Err(ParseError::DblReferenceNotFound { .. })
        ));
    }
}
