//! DATETIME key extraction from raw-data files.
//!
//! Each file yields zero or more candidate fields depending on the source:
//! the file name, the text after a tag, or a delimited column. Every field
//! goes through the optional transform and is then parsed with the chrono
//! format. Fields that do not parse are skipped.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use simm_core::{DatetimeKeys, DatetimeSource, DatetimeSpec, Transform};

use crate::error::{io_err, ParseError};

/// Run-file settings that shape field location.
#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions<'a> {
    /// Column separator for [`DatetimeSource::Column`].
    pub delimiter: &'a str,
    /// End marker for [`DatetimeSource::Tag`] fields.
    pub post_tag: Option<&'a str>,
}

impl Default for ExtractOptions<'_> {
    fn default() -> Self {
        Self {
            delimiter: ",",
            post_tag: None,
        }
    }
}

enum CompiledTransform {
    Identity,
    Slice { start: usize, end: Option<usize> },
    Regex(Regex),
}

impl CompiledTransform {
    fn compile(transform: Option<&Transform>) -> Self {
        match transform {
            None => Self::Identity,
            Some(Transform::Slice { start, end }) => Self::Slice {
                start: *start,
                end: *end,
            },
            // The run-file loader already rejected invalid patterns.
            Some(Transform::Regex(pattern)) => match Regex::new(pattern) {
                Ok(re) => Self::Regex(re),
                Err(err) => {
                    tracing::warn!(
                        pattern = %pattern,
                        error = %err,
                        "DATETIME regex rejected; using field as-is"
                    );
                    Self::Identity
                }
            },
        }
    }

    fn apply(&self, field: &str) -> Option<String> {
        match self {
            Self::Identity => Some(field.to_string()),
            Self::Slice { start, end } => {
                let len = field.chars().count();
                if *start >= len {
                    return None;
                }
                let take = end.map_or(len, |e| e.min(len)).saturating_sub(*start);
                Some(field.chars().skip(*start).take(take).collect())
            }
            Self::Regex(re) => {
                let caps = re.captures(field)?;
                caps.get(1)
                    .or_else(|| caps.get(0))
                    .map(|m| m.as_str().to_string())
            }
        }
    }
}

/// Extract keys from every file. Fails when nothing at all could be parsed.
pub fn extract_keys(
    spec: &DatetimeSpec,
    files: &[PathBuf],
    options: &ExtractOptions<'_>,
) -> Result<DatetimeKeys, ParseError> {
    let transform = CompiledTransform::compile(spec.transform.as_ref());
    let mut keys = DatetimeKeys::new();

    for file in files {
        let fields = locate_fields(&spec.source, file, options)?;
        let mut parsed = 0usize;
        for field in &fields {
            match transform
                .apply(field)
                .and_then(|text| parse_timestamp(text.trim(), &spec.format))
            {
                Some(ts) => {
                    keys.insert(ts);
                    parsed += 1;
                }
                None => {
                    tracing::debug!(
                        file = %file.display(),
                        field = %field,
                        "unparseable DATETIME field"
                    )
                }
            }
        }
        if parsed == 0 {
            tracing::warn!(
                file = %file.display(),
                candidates = fields.len(),
                "no DATETIME key found in raw-data file",
            );
        }
    }

    if keys.is_empty() {
        return Err(ParseError::NoDatetimeKeys { files: files.len() });
    }
    tracing::info!(files = files.len(), keys = keys.len(), "extracted DATETIME keys");
    Ok(keys)
}

/// Parse with `format`, accepting date-only formats as midnight.
pub fn parse_timestamp(text: &str, format: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, format)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, format)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn locate_fields(
    source: &DatetimeSource,
    file: &Path,
    options: &ExtractOptions<'_>,
) -> Result<Vec<String>, ParseError> {
    if let DatetimeSource::Filename = source {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        return Ok(vec![name]);
    }

    let bytes = fs::read(file).map_err(|e| io_err(file, e))?;
    let content = String::from_utf8_lossy(&bytes);

    let fields = match source {
        DatetimeSource::Filename => Vec::new(),
        DatetimeSource::Tag { tag } => content
            .lines()
            .filter_map(|line| {
                let start = line.find(tag.as_str())? + tag.len();
                let after = &line[start..];
                let field = match options.post_tag {
                    Some(end_marker) => after.find(end_marker).map_or(after, |end| &after[..end]),
                    None => after,
                };
                Some(field.trim().to_string())
            })
            .collect(),
        DatetimeSource::Column { index } => content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| line.split(options.delimiter).nth(*index))
            .map(|field| field.trim().to_string())
            .collect(),
    };
    Ok(fields)
}
