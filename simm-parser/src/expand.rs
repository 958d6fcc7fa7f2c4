//! `$VAR` / `${VAR}` expansion for directory values in vendor files.

use std::sync::OnceLock;

use regex::{Captures, Regex};

fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))")
            .expect("env reference pattern is valid")
    })
}

/// Expand references through `lookup`. Unknown variables stay verbatim.
pub fn expand_with<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    reference_pattern()
        .replace_all(input, |caps: &Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            match lookup(name) {
                Some(value) => value,
                None => {
                    tracing::warn!(variable = name, "unset variable left unexpanded");
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "MEDIATION_DATA" => Some("/data/med".to_string()),
            "LIB" => Some("gsm".to_string()),
            _ => None,
        }
    }

    #[rstest]
    #[case("$MEDIATION_DATA/work", "/data/med/work")]
    #[case("${MEDIATION_DATA}/bcp/${LIB}_err", "/data/med/bcp/gsm_err")]
    #[case("/plain/path", "/plain/path")]
    #[case("$UNKNOWN/x", "$UNKNOWN/x")]
    #[case("cost$5", "cost$5")]
    fn expansion(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(expand_with(input, lookup), expected);
    }
}
