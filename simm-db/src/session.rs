//! Scoped database session.
//!
//! A [`Session`] is borrowed from a [`Gateway`](crate::Gateway) for one
//! logical operation. Each statement it runs is wrapped in the same prelude:
//!
//! ```text
//! CONNECT <user>/<password>@//<host>:<port>/<sid>
//! WHENEVER SQLERROR EXIT SQL.SQLCODE      -- any error ends the client non-zero
//! SET ... COLSEP '|'                      -- machine-readable rows
//! ALTER SESSION SET NLS_DATE_FORMAT = 'YYYY-MM-DD HH24:MI:SS';
//! <statement>
//! EXIT
//! ```
//!
//! Release is logged when the session drops, whichever way the caller leaves.

use chrono::NaiveDateTime;
use simm_core::DbCredentials;

use crate::client::{ScriptOutput, SqlClient};
use crate::error::DbError;

/// Session date format, in Oracle and chrono notation.
pub const NLS_DATE_FORMAT: &str = "YYYY-MM-DD HH24:MI:SS";
const CHRONO_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Prefix of the row-count line printed by [`Session::execute`].
pub const ROWS_MARKER: &str = "ROWS=";

/// Statements are cut to this many characters in errors and logs.
pub const MAX_LOGGED_STATEMENT: usize = 200;

/// A bind value for `:1`, `:2`, … placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Text(String),
    Int(u64),
    Bool(bool),
    Timestamp(NaiveDateTime),
}

impl Param {
    /// Render as an SQL literal.
    fn to_sql(&self) -> String {
        match self {
            Param::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Param::Int(n) => n.to_string(),
            Param::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            Param::Timestamp(ts) => format!(
                "TO_DATE('{}', '{NLS_DATE_FORMAT}')",
                ts.format(CHRONO_DATE_FORMAT)
            ),
        }
    }
}

impl From<&str> for Param {
    fn from(s: &str) -> Self {
        Param::Text(s.to_string())
    }
}

impl From<String> for Param {
    fn from(s: String) -> Self {
        Param::Text(s)
    }
}

impl From<u64> for Param {
    fn from(n: u64) -> Self {
        Param::Int(n)
    }
}

impl From<bool> for Param {
    fn from(b: bool) -> Self {
        Param::Bool(b)
    }
}

impl From<NaiveDateTime> for Param {
    fn from(ts: NaiveDateTime) -> Self {
        Param::Timestamp(ts)
    }
}

/// Substitute `:N` placeholders (1-based) outside string literals.
pub fn bind(sql: &str, params: &[Param]) -> Result<String, DbError> {
    let mut out = String::with_capacity(sql.len() + params.len() * 8);
    let mut chars = sql.char_indices().peekable();
    let mut in_literal = false;

    while let Some((_, c)) = chars.next() {
        if c == '\'' {
            in_literal = !in_literal;
            out.push(c);
            continue;
        }
        if c != ':' || in_literal {
            out.push(c);
            continue;
        }

        let mut digits = String::new();
        while let Some(&(_, d)) = chars.peek() {
            if !d.is_ascii_digit() {
                break;
            }
            digits.push(d);
            chars.next();
        }
        if digits.is_empty() {
            out.push(c);
            continue;
        }
        let index: usize = digits.parse().unwrap_or(0);
        let param = index
            .checked_sub(1)
            .and_then(|i| params.get(i))
            .ok_or(DbError::MissingBind {
                index,
                provided: params.len(),
            })?;
        out.push_str(&param.to_sql());
    }
    Ok(out)
}

/// Accept `NAME` or `SCHEMA.NAME` made of `[A-Za-z0-9_$#]`.
pub fn validate_identifier(name: &str) -> Result<&str, DbError> {
    let valid = !name.is_empty()
        && name.split('.').count() <= 2
        && name.split('.').all(|part| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '#'))
        });
    if valid {
        Ok(name)
    } else {
        Err(DbError::InvalidIdentifier(name.to_string()))
    }
}

pub(crate) fn truncate_statement(statement: &str) -> String {
    let flat = statement.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= MAX_LOGGED_STATEMENT {
        return flat;
    }
    let mut cut: String = flat.chars().take(MAX_LOGGED_STATEMENT).collect();
    cut.push_str("...");
    cut
}

/// One logical unit of database work.
pub struct Session<'a, C: SqlClient + ?Sized> {
    client: &'a C,
    credentials: &'a simm_core::DbCredentials,
}

impl<'a, C: SqlClient + ?Sized> Session<'a, C> {
    pub(crate) fn open(client: &'a C, credentials: &'a DbCredentials) -> Self {
        tracing::debug!(
            user = %credentials.user,
            host = %credentials.host,
            sid = %credentials.sid,
            "database session acquired"
        );
        Self {
            client,
            credentials,
        }
    }

    fn script(&self, body: &str) -> String {
        format!(
            "CONNECT {connect}\n\
             WHENEVER SQLERROR EXIT SQL.SQLCODE\n\
             WHENEVER OSERROR EXIT FAILURE\n\
             SET HEADING OFF FEEDBACK OFF PAGESIZE 0 LINESIZE 32767 VERIFY OFF ECHO OFF TAB OFF\n\
             SET TRIMOUT ON TRIMSPOOL ON SERVEROUTPUT ON\n\
             SET COLSEP '|'\n\
             ALTER SESSION SET NLS_DATE_FORMAT = '{NLS_DATE_FORMAT}';\n\
             {body}\n\
             EXIT\n",
            connect = self.credentials.connect_string(),
        )
    }

    fn run(&self, statement: &str) -> Result<String, DbError> {
        let output = self.client.run_script(&self.script(statement))?;
        check_output(statement, output)
    }

    /// Administrative call (procedure block). Output is logged line by line.
    pub fn run_admin(&self, block: &str) -> Result<String, DbError> {
        let text = self.run(block)?;
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            tracing::info!(output = line, "sql client");
        }
        Ok(text)
    }

    /// Run a `SELECT`; each output row split on the column separator.
    pub fn query(&self, sql: &str, params: &[Param]) -> Result<Vec<Vec<String>>, DbError> {
        let statement = format!("{};", bind(sql, params)?);
        let text = self.run(&statement)?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| line.split('|').map(|col| col.trim().to_string()).collect())
            .collect())
    }

    /// Run a DML statement and commit; returns the affected row count.
    pub fn execute(&self, sql: &str, params: &[Param]) -> Result<u64, DbError> {
        let bound = bind(sql, params)?;
        let block = format!(
            "BEGIN\n  {bound};\n  \
             DBMS_OUTPUT.PUT_LINE('{ROWS_MARKER}' || SQL%ROWCOUNT);\n  \
             COMMIT;\nEND;\n/"
        );
        let text = self.run(&block)?;
        text.lines()
            .find_map(|line| line.trim().strip_prefix(ROWS_MARKER))
            .and_then(|n| n.trim().parse().ok())
            .ok_or_else(|| DbError::UnexpectedOutput {
                statement: truncate_statement(&bound),
                output: text.trim().to_string(),
            })
    }
}

impl<C: SqlClient + ?Sized> Drop for Session<'_, C> {
    fn drop(&mut self) {
        tracing::debug!(host = %self.credentials.host, "database session released");
    }
}

fn check_output(statement: &str, output: ScriptOutput) -> Result<String, DbError> {
    let reported = output.text.lines().map(str::trim).any(|line| {
        line.starts_with("ORA-") || line.starts_with("SP2-") || line.starts_with("PLS-")
    });
    if output.success && !reported {
        return Ok(output.text);
    }

    let statement = truncate_statement(statement);
    tracing::error!(statement = %statement, "database statement failed");
    Err(DbError::Statement {
        statement,
        output: output.text.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rstest::rstest;
    use std::cell::RefCell;

    struct Recorder {
        scripts: RefCell<Vec<String>>,
        reply: ScriptOutput,
    }

    impl SqlClient for Recorder {
        fn run_script(&self, script: &str) -> Result<ScriptOutput, DbError> {
            self.scripts.borrow_mut().push(script.to_string());
            Ok(self.reply.clone())
        }
    }

    fn creds() -> DbCredentials {
        DbCredentials {
            user: "simm".into(),
            password: "pw".into(),
            sid: "MED".into(),
            host: "db".into(),
            port: 1521,
        }
    }

    #[test]
    fn bind_replaces_placeholders_outside_literals() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 5, 0)
            .unwrap();
        let sql = bind(
            "SELECT ':1' FROM T WHERE A = :1 AND B = :2 AND C = :10",
            &[
                Param::from("O'Brien"),
                Param::from(ts),
                Param::Int(3),
                Param::Int(4),
                Param::Int(5),
                Param::Int(6),
                Param::Int(7),
                Param::Int(8),
                Param::Int(9),
                Param::Int(10),
            ],
        )
        .expect("bind");
        assert_eq!(
            sql,
            "SELECT ':1' FROM T WHERE A = 'O''Brien' AND B = \
             TO_DATE('2024-03-01 12:05:00', 'YYYY-MM-DD HH24:MI:SS') AND C = 10"
        );
    }

    #[test]
    fn bind_reports_missing_values() {
        let err = bind("WHERE A = :2", &[Param::Int(1)]).unwrap_err();
        assert!(matches!(err, DbError::MissingBind { index: 2, provided: 1 }));
        assert!(bind("WHERE A = :0", &[]).is_err());
    }

    #[rstest]
    #[case("P1.T_CELL", true)]
    #[case("T$X#1", true)]
    #[case("T; DROP TABLE X", false)]
    #[case("A.B.C", false)]
    #[case(".T", false)]
    #[case("", false)]
    fn identifiers_are_validated(#[case] ident: &str, #[case] valid: bool) {
        assert_eq!(validate_identifier(ident).is_ok(), valid, "{ident}");
    }

    #[test]
    fn statements_are_truncated_for_logging() {
        let long = format!("SELECT {} FROM DUAL", "X, ".repeat(200));
        let cut = truncate_statement(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), MAX_LOGGED_STATEMENT + 3);
    }

    #[test]
    fn every_script_carries_the_prelude() {
        let client = Recorder {
            scripts: RefCell::new(Vec::new()),
            reply: ScriptOutput::ok("1\n"),
        };
        let creds = creds();
        let session = Session::open(&client, &creds);
        session.query("SELECT 1 FROM DUAL", &[]).expect("query");

        let scripts = client.scripts.borrow();
        let script = &scripts[0];
        assert!(script.starts_with("CONNECT simm/\"pw\"@//db:1521/MED\n"));
        assert!(script.contains("WHENEVER SQLERROR EXIT SQL.SQLCODE"));
        assert!(script.contains("NLS_DATE_FORMAT = 'YYYY-MM-DD HH24:MI:SS'"));
        assert!(script.contains("SELECT 1 FROM DUAL;\nEXIT\n"));
    }

    #[test]
    fn query_splits_rows_into_columns() {
        let client = Recorder {
            scripts: RefCell::new(Vec::new()),
            reply: ScriptOutput::ok("\n  12 | SIMM_A \n  13 | SIMM_B\n\n"),
        };
        let creds = creds();
        let rows = Session::open(&client, &creds)
            .query("SELECT ID, NAME FROM X", &[])
            .expect("query");
        assert_eq!(
            rows,
            vec![
                vec!["12".to_string(), "SIMM_A".to_string()],
                vec!["13".to_string(), "SIMM_B".to_string()],
            ]
        );
    }

    #[test]
    fn execute_reads_row_count() {
        let client = Recorder {
            scripts: RefCell::new(Vec::new()),
            reply: ScriptOutput::ok("ROWS=4\n"),
        };
        let creds = creds();
        let n = Session::open(&client, &creds)
            .execute("DELETE FROM T WHERE A = :1", &[Param::Int(1)])
            .expect("execute");
        assert_eq!(n, 4);
        assert!(client.scripts.borrow()[0].contains("COMMIT;"));
    }

    #[test]
    fn error_lines_fail_even_with_zero_exit() {
        let client = Recorder {
            scripts: RefCell::new(Vec::new()),
            reply: ScriptOutput::ok("ORA-00942: table or view does not exist\n"),
        };
        let creds = creds();
        let err = Session::open(&client, &creds)
            .query("SELECT * FROM MISSING", &[])
            .unwrap_err();
        match err {
            DbError::Statement { statement, output } => {
                assert_eq!(statement, "SELECT * FROM MISSING;");
                assert!(output.contains("ORA-00942"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn failed_exit_is_an_error() {
        let client = Recorder {
            scripts: RefCell::new(Vec::new()),
            reply: ScriptOutput::failed(""),
        };
        let creds = creds();
        assert!(Session::open(&client, &creds).run_admin("EXEC P;").is_err());
    }
}
