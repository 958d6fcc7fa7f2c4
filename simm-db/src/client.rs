use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::DbError;

/// What a client run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOutput {
    /// Client exit status was zero.
    pub success: bool,
    /// stdout followed by stderr.
    pub text: String,
}

impl ScriptOutput {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            success: true,
            text: text.into(),
        }
    }

    pub fn failed(text: impl Into<String>) -> Self {
        Self {
            success: false,
            text: text.into(),
        }
    }
}

/// Transport for SQL scripts.
pub trait SqlClient {
    /// Feed `script` to a fresh client and collect its combined output.
    fn run_script(&self, script: &str) -> Result<ScriptOutput, DbError>;
}

impl<C: SqlClient + ?Sized> SqlClient for &C {
    fn run_script(&self, script: &str) -> Result<ScriptOutput, DbError> {
        (**self).run_script(script)
    }
}

/// SQL*Plus in silent, no-login mode; the script does its own `CONNECT`.
#[derive(Debug, Clone)]
pub struct SqlPlus {
    binary: PathBuf,
}

impl SqlPlus {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn client_err(&self, source: std::io::Error) -> DbError {
        DbError::Client {
            program: self.binary.clone(),
            source,
        }
    }
}

impl SqlClient for SqlPlus {
    fn run_script(&self, script: &str) -> Result<ScriptOutput, DbError> {
        let mut child = Command::new(&self.binary)
            .args(["-S", "-L", "/nolog"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.client_err(e))?;

        // Dropping stdin at the end of the block closes it.
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(script.as_bytes())
                .map_err(|e| self.client_err(e))?;
        }

        let output = child.wait_with_output().map_err(|e| self.client_err(e))?;
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(ScriptOutput {
            success: output.status.success(),
            text,
        })
    }
}
