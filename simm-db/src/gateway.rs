//! Provisioning operations against the mediation database.

use std::collections::BTreeSet;

use simm_core::{Access, AccessId, DatetimeKeys, DbCredentials, LibraryName, TableRef};

use crate::client::SqlClient;
use crate::error::DbError;
use crate::session::{truncate_statement, validate_identifier, Param, Session};

pub const CREATE_ACCESS_PROC: &str = "GD_ADMIN.CREATE_ACCESS";
pub const DEACTIVATE_ACCESS_PROC: &str = "GD_ADMIN.DEACTIVATE_ACCESS";
const ACCESS_TABLE: &str = "GD_ACCESS";
const LIBRARY_TABLE: &str = "GD_LIBRARY";

/// Keys per `DATETIME IN (...)` list; Oracle rejects longer lists.
pub const DELETE_CHUNK: usize = 1000;

/// Database gateway. Sessions are opened per operation and never cached.
pub struct Gateway<C> {
    client: C,
    credentials: DbCredentials,
}

impl<C: SqlClient> Gateway<C> {
    pub fn new(client: C, credentials: DbCredentials) -> Self {
        Self {
            client,
            credentials,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn session(&self) -> Session<'_, C> {
        Session::open(&self.client, &self.credentials)
    }

    /// Whether the platform knows `library`.
    pub fn library_exists(&self, library: &LibraryName) -> Result<bool, DbError> {
        let sql = format!("SELECT COUNT(*) FROM {LIBRARY_TABLE} WHERE LIBRARY_NAME = :1");
        let rows = self.session().query(&sql, &[library.as_str().into()])?;
        let count = first_cell(&rows)
            .and_then(|c| c.parse::<u64>().ok())
            .ok_or_else(|| DbError::UnexpectedOutput {
                statement: truncate_statement(&sql),
                output: render_rows(&rows),
            })?;
        Ok(count > 0)
    }

    /// Call the creation procedure. The id is not returned; see
    /// [`lookup_access_id`](Self::lookup_access_id).
    pub fn create_access(&self, access: &Access) -> Result<(), DbError> {
        let block = format!(
            "BEGIN\n  {CREATE_ACCESS_PROC}(\n    p_name => :1,\n    p_library => :2,\n    \
             p_local_dir => :3,\n    p_file_mask => :4,\n    p_cycle_interval => :5,\n    \
             p_retry_on_error => :6,\n    p_keep_processed => :7);\nEND;\n/"
        );
        let params = [
            Param::from(access.name.as_str()),
            Param::from(access.library.as_str()),
            Param::from(access.local_dir.to_string_lossy().into_owned()),
            Param::from(access.file_mask.as_str()),
            Param::from(access.cycle_interval_secs),
            Param::from(access.retry_on_error),
            Param::from(access.keep_processed),
        ];
        let bound = crate::session::bind(&block, &params)?;
        self.session().run_admin(&bound)?;
        tracing::info!(access = %access.name, library = %access.library, "access created");
        Ok(())
    }

    /// Newest id recorded for the access `name`.
    pub fn lookup_access_id(&self, name: &str) -> Result<AccessId, DbError> {
        let sql = format!(
            "SELECT ACCESS_ID FROM {ACCESS_TABLE} WHERE ACCESS_NAME = :1 ORDER BY ACCESS_ID DESC"
        );
        let rows = self.session().query(&sql, &[name.into()])?;
        let Some(cell) = first_cell(&rows) else {
            return Err(DbError::AccessNotFound {
                name: name.to_string(),
            });
        };
        cell.parse().map_err(|_| DbError::UnexpectedOutput {
            statement: truncate_statement(&sql),
            output: render_rows(&rows),
        })
    }

    /// Create the access, then read back its id.
    pub fn provision_access(&self, access: &Access) -> Result<AccessId, DbError> {
        self.create_access(access)?;
        let id = self.lookup_access_id(&access.name)?;
        tracing::info!(access = %access.name, id = %id, "access provisioned");
        Ok(id)
    }

    /// Delete rows stamped with any of `keys` from every table.
    ///
    /// Tables loaded by several profiles are deleted from once. Returns the
    /// total number of rows removed.
    pub fn delete_rows<'t, I>(
        &self,
        tables: I,
        keys: &DatetimeKeys,
        ne_name: Option<&str>,
    ) -> Result<u64, DbError>
    where
        I: IntoIterator<Item = &'t TableRef>,
    {
        let tables: BTreeSet<&str> = tables.into_iter().map(|t| t.table.as_str()).collect();
        if keys.is_empty() || tables.is_empty() {
            tracing::debug!("nothing to delete");
            return Ok(0);
        }
        for table in &tables {
            validate_identifier(table)?;
        }

        let keys: Vec<_> = keys.iter().copied().collect();
        let session = self.session();
        let mut total = 0u64;

        for table in tables {
            let mut deleted = 0u64;
            for chunk in keys.chunks(DELETE_CHUNK) {
                let placeholders = (1..=chunk.len())
                    .map(|i| format!(":{i}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                let mut sql = format!("DELETE FROM {table} WHERE DATETIME IN ({placeholders})");
                let mut params: Vec<Param> = chunk.iter().copied().map(Param::from).collect();
                if let Some(ne) = ne_name {
                    params.push(Param::from(ne));
                    sql.push_str(&format!(" AND NE_NAME = :{}", params.len()));
                }
                deleted += session.execute(&sql, &params)?;
            }
            tracing::info!(table, rows = deleted, "deleted rows");
            total += deleted;
        }
        Ok(total)
    }

    /// Disable the subscription so the engine stops polling it.
    pub fn deactivate_access(&self, id: AccessId) -> Result<(), DbError> {
        let block = format!("BEGIN\n  {DEACTIVATE_ACCESS_PROC}(p_access_id => :1);\nEND;\n/");
        let bound = crate::session::bind(&block, &[Param::from(id.0)])?;
        self.session().run_admin(&bound)?;
        tracing::info!(id = %id, "access deactivated");
        Ok(())
    }
}

fn first_cell(rows: &[Vec<String>]) -> Option<&str> {
    rows.first()
        .and_then(|row| row.first())
        .map(String::as_str)
        .filter(|c| !c.is_empty())
}

fn render_rows(rows: &[Vec<String>]) -> String {
    rows.iter()
        .map(|row| row.join("|"))
        .collect::<Vec<_>>()
        .join("\n")
}
