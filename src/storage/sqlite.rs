//! SQLite storage handle

use std::path::Path;
use std::time::Duration;
use rusqlite::{params_from_iter, Connection, DatabaseName, OpenFlags, OptionalExtension, Params, Row};
use rusqlite::types::Value;
use crate::config::StoreConfig;
use crate::{Error, Result};

/// An open connection shared by the table modules.
///
/// The handle is `Send` but not `Sync`: callers that share it across
/// threads serialize access themselves. A closed handle rejects every
/// operation with [`Error::Precondition`].
pub struct SqliteHandle {
    conn: Option<Connection>,
    read_only: bool,
}

impl SqliteHandle {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path, config: &StoreConfig) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        let mode: String = conn.pragma_update_and_check(
            None,
            "journal_mode",
            config.journal_mode.as_str(),
            |row| row.get(0),
        )?;
        tracing::debug!(path = %path.display(), journal_mode = %mode, "opened storage handle");
        Ok(Self { conn: Some(conn), read_only: false })
    }

    /// Open an existing database file without write access
    pub fn open_read_only(path: &Path, config: &StoreConfig) -> Result<Self> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        tracing::debug!(path = %path.display(), "opened read-only storage handle");
        Ok(Self { conn: Some(conn), read_only: true })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn: Some(conn), read_only: false })
    }

    /// Wrap a connection opened elsewhere
    pub fn from_connection(conn: Connection) -> Result<Self> {
        let read_only = conn.is_readonly(DatabaseName::Main)?;
        Ok(Self { conn: Some(conn), read_only })
    }

    /// Close the underlying connection. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            if let Err((conn, e)) = conn.close() {
                self.conn = Some(conn);
                return Err(e.into());
            }
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn connection(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| Error::Precondition("storage handle is closed".to_string()))
    }

    fn writable(&self) -> Result<&Connection> {
        let conn = self.connection()?;
        if self.read_only {
            return Err(Error::Precondition("storage handle is read-only".to_string()));
        }
        Ok(conn)
    }

    /// Fail with [`Error::Precondition`] unless the handle is open and writable
    pub fn ensure_writable(&self) -> Result<()> {
        self.writable().map(|_| ())
    }

    // ========== Statement Execution ==========

    /// Run one or more statements without parameters (DDL)
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.writable()?.execute_batch(sql)?;
        Ok(())
    }

    /// Run a parameterized statement, returning the affected-row count
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<usize> {
        Ok(self.writable()?.execute(sql, params)?)
    }

    /// Run a query and map every row; the first row error aborts the read
    pub fn query_map<T, P, F>(&self, sql: &str, params: P, f: F) -> Result<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let mut stmt = self.connection()?.prepare(sql)?;
        let rows = stmt.query_map(params, f)?;
        rows.collect::<rusqlite::Result<Vec<T>>>().map_err(Into::into)
    }

    /// Walk a cursor row by row. Work done by `f` before a failing row stays done.
    pub fn for_each_row<P, F>(&self, sql: &str, params: P, mut f: F) -> Result<usize>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> Result<()>,
    {
        let mut stmt = self.connection()?.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut seen = 0;
        while let Some(row) = rows.next()? {
            f(row)?;
            seen += 1;
        }
        Ok(seen)
    }

    /// Fetch at most one row
    pub fn query_opt<T, P, F>(&self, sql: &str, params: P, f: F) -> Result<Option<T>>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.connection()?
            .query_row(sql, params, f)
            .optional()
            .map_err(Into::into)
    }

    /// Run a `SELECT COUNT(*)`-style query. A negative result is a range error.
    pub fn count<P: Params>(&self, sql: &str, params: P) -> Result<usize> {
        let count: usize = self.connection()?.query_row(sql, params, |row| row.get(0))?;
        Ok(count)
    }

    // ========== Single-Table Writes ==========

    /// Insert one row, returning its row id
    pub fn insert(&self, table: &str, values: &[(&str, Value)]) -> Result<i64> {
        let conn = self.writable()?;
        let columns = values.iter().map(|(column, _)| *column).collect::<Vec<_>>().join(", ");
        let placeholders = (1..=values.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("INSERT INTO {} ({}) VALUES ({})", table, columns, placeholders);

        let inserted = conn.execute(&sql, params_from_iter(values.iter().map(|(_, v)| v)))?;
        if inserted != 1 {
            return Err(rusqlite::Error::StatementChangedRows(inserted).into());
        }
        Ok(conn.last_insert_rowid())
    }

    /// Update rows where `filter.0 = filter.1`, returning the affected-row count
    pub fn update(&self, table: &str, values: &[(&str, Value)], filter: (&str, Value)) -> Result<usize> {
        let conn = self.writable()?;
        let assignments = values
            .iter()
            .enumerate()
            .map(|(i, (column, _))| format!("{} = ?{}", column, i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?{}",
            table,
            assignments,
            filter.0,
            values.len() + 1
        );

        let params = values.iter().map(|(_, v)| v).chain(std::iter::once(&filter.1));
        Ok(conn.execute(&sql, params_from_iter(params))?)
    }

    /// Delete rows where `filter.0 = filter.1`, returning the affected-row count
    pub fn delete(&self, table: &str, filter: (&str, Value)) -> Result<usize> {
        let conn = self.writable()?;
        let sql = format!("DELETE FROM {} WHERE {} = ?1", table, filter.0);
        Ok(conn.execute(&sql, [&filter.1])?)
    }

    // ========== Scoped Transactions ==========

    /// Run `f` inside a savepoint.
    ///
    /// Released when `f` succeeds, rolled back and released when it fails.
    /// Works both at top level and nested inside a caller's transaction.
    pub fn with_savepoint<T, F>(&self, name: &str, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        let conn = self.writable()?;
        conn.execute_batch(&format!("SAVEPOINT {}", name))?;

        let outcome = f(self).and_then(|value| {
            conn.execute_batch(&format!("RELEASE {}", name))?;
            Ok(value)
        });

        if outcome.is_err() {
            if let Err(e) = conn.execute_batch(&format!("ROLLBACK TO {0}; RELEASE {0}", name)) {
                tracing::warn!(savepoint = name, error = %e, "failed to roll back savepoint");
            }
        }
        outcome
    }
}
