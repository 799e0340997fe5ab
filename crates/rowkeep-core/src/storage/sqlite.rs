//! SQLite storage backend
//!
//! Wraps a single `rusqlite::Connection`. Statements are prepared with
//! their parameters bound positionally; query results are copied into a
//! [`RowCursor`] before the statement is finalized.

use std::path::Path;
use std::time::Duration;

use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection};
use tracing::debug;

use crate::config::Config;
use crate::error::{PersistenceError, PersistenceResult};
use crate::statement::Statement;
use crate::storage::{Cursor, RowCursor, Storage};
use crate::types::Value;

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

/// SQLite-backed [`Storage`]
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Open or create the database file described by the configuration
    pub fn open(config: &Config) -> PersistenceResult<Self> {
        Self::open_path(&config.database_path(), config.busy_timeout())
    }

    /// Open or create a database file, creating its parent directory if needed
    pub fn open_path(path: &Path, busy_timeout: Duration) -> PersistenceResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| {
                PersistenceError::CreateDirectory {
                    path: parent.to_path_buf(),
                    source,
                }
            })?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        debug!("Opened SQLite database at {:?}", path);
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> PersistenceResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Use an already opened connection
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Get a reference to the underlying connection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn run(&self, statement: &Statement) -> PersistenceResult<usize> {
        debug!("Executing sql: {}", statement);
        let changed = self
            .conn
            .execute(statement.sql(), params_from_iter(statement.params()))?;
        Ok(changed)
    }
}

impl Storage for SqliteStorage {
    fn execute(&self, statement: &Statement) -> PersistenceResult<()> {
        self.run(statement)?;
        Ok(())
    }

    fn insert(&self, statement: &Statement) -> PersistenceResult<i64> {
        if self.run(statement)? == 0 {
            return Ok(-1);
        }
        Ok(self.conn.last_insert_rowid())
    }

    fn query(&self, statement: &Statement) -> PersistenceResult<Box<dyn Cursor>> {
        debug!("Querying: {}", statement);
        let mut stmt = self.conn.prepare(statement.sql())?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt.query(params_from_iter(statement.params()))?;
        let mut data = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                values.push(Value::from(row.get_ref(i)?));
            }
            data.push(values);
        }

        Ok(Box::new(RowCursor::new(columns, data)))
    }

    fn delete(&self, statement: &Statement) -> PersistenceResult<usize> {
        self.run(statement)
    }
}
