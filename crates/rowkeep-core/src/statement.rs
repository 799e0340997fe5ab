//! SQL statement synthesis
//!
//! Builds DDL and CRUD statements from a [`TableSchema`]. Identifiers are
//! validated when the schema is derived, so they are interpolated bare;
//! values are never interpolated. They travel as positional parameters
//! (`?1`, `?2`, ...) bound by the storage layer.
//!
//! `Display` renders a statement with its parameters inlined as escaped
//! literals, which is what ends up in the logs.

use std::fmt;

use crate::entity::{is_new_id, Record};
use crate::error::{PersistenceError, PersistenceResult};
use crate::schema::{constraint_clause, validate_identifier, IndexGroup, TableSchema};
use crate::types::{encode, Value};

/// SQL text plus positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(mut self, params: Vec<Value>) -> Self {
        self.params = params;
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut chars = self.sql.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '?' {
                write!(f, "{}", c)?;
                continue;
            }

            let mut digits = String::new();
            while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                digits.push(*d);
                chars.next();
            }

            let param = digits
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| self.params.get(i));
            match param {
                Some(value) => f.write_str(&encode(value))?,
                None => write!(f, "?{}", digits)?,
            }
        }
        Ok(())
    }
}

fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

fn columns(schema: &TableSchema) -> String {
    schema.column_names().join(", ")
}

fn known_column(schema: &TableSchema, column: &str) -> PersistenceResult<()> {
    match schema.field(column) {
        Some(_) => Ok(()),
        None => Err(PersistenceError::unknown_column(schema.name(), column)),
    }
}

/// `CREATE TABLE IF NOT EXISTS`, safe to re-issue
pub fn create_table(schema: &TableSchema) -> Statement {
    let definitions: Vec<String> = schema
        .fields()
        .iter()
        .map(|field| {
            let clause = constraint_clause(field);
            if clause.is_empty() {
                format!("{} {}", field.name(), field.storage_class())
            } else {
                format!("{} {} {}", field.name(), field.storage_class(), clause)
            }
        })
        .collect();

    Statement::new(format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        schema.name(),
        definitions.join(", ")
    ))
}

/// `CREATE INDEX IF NOT EXISTS` for one index group
pub fn create_index(index: &IndexGroup, table: &str) -> Statement {
    Statement::new(format!(
        "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
        index.name,
        table,
        index.columns.join(", ")
    ))
}

/// Insert every column of the record
///
/// An unpersisted primary key is bound as `NULL` so the store assigns one.
pub fn insert(schema: &TableSchema, record: &dyn Record) -> Statement {
    let params: Vec<Value> = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(i, field)| {
            if i == 0 {
                match record.id() {
                    id if is_new_id(id) => Value::Null,
                    id => Value::from(id),
                }
            } else {
                record.value(field.name())
            }
        })
        .collect();

    Statement::new(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        schema.name(),
        columns(schema),
        placeholders(params.len())
    ))
    .with_params(params)
}

/// Update all non-key columns of a persisted record
///
/// Returns `None` when the record has no primary key yet.
pub fn update(schema: &TableSchema, record: &dyn Record) -> Option<Statement> {
    let id = record.id().filter(|id| !is_new_id(Some(*id)))?;

    let mut params = Vec::with_capacity(schema.fields().len());
    let mut assignments = Vec::with_capacity(schema.data_fields().len());
    for field in schema.data_fields() {
        params.push(record.value(field.name()));
        assignments.push(format!("{} = ?{}", field.name(), params.len()));
    }
    params.push(Value::Integer(id));

    Some(
        Statement::new(format!(
            "UPDATE {} SET {} WHERE {} = ?{}",
            schema.name(),
            assignments.join(", "),
            schema.primary_key().name(),
            params.len()
        ))
        .with_params(params),
    )
}

/// Delete by primary key
pub fn delete(schema: &TableSchema, id: i64) -> Statement {
    Statement::new(format!(
        "DELETE FROM {} WHERE {} = ?1",
        schema.name(),
        schema.primary_key().name()
    ))
    .with_params(vec![Value::Integer(id)])
}

/// Delete every row whose column equals the value
pub fn delete_where(
    schema: &TableSchema,
    column: &str,
    value: Value,
) -> PersistenceResult<Statement> {
    known_column(schema, column)?;
    Ok(
        Statement::new(format!("DELETE FROM {} WHERE {} = ?1", schema.name(), column))
            .with_params(vec![value]),
    )
}

/// Select every row, unordered
pub fn select_all(schema: &TableSchema) -> Statement {
    Statement::new(format!("SELECT {} FROM {}", columns(schema), schema.name()))
}

/// Select the row with the given primary key
pub fn select_by_id(schema: &TableSchema, id: i64) -> Statement {
    Statement::new(format!(
        "SELECT {} FROM {} WHERE {} = ?1",
        columns(schema),
        schema.name(),
        schema.primary_key().name()
    ))
    .with_params(vec![Value::Integer(id)])
}

/// Select rows whose column equals the value
pub fn select_where(
    schema: &TableSchema,
    column: &str,
    value: Value,
) -> PersistenceResult<Statement> {
    known_column(schema, column)?;
    Ok(Statement::new(format!(
        "SELECT {} FROM {} WHERE {} = ?1",
        columns(schema),
        schema.name(),
        column
    ))
    .with_params(vec![value]))
}

pub fn count(table: &str) -> PersistenceResult<Statement> {
    validate_identifier("table", table)?;
    Ok(Statement::new(format!("SELECT COUNT(*) FROM {}", table)))
}

/// Every stored column of a table, for inspection
pub fn select_raw(table: &str) -> PersistenceResult<Statement> {
    validate_identifier("table", table)?;
    Ok(Statement::new(format!("SELECT * FROM {}", table)))
}

/// Look a table up in the SQLite catalog
pub fn table_exists(table: &str) -> Statement {
    Statement::new("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1")
        .with_params(vec![Value::from(table)])
}

/// `DROP TABLE IF EXISTS` by name
pub fn drop_table(table: &str) -> PersistenceResult<Statement> {
    validate_identifier("table", table)?;
    Ok(Statement::new(format!("DROP TABLE IF EXISTS {}", table)))
}
