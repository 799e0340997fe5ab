//! Storage layer
//!
//! The engine talks to the physical store through two small traits:
//!
//! - [`Storage`]: executes rendered statements; owns the connection
//! - [`Cursor`]: a positioned, read-once view over query results
//!
//! [`SqliteStorage`] is the SQLite implementation; [`RowCursor`] is the
//! in-memory result window it hands out, and is reusable by any other
//! backend that can materialize rows.

mod cursor;
mod sqlite;

pub use cursor::RowCursor;
pub use sqlite::SqliteStorage;

use crate::error::PersistenceResult;
use crate::statement::Statement;
use crate::types::Value;

/// Executes statements against one physical connection
///
/// Implementations serialize statement execution; the engine issues one
/// blocking call at a time and never retries a failed one.
pub trait Storage {
    /// Run a statement that returns no rows
    fn execute(&self, statement: &Statement) -> PersistenceResult<()>;

    /// Run an insert and return the new row id, negative if nothing was inserted
    fn insert(&self, statement: &Statement) -> PersistenceResult<i64>;

    /// Run a query and return a cursor positioned before the first row
    fn query(&self, statement: &Statement) -> PersistenceResult<Box<dyn Cursor>>;

    /// Run a delete and return the number of affected rows
    fn delete(&self, statement: &Statement) -> PersistenceResult<usize>;
}

/// Forward-moving view over a query result
pub trait Cursor {
    fn row_count(&self) -> usize;

    /// Move to the first row; `false` when there is none
    fn move_to_first(&mut self) -> bool;

    /// Move to the next row; `false` once past the last one
    fn move_to_next(&mut self) -> bool;

    fn column_names(&self) -> &[String];

    /// Index of a named column, `None` if the result lacks it
    fn column_index(&self, name: &str) -> Option<usize> {
        self.column_names().iter().position(|c| c == name)
    }

    fn is_null(&self, index: usize) -> PersistenceResult<bool>;

    /// Raw value of a column in the current row
    fn get_value(&self, index: usize) -> PersistenceResult<Value>;

    fn get_i64(&self, index: usize) -> PersistenceResult<i64>;

    fn get_f64(&self, index: usize) -> PersistenceResult<f64>;

    fn get_string(&self, index: usize) -> PersistenceResult<String>;

    fn get_blob(&self, index: usize) -> PersistenceResult<Vec<u8>>;

    /// Release the result; every later access fails
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}
