//! Materialized result window

use crate::error::{PersistenceError, PersistenceResult};
use crate::storage::Cursor;
use crate::types::Value;

/// A cursor over rows held in memory
///
/// Starts before the first row. Typed accessors coerce between storage
/// classes the way SQLite does: numbers convert to each other, text parses
/// as a number (or reads as 0), and `NULL` reads as 0 or empty.
#[derive(Debug, Clone)]
pub struct RowCursor {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    /// -1 before the first row, `rows.len()` after the last
    position: isize,
    closed: bool,
}

impl RowCursor {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows,
            position: -1,
            closed: false,
        }
    }

    fn current(&self, index: usize) -> PersistenceResult<&Value> {
        if self.closed {
            return Err(PersistenceError::CursorClosed);
        }
        let row = usize::try_from(self.position)
            .ok()
            .and_then(|p| self.rows.get(p))
            .ok_or(PersistenceError::NoCurrentRow)?;
        row.get(index).ok_or(PersistenceError::ColumnOutOfRange {
            index,
            count: self.columns.len(),
        })
    }

    fn move_to(&mut self, position: isize) -> bool {
        if self.closed {
            return false;
        }
        let len = self.rows.len() as isize;
        self.position = position.clamp(-1, len);
        self.position >= 0 && self.position < len
    }
}

impl Cursor for RowCursor {
    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn move_to_first(&mut self) -> bool {
        self.move_to(0)
    }

    fn move_to_next(&mut self) -> bool {
        self.move_to(self.position + 1)
    }

    fn column_names(&self) -> &[String] {
        &self.columns
    }

    fn is_null(&self, index: usize) -> PersistenceResult<bool> {
        Ok(self.current(index)?.is_null())
    }

    fn get_value(&self, index: usize) -> PersistenceResult<Value> {
        self.current(index).cloned()
    }

    fn get_i64(&self, index: usize) -> PersistenceResult<i64> {
        Ok(match self.current(index)? {
            Value::Integer(i) => *i,
            Value::Real(f) => *f as i64,
            Value::Text(s) => s.trim().parse().unwrap_or(0),
            Value::Null | Value::Blob(_) => 0,
        })
    }

    fn get_f64(&self, index: usize) -> PersistenceResult<f64> {
        Ok(match self.current(index)? {
            Value::Integer(i) => *i as f64,
            Value::Real(f) => *f,
            Value::Text(s) => s.trim().parse().unwrap_or(0.0),
            Value::Null | Value::Blob(_) => 0.0,
        })
    }

    fn get_string(&self, index: usize) -> PersistenceResult<String> {
        Ok(match self.current(index)? {
            Value::Null => String::new(),
            Value::Integer(i) => i.to_string(),
            Value::Real(f) => f.to_string(),
            Value::Text(s) => s.clone(),
            Value::Blob(b) => String::from_utf8_lossy(b).into_owned(),
        })
    }

    fn get_blob(&self, index: usize) -> PersistenceResult<Vec<u8>> {
        Ok(match self.current(index)? {
            Value::Null => Vec::new(),
            Value::Blob(b) => b.clone(),
            _ => self.get_string(index)?.into_bytes(),
        })
    }

    fn close(&mut self) {
        self.closed = true;
        self.rows.clear();
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
