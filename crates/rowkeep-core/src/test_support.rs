//! Shared fixtures for unit tests

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use crate::entity::{Entity, Record};
use crate::error::{PersistenceError, PersistenceResult};
use crate::schema::{EntityDescriptor, FieldDescriptor};
use crate::statement::Statement;
use crate::storage::{Cursor, SqliteStorage, Storage};
use crate::types::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Item {
    pub id: Option<i64>,
    pub name: String,
    pub price: f64,
}

impl Item {
    pub fn new(name: &str, price: f64) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            price,
        }
    }
}

impl Record for Item {
    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: Option<i64>) {
        self.id = id;
    }

    fn value(&self, column: &str) -> Value {
        match column {
            "name" => self.name.clone().into(),
            "price" => self.price.into(),
            _ => Value::Null,
        }
    }

    fn set_value(&mut self, column: &str, value: Value) -> PersistenceResult<()> {
        match column {
            "name" => self.name = value.into_typed()?,
            "price" => self.price = value.into_typed()?,
            _ => return Err(PersistenceError::unknown_column("Item", column)),
        }
        Ok(())
    }
}

impl Entity for Item {
    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::new("Item")
            .version(1)
            .field(FieldDescriptor::text("name").not_null().index("idx_item_name"))
            .field(FieldDescriptor::real("price"))
    }
}

/// SQLite storage that records every statement it runs
pub struct CountingStorage {
    inner: SqliteStorage,
    log: Rc<RefCell<Vec<String>>>,
}

impl CountingStorage {
    pub fn in_memory() -> Self {
        Self::wrap(SqliteStorage::open_in_memory().unwrap())
    }

    pub fn open(path: &Path) -> Self {
        Self::wrap(SqliteStorage::open_path(path, Duration::from_secs(5)).unwrap())
    }

    fn wrap(inner: SqliteStorage) -> Self {
        Self {
            inner,
            log: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Handle on the statement log that outlives moving the storage
    pub fn log(&self) -> Rc<RefCell<Vec<String>>> {
        Rc::clone(&self.log)
    }

    pub fn count_matching(&self, prefix: &str) -> usize {
        count_matching(&self.log, prefix)
    }

    fn record(&self, statement: &Statement) {
        self.log.borrow_mut().push(statement.sql().to_string());
    }
}

pub fn count_matching(log: &Rc<RefCell<Vec<String>>>, prefix: &str) -> usize {
    log.borrow().iter().filter(|sql| sql.starts_with(prefix)).count()
}

impl Storage for CountingStorage {
    fn execute(&self, statement: &Statement) -> PersistenceResult<()> {
        self.record(statement);
        self.inner.execute(statement)
    }

    fn insert(&self, statement: &Statement) -> PersistenceResult<i64> {
        self.record(statement);
        self.inner.insert(statement)
    }

    fn query(&self, statement: &Statement) -> PersistenceResult<Box<dyn Cursor>> {
        self.record(statement);
        self.inner.query(statement)
    }

    fn delete(&self, statement: &Statement) -> PersistenceResult<usize> {
        self.record(statement);
        self.inner.delete(statement)
    }
}
