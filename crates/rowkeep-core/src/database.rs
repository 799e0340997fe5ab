//! Database handle
//!
//! A [`Database`] pairs one [`Storage`] with a shared [`SchemaRegistry`]
//! and hands out typed [`Table`]s.
//!
//! ## Usage
//!
//! ```ignore
//! let db = Database::open(&Config::load()?)?;
//! let items = db.table::<Item>()?;   // creates and reconciles on first use
//!
//! let mut pen = Item::new("pen", 1.5);
//! items.insert(&mut pen)?;
//! ```

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::entity::Entity;
use crate::error::{PersistenceError, PersistenceResult};
use crate::registry::SchemaRegistry;
use crate::schema::{table_name, TableSchema};
use crate::statement;
use crate::storage::{SqliteStorage, Storage};
use crate::table::Table;
use crate::types::Value;
use crate::versions::{self, TableVersion, VERSION_TABLE};

/// One storage connection plus the schema state shared with other handles
pub struct Database {
    storage: Box<dyn Storage>,
    registry: Arc<SchemaRegistry>,
}

impl Database {
    /// Wrap a storage with a fresh, private registry
    pub fn new(storage: impl Storage + 'static) -> Self {
        Self::with_registry(storage, Arc::new(SchemaRegistry::new()))
    }

    /// Wrap a storage, sharing the registry with other handles on the same store
    pub fn with_registry(storage: impl Storage + 'static, registry: Arc<SchemaRegistry>) -> Self {
        Self {
            storage: Box::new(storage),
            registry,
        }
    }

    /// Open the SQLite database described by the configuration
    pub fn open(config: &Config) -> PersistenceResult<Self> {
        Ok(Self::new(SqliteStorage::open(config)?))
    }

    /// Open an in-memory SQLite database (for testing)
    pub fn open_in_memory() -> PersistenceResult<Self> {
        Ok(Self::new(SqliteStorage::open_in_memory()?))
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Table handle for an entity type
    ///
    /// Validates the declaration, creates the table if this process hasn't
    /// yet, and reconciles the stored version, running the upgrade hook
    /// when it differs from the declared one.
    pub fn table<E: Entity>(&self) -> PersistenceResult<Table<'_, E>> {
        let descriptor = E::descriptor();
        let declared = descriptor.declared_version()?;
        let name = table_name(&descriptor);
        if name == VERSION_TABLE {
            return Err(PersistenceError::ReservedTable {
                table: name.to_string(),
            });
        }

        self.create_table::<E>()?;
        versions::reconcile::<E>(self, name, declared)?;

        // The hook may have dropped the table; this re-derives and re-creates it
        self.unversioned::<E>()
    }

    /// Table handle that skips version reconciliation
    ///
    /// Upgrade hooks use this to reach their own table while the version
    /// is being reconciled.
    pub fn unversioned<E: Entity>(&self) -> PersistenceResult<Table<'_, E>> {
        let schema = self.create_table::<E>()?;
        Ok(Table::new(self, schema))
    }

    pub(crate) fn version_table(&self) -> PersistenceResult<Table<'_, TableVersion>> {
        self.unversioned::<TableVersion>()
    }

    /// Derive an entity's schema and issue its DDL unless already done
    pub fn create_table<E: Entity>(&self) -> PersistenceResult<Arc<TableSchema>> {
        let schema = self.registry.schema_for(&E::descriptor())?;
        self.registry.ensure_created(self.storage(), &schema)?;
        Ok(schema)
    }

    /// Drop and recreate an entity's table, discarding its rows
    pub fn recreate<E: Entity>(&self) -> PersistenceResult<()> {
        self.drop_table(table_name(&E::descriptor()))?;
        self.create_table::<E>()?;
        Ok(())
    }

    /// Drop a table by name
    ///
    /// Also forgets the table's cached state and removes its version record.
    pub fn drop_table(&self, table: &str) -> PersistenceResult<()> {
        self.storage.execute(&statement::drop_table(table)?)?;
        info!("Dropped table {}", table);

        if table == VERSION_TABLE {
            // Every reconciled version went with it
            self.registry.reset();
            return Ok(());
        }

        self.registry.invalidate(table);
        versions::forget(self, table)?;
        Ok(())
    }

    /// All version records, one per managed table
    pub fn versions(&self) -> PersistenceResult<Vec<TableVersion>> {
        versions::all(self)
    }

    /// Stored version of a table, `None` if it is not managed
    pub fn stored_version(&self, table: &str) -> PersistenceResult<Option<i32>> {
        versions::stored_version(self, table)
    }

    /// Whether the store holds a table of this name
    pub fn has_table(&self, table: &str) -> PersistenceResult<bool> {
        let mut cursor = self.storage.query(&statement::table_exists(table))?;
        let exists = cursor.move_to_first();
        cursor.close();
        Ok(exists)
    }

    /// Number of rows in a table
    pub fn count_rows(&self, table: &str) -> PersistenceResult<i64> {
        let mut cursor = self.storage.query(&statement::count(table)?)?;
        let count = if cursor.move_to_first() {
            cursor.get_i64(0)?
        } else {
            0
        };
        cursor.close();
        Ok(count)
    }

    /// Every column of every row of a table, without an entity type
    pub fn dump_table(&self, table: &str) -> PersistenceResult<TableDump> {
        let mut cursor = self.storage.query(&statement::select_raw(table)?)?;
        let columns = cursor.column_names().to_vec();

        let mut rows = Vec::with_capacity(cursor.row_count());
        while cursor.move_to_next() {
            let row = (0..columns.len())
                .map(|i| cursor.get_value(i))
                .collect::<PersistenceResult<Vec<_>>>()?;
            rows.push(row);
        }
        cursor.close();

        Ok(TableDump { columns, rows })
    }
}

/// Raw contents of one table
#[derive(Debug, Clone, PartialEq)]
pub struct TableDump {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}
