//! Per-table schema version tracking
//!
//! The reserved [`VERSION_TABLE`] stores one `(table_name, version)` row per
//! managed table. When a table handle is opened, the entity's declared
//! version is compared with the stored one:
//!
//! - no row yet: the version is recorded, no hook runs
//! - same version: nothing happens
//! - different version: `Entity::on_upgrade(from, to)` runs once, then the
//!   new version is recorded
//!
//! The version table itself is never versioned.

use tracing::{debug, info};

use crate::database::Database;
use crate::entity::{Entity, Record};
use crate::error::{PersistenceError, PersistenceResult};
use crate::schema::{EntityDescriptor, FieldDescriptor};
use crate::table::Table;
use crate::types::Value;

/// Name of the reserved version table
pub const VERSION_TABLE: &str = "rowkeep_versions";

const TABLE_NAME: &str = "table_name";
const VERSION: &str = "version";

/// Last applied schema version of one table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableVersion {
    id: Option<i64>,
    table_name: String,
    version: i32,
}

impl TableVersion {
    pub fn new(table_name: impl Into<String>, version: i32) -> Self {
        Self {
            id: None,
            table_name: table_name.into(),
            version,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn version(&self) -> i32 {
        self.version
    }
}

impl Record for TableVersion {
    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: Option<i64>) {
        self.id = id;
    }

    fn value(&self, column: &str) -> Value {
        match column {
            TABLE_NAME => Value::from(self.table_name.as_str()),
            VERSION => Value::from(self.version),
            _ => Value::Null,
        }
    }

    fn set_value(&mut self, column: &str, value: Value) -> PersistenceResult<()> {
        match column {
            TABLE_NAME => self.table_name = value.into_typed()?,
            VERSION => self.version = value.into_typed()?,
            _ => return Err(PersistenceError::unknown_column(VERSION_TABLE, column)),
        }
        Ok(())
    }
}

impl Entity for TableVersion {
    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::new(VERSION_TABLE)
            .field(
                FieldDescriptor::text(TABLE_NAME)
                    .not_null()
                    .index("idx_rowkeep_versions_table"),
            )
            .field(FieldDescriptor::integer(VERSION).not_null())
    }
}

/// Whether the version table exists, without creating it
fn exists(db: &Database) -> PersistenceResult<bool> {
    Ok(db.registry().is_created(VERSION_TABLE) || db.has_table(VERSION_TABLE)?)
}

/// Stored version of a table, `None` if it was never recorded
///
/// Read-only: a store without a version table reports `None`.
pub fn stored_version(db: &Database, table: &str) -> PersistenceResult<Option<i32>> {
    if !exists(db)? {
        return Ok(None);
    }
    lookup(db, table)
}

fn lookup(db: &Database, table: &str) -> PersistenceResult<Option<i32>> {
    let versions = db.version_table()?;
    let mut record = TableVersion::default();
    if versions.find_by(TABLE_NAME, table, &mut record)? {
        Ok(Some(record.version))
    } else {
        Ok(None)
    }
}

/// Bring a table's stored version in line with the entity's declaration
pub(crate) fn reconcile<E: Entity>(
    db: &Database,
    table: &str,
    declared: i32,
) -> PersistenceResult<()> {
    let registry = db.registry();
    let Some(_claim) = registry.claim_reconcile(table) else {
        // Opened from this table's own upgrade hook
        return Ok(());
    };
    if registry.verified_version(table) == Some(declared) {
        return Ok(());
    }

    match lookup(db, table)? {
        Some(stored) if stored == declared => {}
        Some(stored) => {
            info!(
                "Upgrading table {} from version {} to {}",
                table, stored, declared
            );
            // The hook sees the declared schema, not the one memoized for the old version
            registry.invalidate(table);
            E::on_upgrade(db, stored, declared)?;
            // The hook may have altered the table; derive its schema afresh
            registry.invalidate(table);
            record(db, table, declared)?;
        }
        None => {
            debug!("Recording version {} for new table {}", declared, table);
            record(db, table, declared)?;
        }
    }

    registry.record_version(table, declared);
    Ok(())
}

/// Replace whatever is stored for the table with a single record
fn record(db: &Database, table: &str, version: i32) -> PersistenceResult<()> {
    let versions = db.version_table()?;
    versions.delete_where(TABLE_NAME, table)?;

    let mut entry = TableVersion::new(table, version);
    if !versions.insert(&mut entry)? {
        return Err(PersistenceError::VersionNotRecorded {
            table: table.to_string(),
            version,
        });
    }
    Ok(())
}

/// Remove a table's version record
pub(crate) fn forget(db: &Database, table: &str) -> PersistenceResult<usize> {
    db.version_table()?.delete_where(TABLE_NAME, table)
}

/// All version records
pub fn all(db: &Database) -> PersistenceResult<Vec<TableVersion>> {
    if !exists(db)? {
        return Ok(Vec::new());
    }
    let versions: Table<'_, TableVersion> = db.version_table()?;
    versions.all()?.collect()
}
