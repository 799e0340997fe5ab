//! Shared schema state
//!
//! One [`SchemaRegistry`] is created per process (or per test) and shared
//! by every [`Database`](crate::Database) handle through an `Arc`. It holds:
//!
//! - the table-creation cache: tables whose DDL was issued in this process
//! - derived schemas, memoized per table name
//! - the version registry's view: tables whose version is already reconciled
//!
//! The cache only saves statements. `CREATE TABLE IF NOT EXISTS` is what
//! keeps schema creation idempotent across restarts and cache misses.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use tracing::{debug, info};

use crate::error::PersistenceResult;
use crate::schema::{table_name, EntityDescriptor, TableSchema};
use crate::statement;
use crate::storage::Storage;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Process-wide memo of table schemas, created tables and verified versions
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    created: Mutex<HashSet<String>>,
    schemas: Mutex<HashMap<String, Arc<TableSchema>>>,
    versions: Mutex<HashMap<String, i32>>,
    /// Tables whose version is being reconciled, and the thread doing it
    reconciling: Mutex<HashMap<String, ThreadId>>,
    reconciled: Condvar,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schema for an entity, derived on first use of its table name
    pub fn schema_for(&self, descriptor: &EntityDescriptor) -> PersistenceResult<Arc<TableSchema>> {
        let mut schemas = lock(&self.schemas);
        if let Some(schema) = schemas.get(table_name(descriptor)) {
            return Ok(Arc::clone(schema));
        }

        let schema = Arc::new(TableSchema::describe(descriptor)?);
        schemas.insert(schema.name().to_string(), Arc::clone(&schema));
        Ok(schema)
    }

    /// Issue table and index DDL unless this process already did
    ///
    /// Returns `true` when statements were issued. The check and the DDL run
    /// under one lock so concurrent callers never race on the same table.
    pub fn ensure_created(
        &self,
        storage: &dyn Storage,
        schema: &TableSchema,
    ) -> PersistenceResult<bool> {
        let mut created = lock(&self.created);
        if created.contains(schema.name()) {
            return Ok(false);
        }

        storage.execute(&statement::create_table(schema))?;
        for index in schema.index_groups() {
            storage.execute(&statement::create_index(&index, schema.name()))?;
        }

        created.insert(schema.name().to_string());
        info!("Ensured table {}", schema.name());
        Ok(true)
    }

    pub fn is_created(&self, table: &str) -> bool {
        lock(&self.created).contains(table)
    }

    /// Forget everything known about one table
    pub fn invalidate(&self, table: &str) {
        lock(&self.created).remove(table);
        lock(&self.schemas).remove(table);
        lock(&self.versions).remove(table);
        debug!("Invalidated cached schema for {}", table);
    }

    /// Forget everything; for test isolation
    pub fn reset(&self) {
        lock(&self.created).clear();
        lock(&self.schemas).clear();
        lock(&self.versions).clear();
    }

    pub(crate) fn verified_version(&self, table: &str) -> Option<i32> {
        lock(&self.versions).get(table).copied()
    }

    pub(crate) fn record_version(&self, table: &str, version: i32) {
        lock(&self.versions).insert(table.to_string(), version);
    }

    /// Claim a table for version reconciliation
    ///
    /// Blocks while another thread holds the claim. Returns `None` when the
    /// calling thread already holds it, which happens when an upgrade hook
    /// opens its own table.
    pub(crate) fn claim_reconcile(&self, table: &str) -> Option<ReconcileClaim<'_>> {
        let me = thread::current().id();
        let mut claims = lock(&self.reconciling);
        loop {
            let owner = claims.get(table).copied();
            match owner {
                Some(owner) if owner == me => return None,
                Some(_) => {
                    claims = self
                        .reconciled
                        .wait(claims)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                None => break,
            }
        }

        claims.insert(table.to_string(), me);
        Some(ReconcileClaim {
            registry: self,
            table: table.to_string(),
        })
    }
}

/// Exclusive right to reconcile one table's version, released on drop
pub(crate) struct ReconcileClaim<'a> {
    registry: &'a SchemaRegistry,
    table: String,
}

impl Drop for ReconcileClaim<'_> {
    fn drop(&mut self) {
        lock(&self.registry.reconciling).remove(&self.table);
        self.registry.reconciled.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CountingStorage, Item};
    use crate::Entity;

    #[test]
    fn test_schema_is_memoized() {
        let registry = SchemaRegistry::new();
        let first = registry.schema_for(&Item::descriptor()).unwrap();
        let second = registry.schema_for(&Item::descriptor()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        registry.invalidate("Item");
        let third = registry.schema_for(&Item::descriptor()).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn test_ensure_created_issues_ddl_once() {
        let registry = SchemaRegistry::new();
        let storage = CountingStorage::in_memory();
        let schema = registry.schema_for(&Item::descriptor()).unwrap();

        assert!(registry.ensure_created(&storage, &schema).unwrap());
        assert!(!registry.ensure_created(&storage, &schema).unwrap());
        assert!(registry.is_created("Item"));
        assert_eq!(storage.count_matching("CREATE TABLE"), 1);
        assert_eq!(storage.count_matching("CREATE INDEX"), 1);
    }

    #[test]
    fn test_invalidate_allows_recreation() {
        let registry = SchemaRegistry::new();
        let storage = CountingStorage::in_memory();
        let schema = registry.schema_for(&Item::descriptor()).unwrap();

        registry.ensure_created(&storage, &schema).unwrap();
        registry.record_version("Item", 1);
        registry.invalidate("Item");

        assert!(!registry.is_created("Item"));
        assert_eq!(registry.verified_version("Item"), None);
        assert!(registry.ensure_created(&storage, &schema).unwrap());
        assert_eq!(storage.count_matching("CREATE TABLE"), 2);
    }

    #[test]
    fn test_reset_clears_everything() {
        let registry = SchemaRegistry::new();
        let storage = CountingStorage::in_memory();
        let schema = registry.schema_for(&Item::descriptor()).unwrap();
        registry.ensure_created(&storage, &schema).unwrap();
        registry.record_version("Item", 3);

        registry.reset();
        assert!(!registry.is_created("Item"));
        assert_eq!(registry.verified_version("Item"), None);
    }

    #[test]
    fn test_reconcile_claim_is_per_table_and_reentrant() {
        let registry = SchemaRegistry::new();
        let item = registry.claim_reconcile("Item").unwrap();

        // Same thread, same table: already claimed
        assert!(registry.claim_reconcile("Item").is_none());
        // Other tables stay available
        assert!(registry.claim_reconcile("Archive").is_some());

        drop(item);
        assert!(registry.claim_reconcile("Item").is_some());
    }

    #[test]
    fn test_reconcile_claim_blocks_other_threads() {
        let registry = Arc::new(SchemaRegistry::new());
        let claim = registry.claim_reconcile("Item").unwrap();

        let (tx, rx) = std::sync::mpsc::channel();
        let waiter = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                let _claim = registry.claim_reconcile("Item");
                tx.send(()).unwrap();
            })
        };

        assert!(rx.recv_timeout(std::time::Duration::from_millis(100)).is_err());
        drop(claim);
        rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap();
        waiter.join().unwrap();
    }

    #[test]
    fn test_concurrent_ensure_issues_ddl_once() {
        let registry = Arc::new(SchemaRegistry::new());
        let schema = registry.schema_for(&Item::descriptor()).unwrap();
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("shared.sqlite");

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let schema = Arc::clone(&schema);
                let path = path.clone();
                std::thread::spawn(move || {
                    let storage = CountingStorage::open(&path);
                    let issued = registry.ensure_created(&storage, &schema).unwrap();
                    (issued, storage.count_matching("CREATE TABLE"))
                })
            })
            .collect();

        let results: Vec<(bool, usize)> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|(issued, _)| *issued).count(), 1);
        assert_eq!(results.iter().map(|(_, n)| n).sum::<usize>(), 1);
    }
}
