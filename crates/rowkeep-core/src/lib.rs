//! Rowkeep Core Library
//!
//! A small object-to-row mapper over SQLite. Plain Rust structs declare
//! their table statically and get create, read, update and delete
//! operations plus per-table schema versioning.
//!
//! # Architecture
//!
//! - **Schema**: entity descriptors are validated into immutable table schemas
//! - **Statements**: SQL is synthesized from schemas; values are always bound
//! - **Storage**: a `Storage` trait over one connection, SQLite by default
//! - **Registry**: one shared object caches schemas, created tables and
//!   reconciled versions
//!
//! # Quick Start
//!
//! ```text
//! let db = Database::open(&Config::load()?)?;
//! let items = db.table::<Item>()?;
//!
//! let mut pen = Item::new("pen", 1.5);
//! items.insert(&mut pen)?;           // pen.id == Some(1)
//! pen.price = 2.0;
//! items.save(&mut pen)?;             // updates, id unchanged
//!
//! for item in items.all()? {
//!     println!("{:?}", item?);
//! }
//! ```
//!
//! # Modules
//!
//! - `database`: Database handle (main entry point)
//! - `table`: Typed CRUD over one entity table
//! - `entity`: Traits implemented by persistable structs
//! - `schema`: Entity descriptors and derived table schemas
//! - `statement`: SQL synthesis
//! - `types`: Column values and type mapping
//! - `storage`: Storage and cursor traits, SQLite backend
//! - `registry`: Shared schema state
//! - `versions`: Per-table schema versions
//! - `config`: Application configuration

pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod registry;
pub mod schema;
pub mod statement;
pub mod storage;
pub mod table;
pub mod types;
pub mod versions;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use database::{Database, TableDump};
pub use entity::{Entity, Record};
pub use error::{PersistenceError, PersistenceResult};
pub use registry::SchemaRegistry;
pub use schema::{EntityDescriptor, FieldDescriptor, TableSchema, MIN_ID, PRIMARY_KEY};
pub use statement::Statement;
pub use storage::{Cursor, RowCursor, SqliteStorage, Storage};
pub use table::{Records, Table};
pub use types::{SemanticType, StorageClass, Value};
pub use versions::{TableVersion, VERSION_TABLE};
