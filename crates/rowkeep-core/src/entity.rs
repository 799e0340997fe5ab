//! Entity declarations
//!
//! A plain struct becomes persistable by implementing [`Record`] (row
//! access by column name) and [`Entity`] (the static descriptor and the
//! upgrade hook). Nothing is discovered at runtime.
//!
//! ```text
//! #[derive(Default)]
//! struct Item { id: Option<i64>, name: String, price: f64 }
//!
//! impl Entity for Item {
//!     fn descriptor() -> EntityDescriptor {
//!         EntityDescriptor::new("Item")
//!             .version(1)
//!             .field(FieldDescriptor::text("name").not_null())
//!             .field(FieldDescriptor::real("price"))
//!     }
//! }
//! ```

use tracing::info;

use crate::database::Database;
use crate::error::PersistenceResult;
use crate::schema::{table_name, EntityDescriptor, MIN_ID};
use crate::types::Value;

/// Check whether a primary key value marks an unpersisted record
///
/// A record is new when its id is absent or below [`MIN_ID`].
pub fn is_new_id(id: Option<i64>) -> bool {
    id.map_or(true, |id| id < MIN_ID)
}

/// Column-level access to one in-memory row
///
/// This is also the read-only surface display adapters use to render a
/// record's current values.
pub trait Record {
    /// Primary key, `None` until the record is inserted
    fn id(&self) -> Option<i64>;

    fn set_id(&mut self, id: Option<i64>);

    /// Current value of a persistable column; `Value::Null` for unknown names
    fn value(&self, column: &str) -> Value;

    /// Apply a decoded column value to the matching field
    fn set_value(&mut self, column: &str, value: Value) -> PersistenceResult<()>;

    /// `true` until the record has been inserted
    fn is_new(&self) -> bool {
        is_new_id(self.id())
    }
}

/// A record type bound to one table
pub trait Entity: Record + Default {
    /// Static declaration of name, version and fields
    fn descriptor() -> EntityDescriptor;

    /// Called when the stored table version differs from the declared one
    ///
    /// The default drops and recreates the table, discarding every row.
    /// Override it to migrate data instead.
    ///
    /// The hook may open any table. Handles on this entity's own table use
    /// the declared schema and skip reconciliation while the hook runs; the
    /// new version is recorded once it returns `Ok`.
    fn on_upgrade(db: &Database, from: i32, to: i32) -> PersistenceResult<()> {
        info!(
            "Recreating table {} for upgrade {} -> {}",
            table_name(&Self::descriptor()),
            from,
            to
        );
        db.recreate::<Self>()
    }
}
