//! Typed CRUD over one entity table
//!
//! Precondition failures (no primary key, no matching row, more than one
//! matching row, an insert the store ignored) come back as `Ok(false)`.
//! Only storage and conversion failures are errors.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::database::Database;
use crate::entity::{is_new_id, Entity, Record};
use crate::error::PersistenceResult;
use crate::schema::TableSchema;
use crate::statement::{self, Statement};
use crate::storage::Cursor;
use crate::types::{decode, Value};

/// Handle on the table of entity type `E`
pub struct Table<'db, E> {
    db: &'db Database,
    schema: Arc<TableSchema>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> fmt::Debug for Table<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl<'db, E: Entity> Table<'db, E> {
    pub(crate) fn new(db: &'db Database, schema: Arc<TableSchema>) -> Self {
        Self {
            db,
            schema,
            _entity: PhantomData,
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn name(&self) -> &str {
        self.schema.name()
    }

    /// Insert the record and assign the store's row id to it
    ///
    /// Creates the table first if it was dropped since this handle was made.
    pub fn insert(&self, record: &mut E) -> PersistenceResult<bool> {
        self.db
            .registry()
            .ensure_created(self.db.storage(), &self.schema)?;

        let id = self
            .db
            .storage()
            .insert(&statement::insert(&self.schema, &*record))?;
        if id < 0 {
            debug!("Insert into {} was not applied", self.name());
            return Ok(false);
        }

        record.set_id(Some(id));
        Ok(true)
    }

    /// Write every non-key column of a persisted record
    ///
    /// Does not check that the row still exists.
    pub fn update(&self, record: &E) -> PersistenceResult<bool> {
        let Some(update) = statement::update(&self.schema, record) else {
            return Ok(false);
        };
        self.db.storage().execute(&update)?;
        Ok(true)
    }

    /// Insert a new record, update a persisted one
    pub fn save(&self, record: &mut E) -> PersistenceResult<bool> {
        if record.is_new() {
            self.insert(record)
        } else {
            self.update(record)
        }
    }

    /// Reload a record from the row matching its primary key
    pub fn find(&self, record: &mut E) -> PersistenceResult<bool> {
        match record.id() {
            Some(id) if !is_new_id(Some(id)) => self.find_by_id(id, record),
            _ => Ok(false),
        }
    }

    /// Fill a record from the row with the given primary key
    pub fn find_by_id(&self, id: i64, record: &mut E) -> PersistenceResult<bool> {
        self.fill_single(&statement::select_by_id(&self.schema, id), record)
    }

    /// Load the row with the given primary key into a new record
    pub fn get(&self, id: i64) -> PersistenceResult<Option<E>> {
        let mut record = E::default();
        if self.find_by_id(id, &mut record)? {
            Ok(Some(record))
        } else {
            Ok(None)
        }
    }

    /// Fill a record from the single row whose column equals the value
    pub fn find_by(
        &self,
        column: &str,
        value: impl Into<Value>,
        record: &mut E,
    ) -> PersistenceResult<bool> {
        let select = statement::select_where(&self.schema, column, value.into())?;
        self.fill_single(&select, record)
    }

    /// Every row, decoded lazily
    pub fn all(&self) -> PersistenceResult<Records<E>> {
        let cursor = self
            .db
            .storage()
            .query(&statement::select_all(&self.schema))?;
        Ok(Records::new(cursor, Arc::clone(&self.schema)))
    }

    /// Delete the row of a persisted record
    pub fn delete(&self, record: &E) -> PersistenceResult<bool> {
        match record.id() {
            Some(id) if !is_new_id(Some(id)) => {
                let affected = self
                    .db
                    .storage()
                    .delete(&statement::delete(&self.schema, id))?;
                Ok(affected > 0)
            }
            _ => Ok(false),
        }
    }

    /// Delete every row whose column equals the value
    pub fn delete_where(&self, column: &str, value: impl Into<Value>) -> PersistenceResult<usize> {
        let delete = statement::delete_where(&self.schema, column, value.into())?;
        self.db.storage().delete(&delete)
    }

    pub fn count(&self) -> PersistenceResult<i64> {
        self.db.count_rows(self.name())
    }

    /// Drop the table and its version record
    pub fn drop_table(&self) -> PersistenceResult<()> {
        self.db.drop_table(self.name())
    }

    fn fill_single(&self, select: &Statement, record: &mut E) -> PersistenceResult<bool> {
        let mut cursor = self.db.storage().query(select)?;
        let found = match cursor.row_count() {
            0 => Ok(false),
            1 => {
                cursor.move_to_first();
                fill(cursor.as_ref(), &self.schema, record).map(|()| true)
            }
            rows => {
                warn!("Expected one row in {} but found {}", self.name(), rows);
                Ok(false)
            }
        };
        cursor.close();
        found
    }
}

/// Lazy sequence of records read from a cursor
///
/// Each row is decoded once, when it is reached. The cursor is closed as
/// soon as the last row has been consumed.
pub struct Records<E> {
    cursor: Box<dyn Cursor>,
    schema: Arc<TableSchema>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Records<E> {
    fn new(cursor: Box<dyn Cursor>, schema: Arc<TableSchema>) -> Self {
        Self {
            cursor,
            schema,
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Iterator for Records<E> {
    type Item = PersistenceResult<E>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor.is_closed() {
            return None;
        }
        if !self.cursor.move_to_next() {
            self.cursor.close();
            return None;
        }

        let mut record = E::default();
        Some(fill(self.cursor.as_ref(), &self.schema, &mut record).map(|()| record))
    }
}

/// Decode the cursor's current row into a record
///
/// Only columns the cursor carries are applied; the rest of the record is
/// left as it was.
pub fn fill(
    cursor: &dyn Cursor,
    schema: &TableSchema,
    record: &mut dyn Record,
) -> PersistenceResult<()> {
    let key = schema.primary_key();
    if let Some(index) = cursor.column_index(key.name()) {
        let id = if cursor.is_null(index)? {
            None
        } else {
            Some(cursor.get_i64(index)?)
        };
        record.set_id(id);
    }

    for field in schema.data_fields() {
        let Some(index) = cursor.column_index(field.name()) else {
            continue;
        };
        let value = match decode(cursor, field)? {
            Some(value) => value,
            None => Value::Blob(cursor.get_blob(index)?),
        };
        record.set_value(field.name(), value)?;
    }
    Ok(())
}

/// Decode every remaining row of the cursor, then close it
pub fn fill_all<E: Entity>(
    cursor: &mut dyn Cursor,
    schema: &TableSchema,
) -> PersistenceResult<Vec<E>> {
    let mut records = Vec::with_capacity(cursor.row_count());
    while cursor.move_to_next() {
        let mut record = E::default();
        fill(cursor, schema, &mut record)?;
        records.push(record);
    }
    cursor.close();
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PersistenceError;
    use crate::schema::{EntityDescriptor, FieldDescriptor};
    use crate::storage::RowCursor;
    use crate::test_support::Item;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Attachment {
        id: Option<i64>,
        label: String,
        data: Vec<u8>,
        size: Option<i64>,
        cached: bool,
    }

    impl Record for Attachment {
        fn id(&self) -> Option<i64> {
            self.id
        }

        fn set_id(&mut self, id: Option<i64>) {
            self.id = id;
        }

        fn value(&self, column: &str) -> Value {
            match column {
                "label" => self.label.clone().into(),
                "data" => self.data.clone().into(),
                "size" => self.size.into(),
                _ => Value::Null,
            }
        }

        fn set_value(&mut self, column: &str, value: Value) -> PersistenceResult<()> {
            match column {
                "label" => self.label = value.into_typed()?,
                "data" => self.data = value.into_typed()?,
                "size" => self.size = value.into_typed()?,
                _ => return Err(PersistenceError::unknown_column("Attachment", column)),
            }
            Ok(())
        }
    }

    impl Entity for Attachment {
        fn descriptor() -> EntityDescriptor {
            EntityDescriptor::new("Attachment")
                .version(1)
                .field(FieldDescriptor::text("label").index("idx_attachment_label"))
                .field(FieldDescriptor::blob("data"))
                .field(FieldDescriptor::of::<Option<i64>>("size"))
                .field(FieldDescriptor::integer("cached").transient())
        }
    }

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_debug_shows_schema() {
        let db = db();
        let items = db.table::<Item>().unwrap();
        let debug = format!("{:?}", items);
        assert!(debug.starts_with("Table {"));
        assert!(debug.contains("\"Item\""));
    }

    #[test]
    fn test_insert_assigns_id() {
        let db = db();
        let items = db.table::<Item>().unwrap();

        let mut pen = Item::new("pen", 1.5);
        assert!(items.insert(&mut pen).unwrap());
        assert_eq!(pen.id, Some(1));

        let mut ink = Item::new("ink", 3.0);
        assert!(items.insert(&mut ink).unwrap());
        assert_eq!(ink.id, Some(2));
    }

    #[test]
    fn test_update_requires_id() {
        let db = db();
        let items = db.table::<Item>().unwrap();
        assert!(!items.update(&Item::new("pen", 1.5)).unwrap());
    }

    #[test]
    fn test_update_keeps_id() {
        let db = db();
        let items = db.table::<Item>().unwrap();
        let mut pen = Item::new("pen", 1.5);
        items.insert(&mut pen).unwrap();

        pen.price = 2.0;
        assert!(items.update(&pen).unwrap());
        assert_eq!(pen.id, Some(1));
        assert_eq!(items.get(1).unwrap().unwrap().price, 2.0);
    }

    #[test]
    fn test_save_dispatches_on_id() {
        let db = db();
        let items = db.table::<Item>().unwrap();

        let mut pen = Item::new("pen", 1.5);
        assert!(items.save(&mut pen).unwrap());
        assert_eq!(pen.id, Some(1));

        pen.name = "fountain pen".into();
        assert!(items.save(&mut pen).unwrap());
        assert_eq!(pen.id, Some(1));
        assert_eq!(items.count().unwrap(), 1);
        assert_eq!(items.get(1).unwrap().unwrap().name, "fountain pen");
    }

    #[test]
    fn test_find_missing_is_false() {
        let db = db();
        let items = db.table::<Item>().unwrap();

        let mut item = Item::default();
        assert!(!items.find_by_id(42, &mut item).unwrap());
        assert!(!items.find(&mut item).unwrap());
        assert!(items.get(42).unwrap().is_none());
        assert_eq!(item, Item::default());
    }

    #[test]
    fn test_find_reloads_record() {
        let db = db();
        let items = db.table::<Item>().unwrap();
        let mut pen = Item::new("pen", 1.5);
        items.insert(&mut pen).unwrap();

        let mut stale = Item {
            id: pen.id,
            ..Default::default()
        };
        assert!(items.find(&mut stale).unwrap());
        assert_eq!(stale, pen);
    }

    #[test]
    fn test_find_by_requires_single_row() {
        let db = db();
        let items = db.table::<Item>().unwrap();
        items.insert(&mut Item::new("pen", 1.5)).unwrap();
        items.insert(&mut Item::new("pen", 2.5)).unwrap();
        items.insert(&mut Item::new("ink", 4.0)).unwrap();

        let mut found = Item::default();
        assert!(!items.find_by("name", "pen", &mut found).unwrap());
        assert!(items.find_by("name", "ink", &mut found).unwrap());
        assert_eq!(found.id, Some(3));
        assert!(matches!(
            items.find_by("colour", "red", &mut found),
            Err(PersistenceError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn test_delete() {
        let db = db();
        let items = db.table::<Item>().unwrap();
        let mut pen = Item::new("pen", 1.5);

        assert!(!items.delete(&pen).unwrap());
        items.insert(&mut pen).unwrap();
        assert!(items.delete(&pen).unwrap());
        assert!(!items.delete(&pen).unwrap());
        assert!(items.get(1).unwrap().is_none());
    }

    #[test]
    fn test_delete_where() {
        let db = db();
        let items = db.table::<Item>().unwrap();
        items.insert(&mut Item::new("pen", 1.5)).unwrap();
        items.insert(&mut Item::new("pen", 2.5)).unwrap();
        items.insert(&mut Item::new("ink", 4.0)).unwrap();

        assert_eq!(items.delete_where("name", "pen").unwrap(), 2);
        assert_eq!(items.count().unwrap(), 1);
    }

    #[test]
    fn test_all_is_lazy_and_finite() {
        let db = db();
        let items = db.table::<Item>().unwrap();
        for (name, price) in [("pen", 1.5), ("ink", 4.0), ("pad", 2.25)] {
            items.insert(&mut Item::new(name, price)).unwrap();
        }

        let mut records = items.all().unwrap();
        let first = records.next().unwrap().unwrap();
        assert_eq!(first.name, "pen");

        let rest: Vec<Item> = records.by_ref().map(|r| r.unwrap()).collect();
        assert_eq!(rest.len(), 2);
        assert!(records.next().is_none());
        assert!(records.cursor.is_closed());
    }

    #[test]
    fn test_insert_recreates_dropped_table() {
        let db = db();
        let items = db.table::<Item>().unwrap();
        items.insert(&mut Item::new("pen", 1.5)).unwrap();

        items.drop_table().unwrap();
        let mut ink = Item::new("ink", 4.0);
        assert!(items.insert(&mut ink).unwrap());
        assert!(!ink.is_new());
        assert_eq!(items.count().unwrap(), 1);
    }

    #[test]
    fn test_round_trip_all_types() {
        let db = db();
        let attachments = db.table::<Attachment>().unwrap();

        let mut original = Attachment {
            label: "O'Brien".into(),
            data: vec![0, 1, 254, 255],
            size: Some(4),
            cached: true,
            ..Default::default()
        };
        attachments.insert(&mut original).unwrap();

        let mut empty = Attachment {
            label: "empty".into(),
            ..Default::default()
        };
        attachments.insert(&mut empty).unwrap();

        let loaded = attachments.get(1).unwrap().unwrap();
        assert_eq!(loaded.label, original.label);
        assert_eq!(loaded.data, original.data);
        assert_eq!(loaded.size, Some(4));
        assert!(!loaded.cached);

        let loaded = attachments.get(2).unwrap().unwrap();
        assert_eq!(loaded.size, None);
        assert!(loaded.data.is_empty());
    }

    #[test]
    fn test_transient_field_is_not_a_column() {
        let db = db();
        let attachments = db.table::<Attachment>().unwrap();
        assert_eq!(
            attachments.schema().column_names(),
            vec!["_id", "label", "data", "size"]
        );
    }

    #[test]
    fn test_fill_applies_only_present_columns() {
        let schema = TableSchema::describe(&Item::descriptor()).unwrap();
        let mut cursor = RowCursor::new(
            vec!["price".into()],
            vec![vec![Value::Real(9.5)]],
        );
        cursor.move_to_first();

        let mut item = Item {
            id: Some(7),
            name: "kept".into(),
            price: 0.0,
        };
        fill(&cursor, &schema, &mut item).unwrap();
        assert_eq!(item.id, Some(7));
        assert_eq!(item.name, "kept");
        assert_eq!(item.price, 9.5);
    }

    #[test]
    fn test_fill_all_closes_cursor() {
        let schema = TableSchema::describe(&Item::descriptor()).unwrap();
        let mut cursor = RowCursor::new(
            vec!["_id".into(), "name".into(), "price".into()],
            vec![
                vec![Value::Integer(1), Value::Text("pen".into()), Value::Real(1.5)],
                vec![Value::Integer(2), Value::Text("ink".into()), Value::Integer(4)],
            ],
        );

        let items: Vec<Item> = fill_all(&mut cursor, &schema).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].price, 4.0);
        assert!(cursor.is_closed());
    }
}
