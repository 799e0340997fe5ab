//! Type mapping between record fields and SQLite storage classes
//!
//! Every field declares a [`SemanticType`]. The mapper turns it into the
//! column's [`StorageClass`] for DDL, decodes cursor columns with the
//! matching typed accessor, and renders [`Value`]s as SQL literals for
//! logging. Unknown or ambiguous types degrade to `BLOB`, never to an error.

use std::fmt;

use crate::error::{PersistenceError, PersistenceResult};
use crate::schema::FieldDescriptor;
use crate::storage::Cursor;

/// Semantic type of a declared field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticType {
    Integer,
    Real,
    Text,
    Blob,
}

/// Coarse column type of the underlying store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageClass {
    Integer,
    Real,
    Text,
    Blob,
    Null,
}

impl StorageClass {
    pub fn as_sql(&self) -> &'static str {
        match self {
            StorageClass::Integer => "INTEGER",
            StorageClass::Real => "REAL",
            StorageClass::Text => "TEXT",
            StorageClass::Blob => "BLOB",
            StorageClass::Null => "NULL",
        }
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Map a field's semantic type to its storage class
///
/// An absent type maps to `NULL`.
pub fn storage_class_of(semantic: Option<SemanticType>) -> StorageClass {
    match semantic {
        Some(SemanticType::Integer) => StorageClass::Integer,
        Some(SemanticType::Real) => StorageClass::Real,
        Some(SemanticType::Text) => StorageClass::Text,
        Some(SemanticType::Blob) => StorageClass::Blob,
        None => StorageClass::Null,
    }
}

/// An in-memory column value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name of the storage class this value would be stored as
    pub fn type_name(&self) -> &'static str {
        self.storage_class().as_sql()
    }

    pub fn storage_class(&self) -> StorageClass {
        match self {
            Value::Null => StorageClass::Null,
            Value::Integer(_) => StorageClass::Integer,
            Value::Real(_) => StorageClass::Real,
            Value::Text(_) => StorageClass::Text,
            Value::Blob(_) => StorageClass::Blob,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert into a typed field value
    pub fn into_typed<T: FromValue>(self) -> PersistenceResult<T> {
        T::from_value(self)
    }
}

macro_rules! value_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Integer(i64::from(v))
                }
            }
        )*
    };
}

value_from_int!(i8, i16, i32, i64, u8, u16, u32, bool);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Real(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Conversion from a decoded column value into a field type
pub trait FromValue: Sized {
    fn from_value(value: Value) -> PersistenceResult<Self>;
}

fn mismatch<T>(expected: &'static str, found: &Value) -> PersistenceResult<T> {
    Err(PersistenceError::TypeMismatch {
        expected,
        found: found.type_name(),
    })
}

macro_rules! from_value_int {
    ($($t:ty),*) => {
        $(
            impl FromValue for $t {
                fn from_value(value: Value) -> PersistenceResult<Self> {
                    match value {
                        Value::Integer(i) => <$t>::try_from(i).or_else(|_| {
                            mismatch(stringify!($t), &Value::Integer(i))
                        }),
                        other => mismatch("INTEGER", &other),
                    }
                }
            }
        )*
    };
}

from_value_int!(i8, i16, i32, i64, u8, u16, u32);

impl FromValue for bool {
    fn from_value(value: Value) -> PersistenceResult<Self> {
        match value {
            Value::Integer(i) => Ok(i != 0),
            other => mismatch("INTEGER", &other),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> PersistenceResult<Self> {
        match value.as_f64() {
            Some(f) => Ok(f),
            None => mismatch("REAL", &value),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> PersistenceResult<Self> {
        f64::from_value(value).map(|f| f as f32)
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> PersistenceResult<Self> {
        match value {
            Value::Text(s) => Ok(s),
            other => mismatch("TEXT", &other),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> PersistenceResult<Self> {
        match value {
            Value::Blob(b) => Ok(b),
            Value::Text(s) => Ok(s.into_bytes()),
            other => mismatch("BLOB", &other),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> PersistenceResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Rust types with a fixed semantic column type
///
/// Lets descriptors be declared from the field's Rust type, e.g.
/// `FieldDescriptor::of::<f64>("price")`.
pub trait ColumnType {
    fn semantic_type() -> SemanticType;
}

macro_rules! column_type {
    ($semantic:ident: $($t:ty),*) => {
        $(
            impl ColumnType for $t {
                fn semantic_type() -> SemanticType {
                    SemanticType::$semantic
                }
            }
        )*
    };
}

column_type!(Integer: i8, i16, i32, i64, u8, u16, u32, bool);
column_type!(Real: f32, f64);
column_type!(Text: String, char);
column_type!(Blob: Vec<u8>);

impl<T: ColumnType> ColumnType for Option<T> {
    fn semantic_type() -> SemanticType {
        T::semantic_type()
    }
}

/// Decode the field's column from the cursor's current row
///
/// Uses the accessor matching the field's semantic type. Returns `None`
/// when the cursor does not carry the column, and for `BLOB` fields,
/// which callers read as opaque bytes.
pub fn decode(cursor: &dyn Cursor, field: &FieldDescriptor) -> PersistenceResult<Option<Value>> {
    let Some(index) = cursor.column_index(field.name()) else {
        return Ok(None);
    };

    if cursor.is_null(index)? {
        return Ok(Some(Value::Null));
    }

    let value = match field.semantic_type() {
        SemanticType::Integer => Value::Integer(cursor.get_i64(index)?),
        SemanticType::Real => Value::Real(cursor.get_f64(index)?),
        SemanticType::Text => Value::Text(cursor.get_string(index)?),
        SemanticType::Blob => return Ok(None),
    };
    Ok(Some(value))
}

/// Render a value as a SQL literal
///
/// Numbers are bare, text is escaped and single-quoted, blobs use the
/// `X'..'` hex form and absent values render as `NULL`.
pub fn encode(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => format!("{:?}", f),
        Value::Text(s) => escape_text(s),
        Value::Blob(b) => {
            let hex: String = b.iter().map(|byte| format!("{:02X}", byte)).collect();
            format!("X'{}'", hex)
        }
    }
}

/// Escape and quote a string literal
fn escape_text(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Plain text rendering of a value for display adapters
///
/// `NULL` and blobs render as an empty string.
pub fn value_as_string(value: &Value) -> String {
    match value {
        Value::Null | Value::Blob(_) => String::new(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s.clone(),
    }
}
