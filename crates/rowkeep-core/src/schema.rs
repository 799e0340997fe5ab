//! Table schema derivation
//!
//! Entities declare their columns statically through an [`EntityDescriptor`].
//! [`TableSchema::describe`] validates a descriptor and turns it into the
//! immutable column list used for DDL and statement synthesis:
//!
//! - only persistable fields become columns
//! - exactly one primary key, always the first column; the implicit
//!   [`PRIMARY_KEY`] column is prepended unless the entity declares its own
//! - index groups collect columns by index name in declaration order

use std::collections::HashSet;

use crate::error::{PersistenceError, PersistenceResult};
use crate::types::{storage_class_of, ColumnType, SemanticType, StorageClass};

/// Name of the implicit primary key column. Don't declare a field with this name.
pub const PRIMARY_KEY: &str = "_id";

/// Smallest row id the store hands out
pub const MIN_ID: i64 = 1;

/// Constraint flags of a single column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Constraints {
    pub primary_key: bool,
    pub auto_increment: bool,
    pub not_null: bool,
}

/// Declaration of a single field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    name: String,
    semantic_type: SemanticType,
    constraints: Constraints,
    index_names: Vec<String>,
    persistable: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, semantic_type: SemanticType) -> Self {
        Self {
            name: name.into(),
            semantic_type,
            constraints: Constraints::default(),
            index_names: Vec::new(),
            persistable: true,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, SemanticType::Integer)
    }

    pub fn real(name: impl Into<String>) -> Self {
        Self::new(name, SemanticType::Real)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, SemanticType::Text)
    }

    pub fn blob(name: impl Into<String>) -> Self {
        Self::new(name, SemanticType::Blob)
    }

    /// Declare a field with the semantic type of a Rust type
    pub fn of<T: ColumnType>(name: impl Into<String>) -> Self {
        Self::new(name, T::semantic_type())
    }

    pub fn primary_key(mut self) -> Self {
        self.constraints.primary_key = true;
        self
    }

    /// Only takes effect together with `primary_key`
    pub fn auto_increment(mut self) -> Self {
        self.constraints.auto_increment = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.constraints.not_null = true;
        self
    }

    /// Add this column to the named index; may be called repeatedly
    pub fn index(mut self, index_name: impl Into<String>) -> Self {
        self.index_names.push(index_name.into());
        self
    }

    /// Keep the field in memory only
    pub fn transient(mut self) -> Self {
        self.persistable = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn semantic_type(&self) -> SemanticType {
        self.semantic_type
    }

    pub fn storage_class(&self) -> StorageClass {
        storage_class_of(Some(self.semantic_type))
    }

    pub fn constraints(&self) -> Constraints {
        self.constraints
    }

    pub fn index_names(&self) -> &[String] {
        &self.index_names
    }

    pub fn is_persistable(&self) -> bool {
        self.persistable
    }

    pub fn is_primary_key(&self) -> bool {
        self.constraints.primary_key
    }

    /// The omnipresent `_id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL`
    fn implicit_primary_key() -> Self {
        Self::integer(PRIMARY_KEY)
            .primary_key()
            .auto_increment()
            .not_null()
    }
}

/// Static declaration of an entity type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    name: String,
    table: Option<String>,
    version: Option<i32>,
    fields: Vec<FieldDescriptor>,
}

impl EntityDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            version: None,
            fields: Vec::new(),
        }
    }

    /// Store the entity under a table name other than its own name
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn version(mut self, version: i32) -> Self {
        self.version = Some(version);
        self
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// The declared schema version, validated to be >= 1
    pub fn declared_version(&self) -> PersistenceResult<i32> {
        match self.version {
            None => Err(PersistenceError::MissingVersion {
                table: table_name(self).to_string(),
            }),
            Some(version) if version < 1 => Err(PersistenceError::InvalidVersion {
                table: table_name(self).to_string(),
                version,
            }),
            Some(version) => Ok(version),
        }
    }
}

/// Storage name of an entity: the table override if set, else the entity name
pub fn table_name(descriptor: &EntityDescriptor) -> &str {
    descriptor.table.as_deref().unwrap_or(&descriptor.name)
}

/// Columns sharing one index name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexGroup {
    pub name: String,
    pub columns: Vec<String>,
}

/// Validated, immutable column layout of one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl TableSchema {
    /// Derive the schema of an entity
    ///
    /// Fails with a configuration error when the descriptor has no
    /// persistable field besides the primary key, declares a column twice,
    /// declares more than one primary key, or uses an invalid identifier.
    pub fn describe(descriptor: &EntityDescriptor) -> PersistenceResult<Self> {
        let name = table_name(descriptor);
        validate_identifier("table", name)?;

        let declared: Vec<&FieldDescriptor> = descriptor
            .fields()
            .iter()
            .filter(|f| f.is_persistable())
            .collect();

        let mut keys = declared.iter().filter(|f| f.is_primary_key());
        let declared_key = keys.next().copied();
        if keys.next().is_some() {
            return Err(PersistenceError::MultiplePrimaryKeys {
                table: name.to_string(),
            });
        }

        let primary_key = match declared_key {
            Some(key) if key.semantic_type() != SemanticType::Integer => {
                return Err(PersistenceError::InvalidPrimaryKey {
                    table: name.to_string(),
                    column: key.name().to_string(),
                });
            }
            Some(key) => key.clone(),
            None => FieldDescriptor::implicit_primary_key(),
        };

        let mut fields = vec![primary_key];
        fields.extend(
            declared
                .into_iter()
                .filter(|f| !f.is_primary_key())
                .cloned(),
        );

        if fields.len() < 2 {
            return Err(PersistenceError::NoPersistableFields {
                table: name.to_string(),
            });
        }

        let mut seen = HashSet::new();
        for field in &fields {
            validate_identifier("column", field.name())?;
            for index in field.index_names() {
                validate_identifier("index", index)?;
            }
            if !seen.insert(field.name()) {
                return Err(PersistenceError::DuplicateColumn {
                    table: name.to_string(),
                    column: field.name().to_string(),
                });
            }
        }

        Ok(Self {
            name: name.to_string(),
            fields,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// All columns, primary key first
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn primary_key(&self) -> &FieldDescriptor {
        &self.fields[0]
    }

    /// Columns other than the primary key
    pub fn data_fields(&self) -> &[FieldDescriptor] {
        &self.fields[1..]
    }

    pub fn field(&self, column: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name() == column)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name()).collect()
    }

    /// Group columns by index name, ordered by first appearance
    pub fn index_groups(&self) -> Vec<IndexGroup> {
        let mut groups: Vec<IndexGroup> = Vec::new();
        for field in &self.fields {
            for index in field.index_names() {
                match groups.iter_mut().find(|g| &g.name == index) {
                    Some(group) => group.columns.push(field.name().to_string()),
                    None => groups.push(IndexGroup {
                        name: index.clone(),
                        columns: vec![field.name().to_string()],
                    }),
                }
            }
        }
        groups
    }
}

/// Render the constraint clause of a column
///
/// Emits `PRIMARY KEY`, `AUTOINCREMENT` (only on a primary key) and
/// `NOT NULL` in that order; empty when none apply.
pub fn constraint_clause(field: &FieldDescriptor) -> String {
    let c = field.constraints();
    let mut parts = Vec::new();
    if c.primary_key {
        parts.push("PRIMARY KEY");
        if c.auto_increment {
            parts.push("AUTOINCREMENT");
        }
    }
    if c.not_null {
        parts.push("NOT NULL");
    }
    parts.join(" ")
}

/// Check that a name can be interpolated into SQL as a bare identifier
pub fn validate_identifier(kind: &'static str, name: &str) -> PersistenceResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(PersistenceError::InvalidIdentifier {
            kind,
            name: name.to_string(),
        })
    }
}
