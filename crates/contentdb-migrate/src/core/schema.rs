//! Canonical schema types shared by the builder, introspector, differ and emitter.
//!
//! These types describe tables and columns without naming any SQL dialect's
//! native types. A [`SchemaDefinition`] is either the desired state (built
//! from the content model) or the actual state (introspected from the live
//! database); both compare structurally.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Name of the mandatory surrogate key column.
pub const ID_COLUMN: &str = "id";

/// Closed set of column types understood by every dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CanonicalType {
    Integer,
    Text,
    Varchar,
    Boolean,
    Numeric,
    Timestamp,
    Jsonb,
    TextArray,
    /// Reference to another collection's `id`. Stored as an integer.
    Relation,
}

impl CanonicalType {
    /// Name used in generated declaration files and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalType::Integer => "integer",
            CanonicalType::Text => "text",
            CanonicalType::Varchar => "varchar",
            CanonicalType::Boolean => "boolean",
            CanonicalType::Numeric => "numeric",
            CanonicalType::Timestamp => "timestamp",
            CanonicalType::Jsonb => "jsonb",
            CanonicalType::TextArray => "textArray",
            CanonicalType::Relation => "relation",
        }
    }

    /// Rust path of the variant, used when rendering declaration modules.
    pub fn variant_name(&self) -> &'static str {
        match self {
            CanonicalType::Integer => "Integer",
            CanonicalType::Text => "Text",
            CanonicalType::Varchar => "Varchar",
            CanonicalType::Boolean => "Boolean",
            CanonicalType::Numeric => "Numeric",
            CanonicalType::Timestamp => "Timestamp",
            CanonicalType::Jsonb => "Jsonb",
            CanonicalType::TextArray => "TextArray",
            CanonicalType::Relation => "Relation",
        }
    }

    /// Whether the catalog reports a character length for this type.
    pub fn supports_max_length(&self) -> bool {
        matches!(self, CanonicalType::Varchar)
    }
}

impl fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column default value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnDefault {
    /// Database-generated auto-increment value.
    Identity,
    /// Literal SQL fragment, e.g. `'draft'::text` or `now()`.
    Expression(String),
}

/// One column's structural attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnDefinition {
    #[serde(rename = "type")]
    pub column_type: CanonicalType,
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ColumnDefault>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
}

impl ColumnDefinition {
    /// Nullable column with no default and no length limit.
    pub fn new(column_type: CanonicalType) -> Self {
        Self {
            column_type,
            nullable: true,
            default: None,
            max_length: None,
        }
    }

    /// The mandatory `id` column: non-null integer identity.
    pub fn identity() -> Self {
        Self {
            column_type: CanonicalType::Integer,
            nullable: false,
            default: Some(ColumnDefault::Identity),
            max_length: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn with_default(mut self, default: ColumnDefault) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_max_length(mut self, max_length: u32) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Whether this column is generated by the database.
    pub fn is_identity(&self) -> bool {
        matches!(self.default, Some(ColumnDefault::Identity))
    }
}

/// Ordered set of columns belonging to one table.
///
/// Column order is preserved for DDL output but ignored by equality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableDefinition {
    columns: IndexMap<String, ColumnDefinition>,
}

impl TableDefinition {
    /// Empty table (used by the introspector, which discovers `id` itself).
    pub fn new() -> Self {
        Self::default()
    }

    /// Table pre-populated with the mandatory `id` column.
    pub fn with_id() -> Self {
        let mut table = Self::new();
        table.insert(ID_COLUMN, ColumnDefinition::identity());
        table
    }

    /// Insert or replace a column, keeping its original position on replace.
    pub fn insert(&mut self, name: impl Into<String>, column: ColumnDefinition) {
        self.columns.insert(name.into(), column);
    }

    pub fn get(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<ColumnDefinition> {
        self.columns.shift_remove(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ColumnDefinition> {
        self.columns.get_mut(name)
    }

    /// Columns in declaration order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &ColumnDefinition)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Map of table name to definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaDefinition {
    tables: BTreeMap<String, TableDefinition>,
}

impl SchemaDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, table: TableDefinition) {
        self.tables.insert(name.into(), table);
    }

    pub fn get(&self, name: &str) -> Option<&TableDefinition> {
        self.tables.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut TableDefinition> {
        self.tables.get_mut(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<TableDefinition> {
        self.tables.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Tables sorted by name.
    pub fn tables(&self) -> impl Iterator<Item = (&str, &TableDefinition)> {
        self.tables.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_equality_ignores_column_order() {
        let mut a = TableDefinition::with_id();
        a.insert("title", ColumnDefinition::new(CanonicalType::Varchar));
        a.insert("body", ColumnDefinition::new(CanonicalType::Text));

        let mut b = TableDefinition::new();
        b.insert("body", ColumnDefinition::new(CanonicalType::Text));
        b.insert("title", ColumnDefinition::new(CanonicalType::Varchar));
        b.insert(ID_COLUMN, ColumnDefinition::identity());

        assert_eq!(a, b);
        assert_eq!(a.column_names(), vec!["id", "title", "body"]);
    }

    #[test]
    fn test_column_equality_is_attribute_wise() {
        let a = ColumnDefinition::new(CanonicalType::Varchar).with_max_length(50);
        let b = ColumnDefinition::new(CanonicalType::Varchar).with_max_length(50);
        let c = ColumnDefinition::new(CanonicalType::Varchar).with_max_length(80);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, a.clone().not_null());
    }

    #[test]
    fn test_schema_equality_ignores_insertion_order() {
        let mut a = SchemaDefinition::new();
        a.insert("posts", TableDefinition::with_id());
        a.insert("authors", TableDefinition::with_id());

        let mut b = SchemaDefinition::new();
        b.insert("authors", TableDefinition::with_id());
        b.insert("posts", TableDefinition::with_id());

        assert_eq!(a, b);
        assert_eq!(a.table_names(), vec!["authors", "posts"]);
    }

    #[test]
    fn test_identity_column_invariant() {
        let table = TableDefinition::with_id();
        let id = table.get(ID_COLUMN).unwrap();
        assert_eq!(id.column_type, CanonicalType::Integer);
        assert!(!id.nullable);
        assert!(id.is_identity());
    }

    #[test]
    fn test_remove_keeps_remaining_order() {
        let mut table = TableDefinition::with_id();
        table.insert("a", ColumnDefinition::new(CanonicalType::Text));
        table.insert("b", ColumnDefinition::new(CanonicalType::Text));
        table.remove("a");
        assert_eq!(table.column_names(), vec!["id", "b"]);
    }
}
