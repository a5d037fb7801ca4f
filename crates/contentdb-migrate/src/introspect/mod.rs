//! Live schema introspection.
//!
//! A single read-only catalog query returns one row per column; rows are
//! grouped into tables and mapped back to canonical column definitions by
//! the dialect.

use tracing::{debug, warn};

use crate::core::{
    CanonicalType, CatalogColumn, CatalogReader, ColumnDefinition, Dialect, SchemaDefinition,
    TableDefinition,
};
use crate::error::Result;

/// Introspect one namespace through a catalog reader.
pub async fn introspect<R>(reader: &R, dialect: &dyn Dialect, schema: &str) -> Result<SchemaDefinition>
where
    R: CatalogReader + ?Sized,
{
    let rows = reader.read_columns(dialect, schema).await?;
    let definition = build_schema(&rows, dialect);
    debug!(
        "Introspected {} tables ({} columns) in schema '{}'",
        definition.len(),
        rows.len(),
        schema
    );
    Ok(definition)
}

/// Group catalog rows (ordered by table, then ordinal position) into a schema.
pub fn build_schema(rows: &[CatalogColumn], dialect: &dyn Dialect) -> SchemaDefinition {
    let mut schema = SchemaDefinition::new();

    for row in rows {
        let column = column_from_catalog(row, dialect);
        match schema.get_mut(&row.table_name) {
            Some(table) => table.insert(row.column_name.as_str(), column),
            None => {
                let mut table = TableDefinition::new();
                table.insert(row.column_name.as_str(), column);
                schema.insert(row.table_name.as_str(), table);
            }
        }
    }

    schema
}

fn column_from_catalog(row: &CatalogColumn, dialect: &dyn Dialect) -> ColumnDefinition {
    let column_type = match dialect.canonical_type(&row.data_type, &row.udt_name) {
        Some(t) => t,
        None => {
            warn!(
                "Unknown native type '{}' ({}) for {}.{}, mapping to text",
                row.data_type, row.udt_name, row.table_name, row.column_name
            );
            CanonicalType::Text
        }
    };

    let mut column = ColumnDefinition::new(column_type).nullable(row.is_nullable);
    if let Some(default) = dialect.parse_default(row.column_default.as_deref(), row.is_identity) {
        column = column.with_default(default);
    }
    if column_type.supports_max_length() {
        if let Some(len) = row.character_maximum_length.and_then(|l| u32::try_from(l).ok()) {
            column = column.with_max_length(len);
        }
    }
    column
}
