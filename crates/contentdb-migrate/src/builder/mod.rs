//! Desired schema construction from a content model.
//!
//! Every collection with a field schema becomes one table that starts with
//! the `id` identity column, followed by its stored fields in declaration
//! order. Internationalized collections additionally fan out into one table
//! per non-default locale (`{collection}_{locale}`) carrying the same
//! columns.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::core::identifier::validate_identifier;
use crate::core::{CanonicalType, ColumnDefinition, SchemaDefinition, TableDefinition, ID_COLUMN};
use crate::error::{MigrateError, Result};
use crate::model::{CollectionDefinition, ContentModel, FieldDefinition};
use crate::typemap::{is_excluded_type, map_type};

/// Result of building the desired schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuildReport {
    pub schema: SchemaDefinition,

    /// Non-fatal validation warnings, one per skipped collection.
    pub skipped: Vec<String>,
}

/// Build the desired schema for a content model.
///
/// Collections without a field schema are skipped and reported. Invalid
/// collection, field or locale names are fatal, as is a table name claimed
/// by two sources (a collection key and another collection's locale table).
pub fn build(model: &ContentModel) -> Result<BuildReport> {
    let mut report = BuildReport::default();
    let mut claimed: HashMap<String, String> = HashMap::new();

    for (key, collection) in model.iter() {
        let Some(fields) = collection.schema.as_ref() else {
            let warning = MigrateError::ConfigValidation(format!(
                "Collection '{}' has no schema definition, skipping",
                key
            ));
            warn!("{}", warning);
            report.skipped.push(warning.to_string());
            continue;
        };

        validate_identifier(key)?;
        let table = build_table(key, fields.iter())?;
        debug!("Collection '{}' -> {} columns", key, table.len());

        claim(&mut claimed, key, format!("collection '{}'", key))?;
        for entry in locale_tables(key, collection) {
            let (locale, locale_table) = entry?;
            claim(
                &mut claimed,
                &locale_table,
                format!("locale '{}' of collection '{}'", locale, key),
            )?;
            report.schema.insert(locale_table, table.clone());
        }
        report.schema.insert(key, table);
    }

    Ok(report)
}

fn claim(claimed: &mut HashMap<String, String>, table: &str, source: String) -> Result<()> {
    if let Some(existing) = claimed.get(table) {
        return Err(MigrateError::Config(format!(
            "Table '{}' is produced by both {} and {}",
            table, existing, source
        )));
    }
    claimed.insert(table.to_string(), source);
    Ok(())
}

fn build_table<'a>(
    collection: &str,
    fields: impl Iterator<Item = (&'a String, &'a FieldDefinition)>,
) -> Result<TableDefinition> {
    let mut table = TableDefinition::with_id();

    for (name, field) in fields {
        if !field.db || is_excluded_type(&field.field_type) {
            continue;
        }
        if name == ID_COLUMN {
            warn!(
                "Field '{}.{}' collides with the identity column, ignoring",
                collection, name
            );
            continue;
        }
        validate_identifier(name)?;
        table.insert(name.as_str(), column_for(field));
    }

    Ok(table)
}

fn column_for(field: &FieldDefinition) -> ColumnDefinition {
    let column_type = map_type(&field.field_type);
    let mut column = ColumnDefinition::new(column_type).nullable(!field.required);

    if column_type == CanonicalType::Varchar {
        if let Some(max_length) = field.max_length() {
            column = column.with_max_length(max_length);
        }
    }

    column
}

fn locale_tables<'a>(
    key: &'a str,
    collection: &'a CollectionDefinition,
) -> impl Iterator<Item = Result<(&'a str, String)>> + 'a {
    collection
        .i18n
        .iter()
        .flat_map(|i18n| i18n.fan_out_locales())
        .map(move |locale| {
            let name = format!("{}_{}", key, locale);
            validate_identifier(&name)?;
            Ok((locale, name))
        })
}
