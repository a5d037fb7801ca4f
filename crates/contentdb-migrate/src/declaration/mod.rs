//! Generated schema declaration module.
//!
//! `generate-schema` writes a Rust source file with one `pub const`
//! [`TableDecl`] per table of the desired schema. Downstream code (route
//! generators, typed queries) includes that file and reads table and column
//! metadata from it without a database round trip.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;

use tracing::{debug, info};

pub use crate::core::CanonicalType;
use crate::core::{SchemaDefinition, ID_COLUMN};
use crate::error::{MigrateError, Result};

/// One column of a declared table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDecl {
    pub name: &'static str,
    pub column_type: CanonicalType,
    pub nullable: bool,
    pub max_length: Option<u32>,
    pub primary_key: bool,
}

/// A declared table and its columns in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDecl {
    pub name: &'static str,
    pub columns: &'static [ColumnDecl],
}

impl TableDecl {
    pub fn column(&self, name: &str) -> Option<&ColumnDecl> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn primary_key(&self) -> Option<&ColumnDecl> {
        self.columns.iter().find(|c| c.primary_key)
    }
}

/// Render the declaration module for a schema.
pub fn render(schema: &SchemaDefinition, namespace: &str) -> String {
    let mut out = String::new();
    out.push_str("//! Table declarations generated by contentdb-migrate. Do not edit.\n\n");
    out.push_str("use contentdb_migrate::declaration::{CanonicalType, ColumnDecl, TableDecl};\n\n");
    let _ = writeln!(out, "pub const SCHEMA: &str = {:?};", namespace);

    let mut used = HashSet::new();
    let mut bindings = Vec::with_capacity(schema.len());

    for (table_name, table) in schema.tables() {
        let binding = unique_binding(table_name, &mut used);

        out.push('\n');
        let _ = writeln!(out, "pub const {}: TableDecl = TableDecl {{", binding);
        let _ = writeln!(out, "    name: {:?},", table_name);
        out.push_str("    columns: &[\n");
        for (column_name, column) in table.columns() {
            let max_length = match column.max_length {
                Some(len) => format!("Some({})", len),
                None => "None".to_string(),
            };
            let _ = writeln!(
                out,
                "        ColumnDecl {{ name: {:?}, column_type: CanonicalType::{}, nullable: {}, max_length: {}, primary_key: {} }},",
                column_name,
                column.column_type.variant_name(),
                column.nullable,
                max_length,
                column_name == ID_COLUMN && column.is_identity(),
            );
        }
        out.push_str("    ],\n};\n");
        bindings.push(binding);
    }

    out.push('\n');
    let _ = writeln!(out, "pub const TABLES: &[TableDecl] = &[{}];", bindings.join(", "));
    out
}

/// Upper-case Rust constant name for a table, unique within one module.
fn unique_binding(table: &str, used: &mut HashSet<String>) -> String {
    let mut base: String = table
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    if base.is_empty() || base.starts_with(|c: char| c.is_ascii_digit()) {
        base.insert_str(0, "T_");
    }
    if matches!(base.as_str(), "SCHEMA" | "TABLES") {
        base.push_str("_TABLE");
    }

    let mut candidate = base.clone();
    let mut n = 2;
    while !used.insert(candidate.clone()) {
        candidate = format!("{}_{}", base, n);
        n += 1;
    }
    candidate
}

/// Write `contents` to `path` unless the file already holds exactly that.
///
/// Returns whether the file was written.
pub fn write_if_changed(path: &Path, contents: &str) -> Result<bool> {
    if let Ok(existing) = std::fs::read_to_string(path) {
        if existing == contents {
            debug!("{} is up to date", path.display());
            return Ok(false);
        }
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| MigrateError::file_system(parent, e))?;
    }
    std::fs::write(path, contents).map_err(|e| MigrateError::file_system(path, e))?;
    info!("Wrote schema declarations to {}", path.display());
    Ok(true)
}
