//! Migration emission: differences to forward and reverse DDL.
//!
//! Each difference contributes one or more steps. A step pairs the forward
//! statements with the statements that undo them. `up` lists steps in
//! discovery order; `down` lists their inverses in reverse order so that
//! teardown mirrors setup.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::core::{ColumnDefinition, Dialect, Executor};
use crate::diff::{ColumnChange, Differences, TableChange};
use crate::error::{MigrateError, Result};

/// Timestamp prefix format for migration identifiers (14 digits).
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Connection and namespace a migration unit runs against.
pub struct MigrationContext<'a> {
    pub connection: &'a dyn Executor,
    pub schema: &'a str,
}

/// A timestamped, reversible set of schema changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationUnit {
    pub timestamp: DateTime<Utc>,
    /// Slug part of the identifier (e.g. `create_blogs`).
    pub name: String,
    pub up: Vec<String>,
    pub down: Vec<String>,
}

impl MigrationUnit {
    /// Identifier: `{timestamp}_{name}`, also the file stem.
    pub fn id(&self) -> String {
        format!("{}_{}", self.timestamp.format(TIMESTAMP_FORMAT), self.name)
    }

    pub fn file_name(&self) -> String {
        format!("{}.sql", self.id())
    }

    /// Apply the forward statements in order.
    pub async fn up(&self, ctx: &MigrationContext<'_>) -> Result<()> {
        self.run(ctx, &self.up, "up").await
    }

    /// Apply the reverse statements in order.
    pub async fn down(&self, ctx: &MigrationContext<'_>) -> Result<()> {
        self.run(ctx, &self.down, "down").await
    }

    async fn run(&self, ctx: &MigrationContext<'_>, statements: &[String], label: &str) -> Result<()> {
        for (index, sql) in statements.iter().enumerate() {
            debug!("[{} {}] {}: {}", self.id(), label, ctx.schema, sql);
            ctx.connection.execute_statement(sql).await.map_err(|e| {
                MigrateError::apply(
                    self.id(),
                    format!("{} statement {} failed: {}", label, index + 1, e),
                )
            })?;
        }
        Ok(())
    }
}

/// One forward change and its inverse.
struct Step {
    up: Vec<String>,
    down: Vec<String>,
}

impl Step {
    fn single(up: String, down: String) -> Self {
        Self {
            up: vec![up],
            down: vec![down],
        }
    }
}

/// Turn differences into a migration unit.
///
/// Returns `None` for empty differences.
pub fn emit(
    differences: &Differences,
    schema: &str,
    dialect: &dyn Dialect,
    timestamp: DateTime<Utc>,
) -> Option<MigrationUnit> {
    if differences.is_empty() {
        return None;
    }

    let mut steps = Vec::new();
    for difference in differences {
        let table = difference.table.as_str();
        match &difference.change {
            TableChange::TableAdded { definition } => steps.push(Step::single(
                dialect.create_table(schema, table, definition),
                dialect.drop_table(schema, table),
            )),
            TableChange::TableRemoved { definition } => steps.push(Step::single(
                dialect.drop_table(schema, table),
                dialect.create_table(schema, table, definition),
            )),
            TableChange::TableModified { columns } => {
                for (column, change) in columns {
                    column_steps(&mut steps, dialect, schema, table, column, change);
                }
            }
        }
    }

    let up = steps.iter().flat_map(|s| s.up.iter().cloned()).collect();
    let down = steps
        .iter()
        .rev()
        .flat_map(|s| s.down.iter().cloned())
        .collect();

    Some(MigrationUnit {
        timestamp,
        name: migration_name(differences),
        up,
        down,
    })
}

fn column_steps(
    steps: &mut Vec<Step>,
    dialect: &dyn Dialect,
    schema: &str,
    table: &str,
    column: &str,
    change: &ColumnChange,
) {
    match change {
        ColumnChange::Added { column: definition } => steps.push(Step::single(
            dialect.add_column(schema, table, column, definition),
            dialect.drop_column(schema, table, column),
        )),
        ColumnChange::Removed { column: definition } => steps.push(Step::single(
            dialect.drop_column(schema, table, column),
            dialect.add_column(schema, table, column, definition),
        )),
        ColumnChange::Modified { old, new } => {
            modified_steps(steps, dialect, schema, table, column, old, new)
        }
    }
}

/// Independent steps for each attribute that changed: type, then
/// nullability, then default.
fn modified_steps(
    steps: &mut Vec<Step>,
    dialect: &dyn Dialect,
    schema: &str,
    table: &str,
    column: &str,
    old: &ColumnDefinition,
    new: &ColumnDefinition,
) {
    if old.column_type != new.column_type || old.max_length != new.max_length {
        steps.push(Step::single(
            dialect.alter_column_type(schema, table, column, new),
            dialect.alter_column_type(schema, table, column, old),
        ));
    }

    if old.nullable != new.nullable {
        steps.push(Step::single(
            dialect.alter_nullability(schema, table, column, new.nullable),
            dialect.alter_nullability(schema, table, column, old.nullable),
        ));
    }

    if old.default != new.default {
        steps.push(Step {
            up: dialect.alter_default(schema, table, column, old.default.as_ref(), new.default.as_ref()),
            down: dialect.alter_default(schema, table, column, new.default.as_ref(), old.default.as_ref()),
        });
    }
}

/// `create_{table}` for a lone added table, `update_schema` otherwise.
fn migration_name(differences: &Differences) -> String {
    let mut iter = differences.iter();
    match (iter.next(), iter.next()) {
        (Some(only), None) => match only.change {
            TableChange::TableAdded { .. } => format!("create_{}", slugify(&only.table)),
            TableChange::TableRemoved { .. } => format!("drop_{}", slugify(&only.table)),
            TableChange::TableModified { .. } => format!("alter_{}", slugify(&only.table)),
        },
        _ => "update_schema".to_string(),
    }
}

/// Lowercase alphanumerics and underscores only, so the name is file-safe.
fn slugify(name: &str) -> String {
    let slug: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if slug.trim_matches('_').is_empty() {
        "table".to_string()
    } else {
        slug
    }
}
