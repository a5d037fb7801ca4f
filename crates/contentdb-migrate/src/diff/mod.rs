//! Structural diffing between an actual and a desired schema.

use indexmap::IndexMap;
use serde::Serialize;

use crate::core::{ColumnDefinition, SchemaDefinition, TableDefinition};

/// Change to a single column of a table present on both sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum ColumnChange {
    Added { column: ColumnDefinition },
    Removed { column: ColumnDefinition },
    Modified { old: ColumnDefinition, new: ColumnDefinition },
}

/// What happened to a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableChange {
    TableAdded { definition: TableDefinition },
    TableRemoved { definition: TableDefinition },
    TableModified { columns: IndexMap<String, ColumnChange> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDifference {
    pub table: String,
    #[serde(flatten)]
    pub change: TableChange,
}

/// Ordered list of table differences.
///
/// Order is: added tables, then modified tables, then removed tables, each
/// phase sorted by table name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Differences(Vec<TableDifference>);

impl Differences {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TableDifference> {
        self.0.iter()
    }

    /// Count of (added, modified, removed) tables.
    pub fn summary(&self) -> (usize, usize, usize) {
        self.0.iter().fold((0, 0, 0), |(a, m, r), d| match d.change {
            TableChange::TableAdded { .. } => (a + 1, m, r),
            TableChange::TableModified { .. } => (a, m + 1, r),
            TableChange::TableRemoved { .. } => (a, m, r + 1),
        })
    }
}

impl<'a> IntoIterator for &'a Differences {
    type Item = &'a TableDifference;
    type IntoIter = std::slice::Iter<'a, TableDifference>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Compute the changes that turn `actual` into `desired`.
pub fn diff(actual: &SchemaDefinition, desired: &SchemaDefinition) -> Differences {
    let mut out = Vec::new();

    for (name, table) in desired.tables() {
        if !actual.contains(name) {
            out.push(TableDifference {
                table: name.to_string(),
                change: TableChange::TableAdded {
                    definition: table.clone(),
                },
            });
        }
    }

    for (name, desired_table) in desired.tables() {
        let Some(actual_table) = actual.get(name) else {
            continue;
        };
        let columns = diff_columns(actual_table, desired_table);
        if !columns.is_empty() {
            out.push(TableDifference {
                table: name.to_string(),
                change: TableChange::TableModified { columns },
            });
        }
    }

    for (name, table) in actual.tables() {
        if !desired.contains(name) {
            out.push(TableDifference {
                table: name.to_string(),
                change: TableChange::TableRemoved {
                    definition: table.clone(),
                },
            });
        }
    }

    Differences(out)
}

/// Column changes for one table, added and modified columns in desired
/// order followed by removed columns in actual order.
fn diff_columns(actual: &TableDefinition, desired: &TableDefinition) -> IndexMap<String, ColumnChange> {
    let mut changes = IndexMap::new();

    for (name, new) in desired.columns() {
        match actual.get(name) {
            None => {
                changes.insert(
                    name.to_string(),
                    ColumnChange::Added {
                        column: new.clone(),
                    },
                );
            }
            Some(old) if old != new => {
                changes.insert(
                    name.to_string(),
                    ColumnChange::Modified {
                        old: old.clone(),
                        new: new.clone(),
                    },
                );
            }
            Some(_) => {}
        }
    }

    for (name, old) in actual.columns() {
        if !desired.contains(name) {
            changes.insert(
                name.to_string(),
                ColumnChange::Removed {
                    column: old.clone(),
                },
            );
        }
    }

    changes
}
