//! Core abstractions for dialect-agnostic schema reconciliation.
//!
//! - [`schema`]: Canonical table, column and schema types
//! - [`traits`]: Dialect, executor, catalog and adapter traits
//! - [`identifier`]: Identifier validation and quoting
//!
//! The core module never names a concrete database. Driver modules
//! (`drivers/postgres`) implement the traits defined here.

pub mod identifier;
pub mod schema;
pub mod traits;

pub use schema::{
    CanonicalType, ColumnDefault, ColumnDefinition, SchemaDefinition, TableDefinition, ID_COLUMN,
};
pub use traits::{CatalogColumn, CatalogReader, DatabaseAdapter, Dialect, Direction, Executor};
