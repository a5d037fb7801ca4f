//! # contentdb-migrate
//!
//! Keep a PostgreSQL schema in sync with a declared content model.
//!
//! A content model (collections of typed fields) is turned into a desired
//! schema, compared against the live database, and the difference is
//! persisted as a timestamped, reversible migration file:
//!
//! - **Schema building** from collections, including per-locale tables
//! - **Introspection** of one namespace through the catalog
//! - **Structural diffing** that ignores column order
//! - **Reversible migrations** whose `down` undoes `up` step by step
//! - **Duplicate guard** so repeated generation never writes the same file twice
//! - **Transactional apply** with an applied-migrations bookkeeping table
//!
//! ## Example
//!
//! ```rust,no_run
//! use contentdb_migrate::{CommandOutcome, Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> contentdb_migrate::Result<()> {
//!     let config = Config::load("contentdb.yaml")?;
//!     let mut orchestrator = Orchestrator::new(config)?;
//!     if let CommandOutcome::GenerateSchema(outcome) = orchestrator.generate_schema(false).await? {
//!         println!("{} tables changed", outcome.differences.len());
//!     }
//!     orchestrator.migrate(false).await?;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod config;
pub mod core;
pub mod declaration;
pub mod diff;
pub mod drivers;
pub mod emit;
pub mod error;
pub mod introspect;
pub mod model;
pub mod orchestrator;
pub mod store;
pub mod typemap;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use config::{Config, DatabaseConfig, DatabaseOverrides, PathsConfig};
pub use crate::core::{
    CanonicalType, ColumnDefault, ColumnDefinition, DatabaseAdapter, Dialect, SchemaDefinition,
    TableDefinition,
};
pub use diff::{diff, Differences, TableDifference};
pub use drivers::{AdapterFactory, DialectKind, PostgresAdapter, PostgresDialect, SslMode};
pub use emit::{emit, MigrationUnit};
pub use error::{MigrateError, Result};
pub use model::{CollectionDefinition, ContentModel, FieldDefinition};
pub use orchestrator::{Command, CommandOutcome, GenerateStatus, HealthCheckResult, Orchestrator};
pub use store::MigrationStore;
