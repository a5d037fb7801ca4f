//! Core traits for dialect-agnostic schema reconciliation.
//!
//! This module defines the primary abstractions used by the engine:
//!
//! - [`Dialect`]: SQL syntax strategy (quoting, DDL, catalog mapping)
//! - [`Executor`]: Runs one SQL statement against a connection or transaction
//! - [`CatalogReader`]: Reads raw column metadata for a namespace
//! - [`DatabaseAdapter`]: Connection lifecycle plus the four commands
//!
//! # Design Patterns
//!
//! - **Strategy**: `Dialect` provides interchangeable DDL rules
//! - **Template Method**: `DatabaseAdapter` implements the command pipelines
//!   as provided methods over a handful of dialect-specific primitives

use async_trait::async_trait;

use crate::emit::MigrationUnit;
use crate::error::Result;
use crate::model::ContentModel;
use crate::orchestrator::{
    pipeline, GenerateOptions, GenerateOutcome, MigrateOptions, MigrateOutcome, ResetOptions,
    ResetOutcome, RollbackOptions, RollbackOutcome,
};

use super::schema::{CanonicalType, ColumnDefault, ColumnDefinition, SchemaDefinition, TableDefinition};

/// SQL syntax strategy for different database engines.
///
/// The differ and emitter only ever see canonical types; everything that
/// depends on a concrete engine goes through this trait.
pub trait Dialect: Send + Sync {
    /// Get the dialect identifier (e.g., "postgres").
    fn name(&self) -> &str;

    /// Quote an identifier (table name, column name, etc.).
    fn quote_ident(&self, name: &str) -> String;

    /// Schema-qualified, quoted table name.
    fn qualify(&self, schema: &str, table: &str) -> String {
        format!("{}.{}", self.quote_ident(schema), self.quote_ident(table))
    }

    /// Native type for a canonical column (e.g. `varchar(255)`).
    fn column_type(&self, column: &ColumnDefinition) -> String;

    /// Full column clause as used in `CREATE TABLE` and `ADD COLUMN`.
    fn column_clause(&self, name: &str, column: &ColumnDefinition) -> String;

    fn create_table(&self, schema: &str, table: &str, definition: &TableDefinition) -> String;

    fn drop_table(&self, schema: &str, table: &str) -> String;

    fn add_column(&self, schema: &str, table: &str, column: &str, definition: &ColumnDefinition)
        -> String;

    fn drop_column(&self, schema: &str, table: &str, column: &str) -> String;

    fn alter_column_type(
        &self,
        schema: &str,
        table: &str,
        column: &str,
        definition: &ColumnDefinition,
    ) -> String;

    /// `SET NOT NULL` when `nullable` is false, `DROP NOT NULL` otherwise.
    fn alter_nullability(&self, schema: &str, table: &str, column: &str, nullable: bool) -> String;

    /// Statements that move a column's default from `from` to `to`.
    ///
    /// Identity defaults may need more than one statement.
    fn alter_default(
        &self,
        schema: &str,
        table: &str,
        column: &str,
        from: Option<&ColumnDefault>,
        to: Option<&ColumnDefault>,
    ) -> Vec<String>;

    /// Read-only catalog query returning one row per column for `$1` namespace.
    fn introspection_query(&self) -> &str;

    /// Map a catalog type (`data_type`, `udt_name`) back to a canonical type.
    fn canonical_type(&self, data_type: &str, udt_name: &str) -> Option<CanonicalType>;

    /// Map a catalog default expression back to a canonical default.
    fn parse_default(&self, raw: Option<&str>, is_identity: bool) -> Option<ColumnDefault>;
}

/// Raw column metadata row from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogColumn {
    pub table_name: String,
    pub column_name: String,
    pub data_type: String,
    pub udt_name: String,
    pub is_nullable: bool,
    pub column_default: Option<String>,
    pub character_maximum_length: Option<i32>,
    pub is_identity: bool,
}

/// Execute a single SQL statement.
///
/// Implemented for plain connections and for transactions so that a
/// [`MigrationUnit`] can run against either.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute_statement(&self, sql: &str) -> Result<()>;
}

/// Read catalog column metadata for one namespace.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    async fn read_columns(&self, dialect: &dyn Dialect, schema: &str) -> Result<Vec<CatalogColumn>>;
}

/// Direction in which a migration unit is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Database adapter: connection lifecycle and the schema commands.
///
/// Implementors supply connection handling and a few primitives; the
/// command pipelines are provided methods so every dialect shares them.
#[async_trait]
pub trait DatabaseAdapter: Send + Sync {
    /// SQL syntax strategy for this adapter.
    fn dialect(&self) -> &dyn Dialect;

    /// Target namespace (e.g. `public`).
    fn schema(&self) -> &str;

    /// Open the connection pool and verify connectivity.
    async fn initialize(&mut self) -> Result<()>;

    /// Check whether a trivial query succeeds.
    async fn test_connection(&self) -> bool;

    /// Introspect the target namespace.
    async fn introspect(&self) -> Result<SchemaDefinition>;

    /// Create the target namespace and the applied-migrations table if missing.
    async fn prepare_bookkeeping(&self) -> Result<()>;

    /// Names of migration units applied to this namespace, oldest first.
    async fn applied_migrations(&self) -> Result<Vec<String>>;

    /// Apply one unit in a single transaction and record the result.
    async fn apply(&self, unit: &MigrationUnit, direction: Direction) -> Result<()>;

    /// Drop the given tables and forget every applied migration, in one transaction.
    async fn drop_tables(&self, tables: &[String]) -> Result<()>;

    /// Release the connection pool. Safe to call more than once.
    async fn close(&mut self);

    /// Introspect, diff against the content model and persist a migration.
    async fn generate_schema(
        &self,
        model: &ContentModel,
        options: &GenerateOptions,
    ) -> Result<GenerateOutcome> {
        pipeline::generate_schema(self, model, options).await
    }

    /// Apply every pending migration unit in timestamp order.
    async fn migrate(&self, options: &MigrateOptions) -> Result<MigrateOutcome> {
        pipeline::migrate(self, options).await
    }

    /// Revert the most recently applied migration units.
    async fn rollback(&self, options: &RollbackOptions) -> Result<RollbackOutcome> {
        pipeline::rollback(self, options).await
    }

    /// Drop every table in the namespace.
    async fn reset_database(&self, options: &ResetOptions) -> Result<ResetOutcome> {
        pipeline::reset_database(self, options).await
    }
}
