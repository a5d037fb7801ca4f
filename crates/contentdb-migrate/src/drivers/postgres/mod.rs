//! PostgreSQL driver.
//!
//! - [`PostgresDialect`]: DDL and catalog mapping
//! - [`PostgresAdapter`]: connection pool, introspection and transactional apply

mod adapter;
mod dialect;

pub use adapter::{PostgresAdapter, BOOKKEEPING_SCHEMA, BOOKKEEPING_TABLE};
pub use dialect::PostgresDialect;
