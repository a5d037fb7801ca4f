//! PostgreSQL database adapter.
//!
//! Owns a single-connection deadpool pool for the lifetime of one command.
//! Every migration unit runs inside its own transaction together with the
//! bookkeeping row that records it.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tokio_postgres::{Client, Config as PgConfig, Transaction};
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::core::{
    CatalogColumn, CatalogReader, DatabaseAdapter, Dialect, Direction, Executor, SchemaDefinition,
};
use crate::drivers::common::{SslMode, TlsBuilder};
use crate::emit::{MigrationContext, MigrationUnit};
use crate::error::{MigrateError, Result};
use crate::introspect::introspect;

use super::PostgresDialect;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Commands run strictly one statement at a time.
const POOL_SIZE: usize = 1;

/// Namespace holding the bookkeeping table, kept apart from content tables.
pub const BOOKKEEPING_SCHEMA: &str = "_contentdb_migrate";
pub const BOOKKEEPING_TABLE: &str = "applied_migrations";

#[async_trait]
impl Executor for Client {
    async fn execute_statement(&self, sql: &str) -> Result<()> {
        self.batch_execute(sql).await?;
        Ok(())
    }
}

#[async_trait]
impl Executor for Transaction<'_> {
    async fn execute_statement(&self, sql: &str) -> Result<()> {
        self.batch_execute(sql).await?;
        Ok(())
    }
}

#[async_trait]
impl CatalogReader for Client {
    async fn read_columns(&self, dialect: &dyn Dialect, schema: &str) -> Result<Vec<CatalogColumn>> {
        let rows = self.query(dialect.introspection_query(), &[&schema]).await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            columns.push(CatalogColumn {
                table_name: row.try_get("table_name")?,
                column_name: row.try_get("column_name")?,
                data_type: row.try_get("data_type")?,
                udt_name: row.try_get("udt_name")?,
                is_nullable: row.try_get("is_nullable")?,
                column_default: row.try_get("column_default")?,
                character_maximum_length: row.try_get("character_maximum_length")?,
                is_identity: row.try_get::<_, Option<bool>>("is_identity")?.unwrap_or(false),
            });
        }
        Ok(columns)
    }
}

/// PostgreSQL implementation of [`DatabaseAdapter`].
pub struct PostgresAdapter {
    config: DatabaseConfig,
    ssl_mode: SslMode,
    dialect: PostgresDialect,
    pool: Option<Pool>,
}

impl PostgresAdapter {
    /// Create an adapter. No connection is made until [`DatabaseAdapter::initialize`].
    pub fn new(config: DatabaseConfig, ssl_mode: SslMode) -> Self {
        Self {
            config,
            ssl_mode,
            dialect: PostgresDialect::new(),
            pool: None,
        }
    }

    fn build_pool(&self) -> Result<Pool> {
        let mut pg_config: PgConfig = self.config.url.parse().map_err(|e| {
            MigrateError::Config(format!(
                "invalid database url {}: {}",
                self.config.redacted_url(),
                e
            ))
        })?;
        pg_config.connect_timeout(CONNECT_TIMEOUT);
        pg_config.application_name("contentdb-migrate");

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let pool = match TlsBuilder::new(self.ssl_mode).build()? {
            None => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                let mgr = Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config);
                Pool::builder(mgr)
                    .max_size(POOL_SIZE)
                    .build()
                    .map_err(|e| MigrateError::pool(e, "creating PostgreSQL pool"))?
            }
            Some(tls) => {
                let mgr = Manager::from_config(pg_config, tls, mgr_config);
                Pool::builder(mgr)
                    .max_size(POOL_SIZE)
                    .build()
                    .map_err(|e| MigrateError::pool(e, "creating PostgreSQL pool"))?
            }
        };
        Ok(pool)
    }

    async fn connection(&self) -> Result<Object> {
        let pool = self.pool.as_ref().ok_or_else(|| {
            MigrateError::Connection("adapter is not initialized".to_string())
        })?;
        pool.get().await.map_err(|e| {
            MigrateError::Connection(format!(
                "cannot connect to {}: {}",
                self.config.redacted_url(),
                e
            ))
        })
    }

    fn bookkeeping_table(&self) -> String {
        self.dialect.qualify(BOOKKEEPING_SCHEMA, BOOKKEEPING_TABLE)
    }

    async fn bookkeeping_exists(&self, client: &Client) -> Result<bool> {
        let row = client
            .query_one(
                "SELECT to_regclass($1::text) IS NOT NULL AS present",
                &[&self.bookkeeping_table()],
            )
            .await?;
        Ok(row.try_get("present")?)
    }
}

#[async_trait]
impl DatabaseAdapter for PostgresAdapter {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn schema(&self) -> &str {
        &self.config.schema
    }

    async fn initialize(&mut self) -> Result<()> {
        if self.pool.is_some() {
            return Ok(());
        }
        self.pool = Some(self.build_pool()?);

        let client = self.connection().await?;
        client.simple_query("SELECT 1").await.map_err(|e| {
            MigrateError::Connection(format!("connection test failed: {}", e))
        })?;

        info!(
            "Connected to PostgreSQL: {} (schema {}, ssl_mode {})",
            self.config.redacted_url(),
            self.config.schema,
            self.ssl_mode
        );
        Ok(())
    }

    async fn test_connection(&self) -> bool {
        match self.connection().await {
            Ok(client) => client.simple_query("SELECT 1").await.is_ok(),
            Err(e) => {
                debug!("Connection test failed: {}", e);
                false
            }
        }
    }

    async fn introspect(&self) -> Result<SchemaDefinition> {
        let object = self.connection().await?;
        let client: &Client = &object;
        introspect(client, &self.dialect, &self.config.schema).await
    }

    async fn prepare_bookkeeping(&self) -> Result<()> {
        let client = self.connection().await?;
        let sql = format!(
            "CREATE SCHEMA IF NOT EXISTS {target};\n\
             CREATE SCHEMA IF NOT EXISTS {schema};\n\
             CREATE TABLE IF NOT EXISTS {table} (\n    \
                 schema_name text NOT NULL,\n    \
                 name text NOT NULL,\n    \
                 applied_at timestamptz NOT NULL DEFAULT now(),\n    \
                 PRIMARY KEY (schema_name, name)\n\
             )",
            target = self.dialect.quote_ident(&self.config.schema),
            schema = self.dialect.quote_ident(BOOKKEEPING_SCHEMA),
            table = self.bookkeeping_table(),
        );
        client.batch_execute(&sql).await?;
        Ok(())
    }

    async fn applied_migrations(&self) -> Result<Vec<String>> {
        let object = self.connection().await?;
        let client: &Client = &object;
        if !self.bookkeeping_exists(client).await? {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT name FROM {} WHERE schema_name = $1 ORDER BY name",
            self.bookkeeping_table()
        );
        let rows = client.query(&sql, &[&self.config.schema]).await?;
        rows.iter()
            .map(|row| row.try_get::<_, String>("name").map_err(MigrateError::from))
            .collect()
    }

    async fn apply(&self, unit: &MigrationUnit, direction: Direction) -> Result<()> {
        let mut object = self.connection().await?;
        let tx = object.transaction().await?;
        let id = unit.id();

        let ctx = MigrationContext {
            connection: &*tx,
            schema: &self.config.schema,
        };
        let result = match direction {
            Direction::Up => unit.up(&ctx).await,
            Direction::Down => unit.down(&ctx).await,
        };
        if let Err(e) = result {
            if let Err(rollback) = tx.rollback().await {
                warn!("Rollback of {} failed: {}", id, rollback);
            }
            return Err(e);
        }

        let bookkeeping = match direction {
            Direction::Up => format!(
                "INSERT INTO {} (schema_name, name) VALUES ($1, $2)",
                self.bookkeeping_table()
            ),
            Direction::Down => format!(
                "DELETE FROM {} WHERE schema_name = $1 AND name = $2",
                self.bookkeeping_table()
            ),
        };
        tx.execute(&bookkeeping, &[&self.config.schema, &id])
            .await
            .map_err(|e| MigrateError::apply(&id, format!("recording migration failed: {}", e)))?;
        tx.commit().await?;

        debug!("Committed {} ({:?})", id, direction);
        Ok(())
    }

    async fn drop_tables(&self, tables: &[String]) -> Result<()> {
        let mut object = self.connection().await?;
        let tx = object.transaction().await?;

        for table in tables {
            let sql = format!(
                "DROP TABLE IF EXISTS {} CASCADE",
                self.dialect.qualify(&self.config.schema, table)
            );
            debug!("{}", sql);
            tx.batch_execute(&sql).await?;
        }

        let forget = format!("DELETE FROM {} WHERE schema_name = $1", self.bookkeeping_table());
        tx.execute(&forget, &[&self.config.schema]).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.close();
            debug!("PostgreSQL pool closed");
        }
    }
}
