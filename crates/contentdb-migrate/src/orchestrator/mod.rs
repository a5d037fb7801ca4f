//! Command orchestrator - connection lifecycle around the schema commands.
//!
//! Every command opens the adapter's pool, runs its pipeline and closes the
//! pool again, whether the pipeline succeeded or not. Commands are meant to
//! run one at a time against a given namespace; nothing here locks against a
//! concurrent run.

pub mod pipeline;

use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::{Config, PathsConfig};
use crate::core::DatabaseAdapter;
use crate::diff::Differences;
use crate::drivers::AdapterFactory;
use crate::emit::MigrationUnit;
use crate::error::Result;
use crate::model::ContentModel;

/// Options for `generate-schema`.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub migrations_dir: PathBuf,
    /// Declaration module to regenerate alongside the migration.
    pub schema_file: Option<PathBuf>,
    /// Report the migration without writing any file.
    pub dry_run: bool,
}

impl GenerateOptions {
    pub fn from_paths(paths: &PathsConfig, dry_run: bool) -> Self {
        Self {
            migrations_dir: paths.migrations.clone(),
            schema_file: paths.schema_file.clone(),
            dry_run,
        }
    }
}

/// What `generate-schema` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerateStatus {
    Written,
    NoChanges,
    /// The candidate matched the most recent file, so nothing was written.
    DuplicateOfLatest,
    DryRun,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateOutcome {
    pub status: GenerateStatus,
    pub differences: Differences,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migration: Option<MigrationUnit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub skipped_collections: Vec<String>,
    pub schema_file_written: bool,
}

/// Options for `migrate`.
#[derive(Debug, Clone)]
pub struct MigrateOptions {
    pub migrations_dir: PathBuf,
    /// List pending units without applying them.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrateOutcome {
    pub applied: Vec<String>,
    /// Populated by dry runs only.
    pub pending: Vec<String>,
}

/// Options for `rollback`.
#[derive(Debug, Clone)]
pub struct RollbackOptions {
    pub migrations_dir: PathBuf,
    pub steps: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RollbackOutcome {
    pub reverted: Vec<String>,
}

/// Options for `reset`.
#[derive(Debug, Clone)]
pub struct ResetOptions {
    pub migrations_dir: PathBuf,
    pub schema_file: Option<PathBuf>,
    /// Also delete every migration file.
    pub clear_migrations: bool,
    /// Also delete the generated declaration module.
    pub clear_schema: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResetOutcome {
    pub dropped_tables: Vec<String>,
    pub removed_migrations: usize,
    pub schema_file_removed: bool,
}

/// Health check result.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    pub healthy: bool,
    pub latency_ms: u64,
    pub dialect: String,
    pub schema: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A command to run against the configured database.
#[derive(Debug, Clone)]
pub enum Command {
    GenerateSchema(GenerateOptions),
    Migrate(MigrateOptions),
    Rollback(RollbackOptions),
    Reset(ResetOptions),
    HealthCheck,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::GenerateSchema(_) => "generate-schema",
            Command::Migrate(_) => "migrate",
            Command::Rollback(_) => "rollback",
            Command::Reset(_) => "reset",
            Command::HealthCheck => "health-check",
        }
    }
}

/// Result of any command, serialized for `--output-json`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum CommandOutcome {
    GenerateSchema(GenerateOutcome),
    Migrate(MigrateOutcome),
    Rollback(RollbackOutcome),
    Reset(ResetOutcome),
    HealthCheck(HealthCheckResult),
}

macro_rules! impl_to_json {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $ty {
                /// Convert to JSON string.
                pub fn to_json(&self) -> Result<String> {
                    Ok(serde_json::to_string_pretty(self)?)
                }
            }
        )*
    };
}

impl_to_json!(
    GenerateOutcome,
    MigrateOutcome,
    RollbackOutcome,
    ResetOutcome,
    HealthCheckResult,
    CommandOutcome,
);

/// Run one command: initialize, dispatch, close.
///
/// The adapter is closed on every path. A health check reports an
/// initialization failure as an unhealthy result instead of an error.
pub async fn run_with_adapter(
    adapter: &mut dyn DatabaseAdapter,
    model: &ContentModel,
    command: &Command,
) -> Result<CommandOutcome> {
    let started = Instant::now();
    let result = match (adapter.initialize().await, command) {
        (Err(e), Command::HealthCheck) => Ok(CommandOutcome::HealthCheck(health_report(
            &*adapter,
            started,
            Some(e.to_string()),
        ))),
        (Err(e), _) => Err(e),
        (Ok(()), _) => {
            debug!("Running {} against '{}'", command.name(), adapter.schema());
            dispatch(&*adapter, model, command, started).await
        }
    };
    adapter.close().await;

    if result.is_ok() {
        info!("{} finished in {:.2}s", command.name(), started.elapsed().as_secs_f64());
    }
    result
}

async fn dispatch(
    adapter: &dyn DatabaseAdapter,
    model: &ContentModel,
    command: &Command,
    started: Instant,
) -> Result<CommandOutcome> {
    Ok(match command {
        Command::GenerateSchema(options) => {
            CommandOutcome::GenerateSchema(adapter.generate_schema(model, options).await?)
        }
        Command::Migrate(options) => CommandOutcome::Migrate(adapter.migrate(options).await?),
        Command::Rollback(options) => CommandOutcome::Rollback(adapter.rollback(options).await?),
        Command::Reset(options) => CommandOutcome::Reset(adapter.reset_database(options).await?),
        Command::HealthCheck => {
            let error = if adapter.test_connection().await {
                None
            } else {
                Some("connection test query failed".to_string())
            };
            CommandOutcome::HealthCheck(health_report(adapter, started, error))
        }
    })
}

fn health_report(
    adapter: &dyn DatabaseAdapter,
    started: Instant,
    error: Option<String>,
) -> HealthCheckResult {
    HealthCheckResult {
        healthy: error.is_none(),
        latency_ms: started.elapsed().as_millis() as u64,
        dialect: adapter.dialect().name().to_string(),
        schema: adapter.schema().to_string(),
        error,
    }
}

/// Schema orchestrator: a validated config plus the adapter it selects.
pub struct Orchestrator {
    config: Config,
    adapter: Box<dyn DatabaseAdapter>,
}

impl Orchestrator {
    /// Create an orchestrator for the configured provider.
    ///
    /// No connection is opened until a command runs.
    pub fn new(config: Config) -> Result<Self> {
        let adapter = AdapterFactory::create(&config.database)?;
        Ok(Self { config, adapter })
    }

    /// Use a specific adapter instead of the one the provider selects.
    pub fn with_adapter(config: Config, adapter: Box<dyn DatabaseAdapter>) -> Self {
        Self { config, adapter }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run a command against the configured database.
    pub async fn run(&mut self, command: &Command) -> Result<CommandOutcome> {
        info!(
            "{}: {} collections, model hash {}",
            command.name(),
            self.config.content_model().len(),
            &self.config.model_hash()[..12]
        );
        run_with_adapter(self.adapter.as_mut(), self.config.content_model(), command).await
    }

    pub async fn generate_schema(&mut self, dry_run: bool) -> Result<CommandOutcome> {
        let options = GenerateOptions::from_paths(&self.config.paths, dry_run);
        self.run(&Command::GenerateSchema(options)).await
    }

    pub async fn migrate(&mut self, dry_run: bool) -> Result<CommandOutcome> {
        let options = MigrateOptions {
            migrations_dir: self.config.paths.migrations.clone(),
            dry_run,
        };
        self.run(&Command::Migrate(options)).await
    }

    pub async fn rollback(&mut self, steps: usize) -> Result<CommandOutcome> {
        let options = RollbackOptions {
            migrations_dir: self.config.paths.migrations.clone(),
            steps,
        };
        self.run(&Command::Rollback(options)).await
    }

    pub async fn reset(&mut self, clear_migrations: bool, clear_schema: bool) -> Result<CommandOutcome> {
        let options = ResetOptions {
            migrations_dir: self.config.paths.migrations.clone(),
            schema_file: self.config.paths.schema_file.clone(),
            clear_migrations,
            clear_schema,
        };
        self.run(&Command::Reset(options)).await
    }

    pub async fn health_check(&mut self) -> Result<CommandOutcome> {
        self.run(&Command::HealthCheck).await
    }
}
