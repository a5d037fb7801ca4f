//! contentdb-migrate CLI - keep a PostgreSQL schema in sync with a content model.

use clap::{Parser, Subcommand};
use contentdb_migrate::orchestrator::{
    GenerateOutcome, GenerateStatus, HealthCheckResult, MigrateOutcome, ResetOutcome,
    RollbackOutcome,
};
use contentdb_migrate::{CommandOutcome, Config, DatabaseOverrides, MigrateError, Orchestrator};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "contentdb-migrate")]
#[command(about = "Generate and apply PostgreSQL migrations from a content model")]
#[command(
    long_about = "Generate and apply PostgreSQL migrations from a content model.\n\n\
                  Commands must not run concurrently against the same schema."
)]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "contentdb.yaml")]
    config: PathBuf,

    /// Database URL (overrides the config file)
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Target schema (overrides the config file)
    #[arg(long)]
    schema: Option<String>,

    /// Database provider alias (overrides the config file)
    #[arg(long)]
    provider: Option<String>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Diff the content model against the database and write a migration
    GenerateSchema {
        /// Show the migration without writing any file
        #[arg(long)]
        dry_run: bool,
    },

    /// Apply pending migrations
    Migrate {
        /// List pending migrations without applying them
        #[arg(long)]
        dry_run: bool,
    },

    /// Revert the most recently applied migrations
    Rollback {
        /// Number of migrations to revert
        #[arg(long, default_value = "1")]
        steps: usize,
    },

    /// Drop every table in the target schema
    Reset {
        /// Also delete all migration files
        #[arg(long)]
        clear_migrations: bool,

        /// Also delete the generated declaration module
        #[arg(long)]
        clear_schema: bool,
    },

    /// Test the database connection
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| MigrateError::Config(e.to_string()))?;

    let overrides = DatabaseOverrides {
        url: cli.database_url.clone(),
        schema: cli.schema.clone(),
        provider: cli.provider.clone(),
    };
    let config = Config::load_with_overrides(&cli.config, &overrides)?;
    info!("Loaded configuration from {:?}", cli.config);

    let mut orchestrator = Orchestrator::new(config)?;

    let outcome = match cli.command {
        Commands::GenerateSchema { dry_run } => orchestrator.generate_schema(dry_run).await?,
        Commands::Migrate { dry_run } => orchestrator.migrate(dry_run).await?,
        Commands::Rollback { steps } => orchestrator.rollback(steps).await?,
        Commands::Reset {
            clear_migrations,
            clear_schema,
        } => orchestrator.reset(clear_migrations, clear_schema).await?,
        Commands::HealthCheck => orchestrator.health_check().await?,
    };

    if cli.output_json {
        println!("{}", outcome.to_json()?);
    } else {
        print_outcome(&outcome);
    }

    if let CommandOutcome::HealthCheck(result) = &outcome {
        if !result.healthy {
            return Err(MigrateError::Connection(
                result
                    .error
                    .clone()
                    .unwrap_or_else(|| "health check failed".to_string()),
            ));
        }
    }

    Ok(())
}

fn print_outcome(outcome: &CommandOutcome) {
    match outcome {
        CommandOutcome::GenerateSchema(result) => print_generate(result),
        CommandOutcome::Migrate(result) => print_migrate(result),
        CommandOutcome::Rollback(result) => print_rollback(result),
        CommandOutcome::Reset(result) => print_reset(result),
        CommandOutcome::HealthCheck(result) => print_health(result),
    }
}

fn print_generate(result: &GenerateOutcome) {
    let (added, modified, removed) = result.differences.summary();
    println!("Schema comparison:");
    println!("  Tables to create: {}", added);
    println!("  Tables to alter: {}", modified);
    println!("  Tables to drop: {}", removed);
    for warning in &result.skipped_collections {
        println!("  Skipped: {}", warning);
    }

    match result.status {
        GenerateStatus::NoChanges => println!("\nNo changes detected."),
        GenerateStatus::DuplicateOfLatest => {
            println!("\nNo changes: the latest migration already covers this diff.")
        }
        GenerateStatus::Written => {
            if let Some(path) = &result.path {
                println!("\nMigration written: {}", path.display());
            }
        }
        GenerateStatus::DryRun => {
            if let Some(unit) = &result.migration {
                println!("\nDry run, {} would contain:", unit.file_name());
                println!("-- up");
                for sql in &unit.up {
                    println!("{};", sql);
                }
                println!("-- down");
                for sql in &unit.down {
                    println!("{};", sql);
                }
            }
        }
    }

    if result.schema_file_written {
        println!("Declaration module updated.");
    }
}

fn print_migrate(result: &MigrateOutcome) {
    if !result.pending.is_empty() {
        println!("Pending migrations:");
        for id in &result.pending {
            println!("  {}", id);
        }
    } else if result.applied.is_empty() {
        println!("Database is up to date.");
    } else {
        println!("Applied migrations:");
        for id in &result.applied {
            println!("  {}", id);
        }
    }
}

fn print_rollback(result: &RollbackOutcome) {
    if result.reverted.is_empty() {
        println!("Nothing to roll back.");
        return;
    }
    println!("Reverted migrations:");
    for id in &result.reverted {
        println!("  {}", id);
    }
}

fn print_reset(result: &ResetOutcome) {
    println!("Dropped {} tables.", result.dropped_tables.len());
    if result.removed_migrations > 0 {
        println!("Removed {} migration files.", result.removed_migrations);
    }
    if result.schema_file_removed {
        println!("Removed declaration module.");
    }
}

fn print_health(result: &HealthCheckResult) {
    println!("Health Check Results:");
    println!(
        "  Database ({}): {} ({}ms)",
        result.dialect,
        if result.healthy { "OK" } else { "FAILED" },
        result.latency_ms
    );
    println!("  Schema: {}", result.schema);
    if let Some(ref err) = result.error {
        println!("    Error: {}", err);
    }
    println!(
        "\n  Overall: {}",
        if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
    );
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("unknown log format '{}', expected text or json", other)),
    }

    Ok(())
}
