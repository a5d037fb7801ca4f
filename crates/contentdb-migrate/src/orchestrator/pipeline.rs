//! Command pipelines shared by every [`DatabaseAdapter`].
//!
//! Each function runs its phases strictly in sequence against an already
//! initialized adapter. Connection lifecycle is handled by the caller.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::builder;
use crate::core::{DatabaseAdapter, Direction};
use crate::declaration;
use crate::diff::diff;
use crate::emit::{emit, MigrationUnit};
use crate::error::{MigrateError, Result};
use crate::model::ContentModel;
use crate::store::{MigrationStore, Persisted};

use super::{
    GenerateOptions, GenerateOutcome, GenerateStatus, MigrateOptions, MigrateOutcome,
    ResetOptions, ResetOutcome, RollbackOptions, RollbackOutcome,
};

/// Build, introspect, diff, emit and persist.
#[instrument(name = "generate_schema", skip_all, fields(schema = %adapter.schema()))]
pub async fn generate_schema<A>(
    adapter: &A,
    model: &ContentModel,
    options: &GenerateOptions,
) -> Result<GenerateOutcome>
where
    A: DatabaseAdapter + ?Sized,
{
    let namespace = adapter.schema();

    info!("Phase 1: Building desired schema from {} collections", model.len());
    let report = builder::build(model)?;
    if !report.skipped.is_empty() {
        warn!("{} collections skipped", report.skipped.len());
    }

    info!("Phase 2: Introspecting schema '{}'", namespace);
    let actual = adapter.introspect().await?;

    info!(
        "Phase 3: Diffing {} desired tables against {} existing",
        report.schema.len(),
        actual.len()
    );
    let differences = diff(&actual, &report.schema);
    let (added, modified, removed) = differences.summary();
    info!(
        "{} tables to add, {} to modify, {} to remove",
        added, modified, removed
    );

    let schema_file_written = match &options.schema_file {
        Some(path) if !options.dry_run => declaration::write_if_changed(
            path,
            &declaration::render(&report.schema, namespace),
        )?,
        _ => false,
    };

    let store = MigrationStore::new(&options.migrations_dir);
    let timestamp = store.next_timestamp(Utc::now())?;
    let migration = emit(&differences, namespace, adapter.dialect(), timestamp);

    let mut outcome = GenerateOutcome {
        status: GenerateStatus::NoChanges,
        differences,
        migration: None,
        path: None,
        skipped_collections: report.skipped,
        schema_file_written,
    };

    let Some(unit) = migration else {
        info!("No changes detected");
        return Ok(outcome);
    };

    if options.dry_run {
        if let Some(latest) = store.duplicate_of_latest(&unit)? {
            info!("Dry run: candidate matches {}, nothing would be written", latest.display());
            outcome.status = GenerateStatus::DuplicateOfLatest;
            outcome.path = Some(latest);
            outcome.migration = Some(unit);
            return Ok(outcome);
        }
        info!("Dry run: {} would be written", unit.file_name());
        outcome.status = GenerateStatus::DryRun;
        outcome.migration = Some(unit);
        return Ok(outcome);
    }

    info!("Phase 4: Persisting migration");
    match store.persist(&unit)? {
        Persisted::Written(path) => {
            outcome.status = GenerateStatus::Written;
            outcome.path = Some(path);
        }
        Persisted::Duplicate(path) => {
            outcome.status = GenerateStatus::DuplicateOfLatest;
            outcome.path = Some(path);
        }
    }
    outcome.migration = Some(unit);
    Ok(outcome)
}

/// Apply pending units in ascending timestamp order, one transaction each.
#[instrument(name = "migrate", skip_all, fields(schema = %adapter.schema()))]
pub async fn migrate<A>(adapter: &A, options: &MigrateOptions) -> Result<MigrateOutcome>
where
    A: DatabaseAdapter + ?Sized,
{
    let store = MigrationStore::new(&options.migrations_dir);
    let units = store.load_all()?;

    if !options.dry_run {
        adapter.prepare_bookkeeping().await?;
    }
    let applied: HashSet<String> = adapter.applied_migrations().await?.into_iter().collect();

    let known: HashSet<String> = units.iter().map(MigrationUnit::id).collect();
    for id in applied.difference(&known) {
        warn!("Applied migration {} has no file in {}", id, store.dir().display());
    }

    let pending: Vec<&MigrationUnit> = units
        .iter()
        .filter(|unit| !applied.contains(&unit.id()))
        .collect();
    info!(
        "{} migrations found, {} already applied, {} pending",
        units.len(),
        units.len() - pending.len(),
        pending.len()
    );

    if options.dry_run {
        return Ok(MigrateOutcome {
            applied: Vec::new(),
            pending: pending.iter().map(|unit| unit.id()).collect(),
        });
    }

    let mut done = Vec::with_capacity(pending.len());
    for unit in pending {
        info!("Applying {}", unit.id());
        adapter.apply(unit, Direction::Up).await?;
        done.push(unit.id());
    }

    if done.is_empty() {
        info!("Database is up to date");
    }
    Ok(MigrateOutcome {
        applied: done,
        pending: Vec::new(),
    })
}

/// Revert the most recently applied units, newest first.
#[instrument(name = "rollback", skip_all, fields(schema = %adapter.schema()))]
pub async fn rollback<A>(adapter: &A, options: &RollbackOptions) -> Result<RollbackOutcome>
where
    A: DatabaseAdapter + ?Sized,
{
    let store = MigrationStore::new(&options.migrations_dir);
    let units: HashMap<String, MigrationUnit> = store
        .load_all()?
        .into_iter()
        .map(|unit| (unit.id(), unit))
        .collect();

    adapter.prepare_bookkeeping().await?;
    let applied = adapter.applied_migrations().await?;

    let mut reverted = Vec::new();
    for id in applied.iter().rev().take(options.steps) {
        let unit = units.get(id).ok_or_else(|| {
            MigrateError::file_system(
                store.dir(),
                format!("no migration file for applied migration {}", id),
            )
        })?;
        info!("Reverting {}", id);
        adapter.apply(unit, Direction::Down).await?;
        reverted.push(id.clone());
    }

    if reverted.is_empty() {
        info!("Nothing to roll back");
    }
    Ok(RollbackOutcome { reverted })
}

/// Drop every table in the namespace and optionally clear generated files.
#[instrument(name = "reset_database", skip_all, fields(schema = %adapter.schema()))]
pub async fn reset_database<A>(adapter: &A, options: &ResetOptions) -> Result<ResetOutcome>
where
    A: DatabaseAdapter + ?Sized,
{
    let actual = adapter.introspect().await?;
    let tables = actual.table_names();

    info!("Dropping {} tables in '{}'", tables.len(), adapter.schema());
    adapter.prepare_bookkeeping().await?;
    adapter.drop_tables(&tables).await?;

    let removed_migrations = if options.clear_migrations {
        let removed = MigrationStore::new(&options.migrations_dir).clear()?;
        info!("Removed {} migration files", removed);
        removed
    } else {
        0
    };

    let schema_file_removed = match &options.schema_file {
        Some(path) if options.clear_schema && path.exists() => {
            std::fs::remove_file(path).map_err(|e| MigrateError::file_system(path, e))?;
            info!("Removed {}", path.display());
            true
        }
        _ => false,
    };

    Ok(ResetOutcome {
        dropped_tables: tables,
        removed_migrations,
        schema_file_removed,
    })
}
