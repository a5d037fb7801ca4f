//! Persisted migration units.
//!
//! Migration files live in one flat directory and sort by their 14-digit
//! timestamp prefix. Before a new unit is written it is checked against the
//! most recent file by [`guard::is_duplicate`].

pub mod format;
pub mod guard;

use chrono::{DateTime, Duration, DurationRound, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::emit::MigrationUnit;
use crate::error::{MigrateError, Result};

/// Outcome of [`MigrationStore::persist`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persisted {
    Written(PathBuf),
    /// Structurally identical to this existing file; nothing written.
    Duplicate(PathBuf),
}

/// Directory of migration files.
#[derive(Debug, Clone)]
pub struct MigrationStore {
    dir: PathBuf,
}

impl MigrationStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Migration files in ascending timestamp order. A missing directory is empty.
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let entries =
            std::fs::read_dir(&self.dir).map_err(|e| MigrateError::file_system(&self.dir, e))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| MigrateError::file_system(&self.dir, e))?.path();
            if path.is_file() && format::is_migration_file(&path) {
                files.push(path);
            }
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }

    /// Most recent migration file, if any.
    pub fn latest(&self) -> Result<Option<PathBuf>> {
        Ok(self.list()?.pop())
    }

    pub fn load(&self, path: &Path) -> Result<MigrationUnit> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| MigrateError::file_system(path, e))?;
        format::parse(path, &contents)
    }

    /// Every unit in ascending timestamp order.
    pub fn load_all(&self) -> Result<Vec<MigrationUnit>> {
        self.list()?.iter().map(|p| self.load(p)).collect()
    }

    /// Timestamp for a new unit: `now` truncated to seconds, bumped past the
    /// latest existing file so identifiers stay strictly increasing.
    pub fn next_timestamp(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let now = now.duration_trunc(Duration::seconds(1)).unwrap_or(now);
        let latest = self
            .latest()?
            .as_deref()
            .and_then(|p| p.file_stem())
            .and_then(|s| s.to_str())
            .and_then(format::parse_stem)
            .map(|(ts, _)| ts);

        Ok(match latest {
            Some(latest) if now <= latest => latest + Duration::seconds(1),
            _ => now,
        })
    }

    /// Write a unit unconditionally.
    pub fn write(&self, unit: &MigrationUnit) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir).map_err(|e| MigrateError::file_system(&self.dir, e))?;
        let path = self.dir.join(unit.file_name());
        std::fs::write(&path, format::render(unit)).map_err(|e| MigrateError::file_system(&path, e))?;
        info!("Wrote migration {}", path.display());
        Ok(path)
    }

    /// Path of the most recent file if `unit` duplicates it.
    pub fn duplicate_of_latest(&self, unit: &MigrationUnit) -> Result<Option<PathBuf>> {
        let Some(latest) = self.latest()? else {
            return Ok(None);
        };
        let previous = self.load(&latest)?;
        Ok(guard::is_duplicate(&previous, unit).then_some(latest))
    }

    /// Write a unit unless it duplicates the most recent file.
    pub fn persist(&self, unit: &MigrationUnit) -> Result<Persisted> {
        if let Some(latest) = self.duplicate_of_latest(unit)? {
            info!(
                "No changes: candidate matches {}",
                latest.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
            );
            return Ok(Persisted::Duplicate(latest));
        }
        Ok(Persisted::Written(self.write(unit)?))
    }

    /// Delete every migration file. Returns how many were removed.
    pub fn clear(&self) -> Result<usize> {
        let files = self.list()?;
        for path in &files {
            debug!("Removing {}", path.display());
            std::fs::remove_file(path).map_err(|e| MigrateError::file_system(path, e))?;
        }
        Ok(files.len())
    }
}
