//! Configuration validation.

use super::Config;
use crate::core::identifier::validate_identifier;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    let db = &config.database;

    if db.provider.trim().is_empty() {
        return Err(MigrateError::Config("database.provider is required".into()));
    }

    if db.url.trim().is_empty() {
        return Err(MigrateError::Config(
            "database.url is required (or pass --database-url / set DATABASE_URL)".into(),
        ));
    }
    if let Err(e) = db.url.parse::<tokio_postgres::Config>() {
        return Err(MigrateError::Config(format!(
            "database.url is not a valid connection string ({}): {}",
            db.redacted_url(),
            e
        )));
    }

    validate_identifier(&db.schema)
        .map_err(|e| MigrateError::Config(format!("database.schema: {}", e)))?;

    if config.paths.migrations.as_os_str().is_empty() {
        return Err(MigrateError::Config("paths.migrations cannot be empty".into()));
    }

    if config.content_model.is_some() && !config.collections.is_empty() {
        return Err(MigrateError::Config(
            "content_model and inline collections are mutually exclusive".into(),
        ));
    }

    Ok(())
}
