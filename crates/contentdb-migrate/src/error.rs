//! Error types for the schema migration library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for schema generation and migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Content model problem that is reported but does not stop generation.
    #[error("Invalid content model: {0}")]
    ConfigValidation(String),

    /// Provider alias that maps to no known dialect.
    #[error("Unsupported database provider '{provider}'. Supported providers: {supported}")]
    UnsupportedDialect { provider: String, supported: String },

    /// Could not reach or authenticate against the database.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query error from the PostgreSQL client.
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// A migration unit failed while being applied; its transaction was rolled back.
    #[error("Migration {migration} failed: {message}")]
    MigrationApply { migration: String, message: String },

    /// A persisted migration file could not be parsed.
    #[error("Malformed migration file {path}: {message}")]
    MigrationFormat { path: PathBuf, message: String },

    /// Directory or file creation failed.
    #[error("File system error at {path}: {message}")]
    FileSystem { path: PathBuf, message: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization error (command reports)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a MigrationApply error
    pub fn apply(migration: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::MigrationApply {
            migration: migration.into(),
            message: message.into(),
        }
    }

    /// Create a FileSystem error
    pub fn file_system(path: impl Into<PathBuf>, err: impl ToString) -> Self {
        MigrateError::FileSystem {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Create a MigrationFormat error
    pub fn format(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        MigrateError::MigrationFormat {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Process exit code for this error class.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::ConfigValidation(_) | MigrateError::Yaml(_) => 2,
            MigrateError::UnsupportedDialect { .. } => 3,
            MigrateError::Connection(_) | MigrateError::Pool { .. } => 4,
            MigrateError::MigrationApply { .. } => 5,
            MigrateError::FileSystem { .. }
            | MigrateError::Io(_)
            | MigrateError::MigrationFormat { .. } => 6,
            MigrateError::Database(_) | MigrateError::Json(_) => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
