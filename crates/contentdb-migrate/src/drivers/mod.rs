//! Database driver implementations.
//!
//! - [`postgres`]: PostgreSQL dialect and adapter
//! - [`common`]: Shared utilities (TLS)
//!
//! # Adding New Databases
//!
//! 1. Create a module under `drivers/` implementing `Dialect` and `DatabaseAdapter`
//! 2. Add a variant to [`DialectKind`]
//! 3. Register its provider aliases in `PROVIDERS`
//! 4. Construct its adapter in [`AdapterFactory::create`]

pub mod common;
pub mod postgres;

pub use common::{SslMode, TlsBuilder};
pub use postgres::{PostgresAdapter, PostgresDialect};

use serde::Serialize;
use std::fmt;
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::core::DatabaseAdapter;
use crate::error::{MigrateError, Result};

/// Canonical dialects with a concrete implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    Postgres,
}

impl DialectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DialectKind::Postgres => "postgres",
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Provider {
    alias: &'static str,
    dialect: DialectKind,
    /// Hosted service that only accepts TLS connections.
    managed: bool,
}

const PROVIDERS: &[Provider] = &[
    Provider { alias: "postgres", dialect: DialectKind::Postgres, managed: false },
    Provider { alias: "postgresql", dialect: DialectKind::Postgres, managed: false },
    Provider { alias: "pg", dialect: DialectKind::Postgres, managed: false },
    Provider { alias: "supabase", dialect: DialectKind::Postgres, managed: true },
    Provider { alias: "neon", dialect: DialectKind::Postgres, managed: true },
    Provider { alias: "vercel-postgres", dialect: DialectKind::Postgres, managed: true },
    Provider { alias: "railway", dialect: DialectKind::Postgres, managed: true },
    Provider { alias: "heroku", dialect: DialectKind::Postgres, managed: true },
    Provider { alias: "render", dialect: DialectKind::Postgres, managed: true },
    Provider { alias: "aws-rds", dialect: DialectKind::Postgres, managed: true },
];

/// Resolves provider aliases and builds adapters.
pub struct AdapterFactory;

impl AdapterFactory {
    fn lookup(provider: &str) -> Option<&'static Provider> {
        let key = provider.trim().to_lowercase().replace('_', "-");
        PROVIDERS.iter().find(|p| p.alias == key)
    }

    /// Every accepted provider alias.
    pub fn supported_providers() -> Vec<&'static str> {
        PROVIDERS.iter().map(|p| p.alias).collect()
    }

    /// Map a provider alias (case-insensitive) to its canonical dialect.
    pub fn resolve_dialect(provider: &str) -> Result<DialectKind> {
        Self::lookup(provider)
            .map(|p| p.dialect)
            .ok_or_else(|| MigrateError::UnsupportedDialect {
                provider: provider.to_string(),
                supported: Self::supported_providers().join(", "),
            })
    }

    /// Whether the provider is a hosted service that requires TLS.
    pub fn is_managed(provider: &str) -> bool {
        Self::lookup(provider).is_some_and(|p| p.managed)
    }

    /// Configured TLS mode, or the provider's default when none is set.
    pub fn ssl_mode_for(config: &DatabaseConfig) -> SslMode {
        config.ssl_mode.unwrap_or(if Self::is_managed(&config.provider) {
            SslMode::Require
        } else {
            SslMode::Disable
        })
    }

    /// Build an uninitialized adapter for the configured provider.
    pub fn create(config: &DatabaseConfig) -> Result<Box<dyn DatabaseAdapter>> {
        let dialect = Self::resolve_dialect(&config.provider)?;
        let ssl_mode = Self::ssl_mode_for(config);
        debug!(
            "Provider '{}' resolved to {} (ssl_mode {})",
            config.provider, dialect, ssl_mode
        );

        match dialect {
            DialectKind::Postgres => Ok(Box::new(PostgresAdapter::new(config.clone(), ssl_mode))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_aliases() {
        for alias in ["postgres", "PostgreSQL", "pg", "supabase", "neon", "vercel_postgres", " aws-rds "] {
            assert_eq!(
                AdapterFactory::resolve_dialect(alias).unwrap(),
                DialectKind::Postgres,
                "alias {alias}"
            );
        }
    }

    #[test]
    fn test_unsupported_provider_names_input() {
        let err = AdapterFactory::resolve_dialect("oracle").unwrap_err();
        match &err {
            MigrateError::UnsupportedDialect { provider, supported } => {
                assert_eq!(provider, "oracle");
                assert!(supported.contains("postgres"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_managed_providers_default_to_tls() {
        let mut config = DatabaseConfig::new("neon", "postgres://localhost/app");
        assert_eq!(AdapterFactory::ssl_mode_for(&config), SslMode::Require);

        config.provider = "postgres".into();
        assert_eq!(AdapterFactory::ssl_mode_for(&config), SslMode::Disable);

        config.provider = "supabase".into();
        config.ssl_mode = Some(SslMode::VerifyFull);
        assert_eq!(AdapterFactory::ssl_mode_for(&config), SslMode::VerifyFull);
    }

    #[test]
    fn test_create_adapter() {
        let config = DatabaseConfig::new("pg", "postgres://localhost/app");
        let adapter = AdapterFactory::create(&config).unwrap();
        assert_eq!(adapter.dialect().name(), "postgres");
        assert_eq!(adapter.schema(), "public");

        let bad = DatabaseConfig::new("mysql", "mysql://localhost/app");
        assert!(AdapterFactory::create(&bad).is_err());
    }
}
