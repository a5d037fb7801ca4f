//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::{MigrateError, Result};
use crate::model::ContentModel;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::debug;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_overrides(path, &DatabaseOverrides::default())
    }

    /// Load configuration, applying overrides before validation.
    ///
    /// A `content_model` path is resolved relative to the config file and
    /// loaded into [`Config::collections`].
    pub fn load_with_overrides<P: AsRef<Path>>(
        path: P,
        overrides: &DatabaseOverrides,
    ) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| MigrateError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let mut config: Config = serde_yaml::from_str(&content)?;
        overrides.apply(&mut config.database);
        config.validate()?;

        if let Some(model_path) = &config.content_model {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            let resolved = base.join(model_path);
            debug!("Loading content model from {}", resolved.display());
            let yaml = std::fs::read_to_string(&resolved).map_err(|e| {
                MigrateError::Config(format!(
                    "cannot read content model {}: {}",
                    resolved.display(),
                    e
                ))
            })?;
            config.collections = ContentModel::from_yaml(&yaml)?;
        }

        Ok(config)
    }

    /// Parse configuration from a YAML string (inline collections only).
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// The loaded content model.
    pub fn content_model(&self) -> &ContentModel {
        &self.collections
    }

    /// SHA-256 of the content model, logged to tie generated migrations to their input.
    pub fn model_hash(&self) -> String {
        let yaml = serde_yaml::to_string(&self.collections).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(yaml.as_bytes());
        hex::encode(hasher.finalize())
    }
}
