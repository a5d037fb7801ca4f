//! Content model types.
//!
//! The content model is supplied by the operator (usually as YAML) and is
//! treated as already loaded: collections keyed by name, each with an
//! ordered map of typed fields. Field order is declaration order and
//! becomes column order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;

fn default_true() -> bool {
    true
}

/// Validation metadata attached to a field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValidation {
    #[serde(default, alias = "maxLength", skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,

    #[serde(default, alias = "minLength", skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
}

/// A single field of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Human-readable label shown in the admin UI.
    #[serde(default)]
    pub label: String,

    /// Semantic type tag (`text`, `number`, `select`, ...).
    #[serde(rename = "type")]
    pub field_type: String,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub multiline: bool,

    /// Whether the field is translated per locale.
    #[serde(default)]
    pub i18n: bool,

    /// Set to `false` for fields that are never stored in the database.
    #[serde(default = "default_true", alias = "storedInDb")]
    pub db: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<FieldValidation>,
}

impl FieldDefinition {
    /// Optional field of the given type.
    pub fn new(field_type: impl Into<String>) -> Self {
        Self {
            label: String::new(),
            field_type: field_type.into(),
            required: false,
            multiline: false,
            i18n: false,
            db: true,
            validation: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_max_length(mut self, max_length: u32) -> Self {
        self.validation.get_or_insert_with(FieldValidation::default).max_length = Some(max_length);
        self
    }

    pub fn not_stored(mut self) -> Self {
        self.db = false;
        self
    }

    /// Maximum length from validation metadata, if any.
    pub fn max_length(&self) -> Option<u32> {
        self.validation.as_ref().and_then(|v| v.max_length)
    }
}

/// Locale configuration of an internationalized collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct I18nConfig {
    #[serde(default)]
    pub locales: Vec<String>,

    #[serde(default, alias = "defaultLocale", skip_serializing_if = "Option::is_none")]
    pub default_locale: Option<String>,
}

impl I18nConfig {
    /// Locales that get their own table: every configured locale except the default.
    pub fn fan_out_locales(&self) -> impl Iterator<Item = &str> {
        let default = self.default_locale.as_deref();
        self.locales
            .iter()
            .map(String::as_str)
            .filter(move |locale| Some(*locale) != default)
    }
}

/// A collection of entries sharing one field schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionDefinition {
    #[serde(default)]
    pub label: String,

    #[serde(default, alias = "slugField", skip_serializing_if = "Option::is_none")]
    pub slug_field: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i18n: Option<I18nConfig>,

    /// Field definitions; a collection without one is skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<IndexMap<String, FieldDefinition>>,
}

impl CollectionDefinition {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            schema: Some(IndexMap::new()),
            ..Default::default()
        }
    }

    /// Append a field (builder style).
    pub fn field(mut self, key: impl Into<String>, field: FieldDefinition) -> Self {
        self.schema
            .get_or_insert_with(IndexMap::new)
            .insert(key.into(), field);
        self
    }

    pub fn with_locales(mut self, locales: &[&str], default_locale: Option<&str>) -> Self {
        self.i18n = Some(I18nConfig {
            locales: locales.iter().map(|l| l.to_string()).collect(),
            default_locale: default_locale.map(str::to_string),
        });
        self
    }
}

/// The full content model: collections keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentModel {
    collections: IndexMap<String, CollectionDefinition>,
}

impl ContentModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a content model from YAML (a map of collection name to definition).
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Add a collection (builder style).
    pub fn collection(mut self, key: impl Into<String>, collection: CollectionDefinition) -> Self {
        self.insert(key, collection);
        self
    }

    /// Insert a collection, returning the previous definition under that key.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        collection: CollectionDefinition,
    ) -> Option<CollectionDefinition> {
        self.collections.insert(key.into(), collection)
    }

    pub fn get(&self, key: &str) -> Option<&CollectionDefinition> {
        self.collections.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CollectionDefinition)> {
        self.collections.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}
