// crates/shadowkeep-config/src/registry.rs
// ============================================================================
// Module: Schema Registry
// Description: Generates shadow config documents from a field registry.
// Purpose: Keep the shadow config derived from one declarative source.
// Dependencies: shadowkeep-core, serde, toml
// ============================================================================

//! ## Overview
//! A registry lists each resource's sortable fields in order, plus optional
//! retention. Generation copies the fields, picks sort defaults
//! (`updatedAt` descending when declared, otherwise the first field
//! ascending), stamps `$generatedFrom`, and validates the result exactly as a
//! loaded document would be.
//!
//! ```toml
//! [database.timestamps]
//! createdAt = "createdAt"
//! updatedAt = "updatedAt"
//!
//! [resources.articles]
//! ttl = { days = 30 }
//! sortable_fields = [
//!   { name = "title", type = "string" },
//!   { name = "updatedAt", type = "datetime" },
//! ]
//! ```

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;
use shadowkeep_core::DatabaseConfig;
use shadowkeep_core::FieldType;
use shadowkeep_core::ResourceName;
use shadowkeep_core::ResourceSchema;
use shadowkeep_core::ShadowConfig;
use shadowkeep_core::ShadowField;
use shadowkeep_core::ShadowFields;
use shadowkeep_core::SortDefaults;
use shadowkeep_core::SortOrder;
use shadowkeep_core::TtlPolicy;

use crate::error::ConfigError;
use crate::file::MAX_CONFIG_FILE_SIZE;
use crate::file::read_text_file;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Field preferred as the default sort key.
const PREFERRED_SORT_FIELD: &str = "updatedAt";
/// Schema version stamped when the registry omits one.
const DEFAULT_SCHEMA_VERSION: &str = "1.0";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Declarative registry of sortable fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaRegistry {
    /// Version stamped into generated documents.
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    /// Table-wide timestamp settings.
    pub database: DatabaseConfig,
    /// Resources keyed by name.
    pub resources: BTreeMap<String, RegistryResource>,
}

/// One resource in the registry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryResource {
    /// Sortable fields in declared order.
    pub sortable_fields: Vec<RegistryField>,
    /// Optional retention policy.
    #[serde(default)]
    pub ttl: Option<TtlPolicy>,
}

/// One sortable field.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryField {
    /// Field name.
    pub name: String,
    /// Declared value type.
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

// ============================================================================
// SECTION: Loading
// ============================================================================

impl SchemaRegistry {
    /// Loads a registry TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = read_text_file(path, MAX_CONFIG_FILE_SIZE)?;
        Self::from_toml_str(&content)
    }

    /// Parses registry TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the text is malformed.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Generates a validated shadow config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a resource declares a field twice or the
    /// generated document fails schema validation.
    pub fn generate(&self, generated_from: &str) -> Result<ShadowConfig, ConfigError> {
        let mut resources = BTreeMap::new();
        for (name, resource) in &self.resources {
            resources.insert(ResourceName::new(name.as_str()), resource.to_schema(name)?);
        }
        let config = ShadowConfig {
            schema_version: self.schema_version.clone(),
            generated_from: Some(generated_from.to_string()),
            database: Some(self.database.clone()),
            resources,
        };
        config.validate()?;
        Ok(config)
    }
}

impl RegistryResource {
    /// Converts the registry entry into a resource schema.
    fn to_schema(&self, resource: &str) -> Result<ResourceSchema, ConfigError> {
        let mut seen = BTreeSet::new();
        let mut fields = Vec::with_capacity(self.sortable_fields.len());
        for field in &self.sortable_fields {
            if !seen.insert(field.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "resource {resource} declares field {} twice",
                    field.name
                )));
            }
            fields.push(ShadowField {
                name: field.name.clone(),
                field_type: field.field_type,
            });
        }
        let shadows = ShadowFields::new(fields);
        Ok(ResourceSchema {
            sort_defaults: sort_defaults(&shadows),
            shadows,
            ttl: self.ttl,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Picks `updatedAt` descending, else the first field ascending.
fn sort_defaults(shadows: &ShadowFields) -> Option<SortDefaults> {
    if shadows.get(PREFERRED_SORT_FIELD).is_some() {
        return Some(SortDefaults {
            field: PREFERRED_SORT_FIELD.to_string(),
            order: SortOrder::Desc,
        });
    }
    shadows.iter().next().map(|first| SortDefaults {
        field: first.name.clone(),
        order: SortOrder::Asc,
    })
}

/// Default schema version.
fn default_schema_version() -> String {
    DEFAULT_SCHEMA_VERSION.to_string()
}
