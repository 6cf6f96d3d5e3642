// crates/shadowkeep-core/src/core/record.rs
// ============================================================================
// Module: Shadowkeep Records
// Description: Primary and shadow record shapes in the single-table layout.
// Purpose: Centralize key formats and shadow-maintenance metadata access.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Every item lives under partition key = resource name. Primary records use
//! the sort key `id#<id>`; shadow records use `<field>#<escaped>#id#<id>`. The
//! three maintenance attributes (`__shadowKeys`, `__configVersion`,
//! `__configHash`) live inside the primary record's `data` map and are only
//! written by the repair path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::RecordId;
use crate::core::identifiers::ResourceName;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Sort key prefix that marks primary records.
pub const PRIMARY_KEY_PREFIX: &str = "id#";
/// Field name reserved for the record identifier.
pub const PRIMARY_ID_FIELD: &str = "id";
/// Metadata attribute listing materialized shadow sort keys.
pub const SHADOW_KEYS_ATTR: &str = "__shadowKeys";
/// Metadata attribute holding the schema version of the last build.
pub const CONFIG_VERSION_ATTR: &str = "__configVersion";
/// Metadata attribute holding the config hash of the last build.
pub const CONFIG_HASH_ATTR: &str = "__configHash";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Record shape errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// Sort key does not carry the primary prefix.
    #[error("sort key {0} is not a primary record key")]
    NotPrimary(String),
    /// A maintenance attribute has the wrong shape.
    #[error("malformed {attribute}: {message}")]
    MalformedMetadata {
        /// Attribute name.
        attribute: &'static str,
        /// Shape violation.
        message: String,
    },
}

// ============================================================================
// SECTION: Keys
// ============================================================================

/// Full item key (partition + sort).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemKey {
    /// Partition key.
    pub pk: String,
    /// Sort key.
    pub sk: String,
}

impl ItemKey {
    /// Creates a new item key.
    #[must_use]
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
        }
    }

    /// Builds the key of a primary record.
    #[must_use]
    pub fn primary(resource: &ResourceName, id: &RecordId) -> Self {
        Self::new(resource.as_str(), format!("{PRIMARY_KEY_PREFIX}{id}"))
    }

    /// Returns true when the sort key addresses a primary record.
    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.sk.starts_with(PRIMARY_KEY_PREFIX)
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.pk, self.sk)
    }
}

/// Raw stored item: key plus its `data` map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredItem {
    /// Item key.
    pub key: ItemKey,
    /// Item data attributes.
    pub data: Map<String, Value>,
}

// ============================================================================
// SECTION: Primary Records
// ============================================================================

/// Authoritative business entity plus its shadow-maintenance metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryRecord {
    /// Owning resource (partition key).
    pub resource: ResourceName,
    /// Record identifier.
    pub id: RecordId,
    /// Business fields and maintenance metadata.
    pub data: Map<String, Value>,
}

impl PrimaryRecord {
    /// Creates a primary record.
    #[must_use]
    pub const fn new(resource: ResourceName, id: RecordId, data: Map<String, Value>) -> Self {
        Self {
            resource,
            id,
            data,
        }
    }

    /// Builds a primary record from a stored item.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::NotPrimary`] when the sort key lacks the `id#` prefix.
    pub fn from_item(item: StoredItem) -> Result<Self, RecordError> {
        let Some(id) = item.key.sk.strip_prefix(PRIMARY_KEY_PREFIX) else {
            return Err(RecordError::NotPrimary(item.key.sk.clone()));
        };
        let id = RecordId::new(id);
        Ok(Self {
            resource: ResourceName::new(item.key.pk),
            id,
            data: item.data,
        })
    }

    /// Returns the record's item key.
    #[must_use]
    pub fn key(&self) -> ItemKey {
        ItemKey::primary(&self.resource, &self.id)
    }

    /// Converts the record back into a stored item.
    #[must_use]
    pub fn into_item(self) -> StoredItem {
        StoredItem {
            key: ItemKey::primary(&self.resource, &self.id),
            data: self.data,
        }
    }

    /// Reads the recorded shadow state from the maintenance attributes.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::MalformedMetadata`] when an attribute has the wrong type.
    pub fn recorded_state(&self) -> Result<RecordedShadowState, RecordError> {
        let shadow_keys = match self.data.get(SHADOW_KEYS_ATTR) {
            None | Some(Value::Null) => None,
            Some(Value::Array(values)) => {
                let mut keys = Vec::with_capacity(values.len());
                for value in values {
                    let Value::String(key) = value else {
                        return Err(RecordError::MalformedMetadata {
                            attribute: SHADOW_KEYS_ATTR,
                            message: "entries must be strings".to_string(),
                        });
                    };
                    keys.push(key.clone());
                }
                Some(keys)
            }
            Some(_) => {
                return Err(RecordError::MalformedMetadata {
                    attribute: SHADOW_KEYS_ATTR,
                    message: "expected an array".to_string(),
                });
            }
        };
        Ok(RecordedShadowState {
            shadow_keys,
            config_version: optional_string(&self.data, CONFIG_VERSION_ATTR)?,
            config_hash: optional_string(&self.data, CONFIG_HASH_ATTR)?,
        })
    }
}

/// Reads an optional string attribute; empty strings count as absent.
fn optional_string(
    data: &Map<String, Value>,
    attribute: &'static str,
) -> Result<Option<String>, RecordError> {
    match data.get(attribute) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) if value.is_empty() => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(RecordError::MalformedMetadata {
            attribute,
            message: "expected a string".to_string(),
        }),
    }
}

/// Shadow state recorded on a primary record at its last (re)build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordedShadowState {
    /// Materialized shadow sort keys; `None` when never recorded.
    pub shadow_keys: Option<Vec<String>>,
    /// Schema version of the last build.
    pub config_version: Option<String>,
    /// Config hash of the last build.
    pub config_hash: Option<String>,
}

impl RecordedShadowState {
    /// Returns the recorded keys, treating an absent list as empty.
    #[must_use]
    pub fn keys(&self) -> &[String] {
        self.shadow_keys.as_deref().unwrap_or_default()
    }
}

/// Metadata written onto a primary record by a successful repair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowMetadata {
    /// Shadow sort keys now materialized.
    pub shadow_keys: Vec<String>,
    /// Schema version used for the build.
    pub config_version: String,
    /// Config hash used for the build.
    pub config_hash: String,
}

impl ShadowMetadata {
    /// Writes the metadata attributes into a record data map.
    pub fn apply_to(&self, data: &mut Map<String, Value>) {
        data.insert(
            SHADOW_KEYS_ATTR.to_string(),
            Value::Array(self.shadow_keys.iter().cloned().map(Value::String).collect()),
        );
        data.insert(CONFIG_VERSION_ATTR.to_string(), Value::String(self.config_version.clone()));
        data.insert(CONFIG_HASH_ATTR.to_string(), Value::String(self.config_hash.clone()));
    }
}

// ============================================================================
// SECTION: Shadow Records
// ============================================================================

/// Derived index entry for one (primary record, sortable field) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowRecord {
    /// Shadow item key.
    pub key: ItemKey,
    /// Source field name.
    pub field: String,
    /// Primary record the shadow points at.
    pub record_id: RecordId,
}

impl ShadowRecord {
    /// Returns the shadow sort key.
    #[must_use]
    pub fn sort_key(&self) -> &str {
        &self.key.sk
    }

    /// Builds the stored item written for this shadow.
    #[must_use]
    pub fn to_item(&self) -> StoredItem {
        let mut data = Map::new();
        data.insert(PRIMARY_ID_FIELD.to_string(), Value::String(self.record_id.to_string()));
        StoredItem {
            key: self.key.clone(),
            data,
        }
    }
}
