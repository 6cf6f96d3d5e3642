// crates/shadowkeep-core/src/core/schema.rs
// ============================================================================
// Module: Shadow Schema Registry
// Description: Per-resource sortable field declarations and retention settings.
// Purpose: Parse and validate the deployed shadow configuration blob.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The shadow configuration declares, for every logical resource, which
//! primary-record fields receive a shadow index entry and how their values are
//! encoded. The document is parsed into a fixed shape and rejected at load time
//! when the shape or any name is invalid; it is immutable afterwards.
//!
//! Field declarations keep their document order because the generator emits
//! shadows in that order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde::de::MapAccess;
use serde::de::Visitor;
use serde::ser::SerializeMap;
use thiserror::Error;

use crate::core::fingerprint::ConfigFingerprint;
use crate::core::hashing::HashError;
use crate::core::identifiers::ResourceName;
use crate::core::record::PRIMARY_ID_FIELD;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum accepted size of a serialized schema document in bytes.
pub const MAX_SCHEMA_BYTES: usize = 1024 * 1024;
/// Maximum number of resources in one schema document.
pub const MAX_RESOURCES: usize = 256;
/// Maximum number of sortable fields per resource.
pub const MAX_FIELDS_PER_RESOURCE: usize = 64;
/// Maximum length of a resource or field name in bytes.
pub const MAX_NAME_LENGTH: usize = 255;
/// Reserved prefix for maintenance metadata attributes.
const RESERVED_PREFIX: &str = "__";
/// Key separator used inside sort keys.
const KEY_SEPARATOR: char = '#';

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Schema loading and validation errors.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The document could not be parsed into the schema shape.
    #[error("shadow config parse error: {0}")]
    Parse(String),
    /// The document parsed but violates a schema rule.
    #[error("invalid shadow config: {0}")]
    Invalid(String),
    /// The requested resource is not declared.
    #[error("resource not declared in shadow config: {0}")]
    UnknownResource(String),
}

// ============================================================================
// SECTION: Field Types
// ============================================================================

/// Value encoding applied to a sortable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Verbatim string.
    String,
    /// Non-negative integer, zero-padded.
    Number,
    /// Timestamp normalized to UTC ISO-8601.
    Datetime,
    /// Boolean encoded as `0`/`1`.
    Boolean,
}

impl FieldType {
    /// Returns the stable label for the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Datetime => "datetime",
            Self::Boolean => "boolean",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sortable field declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowField {
    /// Primary-record field name.
    pub name: String,
    /// Encoding applied to the field value.
    pub field_type: FieldType,
}

/// Wire form of a single field declaration (`{ "type": ... }`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldSpec {
    /// Declared value type.
    #[serde(rename = "type")]
    field_type: FieldType,
}

/// Ordered sortable field declarations for one resource.
///
/// # Invariants
/// - Field names are unique.
/// - Order matches the source document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShadowFields(Vec<ShadowField>);

impl ShadowFields {
    /// Builds a field list from ordered declarations.
    #[must_use]
    pub const fn new(fields: Vec<ShadowField>) -> Self {
        Self(fields)
    }

    /// Iterates fields in declared order.
    pub fn iter(&self) -> std::slice::Iter<'_, ShadowField> {
        self.0.iter()
    }

    /// Returns the number of declared fields.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when no fields are declared.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the declaration for a field name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ShadowField> {
        self.0.iter().find(|field| field.name == name)
    }
}

impl<'a> IntoIterator for &'a ShadowFields {
    type IntoIter = std::slice::Iter<'a, ShadowField>;
    type Item = &'a ShadowField;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Serialize for ShadowFields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for field in &self.0 {
            map.serialize_entry(
                &field.name,
                &FieldSpec {
                    field_type: field.field_type,
                },
            )?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ShadowFields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(ShadowFieldsVisitor)
    }
}

/// Visitor that keeps field declarations in document order.
struct ShadowFieldsVisitor;

impl<'de> Visitor<'de> for ShadowFieldsVisitor {
    type Value = ShadowFields;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a map of field name to { \"type\": ... }")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut fields: Vec<ShadowField> = Vec::new();
        while let Some((name, spec)) = access.next_entry::<String, FieldSpec>()? {
            if fields.iter().any(|existing| existing.name == name) {
                return Err(serde::de::Error::custom(format!("duplicate shadow field: {name}")));
            }
            fields.push(ShadowField {
                name,
                field_type: spec.field_type,
            });
        }
        Ok(ShadowFields(fields))
    }
}

// ============================================================================
// SECTION: Resource Schema
// ============================================================================

/// Sort direction for a resource's default ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    /// Ascending order.
    #[serde(rename = "ASC")]
    Asc,
    /// Descending order.
    #[serde(rename = "DESC")]
    Desc,
}

/// Default list ordering for a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SortDefaults {
    /// Sortable field used by default.
    pub field: String,
    /// Default direction.
    pub order: SortOrder,
}

/// Retention period for a resource's records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TtlPolicy {
    /// Retention in days.
    pub days: u32,
}

/// Shadow declarations for one logical resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResourceSchema {
    /// Sortable fields in declared order.
    #[serde(default)]
    pub shadows: ShadowFields,
    /// Optional default ordering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_defaults: Option<SortDefaults>,
    /// Optional record retention.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<TtlPolicy>,
}

impl ResourceSchema {
    /// Validates field names, sort defaults, and retention.
    fn validate(&self, resource: &ResourceName) -> Result<(), SchemaError> {
        if self.shadows.len() > MAX_FIELDS_PER_RESOURCE {
            return Err(SchemaError::Invalid(format!(
                "resource {resource} declares {} shadow fields (max {MAX_FIELDS_PER_RESOURCE})",
                self.shadows.len()
            )));
        }
        for field in &self.shadows {
            validate_field_name(resource, &field.name)?;
        }
        if let Some(defaults) = &self.sort_defaults
            && self.shadows.get(&defaults.field).is_none()
        {
            return Err(SchemaError::Invalid(format!(
                "resource {resource} sort default field {} is not a shadow field",
                defaults.field
            )));
        }
        if let Some(ttl) = self.ttl
            && ttl.days == 0
        {
            return Err(SchemaError::Invalid(format!(
                "resource {resource} ttl days must be greater than zero"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Database Settings
// ============================================================================

/// Field names used for record timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TimestampFields {
    /// Creation timestamp field.
    pub created_at: String,
    /// Update timestamp field.
    pub updated_at: String,
}

/// Table-wide settings carried with the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Optional logical database name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Timestamp field names.
    pub timestamps: TimestampFields,
}

// ============================================================================
// SECTION: Shadow Config
// ============================================================================

/// Complete shadow configuration for every resource.
///
/// # Invariants
/// - Validated on load; never mutated afterwards.
/// - Serialization round-trips to an equivalent document, so the fingerprint
///   reflects every declared setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShadowConfig {
    /// Human-assigned schema version.
    #[serde(rename = "$schemaVersion")]
    pub schema_version: String,
    /// Optional provenance of a generated document.
    #[serde(rename = "$generatedFrom", default, skip_serializing_if = "Option::is_none")]
    pub generated_from: Option<String>,
    /// Optional table-wide settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseConfig>,
    /// Resource declarations keyed by resource name.
    pub resources: BTreeMap<ResourceName, ResourceSchema>,
}

impl ShadowConfig {
    /// Parses and validates a JSON schema document.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] when the document is oversized, malformed, or invalid.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, SchemaError> {
        if bytes.len() > MAX_SCHEMA_BYTES {
            return Err(SchemaError::Invalid(format!(
                "shadow config exceeds size limit: {} bytes (max {MAX_SCHEMA_BYTES})",
                bytes.len()
            )));
        }
        let config: Self =
            serde_json::from_slice(bytes).map_err(|err| SchemaError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a JSON schema string.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] when the document is malformed or invalid.
    pub fn from_json_str(text: &str) -> Result<Self, SchemaError> {
        Self::from_json_bytes(text.as_bytes())
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Invalid`] when any rule is violated.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.schema_version.trim().is_empty() {
            return Err(SchemaError::Invalid("$schemaVersion must be non-empty".to_string()));
        }
        if self.resources.len() > MAX_RESOURCES {
            return Err(SchemaError::Invalid(format!(
                "shadow config declares {} resources (max {MAX_RESOURCES})",
                self.resources.len()
            )));
        }
        if let Some(database) = &self.database {
            let timestamps = &database.timestamps;
            if timestamps.created_at.is_empty() || timestamps.updated_at.is_empty() {
                return Err(SchemaError::Invalid(
                    "database timestamp field names must be non-empty".to_string(),
                ));
            }
        }
        for (name, schema) in &self.resources {
            validate_resource_name(name)?;
            schema.validate(name)?;
        }
        Ok(())
    }

    /// Returns the schema declared for a resource.
    #[must_use]
    pub fn resource(&self, name: &ResourceName) -> Option<&ResourceSchema> {
        self.resources.get(name)
    }

    /// Returns the schema declared for a resource or an error.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownResource`] when the resource is undeclared.
    pub fn require_resource(&self, name: &ResourceName) -> Result<&ResourceSchema, SchemaError> {
        self.resource(name).ok_or_else(|| SchemaError::UnknownResource(name.to_string()))
    }

    /// Returns the declared resource names.
    #[must_use]
    pub fn resource_names(&self) -> BTreeSet<ResourceName> {
        self.resources.keys().cloned().collect()
    }

    /// Computes the fingerprint of this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonicalization fails.
    pub fn fingerprint(&self) -> Result<ConfigFingerprint, HashError> {
        ConfigFingerprint::compute(self)
    }
}

// ============================================================================
// SECTION: Name Validation
// ============================================================================

/// Validates a resource (partition key) name.
fn validate_resource_name(name: &ResourceName) -> Result<(), SchemaError> {
    let value = name.as_str();
    if value.is_empty() || value.len() > MAX_NAME_LENGTH {
        return Err(SchemaError::Invalid(format!(
            "resource name must be 1..={MAX_NAME_LENGTH} bytes"
        )));
    }
    if !value.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-') {
        return Err(SchemaError::Invalid(format!(
            "resource name {value} must contain only ascii letters, digits, '_' or '-'"
        )));
    }
    Ok(())
}

/// Validates a sortable field name against key-space collisions.
fn validate_field_name(resource: &ResourceName, name: &str) -> Result<(), SchemaError> {
    if name.is_empty() || name.len() > MAX_NAME_LENGTH {
        return Err(SchemaError::Invalid(format!(
            "resource {resource} field names must be 1..={MAX_NAME_LENGTH} bytes"
        )));
    }
    if name.contains(KEY_SEPARATOR) {
        return Err(SchemaError::Invalid(format!(
            "resource {resource} field {name} must not contain '{KEY_SEPARATOR}'"
        )));
    }
    if name.starts_with(RESERVED_PREFIX) {
        return Err(SchemaError::Invalid(format!(
            "resource {resource} field {name} uses the reserved '{RESERVED_PREFIX}' prefix"
        )));
    }
    if name == PRIMARY_ID_FIELD {
        return Err(SchemaError::Invalid(format!(
            "resource {resource} field {name} collides with the primary key prefix"
        )));
    }
    Ok(())
}
