// crates/shadowkeep-core/src/runtime/generator.rs
// ============================================================================
// Module: Shadow Record Generator
// Description: Pure derivation of shadow records from primary record data.
// Purpose: Produce the expected shadow set for drift detection and repair.
// Dependencies: crate::core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! For each sortable field declared by the resource schema, in declared order,
//! the generator encodes the record's value and emits one shadow record keyed
//! `<field>#<escaped>#id#<id>`, where `<escaped>` is the encoded value passed
//! through [`escape_key_component`] and therefore ends in a terminator that no
//! value or id can reproduce. Absent and `null` values emit nothing. The
//! function is pure: identical inputs always yield identical, identically
//! ordered outputs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::core::encoding::EncodeError;
use crate::core::encoding::encode_value;
use crate::core::encoding::escape_key_component;
use crate::core::identifiers::RecordId;
use crate::core::identifiers::ResourceName;
use crate::core::record::ItemKey;
use crate::core::record::PRIMARY_KEY_PREFIX;
use crate::core::record::ShadowRecord;
use crate::core::schema::ResourceSchema;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Shadow generation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerateError {
    /// A field value does not fit its declared type.
    #[error("field {field}: {source}")]
    Encode {
        /// Field name.
        field: String,
        /// Encoding failure.
        source: EncodeError,
    },
}

// ============================================================================
// SECTION: Generation
// ============================================================================

/// Builds the shadow sort key for an encoded field value.
///
/// The id is the last component, so it needs no escaping.
#[must_use]
pub fn shadow_sort_key(field: &str, encoded: &str, id: &RecordId) -> String {
    let value = escape_key_component(encoded);
    format!("{field}#{value}#{PRIMARY_KEY_PREFIX}{id}")
}

/// Generates the expected shadow records for one primary record.
///
/// # Errors
///
/// Returns [`GenerateError`] when a declared field holds a value of the wrong type.
pub fn generate_shadow_records(
    resource: &ResourceName,
    id: &RecordId,
    data: &Map<String, Value>,
    schema: &ResourceSchema,
) -> Result<Vec<ShadowRecord>, GenerateError> {
    let mut records = Vec::with_capacity(schema.shadows.len());
    for field in &schema.shadows {
        let Some(value) = data.get(&field.name) else {
            continue;
        };
        let encoded =
            encode_value(field.field_type, value).map_err(|source| GenerateError::Encode {
                field: field.name.clone(),
                source,
            })?;
        if let Some(encoded) = encoded {
            records.push(ShadowRecord {
                key: ItemKey::new(resource.as_str(), shadow_sort_key(&field.name, &encoded, id)),
                field: field.name.clone(),
                record_id: id.clone(),
            });
        }
    }
    Ok(records)
}
