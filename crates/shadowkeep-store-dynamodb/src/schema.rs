// crates/shadowkeep-store-dynamodb/src/schema.rs
// ============================================================================
// Module: Table Schema
// Description: Attribute names and expression placeholders for the table.
// Purpose: Keep every request builder on one set of names.
// Dependencies: none
// ============================================================================

//! ## Overview
//!
//! ```text
//! Primary key:
//!   - PK (String, partition key): resource name, e.g. "articles"
//!   - SK (String, sort key): "id#<id>" or "<field>#<escaped value>#id#<id>"
//!
//! Attributes:
//!   - data: Map - record attributes
//!       primary records also carry __shadowKeys, __configVersion, __configHash
//!       shadow records carry only { id }
//! ```

/// Partition key attribute.
pub const ATTR_PK: &str = "PK";
/// Sort key attribute.
pub const ATTR_SK: &str = "SK";
/// Nested record attributes.
pub const ATTR_DATA: &str = "data";

/// Placeholder for [`ATTR_PK`].
pub(crate) const NAME_PK: &str = "#pk";
/// Placeholder for [`ATTR_SK`].
pub(crate) const NAME_SK: &str = "#sk";
/// Placeholder for [`ATTR_DATA`].
pub(crate) const NAME_DATA: &str = "#data";
/// Placeholder for the shadow key list attribute.
pub(crate) const NAME_SHADOW_KEYS: &str = "#shadowKeys";
/// Placeholder for the config version attribute.
pub(crate) const NAME_CONFIG_VERSION: &str = "#configVersion";
/// Placeholder for the config hash attribute.
pub(crate) const NAME_CONFIG_HASH: &str = "#configHash";

/// Value placeholder for the scanned resource.
pub(crate) const VALUE_RESOURCE: &str = ":resource";
/// Value placeholder for the sort key prefix.
pub(crate) const VALUE_PREFIX: &str = ":prefix";
/// Value placeholder for the new shadow key list.
pub(crate) const VALUE_SHADOW_KEYS: &str = ":shadowKeys";
/// Value placeholder for the new config version.
pub(crate) const VALUE_CONFIG_VERSION: &str = ":configVersion";
/// Value placeholder for the new config hash.
pub(crate) const VALUE_CONFIG_HASH: &str = ":configHash";
/// Value placeholder for the previously recorded key list.
pub(crate) const VALUE_EXPECTED_KEYS: &str = ":expectedKeys";
/// Value placeholder for the DynamoDB `NULL` type descriptor.
pub(crate) const VALUE_NULL_TYPE: &str = ":nullType";
