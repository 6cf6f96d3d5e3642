// crates/shadowkeep-core/src/core/mod.rs
// ============================================================================
// Module: Shadowkeep Core Types
// Description: Canonical schema, record, key, and fingerprint structures.
// Purpose: Provide stable, serializable types shared by every runtime component.
// Dependencies: serde, serde_json, serde_jcs, sha2, time
// ============================================================================

//! ## Overview
//! Core types define the shadow schema registry, the primary and shadow record
//! shapes stored in the single-table layout, value encodings used inside
//! shadow sort keys, and the config fingerprint used for drift detection.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod encoding;
pub mod fingerprint;
pub mod hashing;
pub mod identifiers;
pub mod record;
pub mod schema;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use encoding::EncodeError;
pub use encoding::KEY_COMPONENT_TERMINATOR;
pub use encoding::NUMBER_WIDTH;
pub use encoding::encode_value;
pub use encoding::escape_key_component;
pub use fingerprint::ConfigFingerprint;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use hashing::HashError;
pub use identifiers::MAX_TOTAL_SEGMENTS;
pub use identifiers::RecordId;
pub use identifiers::ResourceName;
pub use identifiers::RunId;
pub use identifiers::Segment;
pub use identifiers::SegmentError;
pub use record::CONFIG_HASH_ATTR;
pub use record::CONFIG_VERSION_ATTR;
pub use record::ItemKey;
pub use record::PRIMARY_ID_FIELD;
pub use record::PRIMARY_KEY_PREFIX;
pub use record::PrimaryRecord;
pub use record::RecordError;
pub use record::RecordedShadowState;
pub use record::SHADOW_KEYS_ATTR;
pub use record::ShadowMetadata;
pub use record::ShadowRecord;
pub use record::StoredItem;
pub use schema::DatabaseConfig;
pub use schema::FieldType;
pub use schema::MAX_FIELDS_PER_RESOURCE;
pub use schema::MAX_RESOURCES;
pub use schema::MAX_SCHEMA_BYTES;
pub use schema::ResourceSchema;
pub use schema::SchemaError;
pub use schema::ShadowConfig;
pub use schema::ShadowField;
pub use schema::ShadowFields;
pub use schema::SortDefaults;
pub use schema::SortOrder;
pub use schema::TimestampFields;
pub use schema::TtlPolicy;
