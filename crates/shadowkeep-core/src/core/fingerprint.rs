// crates/shadowkeep-core/src/core/fingerprint.rs
// ============================================================================
// Module: Config Fingerprinting
// Description: Stable version and content hash of the loaded shadow config.
// Purpose: Let workers cheaply test whether a record was built against this config.
// Dependencies: crate::core::{hashing, schema}
// ============================================================================

//! ## Overview
//! A fingerprint pairs the human-assigned `$schemaVersion` with a SHA-256
//! digest of the canonical JSON form of the whole configuration. Workers loaded
//! with equivalent configuration compute identical fingerprints, which is what
//! makes independent parallel drift detection safe.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::HashDigest;
use crate::core::hashing::HashError;
use crate::core::hashing::hash_canonical_json;
use crate::core::schema::ShadowConfig;

// ============================================================================
// SECTION: Fingerprint
// ============================================================================

/// Version plus content hash of a shadow configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFingerprint {
    /// Declared schema version.
    pub version: String,
    /// Canonical content hash.
    pub hash: HashDigest,
}

impl ConfigFingerprint {
    /// Computes the fingerprint for a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonicalization fails.
    pub fn compute(config: &ShadowConfig) -> Result<Self, HashError> {
        let hash = hash_canonical_json(DEFAULT_HASH_ALGORITHM, config)?;
        Ok(Self {
            version: config.schema_version.clone(),
            hash,
        })
    }

    /// Returns the hex digest stored on records as `__configHash`.
    #[must_use]
    pub fn hash_hex(&self) -> &str {
        &self.hash.value
    }

    /// Returns true when a recorded hash was produced by this configuration.
    #[must_use]
    pub fn matches(&self, recorded: &str) -> bool {
        self.hash.value == recorded
    }
}
