// crates/shadowkeep-core/src/runtime/drift.rs
// ============================================================================
// Module: Drift Detector
// Description: Compares a primary record's recorded shadow state to the schema.
// Purpose: Decide whether a record's shadows must be rebuilt.
// Dependencies: crate::{core, runtime::generator}, thiserror
// ============================================================================

//! ## Overview
//! Drift is decided with a fixed precedence:
//! 1. no recorded config hash,
//! 2. recorded hash differs from the current fingerprint,
//! 3. expected shadow keys differ from the recorded keys by length or position.
//!
//! The report always carries the freshly generated shadows so the repair path
//! does not need to regenerate them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::core::fingerprint::ConfigFingerprint;
use crate::core::record::PrimaryRecord;
use crate::core::record::RecordError;
use crate::core::record::RecordedShadowState;
use crate::core::record::ShadowRecord;
use crate::core::schema::ResourceSchema;
use crate::runtime::generator::GenerateError;
use crate::runtime::generator::generate_shadow_records;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Why a record was classified as drifted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftReason {
    /// Record carries no config hash.
    MissingHash,
    /// Record was built against a different configuration.
    HashMismatch,
    /// Materialized keys differ from the expected keys.
    KeysMismatch,
}

impl DriftReason {
    /// Returns the stable label for the reason.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingHash => "missing_hash",
            Self::HashMismatch => "hash_mismatch",
            Self::KeysMismatch => "keys_mismatch",
        }
    }
}

impl fmt::Display for DriftReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of drift detection for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriftReport {
    /// Drift classification; `None` means no-op.
    pub reason: Option<DriftReason>,
    /// Shadows the record should have, in declared field order.
    pub expected: Vec<ShadowRecord>,
    /// Sort keys of `expected`.
    pub expected_keys: Vec<String>,
    /// Shadow state recorded on the primary record.
    pub recorded: RecordedShadowState,
}

impl DriftReport {
    /// Returns true when the record needs repair.
    #[must_use]
    pub const fn is_drifted(&self) -> bool {
        self.reason.is_some()
    }

    /// Returns the recorded shadow keys (empty when never recorded).
    #[must_use]
    pub fn actual_keys(&self) -> &[String] {
        self.recorded.keys()
    }
}

/// Drift detection errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriftError {
    /// The expected shadows could not be generated.
    #[error(transparent)]
    Generate(#[from] GenerateError),
    /// The recorded maintenance metadata is malformed.
    #[error(transparent)]
    Metadata(#[from] RecordError),
}

// ============================================================================
// SECTION: Detection
// ============================================================================

/// Classifies a primary record against the current schema and fingerprint.
///
/// # Errors
///
/// Returns [`DriftError`] when metadata is malformed or generation fails.
pub fn detect_drift(
    record: &PrimaryRecord,
    schema: &ResourceSchema,
    fingerprint: &ConfigFingerprint,
) -> Result<DriftReport, DriftError> {
    let recorded = record.recorded_state()?;
    let expected = generate_shadow_records(&record.resource, &record.id, &record.data, schema)?;
    let expected_keys: Vec<String> =
        expected.iter().map(|shadow| shadow.sort_key().to_string()).collect();

    let reason = match recorded.config_hash.as_deref() {
        None => Some(DriftReason::MissingHash),
        Some(hash) if !fingerprint.matches(hash) => Some(DriftReason::HashMismatch),
        Some(_) if expected_keys.as_slice() != recorded.keys() => Some(DriftReason::KeysMismatch),
        Some(_) => None,
    };

    Ok(DriftReport {
        reason,
        expected,
        expected_keys,
        recorded,
    })
}
