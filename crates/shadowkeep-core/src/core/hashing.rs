// crates/shadowkeep-core/src/core/hashing.rs
// ============================================================================
// Module: Shadowkeep Canonical Hashing
// Description: RFC 8785 JSON canonicalization and content hashing utilities.
// Purpose: Provide deterministic digests for schema fingerprints and segment placement.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Schema configuration is hashed over its RFC 8785 (JCS) canonical JSON form
//! so that two processes loaded with equivalent configuration always agree on
//! the digest, regardless of map ordering in the source document.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write;

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Digest algorithms recognised in recorded fingerprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// SHA-256.
    Sha256,
}

/// Algorithm used for config fingerprints.
pub const DEFAULT_HASH_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

/// Content digest tagged with its algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashDigest {
    /// Algorithm that produced `value`.
    pub algorithm: HashAlgorithm,
    /// Lowercase hex digest, as stored in `__configHash`.
    pub value: String,
}

/// Canonicalization failures.
#[derive(Debug, Error)]
pub enum HashError {
    /// The value could not be rendered as canonical JSON.
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
}

// ============================================================================
// SECTION: Hashing
// ============================================================================

/// Hashes the JCS form of `value`, so key order in the source never matters.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when the value cannot be serialized.
pub fn hash_canonical_json<T: Serialize + ?Sized>(
    algorithm: HashAlgorithm,
    value: &T,
) -> Result<HashDigest, HashError> {
    let canonical =
        serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))?;
    let digest = match algorithm {
        HashAlgorithm::Sha256 => sha256(&canonical),
    };
    Ok(HashDigest {
        algorithm,
        value: to_hex(&digest),
    })
}

/// Places a key on a 64-bit ring using the first eight digest bytes.
///
/// The value is identical on every process and platform, which keeps
/// segment membership stable between pages of one scan.
#[must_use]
pub fn stable_bucket(bytes: &[u8]) -> u64 {
    let digest = sha256(bytes);
    let mut prefix = [0_u8; 8];
    prefix.copy_from_slice(&digest[.. 8]);
    u64::from_be_bytes(prefix)
}

/// Raw SHA-256.
fn sha256(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

/// Lowercase hex rendering.
fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, byte| {
        let _ = write!(out, "{byte:02x}");
        out
    })
}
