// crates/shadowkeep-core/tests/drift.rs
// ============================================================================
// Module: Drift Detector Tests
// Description: Drift classification precedence and report contents.
// Purpose: Ensure records are classified exactly as their metadata dictates.
// Dependencies: shadowkeep-core, serde_json
// ============================================================================

//! ## Overview
//! Covers the missing-hash, hash-mismatch, and key-mismatch branches in order,
//! plus the no-op case and malformed metadata.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use serde_json::json;
use shadowkeep_core::CONFIG_HASH_ATTR;
use shadowkeep_core::DriftError;
use shadowkeep_core::DriftReason;
use shadowkeep_core::PrimaryRecord;
use shadowkeep_core::RecordId;
use shadowkeep_core::SHADOW_KEYS_ATTR;
use shadowkeep_core::ShadowMetadata;
use shadowkeep_core::detect_drift;
use shadowkeep_core::shadow_sort_key;

use crate::common::article_data;
use crate::common::articles;
use crate::common::articles_config;

fn record_with(metadata: Option<ShadowMetadata>) -> PrimaryRecord {
    let mut data = article_data("Hello", 3);
    if let Some(metadata) = metadata {
        metadata.apply_to(&mut data);
    }
    PrimaryRecord::new(articles(), RecordId::new("a1"), data)
}

fn expected_keys() -> Vec<String> {
    let id = RecordId::new("a1");
    [
        ("title", "Hello"),
        ("status", "draft"),
        ("viewCount", "00000000000000000003"),
        ("updatedAt", "2024-05-01T12:00:00.000Z"),
        ("published", "0"),
    ]
    .into_iter()
    .map(|(field, encoded)| shadow_sort_key(field, encoded, &id))
    .collect()
}

#[test]
fn missing_hash_is_drift_even_with_matching_keys() {
    let config = articles_config();
    let fingerprint = config.fingerprint().unwrap();
    let mut record = record_with(None);
    record.data.insert(SHADOW_KEYS_ATTR.to_string(), json!(expected_keys()));
    let report =
        detect_drift(&record, config.require_resource(&articles()).unwrap(), &fingerprint)
            .unwrap();
    assert_eq!(report.reason, Some(DriftReason::MissingHash));
    assert_eq!(report.expected_keys, expected_keys());
}

#[test]
fn empty_hash_counts_as_missing() {
    let config = articles_config();
    let fingerprint = config.fingerprint().unwrap();
    let mut record = record_with(None);
    record.data.insert(CONFIG_HASH_ATTR.to_string(), json!(""));
    let report =
        detect_drift(&record, config.require_resource(&articles()).unwrap(), &fingerprint)
            .unwrap();
    assert_eq!(report.reason, Some(DriftReason::MissingHash));
}

#[test]
fn hash_mismatch_precedes_key_comparison() {
    let config = articles_config();
    let fingerprint = config.fingerprint().unwrap();
    let record = record_with(Some(ShadowMetadata {
        shadow_keys: expected_keys(),
        config_version: "0.9".to_string(),
        config_hash: "stale".to_string(),
    }));
    let report =
        detect_drift(&record, config.require_resource(&articles()).unwrap(), &fingerprint)
            .unwrap();
    assert_eq!(report.reason, Some(DriftReason::HashMismatch));
}

#[test]
fn reordered_keys_are_drift() {
    let config = articles_config();
    let fingerprint = config.fingerprint().unwrap();
    let mut keys = expected_keys();
    keys.swap(0, 1);
    let record = record_with(Some(ShadowMetadata {
        shadow_keys: keys,
        config_version: fingerprint.version.clone(),
        config_hash: fingerprint.hash_hex().to_string(),
    }));
    let report =
        detect_drift(&record, config.require_resource(&articles()).unwrap(), &fingerprint)
            .unwrap();
    assert_eq!(report.reason, Some(DriftReason::KeysMismatch));
}

#[test]
fn missing_key_is_drift() {
    let config = articles_config();
    let fingerprint = config.fingerprint().unwrap();
    let mut keys = expected_keys();
    keys.pop();
    let record = record_with(Some(ShadowMetadata {
        shadow_keys: keys,
        config_version: fingerprint.version.clone(),
        config_hash: fingerprint.hash_hex().to_string(),
    }));
    let report =
        detect_drift(&record, config.require_resource(&articles()).unwrap(), &fingerprint)
            .unwrap();
    assert_eq!(report.reason, Some(DriftReason::KeysMismatch));
}

#[test]
fn consistent_record_is_noop() {
    let config = articles_config();
    let fingerprint = config.fingerprint().unwrap();
    let record = record_with(Some(ShadowMetadata {
        shadow_keys: expected_keys(),
        config_version: fingerprint.version.clone(),
        config_hash: fingerprint.hash_hex().to_string(),
    }));
    let report =
        detect_drift(&record, config.require_resource(&articles()).unwrap(), &fingerprint)
            .unwrap();
    assert!(!report.is_drifted());
    assert_eq!(report.actual_keys(), expected_keys().as_slice());
}

#[test]
fn absent_key_list_equals_empty_expected_set() {
    let config = articles_config();
    let fingerprint = config.fingerprint().unwrap();
    let mut data = serde_json::Map::new();
    data.insert(CONFIG_HASH_ATTR.to_string(), json!(fingerprint.hash_hex()));
    let record = PrimaryRecord::new(articles(), RecordId::new("empty"), data);
    let report =
        detect_drift(&record, config.require_resource(&articles()).unwrap(), &fingerprint)
            .unwrap();
    assert_eq!(report.reason, None);
    assert!(report.expected.is_empty());
}

#[test]
fn malformed_key_list_is_an_error() {
    let config = articles_config();
    let fingerprint = config.fingerprint().unwrap();
    let mut record = record_with(None);
    record.data.insert(SHADOW_KEYS_ATTR.to_string(), json!("not-a-list"));
    let err = detect_drift(&record, config.require_resource(&articles()).unwrap(), &fingerprint)
        .unwrap_err();
    assert!(matches!(err, DriftError::Metadata(_)));
}
