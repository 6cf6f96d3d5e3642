// crates/shadowkeep-core/tests/repair.rs
// ============================================================================
// Module: Repair Executor Tests
// Description: Repair planning, transaction limits, and atomicity.
// Purpose: Ensure repairs are minimal, all-or-nothing, and correctly classified.
// Dependencies: shadowkeep-core, serde_json, tokio
// ============================================================================

//! ## Overview
//! Validates minimal delete/put planning, the conditional metadata guard, the
//! fail-fast transaction cap, and that cancelled transactions leave storage
//! untouched.

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

use std::fmt::Write;
use std::sync::Arc;

use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use shadowkeep_core::ConfigFingerprint;
use shadowkeep_core::InMemoryShadowStore;
use shadowkeep_core::ItemKey;
use shadowkeep_core::MetadataCondition;
use shadowkeep_core::PrimaryRecord;
use shadowkeep_core::RecordId;
use shadowkeep_core::RepairError;
use shadowkeep_core::RepairErrorCode;
use shadowkeep_core::RepairExecutor;
use shadowkeep_core::ResourceName;
use shadowkeep_core::SHADOW_KEYS_ATTR;
use shadowkeep_core::ShadowConfig;
use shadowkeep_core::ShadowMetadata;
use shadowkeep_core::StoredItem;
use shadowkeep_core::detect_drift;
use shadowkeep_core::plan_repair;
use shadowkeep_core::shadow_sort_key;

use crate::common::article_data;
use crate::common::articles;
use crate::common::articles_config;

fn hello_key() -> String {
    shadow_sort_key("title", "Hello", &RecordId::new("a1"))
}

fn stale_record(stale_keys: Vec<String>) -> PrimaryRecord {
    let mut data = article_data("Hello", 3);
    ShadowMetadata {
        shadow_keys: stale_keys,
        config_version: "0".to_string(),
        config_hash: "old".to_string(),
    }
    .apply_to(&mut data);
    PrimaryRecord::new(articles(), RecordId::new("a1"), data)
}

#[test]
fn plan_deletes_stale_and_puts_missing_only() {
    let config = articles_config();
    let fingerprint = config.fingerprint().unwrap();
    let schema = config.require_resource(&articles()).unwrap();
    let record = stale_record(vec![
        hello_key(),
        "title#Old#id#a1".to_string(),
        "title#Old#id#a1".to_string(),
    ]);
    let report = detect_drift(&record, schema, &fingerprint).unwrap();
    let plan = plan_repair(&record, schema, &fingerprint, &report).unwrap();

    assert_eq!(plan.deletes, vec![ItemKey::new("articles", "title#Old#id#a1")]);
    let put_keys: Vec<&str> = plan.puts.iter().map(|item| item.key.sk.as_str()).collect();
    assert_eq!(put_keys.len(), 4);
    assert!(!put_keys.contains(&hello_key().as_str()));
    assert_eq!(plan.item_count(), 6);
    assert_eq!(plan.metadata.shadow_keys, report.expected_keys);
    assert_eq!(plan.metadata.config_hash, fingerprint.hash_hex());
    assert_eq!(
        plan.condition,
        MetadataCondition::KeysEqual(vec![
            hello_key(),
            "title#Old#id#a1".to_string(),
            "title#Old#id#a1".to_string(),
        ])
    );
}

#[test]
fn plan_guards_unrecorded_keys_with_absence() {
    let config = articles_config();
    let fingerprint = config.fingerprint().unwrap();
    let schema = config.require_resource(&articles()).unwrap();
    let record = PrimaryRecord::new(articles(), RecordId::new("a1"), article_data("Hi", 1));
    let report = detect_drift(&record, schema, &fingerprint).unwrap();
    let plan = plan_repair(&record, schema, &fingerprint, &report).unwrap();
    assert_eq!(plan.condition, MetadataCondition::KeysAbsent);
    assert!(plan.deletes.is_empty());
    assert_eq!(plan.puts.len(), 5);
}

#[tokio::test]
async fn null_key_list_is_repaired_under_absence_guard() {
    let store = InMemoryShadowStore::new();
    let config = articles_config();
    let fingerprint = config.fingerprint().unwrap();
    let schema = config.require_resource(&articles()).unwrap();
    let mut data = article_data("Hi", 1);
    data.insert(SHADOW_KEYS_ATTR.to_string(), Value::Null);
    let record = PrimaryRecord::new(articles(), RecordId::new("a1"), data);
    store.put_item(record.clone().into_item()).unwrap();

    let report = detect_drift(&record, schema, &fingerprint).unwrap();
    let plan = plan_repair(&record, schema, &fingerprint, &report).unwrap();
    assert_eq!(plan.condition, MetadataCondition::KeysAbsent);

    let executor = RepairExecutor::new(Arc::new(store.clone()));
    let outcome = executor.repair(&record, schema, &fingerprint, &report).await.unwrap();
    assert_eq!(outcome.inserted, 5);
    let state = store.record(&articles(), &RecordId::new("a1")).unwrap().recorded_state().unwrap();
    assert_eq!(state.keys(), report.expected_keys.as_slice());
}

#[test]
fn plan_refuses_to_delete_primary_keys() {
    let config = articles_config();
    let fingerprint = config.fingerprint().unwrap();
    let schema = config.require_resource(&articles()).unwrap();
    let record = stale_record(vec!["id#other".to_string()]);
    let report = detect_drift(&record, schema, &fingerprint).unwrap();
    let err = plan_repair(&record, schema, &fingerprint, &report).unwrap_err();
    assert!(matches!(err, RepairError::Validation(_)));
    assert_eq!(err.code(), RepairErrorCode::ValidationError);
}

#[test]
fn plan_rejects_report_that_disagrees_with_record() {
    let config = articles_config();
    let fingerprint = config.fingerprint().unwrap();
    let schema = config.require_resource(&articles()).unwrap();
    let record = stale_record(Vec::new());
    let mut report = detect_drift(&record, schema, &fingerprint).unwrap();
    report.expected_keys.pop();
    let err = plan_repair(&record, schema, &fingerprint, &report).unwrap_err();
    assert!(matches!(err, RepairError::Validation(_)));
}

#[tokio::test]
async fn repair_applies_every_item_atomically() {
    let store = InMemoryShadowStore::new();
    let config = articles_config();
    let fingerprint = config.fingerprint().unwrap();
    let schema = config.require_resource(&articles()).unwrap();
    let record = stale_record(vec!["title#Old#id#a1".to_string()]);
    store.put_item(record.clone().into_item()).unwrap();
    store.put_item(shadow_item("title#Old#id#a1")).unwrap();

    let executor = RepairExecutor::new(Arc::new(store.clone()));
    let report = detect_drift(&record, schema, &fingerprint).unwrap();
    let outcome = executor.repair(&record, schema, &fingerprint, &report).await.unwrap();

    assert_eq!(outcome.deleted, 1);
    assert_eq!(outcome.inserted, 5);
    assert_eq!(store.shadow_sort_keys(&articles()).len(), 5);
    let stored = store.record(&articles(), &RecordId::new("a1")).unwrap();
    let state = stored.recorded_state().unwrap();
    assert_eq!(state.config_hash.as_deref(), Some(fingerprint.hash_hex()));
    assert_eq!(state.keys(), report.expected_keys.as_slice());
    assert_eq!(store.committed_transactions(), 1);
}

#[tokio::test]
async fn cancelled_transaction_leaves_storage_untouched() {
    let store = InMemoryShadowStore::new();
    let config = articles_config();
    let fingerprint = config.fingerprint().unwrap();
    let schema = config.require_resource(&articles()).unwrap();
    let record = stale_record(vec!["title#Old#id#a1".to_string()]);
    store.put_item(record.clone().into_item()).unwrap();
    store.put_item(shadow_item("title#Old#id#a1")).unwrap();
    let status = shadow_sort_key("status", "draft", &RecordId::new("a1"));
    store.fail_transactions_touching(status).unwrap();
    let before = store.snapshot();

    let executor = RepairExecutor::new(Arc::new(store.clone()));
    let report = detect_drift(&record, schema, &fingerprint).unwrap();
    let err = executor.repair(&record, schema, &fingerprint, &report).await.unwrap_err();

    assert_eq!(err.code(), RepairErrorCode::TransactionFailed);
    assert_eq!(store.snapshot(), before);
}

#[tokio::test]
async fn concurrent_key_rewrite_cancels_the_repair() {
    let store = InMemoryShadowStore::new();
    let config = articles_config();
    let fingerprint = config.fingerprint().unwrap();
    let schema = config.require_resource(&articles()).unwrap();
    let record = stale_record(vec!["title#Old#id#a1".to_string()]);
    let report = detect_drift(&record, schema, &fingerprint).unwrap();

    let mut rewritten = record.clone();
    rewritten.data.insert(SHADOW_KEYS_ATTR.to_string(), json!(["title#Newer#id#a1"]));
    store.put_item(rewritten.into_item()).unwrap();
    let before = store.snapshot();

    let executor = RepairExecutor::new(Arc::new(store.clone()));
    let err = executor.repair(&record, schema, &fingerprint, &report).await.unwrap_err();
    assert!(matches!(err, RepairError::Cancelled(_)));
    assert_eq!(store.snapshot(), before);
}

#[tokio::test]
async fn oversized_repair_fails_fast_without_writing() {
    let (config, record) = wide_record(50);
    let fingerprint = config.fingerprint().unwrap();
    let resource = ResourceName::new("wide");
    let schema = config.require_resource(&resource).unwrap();
    let store = InMemoryShadowStore::new();
    store.put_item(record.clone().into_item()).unwrap();

    let report = detect_drift(&record, schema, &fingerprint).unwrap();
    let plan = plan_repair(&record, schema, &fingerprint, &report).unwrap();
    assert_eq!(plan.item_count(), 101);

    let executor = RepairExecutor::new(Arc::new(store.clone()));
    let err = executor.execute(plan).await.unwrap_err();
    assert_eq!(
        err,
        RepairError::TooLarge {
            items: 101,
            max: 100,
        }
    );
    assert_eq!(err.code(), RepairErrorCode::ValidationError);
    assert_eq!(store.attempted_transactions(), 0);
}

#[tokio::test]
async fn store_limit_is_respected_when_lower_than_default() {
    let store = InMemoryShadowStore::new().with_max_transact_items(3);
    let config = articles_config();
    let fingerprint = config.fingerprint().unwrap();
    let schema = config.require_resource(&articles()).unwrap();
    let record = stale_record(Vec::new());
    store.put_item(record.clone().into_item()).unwrap();
    let executor = RepairExecutor::new(Arc::new(store.clone()));
    let report = detect_drift(&record, schema, &fingerprint).unwrap();
    let err = executor.repair(&record, schema, &fingerprint, &report).await.unwrap_err();
    assert!(matches!(
        err,
        RepairError::TooLarge {
            max: 3,
            ..
        }
    ));
}

fn shadow_item(sort_key: &str) -> StoredItem {
    let mut data = Map::new();
    data.insert("id".to_string(), json!("a1"));
    StoredItem {
        key: ItemKey::new("articles", sort_key),
        data,
    }
}

/// Builds a resource with `count` number fields and a record whose recorded
/// keys are all stale, so repair needs `count` deletes and `count` puts.
fn wide_record(count: usize) -> (ShadowConfig, PrimaryRecord) {
    let mut shadows = String::new();
    let mut data = Map::new();
    let mut stale = Vec::new();
    for index in 0..count {
        if index > 0 {
            shadows.push(',');
        }
        write!(shadows, r#""f{index}": {{ "type": "number" }}"#).unwrap();
        data.insert(format!("f{index}"), Value::from(index));
        stale.push(format!("f{index}#stale#id#w1"));
    }
    let text = format!(
        r#"{{ "$schemaVersion": "1", "resources": {{ "wide": {{ "shadows": {{ {shadows} }} }} }} }}"#
    );
    let config = ShadowConfig::from_json_str(&text).unwrap();
    let fingerprint = ConfigFingerprint::compute(&config).unwrap();
    ShadowMetadata {
        shadow_keys: stale,
        config_version: fingerprint.version,
        config_hash: "outdated".to_string(),
    }
    .apply_to(&mut data);
    (config, PrimaryRecord::new(ResourceName::new("wide"), RecordId::new("w1"), data))
}
