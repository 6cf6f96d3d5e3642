// crates/shadowkeep-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Shared fixtures for shadowkeep-core tests.
// Purpose: Provide reusable schemas, records, and worker builders.
// Dependencies: shadowkeep-core, serde_json
// ============================================================================

//! ## Overview
//! Provides an `articles` schema, sample record data, and helpers that seed
//! the in-memory store with consistent or drifted records.

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
#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]

use std::sync::Arc;

use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use shadowkeep_core::ConfigFingerprint;
use shadowkeep_core::InMemoryShadowStore;
use shadowkeep_core::MemoryEventSink;
use shadowkeep_core::RecordId;
use shadowkeep_core::ResourceName;
use shadowkeep_core::RunId;
use shadowkeep_core::SegmentWorker;
use shadowkeep_core::ShadowConfig;
use shadowkeep_core::ShadowMetadata;
use shadowkeep_core::WorkerInput;
use shadowkeep_core::generate_shadow_records;

/// Schema document used across tests.
pub const ARTICLES_SCHEMA: &str = r#"{
  "$schemaVersion": "1.0",
  "database": { "timestamps": { "createdAt": "createdAt", "updatedAt": "updatedAt" } },
  "resources": {
    "articles": {
      "sortDefaults": { "field": "updatedAt", "order": "DESC" },
      "shadows": {
        "title": { "type": "string" },
        "status": { "type": "string" },
        "viewCount": { "type": "number" },
        "updatedAt": { "type": "datetime" },
        "published": { "type": "boolean" }
      }
    },
    "tasks": {
      "shadows": { "name": { "type": "string" } }
    }
  }
}"#;

pub fn articles_config() -> ShadowConfig {
    ShadowConfig::from_json_str(ARTICLES_SCHEMA).unwrap()
}

pub fn articles() -> ResourceName {
    ResourceName::new("articles")
}

pub fn as_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

pub fn article_data(title: &str, views: u64) -> Map<String, Value> {
    as_map(json!({
        "title": title,
        "status": "draft",
        "viewCount": views,
        "updatedAt": "2024-05-01T12:00:00Z",
        "published": false,
        "body": "ignored by shadows"
    }))
}

pub fn worker_input(segment: u32, total: u32, dry_run: bool, page_limit: u32) -> WorkerInput {
    WorkerInput {
        resource: articles(),
        segment,
        total_segments: total,
        dry_run,
        page_limit,
        run_id: RunId::new("run-test"),
    }
}

pub fn worker(
    store: &InMemoryShadowStore,
    config: ShadowConfig,
) -> (SegmentWorker, Arc<MemoryEventSink>) {
    let events = Arc::new(MemoryEventSink::new());
    let worker = SegmentWorker::new(Arc::new(store.clone()), Arc::new(config), events.clone())
        .unwrap();
    (worker, events)
}

/// Writes a record together with exactly the shadows and metadata the config expects.
pub fn seed_consistent(
    store: &InMemoryShadowStore,
    config: &ShadowConfig,
    id: &str,
    mut data: Map<String, Value>,
) {
    let resource = articles();
    let id = RecordId::new(id);
    let schema = config.require_resource(&resource).unwrap();
    let shadows = generate_shadow_records(&resource, &id, &data, schema).unwrap();
    let fingerprint = ConfigFingerprint::compute(config).unwrap();
    ShadowMetadata {
        shadow_keys: shadows.iter().map(|shadow| shadow.sort_key().to_string()).collect(),
        config_version: fingerprint.version.clone(),
        config_hash: fingerprint.hash_hex().to_string(),
    }
    .apply_to(&mut data);
    for shadow in &shadows {
        store.put_item(shadow.to_item()).unwrap();
    }
    store.put_record(&resource, &id, data).unwrap();
}

/// Writes a record with no shadows and no maintenance metadata.
pub fn seed_bare(store: &InMemoryShadowStore, id: &str, data: Map<String, Value>) {
    store.put_record(&articles(), &RecordId::new(id), data).unwrap();
}
