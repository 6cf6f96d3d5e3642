// crates/shadowkeep-config/tests/settings.rs
// ============================================================================
// Module: Environment Settings Tests
// Description: Worker and coordinator environment resolution.
// Purpose: Ensure missing or malformed variables fail closed.
// Dependencies: shadowkeep-config, shadowkeep-core, base64
// ============================================================================

//! ## Overview
//! Covers required variables, the `AWS_REGION` fallback, allow-list parsing,
//! run default overrides, and schema blob decoding.

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

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use shadowkeep_config::ConfigError;
use shadowkeep_config::CoordinatorSettings;
use shadowkeep_config::WorkerSettings;
use shadowkeep_config::decode_shadow_config;
use shadowkeep_config::encode_shadow_config;
use shadowkeep_core::ResourceName;
use shadowkeep_core::RunDefaults;

use crate::common::SCHEMA_JSON;
use crate::common::lookup;
use crate::common::schema_blob;

#[test]
fn worker_settings_resolve_from_environment() {
    let blob = schema_blob();
    let settings = WorkerSettings::from_lookup(lookup(&[
        ("ENV", "dev"),
        ("REGION", "us-east-1"),
        ("TABLE_NAME", "news"),
        ("SHADOW_CONFIG", &blob),
    ]))
    .unwrap();
    assert_eq!(settings.env, "dev");
    assert_eq!(settings.region, "us-east-1");
    assert_eq!(settings.table_name, "news");
    assert!(settings.shadow_config.resource(&ResourceName::new("articles")).is_some());
}

#[test]
fn worker_region_falls_back_to_aws_region() {
    let blob = schema_blob();
    let settings = WorkerSettings::from_lookup(lookup(&[
        ("ENV", "dev"),
        ("AWS_REGION", "eu-west-1"),
        ("TABLE_NAME", "news"),
        ("SHADOW_CONFIG", &blob),
    ]))
    .unwrap();
    assert_eq!(settings.region, "eu-west-1");
}

#[test]
fn worker_settings_require_every_variable() {
    let blob = schema_blob();
    let full = [
        ("ENV", "dev"),
        ("REGION", "us-east-1"),
        ("TABLE_NAME", "news"),
        ("SHADOW_CONFIG", blob.as_str()),
    ];
    for skip in 0..full.len() {
        let pairs: Vec<(&str, &str)> = full
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != skip)
            .map(|(_, pair)| *pair)
            .collect();
        let err = WorkerSettings::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)), "missing {}", full[skip].0);
        assert_eq!(err.code(), "CONFIG_ERROR");
    }
}

#[test]
fn blank_variables_count_as_missing() {
    let blob = schema_blob();
    let err = WorkerSettings::from_lookup(lookup(&[
        ("ENV", "  "),
        ("REGION", "us-east-1"),
        ("TABLE_NAME", "news"),
        ("SHADOW_CONFIG", &blob),
    ]))
    .unwrap_err();
    assert!(matches!(err, ConfigError::Missing(_)));
}

#[test]
fn malformed_schema_blobs_are_fatal() {
    assert!(matches!(decode_shadow_config("%%%not-base64"), Err(ConfigError::Invalid(_))));
    let not_utf8 = STANDARD.encode([0xff_u8, 0xfe, 0xfd]);
    assert!(matches!(decode_shadow_config(&not_utf8), Err(ConfigError::Invalid(_))));
    let not_json = STANDARD.encode("{ nope");
    assert!(matches!(decode_shadow_config(&not_json), Err(ConfigError::Schema(_))));
    let bad_type = STANDARD.encode(
        r#"{ "$schemaVersion": "1", "resources": { "a": { "shadows": { "x": { "type": "text" } } } } }"#,
    );
    assert!(matches!(decode_shadow_config(&bad_type), Err(ConfigError::Schema(_))));
}

#[test]
fn encoded_blob_decodes_to_the_same_config() {
    let config = decode_shadow_config(&schema_blob()).unwrap();
    let encoded = encode_shadow_config(&config).unwrap();
    let decoded = decode_shadow_config(&encoded).unwrap();
    assert_eq!(decoded, config);
    assert_eq!(
        decoded.fingerprint().unwrap(),
        shadowkeep_core::ShadowConfig::from_json_str(SCHEMA_JSON).unwrap().fingerprint().unwrap()
    );
}

#[test]
fn coordinator_settings_parse_allow_list_and_defaults() {
    let settings = CoordinatorSettings::from_lookup(lookup(&[
        ("ENV", "prod"),
        ("REGION", "us-east-1"),
        ("ALLOW_RESOURCES", " articles, ,tasks ,"),
    ]))
    .unwrap();
    let names: Vec<&str> = settings.allowed_resources.iter().map(ResourceName::as_str).collect();
    assert_eq!(names, vec!["articles", "tasks"]);
    assert_eq!(settings.defaults, RunDefaults::default());
    assert!(settings.policy().allows(&ResourceName::new("tasks")));
}

#[test]
fn coordinator_defaults_can_be_overridden() {
    let settings = CoordinatorSettings::from_lookup(lookup(&[
        ("ENV", "prod"),
        ("REGION", "us-east-1"),
        ("ALLOW_RESOURCES", "articles"),
        ("DEFAULT_SEGMENTS", "16"),
        ("DEFAULT_DRY_RUN", "false"),
        ("DEFAULT_PAGE_LIMIT", "5"),
    ]))
    .unwrap();
    assert_eq!(settings.defaults.segments, 16);
    assert!(!settings.defaults.dry_run);
    assert_eq!(settings.defaults.page_limit, 5);
}

#[test]
fn coordinator_defaults_reject_bad_values() {
    for (name, value) in [
        ("DEFAULT_SEGMENTS", "0"),
        ("DEFAULT_SEGMENTS", "-3"),
        ("DEFAULT_SEGMENTS", "2000000"),
        ("DEFAULT_DRY_RUN", "maybe"),
        ("DEFAULT_PAGE_LIMIT", "1.5"),
    ] {
        let err = CoordinatorSettings::from_lookup(lookup(&[
            ("ENV", "prod"),
            ("REGION", "us-east-1"),
            ("ALLOW_RESOURCES", "articles"),
            (name, value),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "{name}={value}");
    }
}

#[test]
fn coordinator_requires_allow_list() {
    let err = CoordinatorSettings::from_lookup(lookup(&[("ENV", "prod"), ("REGION", "us-east-1")]))
        .unwrap_err();
    assert!(matches!(err, ConfigError::Missing(_)));
}
