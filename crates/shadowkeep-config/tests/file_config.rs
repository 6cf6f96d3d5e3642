// crates/shadowkeep-config/tests/file_config.rs
// ============================================================================
// Module: Maintenance Config File Tests
// Description: Loading and validation of shadowkeep.toml.
// Purpose: Ensure the config file fails closed on bad input.
// Dependencies: shadowkeep-config, shadowkeep-core, tempfile
// ============================================================================

//! ## Overview
//! Covers defaults, unknown keys, size limits, schema sources, event sink
//! settings, and conversion into worker and coordinator settings.

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

use std::fs;

use shadowkeep_config::ConfigError;
use shadowkeep_config::EventSinkKind;
use shadowkeep_config::MAX_CONFIG_FILE_SIZE;
use shadowkeep_config::MaintenanceFileConfig;
use shadowkeep_core::ResourceName;
use shadowkeep_core::RunDefaults;
use tempfile::TempDir;

use crate::common::SCHEMA_JSON;
use crate::common::schema_blob;

fn minimal(schema: &str) -> String {
    format!(
        r#"
[aws]
region = "us-east-1"

[table]
name = "news"

[schema]
{schema}
"#
    )
}

#[test]
fn minimal_config_applies_defaults() {
    let blob = schema_blob();
    let config = MaintenanceFileConfig::from_toml_str(&minimal(&format!("blob = \"{blob}\"")))
        .unwrap();
    assert_eq!(config.env, "local");
    assert_eq!(config.table.page_size, 100);
    assert_eq!(config.coordinator.defaults(), RunDefaults::default());
    assert_eq!(config.logging.sink, EventSinkKind::Stderr);
    assert!(config.coordinator.allow_resources.is_empty());
}

#[test]
fn full_config_round_trips_into_settings() {
    let blob = schema_blob();
    let text = format!(
        r#"
env = "staging"

[aws]
region = "ap-northeast-1"
endpoint_url = "http://localhost:8000"

[table]
name = "news"
page_size = 25

[coordinator]
allow_resources = ["articles", "tasks"]
segments = 4
dry_run = false
page_limit = 10

[schema]
blob = "{blob}"

[logging]
sink = "none"
"#
    );
    let config = MaintenanceFileConfig::from_toml_str(&text).unwrap();
    let worker = config.worker_settings().unwrap();
    assert_eq!(worker.env, "staging");
    assert_eq!(worker.region, "ap-northeast-1");
    assert_eq!(worker.table_name, "news");
    let coordinator = config.coordinator_settings();
    assert_eq!(coordinator.allowed_resources.len(), 2);
    assert!(coordinator.policy().allows(&ResourceName::new("articles")));
    assert_eq!(coordinator.defaults.segments, 4);
    assert!(!coordinator.defaults.dry_run);
    assert!(config.logging.build_sink().is_ok());
}

#[test]
fn unknown_keys_are_rejected() {
    let text = format!("{}\n[extra]\nvalue = 1\n", minimal("blob = \"e30=\""));
    assert!(matches!(MaintenanceFileConfig::from_toml_str(&text), Err(ConfigError::Parse(_))));
    let text = minimal("blob = \"e30=\"\nformat = \"json\"");
    assert!(matches!(MaintenanceFileConfig::from_toml_str(&text), Err(ConfigError::Parse(_))));
}

#[test]
fn schema_source_must_be_exactly_one() {
    let both = minimal("blob = \"e30=\"\npath = \"shadow.config.json\"");
    assert!(matches!(MaintenanceFileConfig::from_toml_str(&both), Err(ConfigError::Invalid(_))));
    let neither = minimal("");
    assert!(matches!(
        MaintenanceFileConfig::from_toml_str(&neither),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn invalid_sections_are_rejected() {
    let cases = [
        minimal("blob = \"e30=\"").replace("region = \"us-east-1\"", "region = \" \""),
        minimal("blob = \"e30=\"").replace("name = \"news\"", "name = \"\""),
        format!("{}\n[coordinator]\nsegments = 0\n", minimal("blob = \"e30=\"")),
        format!("{}\n[coordinator]\nallow_resources = [\" \"]\n", minimal("blob = \"e30=\"")),
        format!("{}\n[logging]\nsink = \"file\"\n", minimal("blob = \"e30=\"")),
        format!("{}\n[logging]\nsink = \"stderr\"\npath = \"x.log\"\n", minimal("blob = \"e30=\"")),
        minimal("blob = \"e30=\"")
            .replace("region = \"us-east-1\"", "region = \"us-east-1\"\nendpoint_url = \"localhost\""),
    ];
    for text in &cases {
        assert!(
            matches!(MaintenanceFileConfig::from_toml_str(text), Err(ConfigError::Invalid(_))),
            "expected rejection for {text}"
        );
    }
}

#[test]
fn load_reads_file_and_resolves_relative_schema_path() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("shadow.config.json"), SCHEMA_JSON).unwrap();
    let config_path = dir.path().join("shadowkeep.toml");
    fs::write(&config_path, minimal("path = \"shadow.config.json\"")).unwrap();

    let config = MaintenanceFileConfig::load(Some(&config_path)).unwrap();
    let schema = config.load_schema().unwrap();
    assert!(schema.resource(&ResourceName::new("articles")).is_some());
}

#[test]
fn load_rejects_oversized_and_non_utf8_files() {
    let dir = TempDir::new().unwrap();
    let big = dir.path().join("big.toml");
    fs::write(&big, vec![b'#'; MAX_CONFIG_FILE_SIZE + 1]).unwrap();
    assert!(matches!(MaintenanceFileConfig::load(Some(&big)), Err(ConfigError::Invalid(_))));

    let binary = dir.path().join("binary.toml");
    fs::write(&binary, [0xff_u8, 0xfe, 0x00]).unwrap();
    assert!(matches!(MaintenanceFileConfig::load(Some(&binary)), Err(ConfigError::Invalid(_))));
}

#[test]
fn load_reports_missing_files_as_io_errors() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.toml");
    assert!(matches!(MaintenanceFileConfig::load(Some(&missing)), Err(ConfigError::Io(_))));
}

#[test]
fn load_rejects_overlong_path_components() {
    let long = "a".repeat(300);
    let path = std::path::PathBuf::from(format!("/tmp/{long}/shadowkeep.toml"));
    assert!(matches!(MaintenanceFileConfig::load(Some(&path)), Err(ConfigError::Invalid(_))));
}

#[test]
fn file_sink_appends_events() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("events.jsonl");
    let text = format!(
        "{}\n[logging]\nsink = \"file\"\npath = \"{}\"\n",
        minimal("blob = \"e30=\""),
        log.display()
    );
    let config = MaintenanceFileConfig::from_toml_str(&text).unwrap();
    let sink = config.logging.build_sink().unwrap();
    sink.record_coordinator(&shadowkeep_core::CoordinatorEvent::rejected(
        Some("articles"),
        "INVALID_INPUT",
        "bad request".to_string(),
    ));
    let written = fs::read_to_string(&log).unwrap();
    assert_eq!(written.lines().count(), 1);
    assert!(written.contains("coordinator_rejected"));
}
