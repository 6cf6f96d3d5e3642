// crates/shadowkeep-config/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Shared fixtures for shadowkeep-config tests.
// Purpose: Provide schema documents, blobs, and environment lookups.
// Dependencies: shadowkeep-config, base64
// ============================================================================

//! ## Overview
//! Provides a small schema document, its base64 blob, and a lookup builder
//! that stands in for the process environment.

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

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Schema document used across tests.
pub const SCHEMA_JSON: &str = r#"{
  "$schemaVersion": "1.0",
  "resources": {
    "articles": {
      "shadows": {
        "title": { "type": "string" },
        "updatedAt": { "type": "datetime" }
      }
    }
  }
}"#;

/// Returns the base64 blob of [`SCHEMA_JSON`].
pub fn schema_blob() -> String {
    STANDARD.encode(SCHEMA_JSON)
}

/// Builds an environment lookup from fixed pairs.
pub fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
    let vars: BTreeMap<String, String> =
        pairs.iter().map(|(name, value)| ((*name).to_string(), (*value).to_string())).collect();
    move |name| vars.get(name).cloned()
}
