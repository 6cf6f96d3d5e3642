// crates/shadowkeep-config/src/settings.rs
// ============================================================================
// Module: Environment Settings
// Description: Worker and coordinator settings resolved from the environment.
// Purpose: Validate process environment once, at startup.
// Dependencies: shadowkeep-core, base64, serde_json
// ============================================================================

//! ## Overview
//! Workers need `ENV`, `REGION` (or `AWS_REGION`), `TABLE_NAME`, and the
//! base64 `SHADOW_CONFIG` blob. Coordinators need `ENV`, the region, and the
//! comma-separated `ALLOW_RESOURCES` list, plus optional run defaults.
//!
//! Every resolver takes a lookup closure so tests never touch the real
//! process environment.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use shadowkeep_core::CoordinatorPolicy;
use shadowkeep_core::ResourceName;
use shadowkeep_core::RunDefaults;
use shadowkeep_core::ShadowConfig;

use crate::error::ConfigError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Deployment environment name.
const ENV_NAME: &str = "ENV";
/// Preferred region variable.
const ENV_REGION: &str = "REGION";
/// Fallback region variable set by the AWS runtime.
const ENV_AWS_REGION: &str = "AWS_REGION";
/// Table holding primary and shadow records.
const ENV_TABLE_NAME: &str = "TABLE_NAME";
/// Base64 JSON shadow config.
const ENV_SHADOW_CONFIG: &str = "SHADOW_CONFIG";
/// Comma-separated resource allow-list.
const ENV_ALLOW_RESOURCES: &str = "ALLOW_RESOURCES";
/// Optional default segment count.
const ENV_DEFAULT_SEGMENTS: &str = "DEFAULT_SEGMENTS";
/// Optional default dry-run flag.
const ENV_DEFAULT_DRY_RUN: &str = "DEFAULT_DRY_RUN";
/// Optional default page limit.
const ENV_DEFAULT_PAGE_LIMIT: &str = "DEFAULT_PAGE_LIMIT";

// ============================================================================
// SECTION: Worker Settings
// ============================================================================

/// Validated worker process settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Deployment environment name.
    pub env: String,
    /// AWS region.
    pub region: String,
    /// Table name.
    pub table_name: String,
    /// Decoded and validated shadow config.
    pub shadow_config: ShadowConfig,
}

impl WorkerSettings {
    /// Resolves worker settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable is missing or the blob is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Resolves worker settings through a variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable is missing or the blob is invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = non_empty(&lookup, ENV_NAME);
        let region = resolve_region(&lookup);
        let table_name = non_empty(&lookup, ENV_TABLE_NAME);
        let blob = non_empty(&lookup, ENV_SHADOW_CONFIG);
        let (Some(env), Some(region), Some(table_name), Some(blob)) =
            (env, region, table_name, blob)
        else {
            return Err(ConfigError::Missing("ENV, REGION, TABLE_NAME, SHADOW_CONFIG".to_string()));
        };
        let shadow_config = decode_shadow_config(&blob)?;
        Ok(Self {
            env,
            region,
            table_name,
            shadow_config,
        })
    }
}

// ============================================================================
// SECTION: Coordinator Settings
// ============================================================================

/// Validated coordinator process settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorSettings {
    /// Deployment environment name.
    pub env: String,
    /// AWS region.
    pub region: String,
    /// Resources runs may target.
    pub allowed_resources: BTreeSet<ResourceName>,
    /// Defaults for omitted request fields.
    pub defaults: RunDefaults,
}

impl CoordinatorSettings {
    /// Resolves coordinator settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable is missing or malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Resolves coordinator settings through a variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable is missing or malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = non_empty(&lookup, ENV_NAME);
        let region = resolve_region(&lookup);
        let allow = non_empty(&lookup, ENV_ALLOW_RESOURCES);
        let (Some(env), Some(region), Some(allow)) = (env, region, allow) else {
            return Err(ConfigError::Missing("ENV, REGION, ALLOW_RESOURCES".to_string()));
        };
        let mut defaults = RunDefaults::default();
        if let Some(value) = non_empty(&lookup, ENV_DEFAULT_SEGMENTS) {
            defaults.segments = parse_positive(ENV_DEFAULT_SEGMENTS, &value)?;
        }
        if let Some(value) = non_empty(&lookup, ENV_DEFAULT_DRY_RUN) {
            defaults.dry_run = parse_bool(ENV_DEFAULT_DRY_RUN, &value)?;
        }
        if let Some(value) = non_empty(&lookup, ENV_DEFAULT_PAGE_LIMIT) {
            defaults.page_limit = parse_positive(ENV_DEFAULT_PAGE_LIMIT, &value)?;
        }
        defaults.validate().map_err(|err| ConfigError::Invalid(err.to_string()))?;
        Ok(Self {
            env,
            region,
            allowed_resources: parse_allow_list(&allow),
            defaults,
        })
    }

    /// Converts the settings into a coordinator policy.
    #[must_use]
    pub fn policy(&self) -> CoordinatorPolicy {
        CoordinatorPolicy::new(self.allowed_resources.clone(), self.defaults)
    }
}

// ============================================================================
// SECTION: Schema Blob
// ============================================================================

/// Decodes a base64 JSON shadow config blob.
///
/// # Errors
///
/// Returns [`ConfigError`] when the blob is not base64, not UTF-8, or not a
/// valid shadow config.
pub fn decode_shadow_config(blob: &str) -> Result<ShadowConfig, ConfigError> {
    let bytes = STANDARD
        .decode(blob.trim())
        .map_err(|err| ConfigError::Invalid(format!("SHADOW_CONFIG is not valid base64: {err}")))?;
    let text = std::str::from_utf8(&bytes)
        .map_err(|_| ConfigError::Invalid("SHADOW_CONFIG must be utf-8".to_string()))?;
    Ok(ShadowConfig::from_json_str(text)?)
}

/// Encodes a shadow config as a base64 JSON blob.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] when serialization fails.
pub fn encode_shadow_config(config: &ShadowConfig) -> Result<String, ConfigError> {
    let json = serde_json::to_vec(config).map_err(|err| ConfigError::Parse(err.to_string()))?;
    Ok(STANDARD.encode(json))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns a trimmed, non-empty variable value.
fn non_empty(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

/// Resolves `REGION`, falling back to `AWS_REGION`.
fn resolve_region(lookup: &impl Fn(&str) -> Option<String>) -> Option<String> {
    non_empty(lookup, ENV_REGION).or_else(|| non_empty(lookup, ENV_AWS_REGION))
}

/// Splits a comma-separated allow-list, ignoring blank entries.
fn parse_allow_list(value: &str) -> BTreeSet<ResourceName> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(ResourceName::new)
        .collect()
}

/// Parses a positive integer variable.
fn parse_positive(name: &str, value: &str) -> Result<u32, ConfigError> {
    match value.parse::<u32>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(ConfigError::Invalid(format!("{name} must be a positive integer"))),
    }
}

/// Parses a boolean variable.
fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ConfigError::Invalid(format!("{name} must be true or false"))),
    }
}
