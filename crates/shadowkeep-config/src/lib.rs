// crates/shadowkeep-config/src/lib.rs
// ============================================================================
// Module: Shadowkeep Config Library
// Description: Runtime settings, maintenance config file, and schema blobs.
// Purpose: Single source of truth for how shadowkeep processes are configured.
// Dependencies: shadowkeep-core, base64, serde, toml
// ============================================================================

//! ## Overview
//! `shadowkeep-config` turns process environment, `shadowkeep.toml`, and the
//! base64 schema blob into validated values. Every loader fails closed: a
//! missing variable, oversized file, or malformed blob is a [`ConfigError`]
//! before any worker or coordinator starts.
//!
//! The registry module generates shadow config documents from a declarative
//! registry of sortable fields.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod error;
pub mod file;
pub mod registry;
pub mod settings;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use error::ConfigError;
pub use file::AwsSection;
pub use file::CONFIG_ENV_VAR;
pub use file::CoordinatorSection;
pub use file::DEFAULT_CONFIG_NAME;
pub use file::EventSinkKind;
pub use file::LoggingSection;
pub use file::MAX_CONFIG_FILE_SIZE;
pub use file::MaintenanceFileConfig;
pub use file::SchemaSection;
pub use file::TableSection;
pub use registry::RegistryField;
pub use registry::RegistryResource;
pub use registry::SchemaRegistry;
pub use settings::CoordinatorSettings;
pub use settings::WorkerSettings;
pub use settings::decode_shadow_config;
pub use settings::encode_shadow_config;
