// crates/shadowkeep-config/src/error.rs
// ============================================================================
// Module: Config Errors
// Description: Error type shared by every configuration loader.
// Purpose: Report configuration failures with a stable machine code.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! All configuration failures collapse to the `CONFIG_ERROR` code. The
//! variant records which stage failed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use shadowkeep_core::SchemaError;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML or JSON parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
    /// Required environment variable is absent or empty.
    #[error("missing required environment variables: {0}")]
    Missing(String),
    /// Shadow schema failed to load.
    #[error("invalid shadow config: {0}")]
    Schema(String),
}

impl ConfigError {
    /// Returns the stable machine code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Io(_) | Self::Parse(_) | Self::Invalid(_) | Self::Missing(_) | Self::Schema(_) => {
                "CONFIG_ERROR"
            }
        }
    }
}

impl From<SchemaError> for ConfigError {
    fn from(err: SchemaError) -> Self {
        Self::Schema(err.to_string())
    }
}
