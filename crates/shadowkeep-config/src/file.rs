// crates/shadowkeep-config/src/file.rs
// ============================================================================
// Module: Maintenance Config File
// Description: Loading and validation of shadowkeep.toml.
// Purpose: Load shadowkeep.toml strictly, with hard size and path limits.
// Dependencies: shadowkeep-core, serde, toml
// ============================================================================

//! ## Overview
//! `shadowkeep.toml` configures local and operator-driven runs: AWS access,
//! the table, coordinator allow-list and defaults, the schema source, and the
//! event sink. The file is read with strict size and path limits, parsed with
//! unknown keys rejected, and validated section by section.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use shadowkeep_core::DEFAULT_PAGE_SIZE;
use shadowkeep_core::FileEventSink;
use shadowkeep_core::MAX_SCHEMA_BYTES;
use shadowkeep_core::MaintenanceEventSink;
use shadowkeep_core::NoopEventSink;
use shadowkeep_core::ResourceName;
use shadowkeep_core::RunDefaults;
use shadowkeep_core::ShadowConfig;
use shadowkeep_core::StderrEventSink;

use crate::error::ConfigError;
use crate::settings::CoordinatorSettings;
use crate::settings::WorkerSettings;
use crate::settings::decode_shadow_config;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "shadowkeep.toml";
/// Environment variable overriding the config path.
pub const CONFIG_ENV_VAR: &str = "SHADOWKEEP_CONFIG";
/// Maximum config file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of one path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum scan page size accepted from config.
const MAX_PAGE_SIZE: u32 = 10_000;
/// Environment name used when the file omits one.
const DEFAULT_ENV: &str = "local";

// ============================================================================
// SECTION: Config File
// ============================================================================

/// Parsed and validated `shadowkeep.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MaintenanceFileConfig {
    /// Deployment environment name.
    #[serde(default = "default_env")]
    pub env: String,
    /// AWS access settings.
    pub aws: AwsSection,
    /// Table settings.
    pub table: TableSection,
    /// Coordinator allow-list and defaults.
    #[serde(default)]
    pub coordinator: CoordinatorSection,
    /// Shadow schema source.
    pub schema: SchemaSection,
    /// Event sink settings.
    #[serde(default)]
    pub logging: LoggingSection,
    /// Directory relative schema paths resolve against.
    #[serde(skip)]
    pub source_dir: Option<PathBuf>,
}

impl MaintenanceFileConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        let content = read_text_file(&resolved, MAX_CONFIG_FILE_SIZE)?;
        let mut config = Self::from_toml_str(&content)?;
        config.source_dir = resolved.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        if content.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.env.trim().is_empty() {
            return Err(ConfigError::Invalid("env must be non-empty".to_string()));
        }
        self.aws.validate()?;
        self.table.validate()?;
        self.coordinator.validate()?;
        self.schema.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Loads the shadow schema named by the `[schema]` section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the schema cannot be read or is invalid.
    pub fn load_schema(&self) -> Result<ShadowConfig, ConfigError> {
        if let Some(blob) = &self.schema.blob {
            return decode_shadow_config(blob);
        }
        let Some(path) = &self.schema.path else {
            return Err(ConfigError::Invalid("schema.path or schema.blob is required".to_string()));
        };
        let path = match &self.source_dir {
            Some(dir) if Path::new(path).is_relative() => dir.join(path),
            _ => PathBuf::from(path),
        };
        let content = read_text_file(&path, MAX_SCHEMA_BYTES)?;
        Ok(ShadowConfig::from_json_str(&content)?)
    }

    /// Builds worker settings from this file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the schema cannot be loaded.
    pub fn worker_settings(&self) -> Result<WorkerSettings, ConfigError> {
        Ok(WorkerSettings {
            env: self.env.clone(),
            region: self.aws.region.clone(),
            table_name: self.table.name.clone(),
            shadow_config: self.load_schema()?,
        })
    }

    /// Builds coordinator settings from this file.
    #[must_use]
    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            env: self.env.clone(),
            region: self.aws.region.clone(),
            allowed_resources: self
                .coordinator
                .allow_resources
                .iter()
                .map(|name| ResourceName::new(name.trim()))
                .collect(),
            defaults: self.coordinator.defaults(),
        }
    }
}

// ============================================================================
// SECTION: Sections
// ============================================================================

/// AWS access settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsSection {
    /// AWS region.
    pub region: String,
    /// Optional endpoint override, for local DynamoDB.
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

impl AwsSection {
    /// Validates AWS settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.region.trim().is_empty() {
            return Err(ConfigError::Invalid("aws.region must be non-empty".to_string()));
        }
        if let Some(url) = &self.endpoint_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            return Err(ConfigError::Invalid(
                "aws.endpoint_url must be an http or https url".to_string(),
            ));
        }
        Ok(())
    }
}

/// Table settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableSection {
    /// Table name.
    pub name: String,
    /// Items examined per scan page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl TableSection {
    /// Validates table settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("table.name must be non-empty".to_string()));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "table.page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(())
    }
}

/// Coordinator allow-list and run defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoordinatorSection {
    /// Resources runs may target.
    #[serde(default)]
    pub allow_resources: Vec<String>,
    /// Default segment count.
    #[serde(default = "default_segments")]
    pub segments: u32,
    /// Default dry-run flag.
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
    /// Default page limit.
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
}

impl Default for CoordinatorSection {
    fn default() -> Self {
        Self {
            allow_resources: Vec::new(),
            segments: default_segments(),
            dry_run: default_dry_run(),
            page_limit: default_page_limit(),
        }
    }
}

impl CoordinatorSection {
    /// Returns the run defaults this section declares.
    #[must_use]
    pub const fn defaults(&self) -> RunDefaults {
        RunDefaults {
            segments: self.segments,
            dry_run: self.dry_run,
            page_limit: self.page_limit,
        }
    }

    /// Validates coordinator settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.allow_resources.iter().any(|name| name.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "coordinator.allow_resources entries must be non-empty".to_string(),
            ));
        }
        self.defaults().validate().map_err(|err| ConfigError::Invalid(err.to_string()))
    }
}

/// Shadow schema source. Exactly one of `path` or `blob` is set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaSection {
    /// JSON schema file path.
    #[serde(default)]
    pub path: Option<String>,
    /// Base64 JSON schema blob.
    #[serde(default)]
    pub blob: Option<String>,
}

impl SchemaSection {
    /// Validates the schema source.
    fn validate(&self) -> Result<(), ConfigError> {
        match (&self.path, &self.blob) {
            (Some(path), None) => validate_path_string("schema.path", path),
            (None, Some(blob)) if !blob.trim().is_empty() => Ok(()),
            (None, Some(_)) => Err(ConfigError::Invalid("schema.blob must be non-empty".to_string())),
            _ => Err(ConfigError::Invalid(
                "exactly one of schema.path or schema.blob must be set".to_string(),
            )),
        }
    }
}

/// Event sink selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Discard events.
    None,
}

/// Event sink settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Sink kind.
    #[serde(default)]
    pub sink: EventSinkKind,
    /// Output path for the file sink.
    #[serde(default)]
    pub path: Option<String>,
}

impl LoggingSection {
    /// Validates sink settings.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (EventSinkKind::File, Some(path)) => validate_path_string("logging.path", path),
            (EventSinkKind::File, None) => {
                Err(ConfigError::Invalid("logging.path is required for the file sink".to_string()))
            }
            (_, Some(_)) => Err(ConfigError::Invalid(
                "logging.path is only valid for the file sink".to_string(),
            )),
            (_, None) => Ok(()),
        }
    }

    /// Builds the configured event sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file sink cannot be opened.
    pub fn build_sink(&self) -> Result<Arc<dyn MaintenanceEventSink>, ConfigError> {
        match (self.sink, &self.path) {
            (EventSinkKind::Stderr, _) => Ok(Arc::new(StderrEventSink)),
            (EventSinkKind::None, _) => Ok(Arc::new(NoopEventSink)),
            (EventSinkKind::File, Some(path)) => {
                let sink = FileEventSink::new(Path::new(path))
                    .map_err(|err| ConfigError::Io(err.to_string()))?;
                Ok(Arc::new(sink))
            }
            (EventSinkKind::File, None) => {
                Err(ConfigError::Invalid("logging.path is required for the file sink".to_string()))
            }
        }
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default environment name.
fn default_env() -> String {
    DEFAULT_ENV.to_string()
}

/// Default scan page size.
const fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

/// Default segment count.
fn default_segments() -> u32 {
    RunDefaults::default().segments
}

/// Default dry-run flag.
fn default_dry_run() -> bool {
    RunDefaults::default().dry_run
}

/// Default page limit.
fn default_page_limit() -> u32 {
    RunDefaults::default().page_limit
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates a path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string field against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    validate_path(Path::new(value.trim()))
        .map_err(|_| ConfigError::Invalid(format!("{field} exceeds path length limits")))
}

/// Reads a UTF-8 file no larger than `limit` bytes.
pub(crate) fn read_text_file(path: &Path, limit: usize) -> Result<String, ConfigError> {
    validate_path(path)?;
    let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
    if bytes.len() > limit {
        return Err(ConfigError::Invalid("file exceeds size limit".to_string()));
    }
    String::from_utf8(bytes).map_err(|_| ConfigError::Invalid("file must be utf-8".to_string()))
}
