// crates/shadowkeep-cli/src/main.rs
// ============================================================================
// Module: Shadowkeep CLI Entry Point
// Description: Command dispatcher for maintenance runs and config tooling.
// Purpose: Run coordinators and segment workers, and manage shadow configs.
// Dependencies: clap, shadowkeep-config, shadowkeep-core,
//               shadowkeep-store-dynamodb, serde_jcs, thiserror, tokio
// ============================================================================

//! ## Overview
//! `shadowkeep` drives shadow-index maintenance against a DynamoDB table.
//! `coordinate` starts a run and waits for its segments; `worker` scans one
//! segment from a JSON input. The remaining commands work offline: they
//! fingerprint a schema, validate a maintenance config file, and generate a
//! shadow config from a field registry.
//!
//! Settings come from the maintenance config file by default. `--from-env`
//! reads the deployment environment variables instead.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::ArgAction;
use clap::ArgGroup;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use shadowkeep_config::ConfigError;
use shadowkeep_config::CoordinatorSettings;
use shadowkeep_config::MaintenanceFileConfig;
use shadowkeep_config::SchemaRegistry;
use shadowkeep_config::WorkerSettings;
use shadowkeep_config::decode_shadow_config;
use shadowkeep_config::encode_shadow_config;
use shadowkeep_core::ConfigFingerprint;
use shadowkeep_core::CoordinatorInput;
use shadowkeep_core::DEFAULT_PAGE_SIZE;
use shadowkeep_core::MAX_SCHEMA_BYTES;
use shadowkeep_core::MaintenanceEventSink;
use shadowkeep_core::ResourceName;
use shadowkeep_core::ScanCoordinator;
use shadowkeep_core::SegmentDispatcher;
use shadowkeep_core::SegmentWorker;
use shadowkeep_core::ShadowConfig;
use shadowkeep_core::ShadowStore;
use shadowkeep_core::StderrEventSink;
use shadowkeep_core::TokioSegmentDispatcher;
use shadowkeep_core::WorkerInput;
use shadowkeep_store_dynamodb::DynamoClientFactory;
use shadowkeep_store_dynamodb::DynamoClientSettings;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum size of a worker input or coordinator request file.
const MAX_REQUEST_BYTES: usize = 64 * 1024;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "shadowkeep", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start a maintenance run and wait for every segment.
    Coordinate(CoordinateCommand),
    /// Scan one segment from a worker input document.
    Worker(WorkerCommand),
    /// Print the version and hash of a shadow config.
    Fingerprint(FingerprintCommand),
    /// Validate a maintenance config file and its schema.
    ValidateConfig(ConfigSourceArgs),
    /// Generate a shadow config from a schema registry.
    GenerateConfig(GenerateConfigCommand),
}

/// Where runtime settings are read from.
#[derive(Args, Debug, Clone)]
struct ConfigSourceArgs {
    /// Config file path (defaults to shadowkeep.toml or `SHADOWKEEP_CONFIG`).
    #[arg(long, value_name = "PATH", conflicts_with = "from_env")]
    config: Option<PathBuf>,
    /// Read settings from deployment environment variables instead of a file.
    #[arg(long, action = ArgAction::SetTrue)]
    from_env: bool,
}

/// Arguments for the `coordinate` command.
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("target").required(true).args(["resource", "request"])))]
struct CoordinateCommand {
    /// Settings source.
    #[command(flatten)]
    source: ConfigSourceArgs,
    /// Resource to maintain.
    #[arg(long, value_name = "NAME")]
    resource: Option<String>,
    /// Raw JSON coordinator request file.
    #[arg(long, value_name = "PATH", conflicts_with_all = ["segments", "apply", "dry_run", "page_limit"])]
    request: Option<PathBuf>,
    /// Number of parallel segments.
    #[arg(long, value_name = "N")]
    segments: Option<u32>,
    /// Apply repairs instead of reporting drift.
    #[arg(long, action = ArgAction::SetTrue, conflicts_with = "dry_run")]
    apply: bool,
    /// Report drift without repairing.
    #[arg(long, action = ArgAction::SetTrue)]
    dry_run: bool,
    /// Maximum pages per segment.
    #[arg(long, value_name = "N")]
    page_limit: Option<u32>,
}

/// Arguments for the `worker` command.
#[derive(Args, Debug)]
struct WorkerCommand {
    /// Settings source.
    #[command(flatten)]
    source: ConfigSourceArgs,
    /// Worker input JSON file.
    #[arg(long, value_name = "PATH")]
    input: PathBuf,
}

/// Arguments for the `fingerprint` command.
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("schema_source").required(true).args(["schema", "blob"])))]
struct FingerprintCommand {
    /// Shadow config JSON file.
    #[arg(long, value_name = "PATH")]
    schema: Option<PathBuf>,
    /// Base64-encoded shadow config.
    #[arg(long, value_name = "BASE64")]
    blob: Option<String>,
}

/// Arguments for the `generate-config` command.
#[derive(Args, Debug)]
struct GenerateConfigCommand {
    /// Schema registry TOML file.
    #[arg(long, value_name = "PATH")]
    registry: PathBuf,
    /// Output path (defaults to stdout).
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
    /// Emit the base64 blob used by `SHADOW_CONFIG` instead of JSON.
    #[arg(long, action = ArgAction::SetTrue)]
    base64: bool,
    /// Value stamped into `$generatedFrom` (defaults to the registry path).
    #[arg(long, value_name = "TEXT")]
    generated_from: Option<String>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing error messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a message.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

/// Errors raised while reading bounded input files.
#[derive(Debug)]
enum ReadLimitError {
    /// File I/O failure.
    Io(std::io::Error),
    /// File size exceeds the configured limit.
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&format!("shadowkeep {version}"))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        write_stdout_line("no command given; run `shadowkeep --help` for usage")
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Coordinate(command) => command_coordinate(&command).await,
        Commands::Worker(command) => command_worker(&command).await,
        Commands::Fingerprint(command) => command_fingerprint(&command),
        Commands::ValidateConfig(command) => command_validate_config(&command),
        Commands::GenerateConfig(command) => command_generate_config(&command),
    }
}

// ============================================================================
// SECTION: Runtime Settings
// ============================================================================

/// Command role used to decide which settings are required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    /// Starts runs; needs the allow-list and run defaults.
    Coordinator,
    /// Scans a single segment.
    Worker,
}

/// Settings shared by the `coordinate` and `worker` commands.
struct RuntimeSettings {
    /// Worker settings including the loaded shadow config.
    worker: WorkerSettings,
    /// Coordinator allow-list and defaults, when available.
    coordinator: Option<CoordinatorSettings>,
    /// DynamoDB connection settings.
    client: DynamoClientSettings,
    /// Items examined per scan page.
    page_size: u32,
    /// Maintenance event sink.
    events: Arc<dyn MaintenanceEventSink>,
}

/// Loads runtime settings from the selected source.
fn load_runtime(source: &ConfigSourceArgs, role: Role) -> CliResult<RuntimeSettings> {
    if source.from_env {
        let worker = WorkerSettings::from_env().map_err(config_error)?;
        let coordinator = match role {
            Role::Coordinator => Some(CoordinatorSettings::from_env().map_err(config_error)?),
            Role::Worker => None,
        };
        return Ok(RuntimeSettings {
            client: DynamoClientSettings {
                region: worker.region.clone(),
                endpoint_url: None,
            },
            worker,
            coordinator,
            page_size: DEFAULT_PAGE_SIZE,
            events: Arc::new(StderrEventSink),
        });
    }
    let config = MaintenanceFileConfig::load(source.config.as_deref()).map_err(config_error)?;
    Ok(RuntimeSettings {
        worker: config.worker_settings().map_err(config_error)?,
        coordinator: Some(config.coordinator_settings()),
        client: DynamoClientSettings {
            region: config.aws.region.clone(),
            endpoint_url: config.aws.endpoint_url.clone(),
        },
        page_size: config.table.page_size,
        events: config.logging.build_sink().map_err(config_error)?,
    })
}

/// Builds a segment worker against the configured table.
async fn build_worker(runtime: &RuntimeSettings) -> CliResult<SegmentWorker> {
    let factory = DynamoClientFactory::new(runtime.client.clone());
    let table = factory.store(runtime.worker.table_name.clone()).await;
    let store: Arc<dyn ShadowStore> = Arc::new(table);
    let worker = SegmentWorker::new(
        store,
        Arc::new(runtime.worker.shadow_config.clone()),
        Arc::clone(&runtime.events),
    )
    .map_err(|err| CliError::new(format!("{}: {err}", err.code())))?;
    Ok(worker.with_page_size(runtime.page_size))
}

// ============================================================================
// SECTION: Coordinate Command
// ============================================================================

/// Executes the `coordinate` command.
async fn command_coordinate(command: &CoordinateCommand) -> CliResult<ExitCode> {
    let runtime = load_runtime(&command.source, Role::Coordinator)?;
    let policy = runtime
        .coordinator
        .as_ref()
        .map(CoordinatorSettings::policy)
        .ok_or_else(|| CliError::new("CONFIG_ERROR: coordinator settings are missing".to_string()))?;
    let worker = build_worker(&runtime).await?;
    let dispatcher = Arc::new(TokioSegmentDispatcher::new(worker));
    let launcher: Arc<dyn SegmentDispatcher> = Arc::<TokioSegmentDispatcher>::clone(&dispatcher);
    let coordinator = ScanCoordinator::new(policy, launcher, Arc::clone(&runtime.events));

    let started = match &command.request {
        Some(path) => {
            let request = read_json_file(path)?;
            coordinator.start_json(&request).await
        }
        None => coordinator.start(&coordinator_input(command)).await,
    }
    .map_err(|err| CliError::new(format!("{}: {err}", err.code())))?;
    write_json(&started)?;

    let Some(handle) = dispatcher.take_run(&started.execution_id) else {
        return Err(CliError::new(format!(
            "run {} was not found after dispatch",
            started.execution_id
        )));
    };
    let summary = handle.join().await;
    write_json(&summary)?;
    if summary.failed_segments > 0 {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Builds a coordinator request from command flags.
fn coordinator_input(command: &CoordinateCommand) -> CoordinatorInput {
    let dry_run = if command.apply {
        Some(false)
    } else if command.dry_run {
        Some(true)
    } else {
        None
    };
    CoordinatorInput {
        resource: command.resource.clone().unwrap_or_default(),
        segments: command.segments,
        dry_run,
        page_limit: command.page_limit,
    }
}

// ============================================================================
// SECTION: Worker Command
// ============================================================================

/// Executes the `worker` command.
async fn command_worker(command: &WorkerCommand) -> CliResult<ExitCode> {
    let request = read_json_file(&command.input)?;
    let input: WorkerInput = serde_json::from_value(request)
        .map_err(|err| CliError::new(format!("INVALID_INPUT: {err}")))?;
    let runtime = load_runtime(&command.source, Role::Worker)?;
    let worker = build_worker(&runtime).await?;
    let output = worker
        .run(&input)
        .await
        .map_err(|err| CliError::new(format!("{}: {err}", err.code())))?;
    write_json(&output)?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Offline Commands
// ============================================================================

/// Executes the `fingerprint` command.
fn command_fingerprint(command: &FingerprintCommand) -> CliResult<ExitCode> {
    let config = match (&command.schema, &command.blob) {
        (Some(path), _) => load_schema_file(path)?,
        (None, Some(blob)) => decode_shadow_config(blob).map_err(config_error)?,
        (None, None) => {
            return Err(CliError::new("either --schema or --blob is required".to_string()));
        }
    };
    let fingerprint = fingerprint_config(&config)?;
    write_json(&json!({
        "version": fingerprint.version,
        "hash": fingerprint.hash_hex(),
    }))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `validate-config` command.
fn command_validate_config(command: &ConfigSourceArgs) -> CliResult<ExitCode> {
    let config = if command.from_env {
        let worker = WorkerSettings::from_env().map_err(config_error)?;
        let coordinator = CoordinatorSettings::from_env().map_err(config_error)?;
        ensure_allowed_resources_exist(&worker.shadow_config, &coordinator)?;
        worker.shadow_config
    } else {
        let file =
            MaintenanceFileConfig::load(command.config.as_deref()).map_err(config_error)?;
        let config = file.load_schema().map_err(config_error)?;
        ensure_allowed_resources_exist(&config, &file.coordinator_settings())?;
        config
    };
    let fingerprint = fingerprint_config(&config)?;
    write_stdout_line(&format!(
        "config ok: {} resource(s), schema {} ({})",
        config.resources.len(),
        fingerprint.version,
        fingerprint.hash_hex()
    ))
    .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Rejects allow-listed resources that the shadow config does not define.
fn ensure_allowed_resources_exist(
    config: &ShadowConfig,
    coordinator: &CoordinatorSettings,
) -> CliResult<()> {
    let missing: Vec<&str> = coordinator
        .allowed_resources
        .iter()
        .filter(|resource| config.resource(resource).is_none())
        .map(ResourceName::as_str)
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    Err(CliError::new(format!(
        "CONFIG_ERROR: allow-listed resources missing from the shadow config: {}",
        missing.join(", ")
    )))
}

/// Executes the `generate-config` command.
fn command_generate_config(command: &GenerateConfigCommand) -> CliResult<ExitCode> {
    let registry = SchemaRegistry::load(&command.registry).map_err(config_error)?;
    let generated_from = command
        .generated_from
        .clone()
        .unwrap_or_else(|| command.registry.display().to_string());
    let config = registry.generate(&generated_from).map_err(config_error)?;

    let rendered = if command.base64 {
        encode_shadow_config(&config).map_err(config_error)?
    } else {
        serde_json::to_string_pretty(&config)
            .map_err(|err| CliError::new(format!("failed to render config: {err}")))?
    };
    match &command.output {
        Some(path) => {
            let mut content = rendered;
            content.push('\n');
            fs::write(path, content).map_err(|err| {
                CliError::new(format!("failed to write {}: {err}", path.display()))
            })?;
        }
        None => write_stdout_line(&rendered)
            .map_err(|err| CliError::new(output_error("stdout", &err)))?,
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads and validates a shadow config JSON file.
fn load_schema_file(path: &Path) -> CliResult<ShadowConfig> {
    let bytes =
        read_bytes_with_limit(path, MAX_SCHEMA_BYTES).map_err(|err| read_error(path, err))?;
    ShadowConfig::from_json_bytes(&bytes)
        .map_err(|err| config_error(ConfigError::from(err)))
}

/// Computes a config fingerprint.
fn fingerprint_config(config: &ShadowConfig) -> CliResult<ConfigFingerprint> {
    ConfigFingerprint::compute(config)
        .map_err(|err| CliError::new(format!("failed to fingerprint config: {err}")))
}

/// Reads a bounded JSON document.
fn read_json_file(path: &Path) -> CliResult<Value> {
    let bytes =
        read_bytes_with_limit(path, MAX_REQUEST_BYTES).map_err(|err| read_error(path, err))?;
    serde_json::from_slice(&bytes)
        .map_err(|err| CliError::new(format!("INVALID_INPUT: {}: {err}", path.display())))
}

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let metadata = file.metadata().map_err(ReadLimitError::Io)?;
    let size = metadata.len();
    let limit = u64::try_from(max_bytes).map_err(|_| ReadLimitError::TooLarge {
        size,
        limit: max_bytes,
    })?;
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }

    let mut limited = file.take(limit.saturating_add(1));
    let mut bytes = Vec::new();
    limited.read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

/// Formats a bounded read failure.
fn read_error(path: &Path, error: ReadLimitError) -> CliError {
    match error {
        ReadLimitError::Io(err) => {
            CliError::new(format!("failed to read {}: {err}", path.display()))
        }
        ReadLimitError::TooLarge {
            size,
            limit,
        } => CliError::new(format!(
            "{} is too large ({size} bytes, limit {limit})",
            path.display()
        )),
    }
}

/// Formats a configuration failure with its stable code.
fn config_error(error: ConfigError) -> CliError {
    CliError::new(format!("{}: {error}", error.code()))
}

/// Writes a value to stdout as canonical JSON.
fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let mut bytes = serde_jcs::to_vec(value)
        .map_err(|err| CliError::new(format!("failed to render output: {err}")))?;
    bytes.push(b'\n');
    let mut stdout = std::io::stdout();
    stdout.write_all(&bytes).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output stream failure.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
