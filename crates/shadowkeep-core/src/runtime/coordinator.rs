// crates/shadowkeep-core/src/runtime/coordinator.rs
// ============================================================================
// Module: Scan Coordinator
// Description: Validates a maintenance request and dispatches segment workers.
// Purpose: Start a run as one worker per disjoint scan segment.
// Dependencies: crate::{core, events, interfaces, runtime::worker}, rand, serde, time
// ============================================================================

//! ## Overview
//! The coordinator checks the request against an allow-list, applies defaults
//! (8 segments, dry run, 100 pages), and hands a [`RunPlan`] to a
//! [`SegmentDispatcher`]. Each segment task is named
//! `<resource>-<epochMillis>-<rand6>-seg<k>` and carries the shared run id.
//! Aggregating segment outputs is left to the dispatcher.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;

use rand::Rng;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::identifiers::MAX_TOTAL_SEGMENTS;
use crate::core::identifiers::ResourceName;
use crate::core::identifiers::RunId;
use crate::events::CoordinatorEvent;
use crate::events::MaintenanceEventSink;
use crate::interfaces::RunPlan;
use crate::interfaces::SegmentDispatcher;
use crate::interfaces::SegmentTask;
use crate::runtime::worker::WorkerInput;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Alphabet of the random execution-name suffix.
const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
/// Length of the random execution-name suffix.
const SUFFIX_LEN: usize = 6;
/// Random bytes in a run identifier.
const RUN_ID_BYTES: usize = 16;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Coordinator failures.
///
/// # Invariants
/// - Variants map one-to-one onto stable codes via [`CoordinatorError::code`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    /// Request is malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Resource is not on the allow-list.
    #[error("resource not allowed: {0}")]
    ResourceNotAllowed(String),
    /// Coordinator configuration is unusable.
    #[error("coordinator configuration error: {0}")]
    Config(String),
    /// Dispatching the run failed.
    #[error("dispatch error: {0}")]
    Dispatch(String),
}

impl CoordinatorError {
    /// Returns the stable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::ResourceNotAllowed(_) => "RESOURCE_NOT_ALLOWED",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Dispatch(_) => "SFN_ERROR",
        }
    }
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// Defaults applied to omitted request fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RunDefaults {
    /// Default segment count.
    pub segments: u32,
    /// Default dry-run flag.
    pub dry_run: bool,
    /// Default page limit per worker.
    pub page_limit: u32,
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            segments: 8,
            dry_run: true,
            page_limit: 100,
        }
    }
}

impl RunDefaults {
    /// Validates the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Config`] when a default is out of range.
    pub fn validate(&self) -> Result<(), CoordinatorError> {
        if self.segments == 0 || self.segments > MAX_TOTAL_SEGMENTS {
            return Err(CoordinatorError::Config(format!(
                "default segments must be between 1 and {MAX_TOTAL_SEGMENTS}"
            )));
        }
        if self.page_limit == 0 {
            return Err(CoordinatorError::Config(
                "default page limit must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Allow-list and defaults governing which runs may start.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CoordinatorPolicy {
    /// Resources that may be maintained.
    pub allowed_resources: BTreeSet<ResourceName>,
    /// Defaults for omitted request fields.
    pub defaults: RunDefaults,
}

impl CoordinatorPolicy {
    /// Creates a policy.
    #[must_use]
    pub const fn new(allowed_resources: BTreeSet<ResourceName>, defaults: RunDefaults) -> Self {
        Self {
            allowed_resources,
            defaults,
        }
    }

    /// Returns true when the resource is on the allow-list.
    #[must_use]
    pub fn allows(&self, resource: &ResourceName) -> bool {
        self.allowed_resources.contains(resource)
    }
}

/// Request to start a maintenance run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorInput {
    /// Resource to maintain.
    #[serde(default)]
    pub resource: String,
    /// Segment count; defaults apply when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segments: Option<u32>,
    /// Dry-run flag; defaults apply when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
    /// Page limit per worker; defaults apply when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_limit: Option<u32>,
}

/// Accepted run reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorOutput {
    /// Opaque execution identifier from the dispatcher.
    pub execution_id: String,
    /// RFC 3339 start time.
    pub started_at: String,
}

/// Request after validation and default resolution.
struct ResolvedRun {
    /// Allowed resource.
    resource: ResourceName,
    /// Segment count.
    segments: u32,
    /// Dry-run flag.
    dry_run: bool,
    /// Page limit per worker.
    page_limit: u32,
}

// ============================================================================
// SECTION: Coordinator
// ============================================================================

/// Starts maintenance runs through a dispatcher.
pub struct ScanCoordinator {
    /// Allow-list and defaults.
    policy: CoordinatorPolicy,
    /// Run launcher.
    dispatcher: Arc<dyn SegmentDispatcher>,
    /// Event sink.
    events: Arc<dyn MaintenanceEventSink>,
    /// Wall clock used for execution names and start times.
    clock: fn() -> OffsetDateTime,
}

impl ScanCoordinator {
    /// Creates a coordinator using the system clock.
    #[must_use]
    pub fn new(
        policy: CoordinatorPolicy,
        dispatcher: Arc<dyn SegmentDispatcher>,
        events: Arc<dyn MaintenanceEventSink>,
    ) -> Self {
        Self {
            policy,
            dispatcher,
            events,
            clock: OffsetDateTime::now_utc,
        }
    }

    /// Replaces the wall clock.
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> OffsetDateTime) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the active policy.
    #[must_use]
    pub const fn policy(&self) -> &CoordinatorPolicy {
        &self.policy
    }

    /// Starts a run from a raw JSON request.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::InvalidInput`] when a field has the wrong
    /// type, or any error from [`ScanCoordinator::start`].
    pub async fn start_json(&self, request: &Value) -> Result<CoordinatorOutput, CoordinatorError> {
        let input = match CoordinatorInput::deserialize(request) {
            Ok(input) => input,
            Err(err) => {
                let err = CoordinatorError::InvalidInput(err.to_string());
                let resource = request.get("resource").and_then(Value::as_str);
                self.reject(resource, &err);
                return Err(err);
            }
        };
        self.start(&input).await
    }

    /// Validates a request, plans its segments, and dispatches them.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError`] when validation or dispatch fails.
    pub async fn start(
        &self,
        input: &CoordinatorInput,
    ) -> Result<CoordinatorOutput, CoordinatorError> {
        match self.try_start(input).await {
            Ok(output) => Ok(output),
            Err(err) => {
                self.reject(Some(input.resource.as_str()), &err);
                Err(err)
            }
        }
    }

    /// Runs validation, planning, and dispatch.
    async fn try_start(
        &self,
        input: &CoordinatorInput,
    ) -> Result<CoordinatorOutput, CoordinatorError> {
        let resolved = self.resolve(input)?;
        let now = (self.clock)();
        let plan = build_plan(&resolved, now);
        let event = CoordinatorEvent::started(&plan);
        let receipt = self
            .dispatcher
            .dispatch(plan)
            .await
            .map_err(|err| CoordinatorError::Dispatch(err.to_string()))?;
        self.events.record_coordinator(&event);
        let started_at =
            now.format(&Rfc3339).map_err(|err| CoordinatorError::Config(err.to_string()))?;
        Ok(CoordinatorOutput {
            execution_id: receipt.execution_id,
            started_at,
        })
    }

    /// Validates the request and applies defaults.
    fn resolve(&self, input: &CoordinatorInput) -> Result<ResolvedRun, CoordinatorError> {
        if self.policy.allowed_resources.is_empty() {
            return Err(CoordinatorError::Config("resource allow-list is empty".to_string()));
        }
        self.policy.defaults.validate()?;
        if input.resource.trim().is_empty() {
            return Err(CoordinatorError::InvalidInput(
                "resource is required and must be a non-empty string".to_string(),
            ));
        }
        let resource = ResourceName::new(input.resource.as_str());
        if !self.policy.allows(&resource) {
            let allowed: Vec<&str> =
                self.policy.allowed_resources.iter().map(ResourceName::as_str).collect();
            return Err(CoordinatorError::ResourceNotAllowed(format!(
                "{resource}; allowed resources: {}",
                allowed.join(", ")
            )));
        }
        let segments = input.segments.unwrap_or(self.policy.defaults.segments);
        if segments == 0 || segments > MAX_TOTAL_SEGMENTS {
            return Err(CoordinatorError::InvalidInput(format!(
                "segments must be an integer between 1 and {MAX_TOTAL_SEGMENTS}"
            )));
        }
        let page_limit = input.page_limit.unwrap_or(self.policy.defaults.page_limit);
        if page_limit == 0 {
            return Err(CoordinatorError::InvalidInput(
                "pageLimit must be a positive integer".to_string(),
            ));
        }
        Ok(ResolvedRun {
            resource,
            segments,
            dry_run: input.dry_run.unwrap_or(self.policy.defaults.dry_run),
            page_limit,
        })
    }

    /// Emits a rejection event.
    fn reject(&self, resource: Option<&str>, err: &CoordinatorError) {
        self.events
            .record_coordinator(&CoordinatorEvent::rejected(resource, err.code(), err.to_string()));
    }
}

// ============================================================================
// SECTION: Planning
// ============================================================================

/// Builds the run plan for a resolved request.
fn build_plan(run: &ResolvedRun, now: OffsetDateTime) -> RunPlan {
    let run_id = new_run_id();
    let execution_name = execution_name(&run.resource, now);
    let tasks = (0..run.segments)
        .map(|segment| SegmentTask {
            name: format!("{execution_name}-seg{segment}"),
            input: WorkerInput {
                resource: run.resource.clone(),
                segment,
                total_segments: run.segments,
                dry_run: run.dry_run,
                page_limit: run.page_limit,
                run_id: run_id.clone(),
            },
        })
        .collect();
    RunPlan {
        run_id,
        execution_name,
        resource: run.resource.clone(),
        total_segments: run.segments,
        dry_run: run.dry_run,
        page_limit: run.page_limit,
        tasks,
    }
}

/// Formats `<resource>-<epochMillis>-<rand6>`.
#[must_use]
pub fn execution_name(resource: &ResourceName, now: OffsetDateTime) -> String {
    let millis = now.unix_timestamp_nanos() / 1_000_000;
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| char::from(SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())]))
        .collect();
    format!("{resource}-{millis}-{suffix}")
}

/// Generates a random hex run identifier.
fn new_run_id() -> RunId {
    let mut bytes = [0_u8; RUN_ID_BYTES];
    rand::thread_rng().fill(&mut bytes);
    RunId::new(bytes.iter().map(|byte| format!("{byte:02x}")).collect::<String>())
}
