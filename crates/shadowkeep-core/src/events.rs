// crates/shadowkeep-core/src/events.rs
// ============================================================================
// Module: Maintenance Events
// Description: Structured JSON events emitted by workers and the coordinator.
// Purpose: Emit maintenance logs without a hard dependency on a logging stack.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Events are flat serde structs with an `event` label and a millisecond
//! timestamp. Sinks render them as one JSON object per line. Deployments pick
//! a sink (stderr, append-only file, or none); tests use [`MemoryEventSink`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::RecordId;
use crate::interfaces::RunPlan;
use crate::runtime::drift::DriftReason;
use crate::runtime::worker::RecordFailure;
use crate::runtime::worker::SegmentCounters;
use crate::runtime::worker::WorkerInput;
use crate::runtime::worker::WorkerOutput;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Segment lifecycle event.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Run identifier.
    pub run_id: String,
    /// Resource being scanned.
    pub resource: String,
    /// Segment index.
    pub segment: u32,
    /// Total segments.
    pub total_segments: u32,
    /// Whether repairs are suppressed.
    pub dry_run: bool,
    /// Pages processed so far.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,
    /// Final counters for completion events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counters: Option<SegmentCounters>,
    /// Terminal status label for completion events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<&'static str>,
}

impl WorkerEvent {
    /// Builds a `worker_started` event.
    #[must_use]
    pub fn started(input: &WorkerInput) -> Self {
        Self::base("worker_started", input)
    }

    /// Builds a `worker_completed` event.
    #[must_use]
    pub fn completed(input: &WorkerInput, output: &WorkerOutput) -> Self {
        let mut event = Self::base("worker_completed", input);
        event.pages = Some(output.pages);
        event.counters = Some(output.counters);
        event.status = Some(output.status.as_str());
        event
    }

    /// Builds a `page_limit_reached` event.
    #[must_use]
    pub fn page_limit_reached(input: &WorkerInput, pages: u32) -> Self {
        let mut event = Self::base("page_limit_reached", input);
        event.pages = Some(pages);
        event
    }

    /// Builds the shared event fields.
    fn base(event: &'static str, input: &WorkerInput) -> Self {
        Self {
            event,
            timestamp_ms: now_ms(),
            run_id: input.run_id.to_string(),
            resource: input.resource.to_string(),
            segment: input.segment,
            total_segments: input.total_segments,
            dry_run: input.dry_run,
            pages: None,
            counters: None,
            status: None,
        }
    }
}

/// Per-record drift or repair event.
#[derive(Debug, Clone, Serialize)]
pub struct RecordEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Run identifier.
    pub run_id: String,
    /// Resource of the record.
    pub resource: String,
    /// Segment index.
    pub segment: u32,
    /// Record identifier.
    pub record_id: String,
    /// Drift reason label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    /// Failure code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    /// Failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Whether repairs are suppressed.
    pub dry_run: bool,
}

impl RecordEvent {
    /// Builds a `drift_detected` event.
    #[must_use]
    pub fn drift_detected(input: &WorkerInput, id: &RecordId, reason: DriftReason) -> Self {
        let mut event = Self::base("drift_detected", input, id);
        event.reason = Some(reason.as_str());
        event
    }

    /// Builds a `repair_failed` event.
    #[must_use]
    pub fn repair_failed(input: &WorkerInput, failure: &RecordFailure) -> Self {
        let mut event = Self::base("repair_failed", input, &failure.id);
        event.code = Some(failure.code.as_str());
        event.message = Some(failure.message.clone());
        event
    }

    /// Builds the shared event fields.
    fn base(event: &'static str, input: &WorkerInput, id: &RecordId) -> Self {
        Self {
            event,
            timestamp_ms: now_ms(),
            run_id: input.run_id.to_string(),
            resource: input.resource.to_string(),
            segment: input.segment,
            record_id: id.to_string(),
            reason: None,
            code: None,
            message: None,
            dry_run: input.dry_run,
        }
    }
}

/// Coordinator acceptance or rejection event.
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Run identifier when a run was planned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    /// Requested resource when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Execution name when dispatched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_name: Option<String>,
    /// Segment count when dispatched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments: Option<u32>,
    /// Dry-run flag when dispatched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
    /// Page limit when dispatched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_limit: Option<u32>,
    /// Rejection code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    /// Rejection message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CoordinatorEvent {
    /// Builds a `coordinator_started` event for a dispatched plan.
    #[must_use]
    pub fn started(plan: &RunPlan) -> Self {
        Self {
            event: "coordinator_started",
            timestamp_ms: now_ms(),
            run_id: Some(plan.run_id.to_string()),
            resource: Some(plan.resource.to_string()),
            execution_name: Some(plan.execution_name.clone()),
            segments: Some(plan.total_segments),
            dry_run: Some(plan.dry_run),
            page_limit: Some(plan.page_limit),
            error_code: None,
            message: None,
        }
    }

    /// Builds a `coordinator_rejected` event.
    #[must_use]
    pub fn rejected(resource: Option<&str>, error_code: &'static str, message: String) -> Self {
        Self {
            event: "coordinator_rejected",
            timestamp_ms: now_ms(),
            run_id: None,
            resource: resource.map(str::to_string),
            execution_name: None,
            segments: None,
            dry_run: None,
            page_limit: None,
            error_code: Some(error_code),
            message: Some(message),
        }
    }
}

/// Returns the current time in milliseconds since the epoch.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Sink for maintenance events.
pub trait MaintenanceEventSink: Send + Sync {
    /// Records a segment lifecycle event.
    fn record_worker(&self, event: &WorkerEvent);

    /// Records a per-record event.
    fn record_record(&self, _event: &RecordEvent) {}

    /// Records a coordinator event.
    fn record_coordinator(&self, _event: &CoordinatorEvent) {}
}

/// Event sink that logs JSON lines to stderr.
pub struct StderrEventSink;

impl MaintenanceEventSink for StderrEventSink {
    fn record_worker(&self, event: &WorkerEvent) {
        write_stderr(event);
    }

    fn record_record(&self, event: &RecordEvent) {
        write_stderr(event);
    }

    fn record_coordinator(&self, event: &CoordinatorEvent) {
        write_stderr(event);
    }
}

/// Writes one serialized event to stderr.
fn write_stderr<T: Serialize>(event: &T) {
    if let Ok(payload) = serde_json::to_string(event) {
        let _ = writeln!(std::io::stderr(), "{payload}");
    }
}

/// Event sink that appends JSON lines to a file.
pub struct FileEventSink {
    /// File handle guarded for concurrent writes.
    file: Mutex<std::fs::File>,
}

impl FileEventSink {
    /// Opens a file-backed event sink.
    ///
    /// # Errors
    ///
    /// Returns [`io::Error`] when the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one serialized event.
    fn write<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl MaintenanceEventSink for FileEventSink {
    fn record_worker(&self, event: &WorkerEvent) {
        self.write(event);
    }

    fn record_record(&self, event: &RecordEvent) {
        self.write(event);
    }

    fn record_coordinator(&self, event: &CoordinatorEvent) {
        self.write(event);
    }
}

/// No-op event sink.
pub struct NoopEventSink;

impl MaintenanceEventSink for NoopEventSink {
    fn record_worker(&self, _event: &WorkerEvent) {}
}

/// Event sink that keeps events in memory.
#[derive(Default)]
pub struct MemoryEventSink {
    /// Serialized events in emission order.
    events: Mutex<Vec<Value>>,
}

impl MemoryEventSink {
    /// Creates an empty in-memory sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<Value> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Returns the `event` labels of recorded events in order.
    #[must_use]
    pub fn event_names(&self) -> Vec<String> {
        self.events()
            .iter()
            .filter_map(|event| event.get("event").and_then(Value::as_str).map(str::to_string))
            .collect()
    }

    /// Stores one serialized event.
    fn push<T: Serialize>(&self, event: &T) {
        if let Ok(value) = serde_json::to_value(event)
            && let Ok(mut events) = self.events.lock()
        {
            events.push(value);
        }
    }
}

impl MaintenanceEventSink for MemoryEventSink {
    fn record_worker(&self, event: &WorkerEvent) {
        self.push(event);
    }

    fn record_record(&self, event: &RecordEvent) {
        self.push(event);
    }

    fn record_coordinator(&self, event: &CoordinatorEvent) {
        self.push(event);
    }
}
