// crates/shadowkeep-core/src/runtime/worker.rs
// ============================================================================
// Module: Segment Worker
// Description: Paginated drift detection and repair over one scan segment.
// Purpose: Keep every primary record in a segment consistent with its shadows.
// Dependencies: crate::{core, events, interfaces, runtime}, serde, thiserror
// ============================================================================

//! ## Overview
//! A worker validates its input, then pages through its segment of the
//! resource's primary records. Each record is classified by the drift
//! detector; drifted records are repaired unless the run is a dry run.
//! Per-record failures are counted and reported but never abort the segment;
//! items the store could not decode count as scanned validation failures.
//! Only storage scan failures and invalid input are fatal.
//!
//! The scan stops when the segment is exhausted or after `pageLimit` pages
//! while more remain (`limit_reached`). Empty pages that still carry a
//! continuation token do not stop the scan.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::fingerprint::ConfigFingerprint;
use crate::core::identifiers::RecordId;
use crate::core::identifiers::ResourceName;
use crate::core::identifiers::RunId;
use crate::core::identifiers::Segment;
use crate::core::record::PRIMARY_KEY_PREFIX;
use crate::core::record::PrimaryRecord;
use crate::core::schema::ResourceSchema;
use crate::core::schema::ShadowConfig;
use crate::events::MaintenanceEventSink;
use crate::events::RecordEvent;
use crate::events::WorkerEvent;
use crate::interfaces::RejectedItem;
use crate::interfaces::ScanRequest;
use crate::interfaces::ShadowStore;
use crate::interfaces::StoreError;
use crate::runtime::drift::detect_drift;
use crate::runtime::repair::RepairError;
use crate::runtime::repair::RepairErrorCode;
use crate::runtime::repair::RepairExecutor;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default number of items examined per scan page.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Input for one segment worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WorkerInput {
    /// Resource to scan.
    pub resource: ResourceName,
    /// Zero-based segment index.
    pub segment: u32,
    /// Total segments in the run.
    pub total_segments: u32,
    /// Suppresses repairs when true.
    pub dry_run: bool,
    /// Maximum pages to process.
    pub page_limit: u32,
    /// Shared run identifier.
    pub run_id: RunId,
}

/// Per-segment record counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentCounters {
    /// Primary records examined.
    pub scanned: u64,
    /// Records classified as drifted.
    pub drifted: u64,
    /// Drifted records successfully repaired.
    pub repaired: u64,
    /// Records that could not be checked or repaired.
    pub failed: u64,
    /// Records already consistent.
    pub noop: u64,
}

impl SegmentCounters {
    /// Adds another segment's counters to these.
    pub const fn absorb(&mut self, other: &Self) {
        self.scanned += other.scanned;
        self.drifted += other.drifted;
        self.repaired += other.repaired;
        self.failed += other.failed;
        self.noop += other.noop;
    }
}

/// One per-record failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFailure {
    /// Record identifier.
    pub id: RecordId,
    /// Failure class.
    pub code: RepairErrorCode,
    /// Failure detail.
    pub message: String,
}

/// Terminal state of a segment scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    /// The segment was fully scanned.
    Done,
    /// The page limit stopped the scan with pages remaining.
    LimitReached,
}

impl WorkerStatus {
    /// Returns the stable label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::LimitReached => "limit_reached",
        }
    }
}

/// Result of one segment worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerOutput {
    /// Segment index.
    pub segment: u32,
    /// Record counters.
    #[serde(flatten)]
    pub counters: SegmentCounters,
    /// Per-record failures.
    pub errors: Vec<RecordFailure>,
    /// Terminal scan state.
    pub status: WorkerStatus,
    /// Pages processed.
    pub pages: u32,
}

/// Fatal worker errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerError {
    /// Input or loaded configuration is unusable.
    #[error("worker configuration error: {0}")]
    Config(String),
    /// Scanning the segment failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WorkerError {
    /// Returns the stable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Store(_) => "STORE_ERROR",
        }
    }
}

// ============================================================================
// SECTION: Worker
// ============================================================================

/// Outcome of processing one record.
enum RecordOutcome {
    /// Record already consistent.
    Noop,
    /// Record drifted; repair skipped or succeeded.
    Drifted {
        /// True when a repair was applied.
        repaired: bool,
    },
    /// Record drifted and repair failed.
    RepairFailed(RecordFailure),
    /// Record could not be classified.
    Invalid(RecordFailure),
}

/// Segment worker bound to a store, a loaded config, and an event sink.
#[derive(Clone)]
pub struct SegmentWorker {
    /// Storage driver.
    store: Arc<dyn ShadowStore>,
    /// Loaded shadow configuration.
    config: Arc<ShadowConfig>,
    /// Fingerprint of `config`.
    fingerprint: ConfigFingerprint,
    /// Repair executor sharing `store`.
    repair: RepairExecutor,
    /// Event sink.
    events: Arc<dyn MaintenanceEventSink>,
    /// Items examined per scan page.
    page_size: u32,
}

impl SegmentWorker {
    /// Creates a worker and computes the config fingerprint once.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Config`] when the config cannot be fingerprinted.
    pub fn new(
        store: Arc<dyn ShadowStore>,
        config: Arc<ShadowConfig>,
        events: Arc<dyn MaintenanceEventSink>,
    ) -> Result<Self, WorkerError> {
        let fingerprint =
            ConfigFingerprint::compute(&config).map_err(|err| WorkerError::Config(err.to_string()))?;
        Ok(Self {
            repair: RepairExecutor::new(Arc::clone(&store)),
            store,
            config,
            fingerprint,
            events,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Overrides the scan page size.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Returns the fingerprint used for drift detection.
    #[must_use]
    pub const fn fingerprint(&self) -> &ConfigFingerprint {
        &self.fingerprint
    }

    /// Scans one segment, detecting and repairing drift.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError`] for invalid input or a failed scan.
    pub async fn run(&self, input: &WorkerInput) -> Result<WorkerOutput, WorkerError> {
        let segment = Segment::new(input.segment, input.total_segments)
            .map_err(|err| WorkerError::Config(err.to_string()))?;
        if input.page_limit == 0 {
            return Err(WorkerError::Config("pageLimit must be greater than zero".to_string()));
        }
        if self.page_size == 0 {
            return Err(WorkerError::Config("page size must be greater than zero".to_string()));
        }
        let schema = self
            .config
            .require_resource(&input.resource)
            .map_err(|err| WorkerError::Config(err.to_string()))?;

        self.events.record_worker(&WorkerEvent::started(input));

        let mut counters = SegmentCounters::default();
        let mut errors = Vec::new();
        let mut pages = 0_u32;
        let mut request = ScanRequest {
            resource: input.resource.clone(),
            segment,
            key_prefix: PRIMARY_KEY_PREFIX.to_string(),
            page_size: self.page_size,
            start_key: None,
        };

        let status = loop {
            let page = self.store.scan_segment(&request).await?;
            pages += 1;
            for rejected in &page.rejected {
                counters.scanned += 1;
                counters.failed += 1;
                let failure = rejected_failure(rejected);
                self.events.record_record(&RecordEvent::repair_failed(input, &failure));
                errors.push(failure);
            }
            for record in &page.items {
                counters.scanned += 1;
                match self.process_record(input, schema, record).await {
                    RecordOutcome::Noop => counters.noop += 1,
                    RecordOutcome::Drifted {
                        repaired,
                    } => {
                        counters.drifted += 1;
                        if repaired {
                            counters.repaired += 1;
                        }
                    }
                    RecordOutcome::RepairFailed(failure) => {
                        counters.drifted += 1;
                        counters.failed += 1;
                        self.events.record_record(&RecordEvent::repair_failed(input, &failure));
                        errors.push(failure);
                    }
                    RecordOutcome::Invalid(failure) => {
                        counters.failed += 1;
                        self.events.record_record(&RecordEvent::repair_failed(input, &failure));
                        errors.push(failure);
                    }
                }
            }
            match page.next {
                None => break WorkerStatus::Done,
                Some(_) if pages >= input.page_limit => {
                    self.events.record_worker(&WorkerEvent::page_limit_reached(input, pages));
                    break WorkerStatus::LimitReached;
                }
                Some(next) => request.start_key = Some(next),
            }
        };

        let output = WorkerOutput {
            segment: input.segment,
            counters,
            errors,
            status,
            pages,
        };
        self.events.record_worker(&WorkerEvent::completed(input, &output));
        Ok(output)
    }

    /// Classifies one record and repairs it when required.
    async fn process_record(
        &self,
        input: &WorkerInput,
        schema: &ResourceSchema,
        record: &PrimaryRecord,
    ) -> RecordOutcome {
        let report = match detect_drift(record, schema, &self.fingerprint) {
            Ok(report) => report,
            Err(err) => {
                return RecordOutcome::Invalid(RecordFailure {
                    id: record.id.clone(),
                    code: RepairErrorCode::ValidationError,
                    message: err.to_string(),
                });
            }
        };
        let Some(reason) = report.reason else {
            return RecordOutcome::Noop;
        };
        self.events.record_record(&RecordEvent::drift_detected(input, &record.id, reason));
        if input.dry_run {
            return RecordOutcome::Drifted {
                repaired: false,
            };
        }
        match self.repair.repair(record, schema, &self.fingerprint, &report).await {
            Ok(_) => RecordOutcome::Drifted {
                repaired: true,
            },
            Err(err) => RecordOutcome::RepairFailed(failure_for(record, &err)),
        }
    }
}

/// Builds the reported failure for an item the store could not decode.
fn rejected_failure(rejected: &RejectedItem) -> RecordFailure {
    let sk = rejected.key.sk.as_str();
    RecordFailure {
        id: RecordId::new(sk.strip_prefix(PRIMARY_KEY_PREFIX).unwrap_or(sk)),
        code: RepairErrorCode::ValidationError,
        message: rejected.message.clone(),
    }
}

/// Builds the reported failure for a repair error.
fn failure_for(record: &PrimaryRecord, err: &RepairError) -> RecordFailure {
    RecordFailure {
        id: record.id.clone(),
        code: err.code(),
        message: err.to_string(),
    }
}
