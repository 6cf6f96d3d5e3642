// crates/shadowkeep-core/src/lib.rs
// ============================================================================
// Module: Shadowkeep Core Library
// Description: Public API surface for the shadow-index consistency engine.
// Purpose: Expose core types, interfaces, runtime components, and event sinks.
// Dependencies: crate::{core, events, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Shadowkeep keeps denormalized shadow index records consistent with their
//! primary records in a single-table key/value store. The core derives the
//! expected shadow set from a versioned schema, detects drift per record, and
//! repairs drift with one atomic multi-item write per record. Storage and
//! dispatch are reached only through the traits in [`interfaces`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod events;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use events::CoordinatorEvent;
pub use events::FileEventSink;
pub use events::MaintenanceEventSink;
pub use events::MemoryEventSink;
pub use events::NoopEventSink;
pub use events::RecordEvent;
pub use events::StderrEventSink;
pub use events::WorkerEvent;
pub use interfaces::DispatchError;
pub use interfaces::DispatchReceipt;
pub use interfaces::MAX_TRANSACT_ITEMS;
pub use interfaces::MetadataCondition;
pub use interfaces::RejectedItem;
pub use interfaces::RunPlan;
pub use interfaces::ScanPage;
pub use interfaces::ScanRequest;
pub use interfaces::SegmentDispatcher;
pub use interfaces::SegmentTask;
pub use interfaces::ShadowStore;
pub use interfaces::StoreError;
pub use interfaces::TransactError;
pub use interfaces::TransactItem;
pub use runtime::CoordinatorError;
pub use runtime::CoordinatorInput;
pub use runtime::CoordinatorOutput;
pub use runtime::CoordinatorPolicy;
pub use runtime::DriftError;
pub use runtime::DriftReason;
pub use runtime::DriftReport;
pub use runtime::GenerateError;
pub use runtime::InMemoryShadowStore;
pub use runtime::RecordFailure;
pub use runtime::RepairError;
pub use runtime::RepairErrorCode;
pub use runtime::RepairExecutor;
pub use runtime::RepairOutcome;
pub use runtime::RepairPlan;
pub use runtime::RunDefaults;
pub use runtime::RunHandle;
pub use runtime::RunSummary;
pub use runtime::SegmentReport;
pub use runtime::ScanCoordinator;
pub use runtime::SegmentCounters;
pub use runtime::SegmentWorker;
pub use runtime::TokioSegmentDispatcher;
pub use runtime::WorkerError;
pub use runtime::WorkerInput;
pub use runtime::WorkerOutput;
pub use runtime::WorkerStatus;
pub use runtime::DEFAULT_PAGE_SIZE;
pub use runtime::DEFAULT_RETAINED_RUNS;
pub use runtime::detect_drift;
pub use runtime::execution_name;
pub use runtime::generate_shadow_records;
pub use runtime::plan_repair;
pub use runtime::shadow_sort_key;
