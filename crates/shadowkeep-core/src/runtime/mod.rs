// crates/shadowkeep-core/src/runtime/mod.rs
// ============================================================================
// Module: Shadowkeep Runtime
// Description: Generation, drift detection, repair, and the scan protocol.
// Purpose: Execute shadow maintenance against storage and dispatch interfaces.
// Dependencies: crate::{core, events, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules implement the maintenance pipeline. The generator and drift
//! detector are pure; the repair executor and segment worker reach storage only
//! through [`crate::interfaces::ShadowStore`]; the coordinator reaches workers
//! only through [`crate::interfaces::SegmentDispatcher`].

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod coordinator;
pub mod dispatch;
pub mod drift;
pub mod generator;
pub mod repair;
pub mod store;
pub mod worker;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use coordinator::CoordinatorError;
pub use coordinator::CoordinatorInput;
pub use coordinator::CoordinatorOutput;
pub use coordinator::CoordinatorPolicy;
pub use coordinator::RunDefaults;
pub use coordinator::ScanCoordinator;
pub use coordinator::execution_name;
pub use dispatch::DEFAULT_RETAINED_RUNS;
pub use dispatch::RunHandle;
pub use dispatch::RunSummary;
pub use dispatch::SegmentReport;
pub use dispatch::TokioSegmentDispatcher;
pub use drift::DriftError;
pub use drift::DriftReason;
pub use drift::DriftReport;
pub use drift::detect_drift;
pub use generator::GenerateError;
pub use generator::generate_shadow_records;
pub use generator::shadow_sort_key;
pub use repair::RepairError;
pub use repair::RepairErrorCode;
pub use repair::RepairExecutor;
pub use repair::RepairOutcome;
pub use repair::RepairPlan;
pub use repair::plan_repair;
pub use store::InMemoryShadowStore;
pub use worker::DEFAULT_PAGE_SIZE;
pub use worker::RecordFailure;
pub use worker::SegmentCounters;
pub use worker::SegmentWorker;
pub use worker::WorkerError;
pub use worker::WorkerInput;
pub use worker::WorkerOutput;
pub use worker::WorkerStatus;
