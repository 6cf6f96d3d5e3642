// crates/shadowkeep-core/src/interfaces/mod.rs
// ============================================================================
// Module: Shadowkeep Interfaces
// Description: Backend-agnostic interfaces for storage and segment dispatch.
// Purpose: Define the contract surfaces used by the maintenance runtime.
// Dependencies: async-trait, crate::core, crate::runtime::worker
// ============================================================================

//! ## Overview
//! The runtime reaches storage only through [`ShadowStore`] and launches
//! workers only through [`SegmentDispatcher`]. Implementations must fail closed:
//! a transactional write either applies every item or none of them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::ResourceName;
use crate::core::identifiers::RunId;
use crate::core::identifiers::Segment;
use crate::core::record::ItemKey;
use crate::core::record::PrimaryRecord;
use crate::core::record::ShadowMetadata;
use crate::core::record::StoredItem;
use crate::runtime::worker::WorkerInput;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum number of items accepted by one transactional write.
pub const MAX_TRANSACT_ITEMS: usize = 100;

// ============================================================================
// SECTION: Shadow Store
// ============================================================================

/// Request for one page of a partitioned scan.
///
/// # Invariants
/// - Only items whose partition key equals `resource` and whose sort key
///   starts with `key_prefix` are returned.
/// - `page_size` bounds items examined before filtering, so filtered pages
///   may be empty while `next` is still present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    /// Resource (partition key) to scan.
    pub resource: ResourceName,
    /// Segment of the parallel scan.
    pub segment: Segment,
    /// Required sort key prefix.
    pub key_prefix: String,
    /// Items examined per page.
    pub page_size: u32,
    /// Continuation token from the previous page.
    pub start_key: Option<ItemKey>,
}

/// One page of scan results.
///
/// # Invariants
/// - An item that matches the filter but cannot be decoded is reported in
///   `rejected` instead of failing the page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Primary records matching the filter.
    pub items: Vec<PrimaryRecord>,
    /// Matching items that could not be decoded into primary records.
    pub rejected: Vec<RejectedItem>,
    /// Continuation token; `None` once the segment is exhausted.
    pub next: Option<ItemKey>,
}

/// Scanned item whose attributes could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedItem {
    /// Key of the undecodable item.
    pub key: ItemKey,
    /// Decode failure.
    pub message: String,
}

/// Guard attached to a metadata update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "keys", rename_all = "snake_case")]
pub enum MetadataCondition {
    /// The record must not carry a shadow key list.
    KeysAbsent,
    /// The record's shadow key list must equal these keys.
    KeysEqual(Vec<String>),
}

/// One operation in a transactional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactItem {
    /// Writes a full item.
    Put(StoredItem),
    /// Deletes an item by key.
    Delete(ItemKey),
    /// Sets the shadow metadata attributes on a primary record.
    UpdateMetadata {
        /// Primary record key.
        key: ItemKey,
        /// Metadata to write.
        metadata: ShadowMetadata,
        /// Guard that must hold for the write to apply.
        condition: MetadataCondition,
    },
}

impl TransactItem {
    /// Returns the key the item targets.
    #[must_use]
    pub const fn key(&self) -> &ItemKey {
        match self {
            Self::Put(item) => &item.key,
            Self::Delete(key)
            | Self::UpdateMetadata {
                key, ..
            } => key,
        }
    }
}

/// Storage errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Store I/O or connectivity error.
    #[error("shadow store io error: {0}")]
    Io(String),
    /// Store throttled the request.
    #[error("shadow store throttled: {0}")]
    Throttled(String),
    /// Stored data has an unexpected shape.
    #[error("shadow store corruption: {0}")]
    Corrupt(String),
    /// Request was rejected as invalid.
    #[error("shadow store invalid request: {0}")]
    Invalid(String),
}

/// Transactional write errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactError {
    /// A condition failed or a conflicting write intervened; nothing applied.
    #[error("transaction cancelled: {0}")]
    Cancelled(String),
    /// The transaction exceeds the store's item limit; nothing applied.
    #[error("transaction has {count} items (max {max})")]
    TooManyItems {
        /// Items submitted.
        count: usize,
        /// Store maximum.
        max: usize,
    },
    /// Underlying store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Single-table storage driver used by workers.
#[async_trait]
pub trait ShadowStore: Send + Sync {
    /// Fetches one page of primary records from a scan segment.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the scan fails.
    async fn scan_segment(&self, request: &ScanRequest) -> Result<ScanPage, StoreError>;

    /// Applies every item atomically or none of them.
    ///
    /// # Errors
    ///
    /// Returns [`TransactError`] when the transaction is cancelled or fails.
    async fn transact_write(&self, items: &[TransactItem]) -> Result<(), TransactError>;

    /// Returns the largest transaction the store accepts.
    fn max_transact_items(&self) -> usize {
        MAX_TRANSACT_ITEMS
    }
}

// ============================================================================
// SECTION: Segment Dispatcher
// ============================================================================

/// One worker invocation within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentTask {
    /// Unique task name (`<execution>-seg<k>`).
    pub name: String,
    /// Worker input for the segment.
    pub input: WorkerInput,
}

/// Fully resolved maintenance run handed to a dispatcher.
///
/// # Invariants
/// - `tasks` holds exactly one task per segment index in `0..total_segments`.
/// - Every task shares `run_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPlan {
    /// Shared run identifier.
    pub run_id: RunId,
    /// Execution name (`<resource>-<epochMillis>-<rand6>`).
    pub execution_name: String,
    /// Resource being maintained.
    pub resource: ResourceName,
    /// Total scan segments.
    pub total_segments: u32,
    /// Whether repairs are suppressed.
    pub dry_run: bool,
    /// Page limit per worker.
    pub page_limit: u32,
    /// Per-segment tasks.
    pub tasks: Vec<SegmentTask>,
}

/// Receipt returned once a run has been handed off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReceipt {
    /// Opaque execution identifier.
    pub execution_id: String,
    /// Number of tasks launched.
    pub dispatched: usize,
}

/// Dispatch errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Dispatcher refused the plan.
    #[error("dispatch rejected: {0}")]
    Rejected(String),
    /// Dispatcher failed to launch the run.
    #[error("dispatch failed: {0}")]
    Failed(String),
}

/// Launches the per-segment workers of a run.
#[async_trait]
pub trait SegmentDispatcher: Send + Sync {
    /// Hands a run plan to the orchestration layer.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] when the run cannot be launched.
    async fn dispatch(&self, plan: RunPlan) -> Result<DispatchReceipt, DispatchError>;
}
