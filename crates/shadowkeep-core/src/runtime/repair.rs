// crates/shadowkeep-core/src/runtime/repair.rs
// ============================================================================
// Module: Repair Executor
// Description: Minimal shadow delete/insert plus metadata update in one transaction.
// Purpose: Bring a drifted record's shadows back in line atomically.
// Dependencies: crate::{core, interfaces, runtime}, serde, thiserror
// ============================================================================

//! ## Overview
//! A repair plan holds three groups that are committed as one transactional
//! write:
//! - deletes of recorded keys that are no longer expected,
//! - puts of expected shadows that are not recorded,
//! - one conditional update of the primary record's metadata.
//!
//! Plans larger than the store's transaction limit fail fast and are never
//! split, so a record is never left half-repaired. The metadata update only
//! applies while the record still carries the key list the worker observed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::fingerprint::ConfigFingerprint;
use crate::core::record::ItemKey;
use crate::core::record::PRIMARY_KEY_PREFIX;
use crate::core::record::PrimaryRecord;
use crate::core::record::ShadowMetadata;
use crate::core::record::ShadowRecord;
use crate::core::record::StoredItem;
use crate::core::schema::ResourceSchema;
use crate::interfaces::MetadataCondition;
use crate::interfaces::ShadowStore;
use crate::interfaces::TransactError;
use crate::interfaces::TransactItem;
use crate::runtime::drift::DriftReport;
use crate::runtime::generator::GenerateError;
use crate::runtime::generator::generate_shadow_records;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Machine-readable repair failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepairErrorCode {
    /// Transaction cancelled or storage failed; retryable.
    TransactionFailed,
    /// Record cannot be repaired as-is; not retryable.
    ValidationError,
}

impl RepairErrorCode {
    /// Returns the stable code string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TransactionFailed => "TRANSACTION_FAILED",
            Self::ValidationError => "VALIDATION_ERROR",
        }
    }
}

impl fmt::Display for RepairErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Repair failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepairError {
    /// The transaction would exceed the store's item limit.
    #[error("repair needs {items} transaction items (max {max})")]
    TooLarge {
        /// Items the plan requires.
        items: usize,
        /// Store maximum.
        max: usize,
    },
    /// Expected shadows could not be regenerated.
    #[error(transparent)]
    Generate(#[from] GenerateError),
    /// The plan is inconsistent with the record.
    #[error("repair validation failed: {0}")]
    Validation(String),
    /// The store cancelled the transaction.
    #[error("repair transaction cancelled: {0}")]
    Cancelled(String),
    /// The store failed while applying the transaction.
    #[error("repair store error: {0}")]
    Store(String),
}

impl RepairError {
    /// Returns the failure class reported in worker output.
    #[must_use]
    pub const fn code(&self) -> RepairErrorCode {
        match self {
            Self::Cancelled(_) | Self::Store(_) => RepairErrorCode::TransactionFailed,
            Self::TooLarge {
                ..
            }
            | Self::Generate(_)
            | Self::Validation(_) => RepairErrorCode::ValidationError,
        }
    }
}

impl From<TransactError> for RepairError {
    fn from(err: TransactError) -> Self {
        match err {
            TransactError::Cancelled(message) => Self::Cancelled(message),
            TransactError::TooManyItems {
                count,
                max,
            } => Self::TooLarge {
                items: count,
                max,
            },
            TransactError::Store(err) => Self::Store(err.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Planning
// ============================================================================

/// Transactional write needed to repair one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairPlan {
    /// Primary record key.
    pub primary: ItemKey,
    /// Stale shadow keys to delete.
    pub deletes: Vec<ItemKey>,
    /// Missing shadows to write.
    pub puts: Vec<StoredItem>,
    /// Metadata written to the primary record.
    pub metadata: ShadowMetadata,
    /// Guard on the metadata update.
    pub condition: MetadataCondition,
}

impl RepairPlan {
    /// Returns the number of transaction items the plan needs.
    #[must_use]
    pub const fn item_count(&self) -> usize {
        self.deletes.len() + self.puts.len() + 1
    }

    /// Converts the plan into ordered transaction items.
    #[must_use]
    pub fn into_items(self) -> Vec<TransactItem> {
        let mut items = Vec::with_capacity(self.item_count());
        items.extend(self.deletes.into_iter().map(TransactItem::Delete));
        items.extend(self.puts.into_iter().map(TransactItem::Put));
        items.push(TransactItem::UpdateMetadata {
            key: self.primary,
            metadata: self.metadata,
            condition: self.condition,
        });
        items
    }
}

/// Builds the repair plan for a drifted record.
///
/// # Errors
///
/// Returns [`RepairError`] when regeneration disagrees with the drift report or
/// a recorded key addresses a primary record.
pub fn plan_repair(
    record: &PrimaryRecord,
    schema: &ResourceSchema,
    fingerprint: &ConfigFingerprint,
    report: &DriftReport,
) -> Result<RepairPlan, RepairError> {
    let shadows = generate_shadow_records(&record.resource, &record.id, &record.data, schema)?;
    let regenerated: Vec<&str> = shadows.iter().map(|shadow| shadow.sort_key()).collect();
    if regenerated != report.expected_keys.iter().map(String::as_str).collect::<Vec<_>>() {
        return Err(RepairError::Validation(format!(
            "regenerated shadow keys for {} do not match expected keys",
            record.id
        )));
    }

    let expected: BTreeSet<&str> = regenerated.iter().copied().collect();
    let actual: BTreeSet<&str> = report.actual_keys().iter().map(String::as_str).collect();

    let mut deletes = Vec::new();
    for key in &actual {
        if expected.contains(key) {
            continue;
        }
        if key.starts_with(PRIMARY_KEY_PREFIX) {
            return Err(RepairError::Validation(format!(
                "recorded shadow key {key} addresses a primary record"
            )));
        }
        deletes.push(ItemKey::new(record.resource.as_str(), *key));
    }

    let puts = shadows
        .iter()
        .filter(|shadow| !actual.contains(shadow.sort_key()))
        .map(ShadowRecord::to_item)
        .collect();

    let condition = match &report.recorded.shadow_keys {
        None => MetadataCondition::KeysAbsent,
        Some(keys) => MetadataCondition::KeysEqual(keys.clone()),
    };

    Ok(RepairPlan {
        primary: record.key(),
        deletes,
        puts,
        metadata: ShadowMetadata {
            shadow_keys: report.expected_keys.clone(),
            config_version: fingerprint.version.clone(),
            config_hash: fingerprint.hash_hex().to_string(),
        },
        condition,
    })
}

// ============================================================================
// SECTION: Execution
// ============================================================================

/// Counts of shadow items changed by a successful repair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairOutcome {
    /// Stale shadows deleted.
    pub deleted: usize,
    /// Missing shadows written.
    pub inserted: usize,
}

/// Applies repair plans through a shadow store.
#[derive(Clone)]
pub struct RepairExecutor {
    /// Storage driver.
    store: Arc<dyn ShadowStore>,
}

impl RepairExecutor {
    /// Creates a repair executor over a store.
    #[must_use]
    pub fn new(store: Arc<dyn ShadowStore>) -> Self {
        Self {
            store,
        }
    }

    /// Plans and applies the repair of one drifted record.
    ///
    /// # Errors
    ///
    /// Returns [`RepairError`] when planning or the transaction fails.
    pub async fn repair(
        &self,
        record: &PrimaryRecord,
        schema: &ResourceSchema,
        fingerprint: &ConfigFingerprint,
        report: &DriftReport,
    ) -> Result<RepairOutcome, RepairError> {
        let plan = plan_repair(record, schema, fingerprint, report)?;
        self.execute(plan).await
    }

    /// Applies a repair plan as a single transaction.
    ///
    /// # Errors
    ///
    /// Returns [`RepairError::TooLarge`] without touching the store when the
    /// plan exceeds the transaction limit, or the mapped store failure.
    pub async fn execute(&self, plan: RepairPlan) -> Result<RepairOutcome, RepairError> {
        let max = self.store.max_transact_items();
        let items = plan.item_count();
        if items > max {
            return Err(RepairError::TooLarge {
                items,
                max,
            });
        }
        let outcome = RepairOutcome {
            deleted: plan.deletes.len(),
            inserted: plan.puts.len(),
        };
        self.store.transact_write(&plan.into_items()).await?;
        Ok(outcome)
    }
}
