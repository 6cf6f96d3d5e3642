// crates/shadowkeep-core/src/runtime/store.rs
// ============================================================================
// Module: In-Memory Shadow Store
// Description: Single-table store with partitioned scans and atomic transactions.
// Purpose: Provide a deterministic store implementation without external deps.
// Dependencies: crate::{core, interfaces}, async-trait
// ============================================================================

//! ## Overview
//! This module provides an in-memory implementation of [`ShadowStore`] for
//! tests and local runs. It mirrors the storage semantics the worker relies
//! on:
//! - items are assigned to scan segments by a stable hash of their key, so
//!   segments are disjoint and complete;
//! - the page size bounds items examined *before* filtering, so filtered pages
//!   may be empty while a continuation token remains;
//! - transactions validate every condition before applying any item.
//!
//! Failure injection hooks let tests force cancelled transactions and mark
//! items as undecodable, which scans then report as rejected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::ops::Bound;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use async_trait::async_trait;
use serde_json::Map;
use serde_json::Value;

use crate::core::hashing::stable_bucket;
use crate::core::identifiers::RecordId;
use crate::core::identifiers::ResourceName;
use crate::core::identifiers::Segment;
use crate::core::record::ItemKey;
use crate::core::record::PrimaryRecord;
use crate::core::record::SHADOW_KEYS_ATTR;
use crate::core::record::StoredItem;
use crate::interfaces::MAX_TRANSACT_ITEMS;
use crate::interfaces::MetadataCondition;
use crate::interfaces::RejectedItem;
use crate::interfaces::ScanPage;
use crate::interfaces::ScanRequest;
use crate::interfaces::ShadowStore;
use crate::interfaces::StoreError;
use crate::interfaces::TransactError;
use crate::interfaces::TransactItem;

// ============================================================================
// SECTION: State
// ============================================================================

/// Mutable store state guarded by one mutex.
#[derive(Debug, Default)]
struct StoreState {
    /// Items keyed by (partition, sort) key.
    items: BTreeMap<ItemKey, Map<String, Value>>,
    /// Number of upcoming transactions to cancel.
    fail_next: usize,
    /// Sort keys whose transactions are always cancelled.
    fail_sort_keys: BTreeSet<String>,
    /// Items scans report as undecodable.
    undecodable: BTreeSet<ItemKey>,
    /// Transactions committed.
    committed: u64,
    /// Transactions attempted.
    attempted: u64,
    /// Scan pages served.
    scans: u64,
}

/// Returns the scan bucket of an item key.
fn bucket_of(key: &ItemKey) -> u64 {
    stable_bucket(format!("{}|{}", key.pk, key.sk).as_bytes())
}

/// Returns true when the record's shadow key list satisfies the guard.
fn condition_holds(data: &Map<String, Value>, condition: &MetadataCondition) -> bool {
    let recorded = data.get(SHADOW_KEYS_ATTR).filter(|value| !value.is_null());
    match condition {
        MetadataCondition::KeysAbsent => recorded.is_none(),
        MetadataCondition::KeysEqual(keys) => recorded.is_some_and(|value| {
            value.as_array().is_some_and(|values| {
                values.len() == keys.len()
                    && values.iter().zip(keys).all(|(value, key)| value.as_str() == Some(key))
            })
        }),
    }
}

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// In-memory shadow store for tests and local runs.
#[derive(Debug, Clone)]
pub struct InMemoryShadowStore {
    /// Shared state protected by a mutex.
    state: Arc<Mutex<StoreState>>,
    /// Maximum items per transaction.
    max_transact_items: usize,
}

impl Default for InMemoryShadowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryShadowStore {
    /// Creates an empty store with the default transaction limit.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            max_transact_items: MAX_TRANSACT_ITEMS,
        }
    }

    /// Overrides the transaction item limit.
    #[must_use]
    pub const fn with_max_transact_items(mut self, max: usize) -> Self {
        self.max_transact_items = max;
        self
    }

    /// Locks the store state.
    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Io("shadow store mutex poisoned".to_string()))
    }

    /// Writes an item, replacing any existing item with the same key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store lock is poisoned.
    pub fn put_item(&self, item: StoredItem) -> Result<(), StoreError> {
        self.lock()?.items.insert(item.key, item.data);
        Ok(())
    }

    /// Writes a primary record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store lock is poisoned.
    pub fn put_record(
        &self,
        resource: &ResourceName,
        id: &RecordId,
        data: Map<String, Value>,
    ) -> Result<(), StoreError> {
        self.put_item(PrimaryRecord::new(resource.clone(), id.clone(), data).into_item())
    }

    /// Returns the data of an item.
    #[must_use]
    pub fn get(&self, key: &ItemKey) -> Option<Map<String, Value>> {
        self.lock().ok().and_then(|state| state.items.get(key).cloned())
    }

    /// Returns a primary record by id.
    #[must_use]
    pub fn record(&self, resource: &ResourceName, id: &RecordId) -> Option<PrimaryRecord> {
        self.get(&ItemKey::primary(resource, id))
            .map(|data| PrimaryRecord::new(resource.clone(), id.clone(), data))
    }

    /// Returns every item key, in key order.
    #[must_use]
    pub fn keys(&self) -> Vec<ItemKey> {
        self.lock().map(|state| state.items.keys().cloned().collect()).unwrap_or_default()
    }

    /// Returns the sort keys of non-primary items in a partition.
    #[must_use]
    pub fn shadow_sort_keys(&self, resource: &ResourceName) -> Vec<String> {
        self.keys()
            .into_iter()
            .filter(|key| key.pk == resource.as_str() && !key.is_primary())
            .map(|key| key.sk)
            .collect()
    }

    /// Returns a copy of every item.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<ItemKey, Map<String, Value>> {
        self.lock().map(|state| state.items.clone()).unwrap_or_default()
    }

    /// Cancels the next `count` transactions.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store lock is poisoned.
    pub fn fail_next_transactions(&self, count: usize) -> Result<(), StoreError> {
        self.lock()?.fail_next = count;
        Ok(())
    }

    /// Cancels every transaction that touches the given sort key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store lock is poisoned.
    pub fn fail_transactions_touching(&self, sort_key: impl Into<String>) -> Result<(), StoreError> {
        self.lock()?.fail_sort_keys.insert(sort_key.into());
        Ok(())
    }

    /// Makes scans report the item at `key` as undecodable.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store lock is poisoned.
    pub fn mark_undecodable(&self, key: ItemKey) -> Result<(), StoreError> {
        self.lock()?.undecodable.insert(key);
        Ok(())
    }

    /// Returns the number of committed transactions.
    #[must_use]
    pub fn committed_transactions(&self) -> u64 {
        self.lock().map(|state| state.committed).unwrap_or_default()
    }

    /// Returns the number of attempted transactions.
    #[must_use]
    pub fn attempted_transactions(&self) -> u64 {
        self.lock().map(|state| state.attempted).unwrap_or_default()
    }

    /// Returns the number of scan pages served.
    #[must_use]
    pub fn scan_pages(&self) -> u64 {
        self.lock().map(|state| state.scans).unwrap_or_default()
    }
}

#[async_trait]
impl ShadowStore for InMemoryShadowStore {
    async fn scan_segment(&self, request: &ScanRequest) -> Result<ScanPage, StoreError> {
        if request.page_size == 0 {
            return Err(StoreError::Invalid("page size must be greater than zero".to_string()));
        }
        let mut state = self.lock()?;
        state.scans += 1;
        let lower = request.start_key.as_ref().map_or(Bound::Unbounded, Bound::Excluded);
        let segment: Segment = request.segment;
        let mut in_segment = state
            .items
            .range((lower, Bound::Unbounded))
            .filter(|(key, _)| segment.contains_bucket(bucket_of(key)));

        let mut items = Vec::new();
        let mut rejected = Vec::new();
        let mut examined = 0_u32;
        let mut last_key = None;
        while examined < request.page_size {
            let Some((key, data)) = in_segment.next() else {
                break;
            };
            examined += 1;
            last_key = Some(key.clone());
            if key.pk != request.resource.as_str() || !key.sk.starts_with(&request.key_prefix) {
                continue;
            }
            if state.undecodable.contains(key) {
                rejected.push(RejectedItem {
                    key: key.clone(),
                    message: format!("item {key} has a non-map data attribute"),
                });
                continue;
            }
            let item = StoredItem {
                key: key.clone(),
                data: data.clone(),
            };
            match PrimaryRecord::from_item(item) {
                Ok(record) => items.push(record),
                Err(err) => rejected.push(RejectedItem {
                    key: key.clone(),
                    message: err.to_string(),
                }),
            }
        }
        let next = if in_segment.next().is_some() { last_key } else { None };
        Ok(ScanPage {
            items,
            rejected,
            next,
        })
    }

    async fn transact_write(&self, items: &[TransactItem]) -> Result<(), TransactError> {
        let mut state = self.lock()?;
        state.attempted += 1;
        if items.is_empty() {
            return Err(StoreError::Invalid("transaction has no items".to_string()).into());
        }
        if items.len() > self.max_transact_items {
            return Err(TransactError::TooManyItems {
                count: items.len(),
                max: self.max_transact_items,
            });
        }
        let mut seen = BTreeSet::new();
        for item in items {
            if !seen.insert(item.key()) {
                return Err(StoreError::Invalid(format!(
                    "transaction touches {} more than once",
                    item.key()
                ))
                .into());
            }
        }
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(TransactError::Cancelled("injected cancellation".to_string()));
        }
        if let Some(item) = items.iter().find(|item| state.fail_sort_keys.contains(&item.key().sk))
        {
            return Err(TransactError::Cancelled(format!(
                "injected cancellation for {}",
                item.key()
            )));
        }
        for item in items {
            if let TransactItem::UpdateMetadata {
                key,
                condition,
                ..
            } = item
            {
                let holds =
                    state.items.get(key).is_some_and(|data| condition_holds(data, condition));
                if !holds {
                    return Err(TransactError::Cancelled(format!(
                        "conditional check failed for {key}"
                    )));
                }
            }
        }
        for item in items {
            match item {
                TransactItem::Put(stored) => {
                    state.items.insert(stored.key.clone(), stored.data.clone());
                }
                TransactItem::Delete(key) => {
                    state.items.remove(key);
                }
                TransactItem::UpdateMetadata {
                    key,
                    metadata,
                    ..
                } => {
                    if let Some(data) = state.items.get_mut(key) {
                        metadata.apply_to(data);
                    }
                }
            }
        }
        state.committed += 1;
        drop(state);
        Ok(())
    }

    fn max_transact_items(&self) -> usize {
        self.max_transact_items
    }
}
