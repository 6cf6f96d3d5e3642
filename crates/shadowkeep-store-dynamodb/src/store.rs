// crates/shadowkeep-store-dynamodb/src/store.rs
// ============================================================================
// Module: DynamoDB Shadow Store
// Description: Segment scans and transactional writes against DynamoDB.
// Purpose: Implement the shadow store interface for a live table.
// Dependencies: shadowkeep-core, aws-sdk-dynamodb, async-trait
// ============================================================================

//! ## Overview
//! Scans run one parallel-scan segment at a time with the filter
//! `PK = :resource AND begins_with(SK, :prefix)`. `Limit` bounds items
//! examined, so filtered pages can be empty while a continuation key remains.
//! Items whose `data` attribute cannot be decoded are returned as rejected
//! items rather than failing the page.
//!
//! Transactions map one-to-one onto `TransactWriteItems`. The metadata update
//! carries a condition on the previously recorded key list, where an unrecorded
//! list may be missing or stored as `NULL`; a failed condition
//! or a conflicting write surfaces as `TransactionCanceledException` and maps
//! to [`TransactError::Cancelled`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::scan::ScanError;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::types::Delete;
use aws_sdk_dynamodb::types::Put;
use aws_sdk_dynamodb::types::TransactWriteItem;
use aws_sdk_dynamodb::types::Update;
use shadowkeep_core::CONFIG_HASH_ATTR;
use shadowkeep_core::CONFIG_VERSION_ATTR;
use shadowkeep_core::ItemKey;
use shadowkeep_core::MetadataCondition;
use shadowkeep_core::PrimaryRecord;
use shadowkeep_core::RejectedItem;
use shadowkeep_core::SHADOW_KEYS_ATTR;
use shadowkeep_core::ScanPage;
use shadowkeep_core::ScanRequest;
use shadowkeep_core::ShadowMetadata;
use shadowkeep_core::ShadowStore;
use shadowkeep_core::StoreError;
use shadowkeep_core::TransactError;
use shadowkeep_core::TransactItem;

use crate::attributes::DynamoItem;
use crate::attributes::attributes_to_key;
use crate::attributes::attributes_to_stored;
use crate::attributes::key_to_attributes;
use crate::attributes::stored_to_attributes;
use crate::schema::ATTR_DATA;
use crate::schema::ATTR_PK;
use crate::schema::ATTR_SK;
use crate::schema::NAME_CONFIG_HASH;
use crate::schema::NAME_CONFIG_VERSION;
use crate::schema::NAME_DATA;
use crate::schema::NAME_PK;
use crate::schema::NAME_SHADOW_KEYS;
use crate::schema::NAME_SK;
use crate::schema::VALUE_CONFIG_HASH;
use crate::schema::VALUE_CONFIG_VERSION;
use crate::schema::VALUE_EXPECTED_KEYS;
use crate::schema::VALUE_NULL_TYPE;
use crate::schema::VALUE_PREFIX;
use crate::schema::VALUE_RESOURCE;
use crate::schema::VALUE_SHADOW_KEYS;

// ============================================================================
// SECTION: Store
// ============================================================================

/// DynamoDB-backed shadow store.
#[derive(Clone)]
pub struct DynamoShadowStore {
    /// Shared SDK client.
    client: Client,
    /// Table holding primary and shadow records.
    table_name: String,
}

impl fmt::Debug for DynamoShadowStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamoShadowStore").field("table_name", &self.table_name).finish()
    }
}

impl DynamoShadowStore {
    /// Creates a store from a pre-built client.
    #[must_use]
    pub fn from_client(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    /// Returns the table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

#[async_trait]
impl ShadowStore for DynamoShadowStore {
    async fn scan_segment(&self, request: &ScanRequest) -> Result<ScanPage, StoreError> {
        let segment = to_i32("segment", request.segment.index())?;
        let total = to_i32("total segments", request.segment.total())?;
        let limit = to_i32("page size", request.page_size)?;
        let response = self
            .client
            .scan()
            .table_name(&self.table_name)
            .segment(segment)
            .total_segments(total)
            .limit(limit)
            .filter_expression(format!(
                "{NAME_PK} = {VALUE_RESOURCE} AND begins_with({NAME_SK}, {VALUE_PREFIX})"
            ))
            .expression_attribute_names(NAME_PK, ATTR_PK)
            .expression_attribute_names(NAME_SK, ATTR_SK)
            .expression_attribute_values(
                VALUE_RESOURCE,
                AttributeValue::S(request.resource.as_str().to_string()),
            )
            .expression_attribute_values(VALUE_PREFIX, AttributeValue::S(request.key_prefix.clone()))
            .set_exclusive_start_key(request.start_key.as_ref().map(key_to_attributes))
            .send()
            .await
            .map_err(map_scan_error)?;

        let (items, rejected) = decode_scan_items(response.items())?;
        let next = match response.last_evaluated_key() {
            Some(key) if !key.is_empty() => Some(attributes_to_key(key)?),
            _ => None,
        };
        Ok(ScanPage {
            items,
            rejected,
            next,
        })
    }

    async fn transact_write(&self, items: &[TransactItem]) -> Result<(), TransactError> {
        let max = self.max_transact_items();
        if items.len() > max {
            return Err(TransactError::TooManyItems {
                count: items.len(),
                max,
            });
        }
        if items.is_empty() {
            return Err(StoreError::Invalid("transaction has no items".to_string()).into());
        }
        let requests = items
            .iter()
            .map(|item| build_transact_item(&self.table_name, item))
            .collect::<Result<Vec<_>, _>>()?;
        self.client
            .transact_write_items()
            .set_transact_items(Some(requests))
            .send()
            .await
            .map_err(map_transact_error)?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Scan Decoding
// ============================================================================

/// Splits raw scan items into decoded primary records and rejected items.
///
/// # Errors
///
/// Returns [`StoreError::Corrupt`] only when an item lacks its string keys,
/// which the scan filter rules out for a well-formed table.
pub fn decode_scan_items(
    raw: &[DynamoItem],
) -> Result<(Vec<PrimaryRecord>, Vec<RejectedItem>), StoreError> {
    let mut items = Vec::with_capacity(raw.len());
    let mut rejected = Vec::new();
    for attributes in raw {
        let decoded = attributes_to_stored(attributes).and_then(|stored| {
            PrimaryRecord::from_item(stored).map_err(|err| StoreError::Corrupt(err.to_string()))
        });
        match decoded {
            Ok(record) => items.push(record),
            Err(err) => rejected.push(RejectedItem {
                key: attributes_to_key(attributes)?,
                message: err.to_string(),
            }),
        }
    }
    Ok((items, rejected))
}

// ============================================================================
// SECTION: Request Builders
// ============================================================================

/// Converts one transaction item into a DynamoDB request item.
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] when the SDK rejects the request shape.
pub fn build_transact_item(table: &str, item: &TransactItem) -> Result<TransactWriteItem, StoreError> {
    match item {
        TransactItem::Put(stored) => {
            let put = Put::builder()
                .table_name(table)
                .set_item(Some(stored_to_attributes(stored)))
                .build()
                .map_err(|err| StoreError::Invalid(err.to_string()))?;
            Ok(TransactWriteItem::builder().put(put).build())
        }
        TransactItem::Delete(key) => {
            let delete = Delete::builder()
                .table_name(table)
                .set_key(Some(key_to_attributes(key)))
                .build()
                .map_err(|err| StoreError::Invalid(err.to_string()))?;
            Ok(TransactWriteItem::builder().delete(delete).build())
        }
        TransactItem::UpdateMetadata {
            key,
            metadata,
            condition,
        } => {
            let update = metadata_update(table, key, metadata, condition)?;
            Ok(TransactWriteItem::builder().update(update).build())
        }
    }
}

/// Builds the conditional metadata update for a primary record.
fn metadata_update(
    table: &str,
    key: &ItemKey,
    metadata: &ShadowMetadata,
    condition: &MetadataCondition,
) -> Result<Update, StoreError> {
    let keys_path = format!("{NAME_DATA}.{NAME_SHADOW_KEYS}");
    let mut builder = Update::builder()
        .table_name(table)
        .set_key(Some(key_to_attributes(key)))
        .update_expression(format!(
            "SET {keys_path} = {VALUE_SHADOW_KEYS}, {NAME_DATA}.{NAME_CONFIG_VERSION} = \
             {VALUE_CONFIG_VERSION}, {NAME_DATA}.{NAME_CONFIG_HASH} = {VALUE_CONFIG_HASH}"
        ))
        .expression_attribute_names(NAME_PK, ATTR_PK)
        .expression_attribute_names(NAME_DATA, ATTR_DATA)
        .expression_attribute_names(NAME_SHADOW_KEYS, SHADOW_KEYS_ATTR)
        .expression_attribute_names(NAME_CONFIG_VERSION, CONFIG_VERSION_ATTR)
        .expression_attribute_names(NAME_CONFIG_HASH, CONFIG_HASH_ATTR)
        .expression_attribute_values(VALUE_SHADOW_KEYS, string_list(&metadata.shadow_keys))
        .expression_attribute_values(
            VALUE_CONFIG_VERSION,
            AttributeValue::S(metadata.config_version.clone()),
        )
        .expression_attribute_values(VALUE_CONFIG_HASH, AttributeValue::S(metadata.config_hash.clone()));
    builder = match condition {
        MetadataCondition::KeysAbsent => builder
            .condition_expression(format!(
                "attribute_exists({NAME_PK}) AND (attribute_not_exists({keys_path}) OR \
                 attribute_type({keys_path}, {VALUE_NULL_TYPE}))"
            ))
            .expression_attribute_values(VALUE_NULL_TYPE, AttributeValue::S("NULL".to_string())),
        MetadataCondition::KeysEqual(expected) => builder
            .condition_expression(format!(
                "attribute_exists({NAME_PK}) AND {keys_path} = {VALUE_EXPECTED_KEYS}"
            ))
            .expression_attribute_values(VALUE_EXPECTED_KEYS, string_list(expected)),
    };
    builder.build().map_err(|err| StoreError::Invalid(err.to_string()))
}

/// Encodes sort keys as a DynamoDB list of strings.
fn string_list(keys: &[String]) -> AttributeValue {
    AttributeValue::L(keys.iter().cloned().map(AttributeValue::S).collect())
}

/// Converts a request bound into the SDK's signed integer type.
fn to_i32(field: &str, value: u32) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::Invalid(format!("{field} {value} out of range")))
}

// ============================================================================
// SECTION: Error Mapping
// ============================================================================

/// Maps scan failures onto store errors.
fn map_scan_error(err: SdkError<ScanError>) -> StoreError {
    let message = DisplayErrorContext(&err).to_string();
    match err.as_service_error() {
        Some(
            ScanError::ProvisionedThroughputExceededException(_) | ScanError::RequestLimitExceeded(_),
        ) => StoreError::Throttled(message),
        Some(ScanError::ResourceNotFoundException(_)) => StoreError::Invalid(message),
        _ => StoreError::Io(message),
    }
}

/// Maps transaction failures onto transaction errors.
fn map_transact_error(err: SdkError<TransactWriteItemsError>) -> TransactError {
    let message = DisplayErrorContext(&err).to_string();
    match err.as_service_error() {
        Some(TransactWriteItemsError::TransactionCanceledException(cancelled)) => {
            let reasons: Vec<&str> = cancelled
                .cancellation_reasons()
                .iter()
                .filter_map(|reason| reason.code())
                .collect();
            TransactError::Cancelled(format!(
                "TransactionCanceledException: {}",
                if reasons.is_empty() { message } else { reasons.join(", ") }
            ))
        }
        Some(
            TransactWriteItemsError::ProvisionedThroughputExceededException(_)
            | TransactWriteItemsError::RequestLimitExceeded(_),
        ) => StoreError::Throttled(message).into(),
        Some(TransactWriteItemsError::ResourceNotFoundException(_)) => {
            StoreError::Invalid(message).into()
        }
        _ => StoreError::Io(message).into(),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
