// crates/shadowkeep-store-dynamodb/src/lib.rs
// ============================================================================
// Module: Shadowkeep DynamoDB Store
// Description: DynamoDB implementation of the shadow store interface.
// Purpose: Run segment scans and all-or-nothing repairs against a real table.
// Dependencies: shadowkeep-core, aws-config, aws-sdk-dynamodb, tokio
// ============================================================================

//! ## Overview
//! Primary and shadow records share one table keyed by `PK` (resource) and
//! `SK` (sort key), with record attributes nested under `data`. Scans use
//! DynamoDB parallel scan segments with a filter on the resource and the
//! `id#` prefix. Repairs are a single `TransactWriteItems` call whose
//! metadata update is conditional on the previously recorded key list.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod attributes;
pub mod client;
pub mod schema;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use client::DynamoClientFactory;
pub use client::DynamoClientSettings;
pub use store::DynamoShadowStore;
