// crates/shadowkeep-store-dynamodb/src/client.rs
// ============================================================================
// Module: DynamoDB Client Factory
// Description: Process-wide DynamoDB client construction.
// Purpose: Build the SDK client once and share it across workers.
// Dependencies: aws-config, aws-sdk-dynamodb, tokio
// ============================================================================

//! ## Overview
//! The factory loads shared AWS configuration on first use and caches the
//! resulting client. Later callers receive clones of the same client, which
//! share its connection pool.

// ============================================================================
// SECTION: Imports
// ============================================================================

use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_sdk_dynamodb::Client;
use tokio::sync::OnceCell;

use crate::store::DynamoShadowStore;

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Connection settings for the DynamoDB client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamoClientSettings {
    /// AWS region.
    pub region: String,
    /// Optional endpoint override (local DynamoDB, `LocalStack`).
    pub endpoint_url: Option<String>,
}

// ============================================================================
// SECTION: Factory
// ============================================================================

/// Lazily built, cached DynamoDB client.
pub struct DynamoClientFactory {
    /// Connection settings.
    settings: DynamoClientSettings,
    /// Cached client.
    client: OnceCell<Client>,
}

impl DynamoClientFactory {
    /// Creates a factory; no AWS configuration is loaded yet.
    #[must_use]
    pub fn new(settings: DynamoClientSettings) -> Self {
        Self {
            settings,
            client: OnceCell::new(),
        }
    }

    /// Returns the shared client, building it on first use.
    pub async fn client(&self) -> Client {
        self.client
            .get_or_init(|| async {
                let mut loader = aws_config::defaults(BehaviorVersion::latest())
                    .region(Region::new(self.settings.region.clone()));
                if let Some(endpoint) = &self.settings.endpoint_url {
                    loader = loader.endpoint_url(endpoint.clone());
                }
                let shared_config = loader.load().await;
                Client::new(&shared_config)
            })
            .await
            .clone()
    }

    /// Returns a store for `table_name` backed by the shared client.
    pub async fn store(&self, table_name: impl Into<String>) -> DynamoShadowStore {
        DynamoShadowStore::from_client(self.client().await, table_name)
    }
}
