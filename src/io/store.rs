//! Item store: marking map items processed in their tenant's database.
//!
//! A connection is opened for each commit and closed straight after; no pool
//! is kept between items.

use crate::config::{Config, StoreConfig};
use crate::error::StoreError;
use crate::io::{CommandRegistry, ProcessRegistry};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use std::sync::Arc;
use std::time::Duration;

/// Decode an item directory name into its store primary key.
///
/// Names are standard base64 of the identifier's text.
pub fn decode_item_id(name: &str) -> Result<String, StoreError> {
    let invalid = || StoreError::InvalidItemId(name.to_string());
    let bytes = STANDARD.decode(name).map_err(|_| invalid())?;
    let id = String::from_utf8(bytes).map_err(|_| invalid())?;
    if id.is_empty() {
        return Err(invalid());
    }
    Ok(id)
}

/// Persisted record of map items.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Set the `processed` flag of item `item_id` owned by `tenant`.
    /// Returns the number of rows updated.
    async fn mark_processed(&self, tenant: &str, item_id: &str) -> Result<u64, StoreError>;
}

/// Postgres-backed item store using tenant credentials from the registry.
pub struct PostgresItemStore {
    config: StoreConfig,
    registry: Arc<dyn ProcessRegistry>,
}

impl PostgresItemStore {
    pub fn new(config: StoreConfig, registry: Arc<dyn ProcessRegistry>) -> Self {
        Self { config, registry }
    }

    fn update_sql(&self) -> String {
        // Table name is checked as a plain identifier by Config::validate
        format!(
            "UPDATE \"{}\" SET processed = true WHERE id::text = $1",
            self.config.table
        )
    }
}

#[async_trait]
impl ItemStore for PostgresItemStore {
    async fn mark_processed(&self, tenant: &str, item_id: &str) -> Result<u64, StoreError> {
        let creds = self.registry.credentials_for(tenant).await?;

        let options = PgConnectOptions::new()
            .host(&self.config.host)
            .port(self.config.port)
            .database(&self.config.database)
            .username(&creds.username)
            .password(&creds.password);

        let timeout = Duration::from_secs(self.config.connect_timeout_secs);
        let mut conn = tokio::time::timeout(timeout, PgConnection::connect_with(&options))
            .await
            .map_err(|_| StoreError::Timeout(self.config.connect_timeout_secs))??;

        let result = sqlx::query(&self.update_sql())
            .bind(item_id)
            .execute(&mut conn)
            .await;

        if let Err(e) = conn.close().await {
            tracing::warn!("Closing store connection for tenant {} failed: {}", tenant, e);
        }

        Ok(result?.rows_affected())
    }
}

/// Create the production item store from configuration.
pub fn create_item_store(config: &Config) -> Arc<dyn ItemStore> {
    let registry = Arc::new(CommandRegistry::new(config.registry.clone()));
    Arc::new(PostgresItemStore::new(config.store.clone(), registry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::TenantCredentials;

    #[test]
    fn test_decode_item_id() {
        assert_eq!(decode_item_id("MTI=").unwrap(), "12");
        assert_eq!(decode_item_id("NDI3").unwrap(), "427");
        assert_eq!(
            decode_item_id("ZjQ3YWMxMGItNThjYy00MzcyLWE1NjctMGUwMmIyYzNkNDc5").unwrap(),
            "f47ac10b-58cc-4372-a567-0e02b2c3d479"
        );
    }

    #[test]
    fn test_decode_item_id_invalid() {
        assert!(matches!(decode_item_id("not base64!"), Err(StoreError::InvalidItemId(_))));
        assert!(matches!(decode_item_id(""), Err(StoreError::InvalidItemId(_))));
        // 0xFF 0xFE is not UTF-8
        assert!(matches!(decode_item_id("//4="), Err(StoreError::InvalidItemId(_))));
    }

    struct NoTenants;

    #[async_trait]
    impl ProcessRegistry for NoTenants {
        async fn credentials_for(&self, tenant: &str) -> Result<TenantCredentials, StoreError> {
            Err(StoreError::UnknownTenant(tenant.to_string()))
        }
    }

    #[test]
    fn test_update_sql_quotes_table() {
        let store = PostgresItemStore::new(StoreConfig::default(), Arc::new(NoTenants));
        assert_eq!(
            store.update_sql(),
            "UPDATE \"Maps\" SET processed = true WHERE id::text = $1"
        );
    }

    #[tokio::test]
    async fn test_registry_failure_surfaces() {
        let store = PostgresItemStore::new(StoreConfig::default(), Arc::new(NoTenants));
        let err = store.mark_processed("acme", "12").await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownTenant(_)));
    }
}
