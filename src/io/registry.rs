//! Tenant credential lookup through the process registry.
//!
//! Each tenant is served by a named running instance whose environment holds
//! its schema name and database credentials. The registry is asked afresh for
//! every commit; nothing is cached between items.

use crate::config::RegistryConfig;
use crate::error::StoreError;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

/// Database credentials for one tenant.
#[derive(Clone, PartialEq, Eq)]
pub struct TenantCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for TenantCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Source of per-tenant credentials.
#[async_trait]
pub trait ProcessRegistry: Send + Sync {
    /// Resolve the credentials of the instance serving `tenant`.
    async fn credentials_for(&self, tenant: &str) -> Result<TenantCredentials, StoreError>;
}

#[derive(Debug, Deserialize)]
struct Instance {
    #[serde(default)]
    pm2_env: Option<InstanceEnv>,
}

#[derive(Debug, Deserialize)]
struct InstanceEnv {
    #[serde(default)]
    env: HashMap<String, serde_json::Value>,
}

/// Find `tenant`'s credentials in a JSON instance listing.
pub fn find_credentials(
    listing: &str,
    tenant: &str,
    config: &RegistryConfig,
) -> Result<TenantCredentials, StoreError> {
    let instances: Vec<Instance> = serde_json::from_str(listing)
        .map_err(|e| StoreError::Registry(format!("unparseable instance list: {e}")))?;

    let env = instances
        .iter()
        .filter_map(|i| i.pm2_env.as_ref())
        .map(|e| &e.env)
        .find(|env| env.get(&config.schema_var).and_then(|v| v.as_str()) == Some(tenant))
        .ok_or_else(|| StoreError::UnknownTenant(tenant.to_string()))?;

    let var = |name: &str| {
        env.get(name)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| StoreError::Registry(format!("instance for '{tenant}' has no {name}")))
    };

    Ok(TenantCredentials {
        username: var(&config.username_var)?,
        password: var(&config.password_var)?,
    })
}

/// Registry backed by a command that prints the instance list (`pm2 jlist`).
#[derive(Debug, Clone)]
pub struct CommandRegistry {
    config: RegistryConfig,
}

impl CommandRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ProcessRegistry for CommandRegistry {
    async fn credentials_for(&self, tenant: &str) -> Result<TenantCredentials, StoreError> {
        let output = tokio::process::Command::new(&self.config.command)
            .args(&self.config.args)
            .output()
            .await
            .map_err(|e| StoreError::Registry(format!("cannot run {}: {e}", self.config.command)))?;

        if !output.status.success() {
            return Err(StoreError::Registry(format!(
                "{} exited with {}",
                self.config.command, output.status
            )));
        }

        let listing = String::from_utf8_lossy(&output.stdout);
        find_credentials(&listing, tenant, &self.config)
    }
}
