//! Configuration for the map tiling job.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the tiling job.
///
/// Every field carries a default, so an empty document reproduces the
/// fixed layout the job has always used on the web host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Filesystem locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Item store connection settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Process registry used to resolve tenant credentials
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Processing configuration
    #[serde(default)]
    pub processing: ProcessingConfig,
}

/// Filesystem locations used by a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of the upload tree: `<upload_root>/<tenant>/<item>/`
    #[serde(default = "default_upload_root")]
    pub upload_root: PathBuf,

    /// Root of the generated pyramids: `<storage_root>/<tenant>/<item>/<zoom>/`
    #[serde(default = "default_storage_root")]
    pub storage_root: PathBuf,

    /// Marker file whose existence means a run is in progress
    #[serde(default = "default_lock_path")]
    pub lock_path: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            upload_root: default_upload_root(),
            storage_root: default_storage_root(),
            lock_path: default_lock_path(),
        }
    }
}

/// Connection settings for the per-tenant item database.
///
/// Credentials are not configured here; they are looked up per tenant
/// in the process registry at commit time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database host
    #[serde(default = "default_store_host")]
    pub host: String,

    /// Database port
    #[serde(default = "default_store_port")]
    pub port: u16,

    /// Database name shared by all tenants
    #[serde(default = "default_store_database")]
    pub database: String,

    /// Table holding one row per map item
    #[serde(default = "default_store_table")]
    pub table: String,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Keep the source directory when the store update fails.
    /// When false the update is a best-effort notification.
    #[serde(default)]
    pub require_commit: bool,

    /// Retry configuration for the store round-trip
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: default_store_host(),
            port: default_store_port(),
            database: default_store_database(),
            table: default_store_table(),
            connect_timeout_secs: default_connect_timeout_secs(),
            require_commit: false,
            retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration for transient store failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Initial backoff in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
        }
    }
}

/// Process registry settings.
///
/// The registry command must print a JSON array of running instances,
/// each carrying its environment under `pm2_env.env`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Executable to run
    #[serde(default = "default_registry_command")]
    pub command: String,

    /// Arguments passed to the executable
    #[serde(default = "default_registry_args")]
    pub args: Vec<String>,

    /// Environment variable naming the instance's tenant schema
    #[serde(default = "default_schema_var")]
    pub schema_var: String,

    /// Environment variable holding the database user
    #[serde(default = "default_username_var")]
    pub username_var: String,

    /// Environment variable holding the database password
    #[serde(default = "default_password_var")]
    pub password_var: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            command: default_registry_command(),
            args: default_registry_args(),
            schema_var: default_schema_var(),
            username_var: default_username_var(),
            password_var: default_password_var(),
        }
    }
}

/// Processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Number of tenants processed concurrently (items within a tenant
    /// are always processed one at a time)
    #[serde(default = "default_tenant_concurrency")]
    pub tenant_concurrency: usize,

    /// Number of Tokio worker threads
    #[serde(default)]
    pub worker_threads: Option<usize>,

    /// Rayon thread pool size for tile encoding
    #[serde(default)]
    pub rayon_threads: Option<usize>,

    /// Log a metrics summary when the run completes
    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    /// Optional path to save metrics JSON after the run completes
    #[serde(default)]
    pub metrics_output_path: Option<String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            tenant_concurrency: 1,
            worker_threads: None,
            rayon_threads: None,
            enable_metrics: true,
            metrics_output_path: None,
        }
    }
}

impl Config {
    /// Load configuration from a YAML or JSON file.
    /// Format is auto-detected from file extension (.yaml, .yml, or .json).
    pub fn from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let config: Config = match ext {
            "json" => serde_json::from_str(&contents)?,
            _ => {
                // An empty YAML document means "all defaults"
                if contents.trim().is_empty() {
                    Config::default()
                } else {
                    serde_yaml::from_str(&contents)?
                }
            }
        };
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Load configuration from a JSON string.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Serialize configuration to YAML.
    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        let paths = &self.paths;
        if paths.upload_root.as_os_str().is_empty() {
            anyhow::bail!("upload_root must not be empty");
        }
        if paths.storage_root.as_os_str().is_empty() {
            anyhow::bail!("storage_root must not be empty");
        }
        if paths.lock_path.as_os_str().is_empty() {
            anyhow::bail!("lock_path must not be empty");
        }
        if paths.upload_root == paths.storage_root {
            anyhow::bail!("upload_root and storage_root must differ");
        }
        if self.processing.tenant_concurrency == 0 {
            anyhow::bail!("tenant_concurrency must be > 0");
        }
        if !is_plain_identifier(&self.store.table) {
            anyhow::bail!(
                "store table '{}' must contain only letters, digits and underscores",
                self.store.table
            );
        }
        if self.registry.command.is_empty() {
            anyhow::bail!("registry command must not be empty");
        }
        Ok(())
    }
}

/// True for a non-empty identifier made of ASCII letters, digits and `_`.
pub(crate) fn is_plain_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// Default value functions for serde
fn default_upload_root() -> PathBuf { PathBuf::from("/var/www/map_uploads") }
fn default_storage_root() -> PathBuf { PathBuf::from("/var/www/map_storage") }
fn default_lock_path() -> PathBuf { PathBuf::from("/tmp/map_process_running") }
fn default_store_host() -> String { "localhost".to_string() }
fn default_store_port() -> u16 { 5432 }
fn default_store_database() -> String { "cadvanced".to_string() }
fn default_store_table() -> String { "Maps".to_string() }
fn default_connect_timeout_secs() -> u64 { 10 }
fn default_max_retries() -> usize { 3 }
fn default_initial_backoff_ms() -> u64 { 100 }
fn default_max_backoff_ms() -> u64 { 10000 }
fn default_registry_command() -> String { "pm2".to_string() }
fn default_registry_args() -> Vec<String> { vec!["jlist".to_string()] }
fn default_schema_var() -> String { "DB_SCHEMA".to_string() }
fn default_username_var() -> String { "DB_USERNAME".to_string() }
fn default_password_var() -> String { "DB_PASSWORD".to_string() }
fn default_tenant_concurrency() -> usize { 1 }
fn default_true() -> bool { true }
