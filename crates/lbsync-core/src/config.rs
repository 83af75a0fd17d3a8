//! Configuration types for lbsync

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{LbsyncError, LbsyncResult};

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Discovery backend configuration
    pub discovery: DiscoveryConfig,
    /// Reconciliation loop configuration
    pub reconciler: ReconcilerConfig,
    /// Declaration storage configuration
    pub storage: StorageConfig,
    /// Committed configuration output
    pub output: OutputConfig,
    /// Admin API configuration
    pub api: ApiConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl DaemonConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> LbsyncResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LbsyncError::Config(format!("Failed to read config file: {}", e)))?;
        toml::from_str(&content)
            .map_err(|e| LbsyncError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Override file values with the well-known environment variables of the platform
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("TUTUM_SERVICE_API_URL") {
            self.discovery.url = url;
        }
        if let Some(auth) = lookup("TUTUM_AUTH") {
            self.discovery.auth = Some(auth);
        }
        if let Some(password) =
            lookup("LBSYNC_ADMIN_PASSWORD").or_else(|| lookup("HAPROXY_UI_PASSWORD"))
        {
            self.api.admin_password = Some(password);
        }
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.api.port = port;
        }
    }

    /// Reject settings the daemon cannot run with
    pub fn validate(&self) -> LbsyncResult<()> {
        if self.discovery.url.trim().is_empty() {
            return Err(LbsyncError::Config(
                "The discovery API URL was not specified".to_string(),
            ));
        }
        if self.reconciler.poll_interval_secs == 0 {
            return Err(LbsyncError::Config(
                "poll_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Discovery backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// URL returning the service document of this load balancer
    pub url: String,
    /// Value of the `Authorization` header, if the backend requires one
    pub auth: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            auth: None,
            timeout_secs: 10,
        }
    }
}

impl DiscoveryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Reconciliation loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Delay between the end of one poll cycle and the start of the next
    pub poll_interval_secs: u64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
        }
    }
}

impl ReconcilerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Declaration storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON file holding the frontend declarations
    pub declarations_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            declarations_path: PathBuf::from("/var/local/lbsync/config.json"),
        }
    }
}

/// Where committed configurations are handed off
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// File receiving the committed frontends as JSON
    pub snapshot_path: PathBuf,
    /// Command run after each snapshot write (program followed by its arguments)
    pub reload_command: Vec<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("/var/local/lbsync/frontends.json"),
            reload_command: Vec::new(),
        }
    }
}

/// Admin API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Address to bind the admin API
    pub address: String,
    /// Port for the admin API
    pub port: u16,
    /// Basic auth user name
    pub admin_user: String,
    /// Basic auth password; every request is rejected while unset
    pub admin_password: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 3000,
            admin_user: "admin".to_string(),
            admin_password: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
