// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Orchestrator Configuration Types
//
// Defines the configuration schema of the entitlement orchestrator:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Catalog and tenant directory endpoints with connect/read timeouts
// - Module tenant endpoint client settings
// - Event bus and flow execution settings
// - Optional PostgreSQL persistence

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::flow::ExecutionStrategy;
use crate::domain::repository::{PostgresConfig, StorageBackend};

pub const API_VERSION: &str = "entitlements/v1";
pub const KIND: &str = "OrchestratorConfig";

/// Top-level Kubernetes-style orchestrator configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfigManifest {
    /// API version (must be "entitlements/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "OrchestratorConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: OrchestratorConfigSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    /// Optional: Configuration version for tracking
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfigSpec {
    /// Application catalog (descriptors, module discovery)
    pub catalog: EndpointConfig,

    pub tenant_directory: EndpointConfig,

    /// Client settings for `POST {location}/_/tenant`
    #[serde(default)]
    pub modules: ModuleClientConfig,

    #[serde(default)]
    pub event_bus: EventBusConfig,

    #[serde(default)]
    pub flow: FlowConfig,

    /// PostgreSQL persistence; in-memory repositories when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub url: String,

    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    #[serde(default = "default_read_timeout", with = "humantime_serde")]
    pub read_timeout: Duration,
}

impl EndpointConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: default_connect_timeout(),
            read_timeout: default_read_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleClientConfig {
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Module tenant operations may run migrations
    #[serde(default = "default_module_read_timeout", with = "humantime_serde")]
    pub read_timeout: Duration,
}

impl Default for ModuleClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            read_timeout: default_module_read_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBusConfig {
    /// Topic module entitlement events are published to
    #[serde(default = "default_topic")]
    pub topic: String,

    #[serde(default = "default_send_timeout", with = "humantime_serde")]
    pub send_timeout: Duration,

    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            send_timeout: default_send_timeout(),
            capacity: default_capacity(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowConfig {
    #[serde(default)]
    pub default_strategy: ExecutionStrategy,

    /// Ask modules to drop tenant data when an application is revoked
    #[serde(default)]
    pub purge_on_revoke: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// "compact" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_read_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_module_read_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_topic() -> String {
    "entitlement".to_string()
}

fn default_send_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_capacity() -> usize {
    1000
}

fn default_max_connections() -> u32 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

impl Default for OrchestratorConfigSpec {
    fn default() -> Self {
        Self {
            catalog: EndpointConfig::new("http://localhost:8081"),
            tenant_directory: EndpointConfig::new("http://localhost:8082"),
            modules: ModuleClientConfig::default(),
            event_bus: EventBusConfig::default(),
            flow: FlowConfig::default(),
            database: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for OrchestratorConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "entitlement-orchestrator".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: OrchestratorConfigSpec::default(),
        }
    }
}

impl OrchestratorConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. ENTITLEMENT_CONFIG_PATH environment variable
    /// 2. ./entitlement-config.yaml (working directory)
    /// 3. ~/.entitlement/config.yaml (user home)
    /// 4. /etc/entitlement/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("ENTITLEMENT_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./entitlement-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".entitlement").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/entitlement/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path fails if missing or invalid
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("ENTITLEMENT_CATALOG_URL") {
            tracing::info!("Environment override: ENTITLEMENT_CATALOG_URL={}", url);
            self.spec.catalog.url = url;
        }

        if let Ok(url) = std::env::var("ENTITLEMENT_TENANT_URL") {
            tracing::info!("Environment override: ENTITLEMENT_TENANT_URL={}", url);
            self.spec.tenant_directory.url = url;
        }

        // The database URL carries credentials, so it is not logged
        if let Ok(url) = std::env::var("ENTITLEMENT_DATABASE_URL") {
            tracing::info!("Environment override: ENTITLEMENT_DATABASE_URL");
            match self.spec.database.as_mut() {
                Some(database) => database.url = url,
                None => {
                    self.spec.database = Some(DatabaseConfig {
                        url,
                        max_connections: default_max_connections(),
                    })
                }
            }
        }
    }

    pub fn storage_backend(&self) -> StorageBackend {
        match &self.spec.database {
            Some(database) => StorageBackend::PostgreSQL(PostgresConfig {
                connection_string: database.url.clone(),
                max_connections: database.max_connections,
            }),
            None => StorageBackend::InMemory,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        for (field, endpoint) in [
            ("spec.catalog", &self.spec.catalog),
            ("spec.tenant_directory", &self.spec.tenant_directory),
        ] {
            if endpoint.url.trim().is_empty() {
                anyhow::bail!("{}.url cannot be empty", field);
            }
            if endpoint.connect_timeout.is_zero() || endpoint.read_timeout.is_zero() {
                anyhow::bail!("{} timeouts must be greater than zero", field);
            }
        }

        if self.spec.modules.connect_timeout.is_zero() || self.spec.modules.read_timeout.is_zero() {
            anyhow::bail!("spec.modules timeouts must be greater than zero");
        }

        if self.spec.event_bus.topic.is_empty() {
            anyhow::bail!("spec.event_bus.topic cannot be empty");
        }
        if self.spec.event_bus.send_timeout.is_zero() {
            anyhow::bail!("spec.event_bus.send_timeout must be greater than zero");
        }
        if self.spec.event_bus.capacity == 0 {
            anyhow::bail!("spec.event_bus.capacity must be greater than zero");
        }

        if let Some(database) = &self.spec.database {
            if database.url.is_empty() {
                anyhow::bail!("spec.database.url cannot be empty");
            }
            if database.max_connections == 0 {
                anyhow::bail!("spec.database.max_connections must be greater than zero");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest() {
        let manifest = OrchestratorConfigManifest::default();
        assert_eq!(manifest.api_version, "entitlements/v1");
        assert_eq!(manifest.kind, "OrchestratorConfig");
        assert_eq!(manifest.spec.flow.default_strategy, ExecutionStrategy::FailFast);
        assert!(matches!(manifest.storage_backend(), StorageBackend::InMemory));
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_yaml_with_humantime_durations() {
        let yaml = r#"
apiVersion: entitlements/v1
kind: OrchestratorConfig
metadata:
  name: test-orchestrator
spec:
  catalog:
    url: http://catalog:8081
    connect_timeout: 2s
    read_timeout: 1m
  tenant_directory:
    url: http://tenants:8082
  event_bus:
    topic: tenant-entitlements
    send_timeout: 500ms
  flow:
    default_strategy: ignore-errors
    purge_on_revoke: true
  database:
    url: postgres://entitlements@db/entitlements
"#;
        let manifest = OrchestratorConfigManifest::from_yaml_str(yaml).unwrap();
        assert_eq!(manifest.spec.catalog.connect_timeout, Duration::from_secs(2));
        assert_eq!(manifest.spec.catalog.read_timeout, Duration::from_secs(60));
        assert_eq!(manifest.spec.tenant_directory.read_timeout, Duration::from_secs(30));
        assert_eq!(manifest.spec.event_bus.send_timeout, Duration::from_millis(500));
        assert_eq!(manifest.spec.event_bus.capacity, 1000);
        assert_eq!(manifest.spec.flow.default_strategy, ExecutionStrategy::IgnoreErrors);
        assert!(manifest.spec.flow.purge_on_revoke);
        assert_eq!(manifest.spec.database.as_ref().unwrap().max_connections, 5);
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_yaml_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entitlement-config.yaml");

        let mut manifest = OrchestratorConfigManifest::default();
        manifest.metadata.name = "roundtrip".to_string();
        manifest.spec.event_bus.send_timeout = Duration::from_secs(3);
        manifest.to_yaml_file(&path).unwrap();

        let parsed = OrchestratorConfigManifest::from_yaml_file(&path).unwrap();
        assert_eq!(parsed.metadata.name, "roundtrip");
        assert_eq!(parsed.spec.event_bus.send_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_explicit_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.yaml");
        assert!(OrchestratorConfigManifest::load_or_default(Some(missing)).is_err());
    }

    #[test]
    fn test_validation() {
        let mut manifest = OrchestratorConfigManifest::default();
        assert!(manifest.validate().is_ok());

        manifest.api_version = "wrong/v1".to_string();
        assert!(manifest.validate().is_err());
        manifest.api_version = API_VERSION.to_string();

        manifest.kind = "NodeConfig".to_string();
        assert!(manifest.validate().is_err());
        manifest.kind = KIND.to_string();

        manifest.spec.catalog.url = " ".to_string();
        assert!(manifest.validate().is_err());
        manifest.spec.catalog.url = "http://catalog".to_string();

        manifest.spec.tenant_directory.read_timeout = Duration::ZERO;
        assert!(manifest.validate().is_err());
        manifest.spec.tenant_directory.read_timeout = Duration::from_secs(1);

        manifest.spec.event_bus.capacity = 0;
        assert!(manifest.validate().is_err());
        manifest.spec.event_bus.capacity = 10;

        manifest.spec.database = Some(DatabaseConfig {
            url: String::new(),
            max_connections: 5,
        });
        assert!(manifest.validate().is_err());
    }
}
