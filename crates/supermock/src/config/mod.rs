//! Configuration types for supermock.
//!
//! Every section has defaults, so an empty file (or no file at all) is a
//! valid configuration. Command-line flags are applied on top by the binary.

mod listen;
mod routing;
mod scripting;
mod storage;
mod upstream;

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub use listen::ListenConfig;
pub use routing::RoutingConfig;
pub use scripting::ScriptingConfig;
pub use storage::{StorageBackend, StorageConfig};
pub use upstream::ProxyConfig;

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// HTTP client used by proxy rules
    #[serde(default)]
    pub proxy: ProxyConfig,
    /// Limits for custom rule scripts
    #[serde(default)]
    pub scripting: ScriptingConfig,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = if contents.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.listen.port != 0 && self.listen.port == self.listen.admin_port {
            anyhow::bail!(
                "Mock port and admin port must differ (both are {})",
                self.listen.port
            );
        }

        if self.storage.backend == StorageBackend::File && self.storage.path.is_none() {
            anyhow::bail!("storage.path is required when storage.backend is 'file'");
        }

        if self.proxy.timeout_ms == 0 {
            anyhow::bail!("proxy.timeout_ms must be greater than 0");
        }

        self.scripting.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let yaml = r#"
listen:
  host: 127.0.0.1
  port: 8080
  admin_port: 8081
routing:
  debounce_ms: 50
storage:
  backend: file
  path: /tmp/supermock/db.json
proxy:
  timeout_ms: 5000
scripting:
  max_operations: 1000
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.listen.host, "127.0.0.1");
        assert_eq!(config.listen.port, 8080);
        assert_eq!(config.listen.admin_port, 8081);
        assert_eq!(config.routing.debounce_ms, 50);
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.proxy.timeout_ms, 5000);
        assert!(!config.proxy.accept_invalid_certs);
        assert_eq!(config.scripting.max_operations, 1000);
        assert_eq!(
            config.scripting.max_call_levels,
            ScriptingConfig::default().max_call_levels
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.listen.port, 3000);
        assert_eq!(config.listen.admin_port, 2525);
        assert_eq!(config.routing.debounce_ms, 100);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_file_backend_without_path() {
        let mut config = Config::default();
        config.storage.backend = StorageBackend::File;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("storage.path"));
    }

    #[test]
    fn test_validate_rejects_shared_port() {
        let mut config = Config::default();
        config.listen.admin_port = config.listen.port;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("supermock.yaml");
        std::fs::write(&path, "listen:\n  port: 4000\n").unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.listen.port, 4000);

        std::fs::write(&path, "").unwrap();
        assert_eq!(Config::from_file(&path).unwrap(), Config::default());
    }
}
