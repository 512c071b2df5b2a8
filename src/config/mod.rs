//! Configuration module
//!
//! Handles loading and saving SensorNet gateway configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::gateway::GatewayConfig;
use crate::protocol::DEFAULT_ENDPOINT;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Discovery endpoint settings
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Gateway name; prefixes auto-created device names
    pub name: String,
    /// Enable verbose logging
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            name: hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_else(|_| "sensornet".to_string()),
            verbose: false,
        }
    }
}

/// Discovery endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// UDP endpoint sensor nodes broadcast to, `address:port`
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Create visible devices from presentation/set messages
    #[serde(default)]
    pub auto_create: bool,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            auto_create: false,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default location
    pub fn load_default() -> ConfigResult<Self> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("sensornet/config.toml")),
            Some(PathBuf::from("./sensornet.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                return Self::load(path);
            }
        }

        // Return default config if no file found
        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Derive the gateway server configuration
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig::new(self.discovery.endpoint.clone())
            .with_auto_create(self.discovery.auto_create)
            .with_name(self.general.name.clone())
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config() -> String {
    let config = Config {
        general: GeneralConfig {
            name: "Living Room Gateway".to_string(),
            verbose: false,
        },
        discovery: DiscoveryConfig {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            auto_create: true,
        },
    };

    toml::to_string_pretty(&config).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.discovery.endpoint, DEFAULT_ENDPOINT);
        assert!(!config.discovery.auto_create);
    }

    #[test]
    fn test_save_and_load() {
        let config = Config::default();
        let file = NamedTempFile::new().unwrap();

        config.save(file.path()).unwrap();

        let loaded = Config::load(file.path()).unwrap();
        assert_eq!(loaded.discovery.endpoint, config.discovery.endpoint);
        assert_eq!(loaded.general.name, config.general.name);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/sensornet.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_sample_config() {
        let sample = generate_sample_config();
        let parsed: Config = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.general.name, "Living Room Gateway");
        assert!(parsed.discovery.auto_create);
    }

    #[test]
    fn test_gateway_config_conversion() {
        let mut config = Config::default();
        config.discovery.auto_create = true;
        config.general.name = "GW".to_string();

        let gateway = config.gateway_config();
        assert_eq!(gateway.endpoint, DEFAULT_ENDPOINT);
        assert!(gateway.auto_create);
        assert_eq!(gateway.name, "GW");
    }
}
