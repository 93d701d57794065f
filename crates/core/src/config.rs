//! deskcal Configuration
//!
//! Configuration structures with defaults expressed through serde attributes,
//! plus the loader and validator used by the binary.

use crate::error::DeskcalError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

// ============================================================================
// Constants
// ============================================================================

/// Default gateway host
pub const DEFAULT_GATEWAY_HOST: &str = "127.0.0.1";
/// Default gateway port
pub const DEFAULT_GATEWAY_PORT: u16 = 18790;
/// Default WebSocket path
pub const DEFAULT_WS_PATH: &str = "/ws";
/// Default SQLite file name inside the deskcal directory
pub const DEFAULT_DB_FILE: &str = "bookings.sqlite";

// ============================================================================
// Helper functions for paths (required for serde defaults)
// ============================================================================

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn default_deskcal_dir() -> PathBuf {
    home_dir().join(".deskcal")
}

// ============================================================================
// Main Config
// ============================================================================

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Booking store configuration
    #[serde(default)]
    pub store: StoreConfig,
    /// Locations seeded into the store at startup
    #[serde(default)]
    pub locations: Vec<LocationSeed>,
}

// ============================================================================
// Gateway Config
// ============================================================================

/// Gateway server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway host
    #[serde(default = "GatewayConfig::default_host")]
    pub host: String,
    /// Gateway port
    #[serde(default = "GatewayConfig::default_port")]
    pub port: u16,
    /// WebSocket path
    #[serde(default = "GatewayConfig::default_ws_path")]
    pub ws_path: String,
}

impl GatewayConfig {
    fn default_host() -> String {
        DEFAULT_GATEWAY_HOST.to_string()
    }
    fn default_port() -> u16 {
        DEFAULT_GATEWAY_PORT
    }
    fn default_ws_path() -> String {
        DEFAULT_WS_PATH.to_string()
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_GATEWAY_HOST.to_string(),
            port: DEFAULT_GATEWAY_PORT,
            ws_path: DEFAULT_WS_PATH.to_string(),
        }
    }
}

// ============================================================================
// Store Config
// ============================================================================

/// Which booking store backs the service
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local store, lost on restart
    Memory,
    /// SQLite file at `db_path`
    #[default]
    Sqlite,
}

/// Booking store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Database path for the sqlite backend
    #[serde(default = "StoreConfig::default_db_path")]
    pub db_path: PathBuf,
}

impl StoreConfig {
    fn default_db_path() -> PathBuf {
        default_deskcal_dir().join(DEFAULT_DB_FILE)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            db_path: Self::default_db_path(),
        }
    }
}

// ============================================================================
// Locations
// ============================================================================

/// A bookable office location and how many people it holds per day
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocationSeed {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub capacity: u32,
}

// ============================================================================
// Config Loading and Validation
// ============================================================================

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file or default locations
    pub fn load(path: Option<&str>) -> Result<Config, DeskcalError> {
        let config_path = Self::resolve_config_path(path)?;
        Self::load_from(&config_path)
    }

    /// Like `load`, but falls back to defaults when none of the default
    /// locations has a file. An explicit path must exist.
    pub fn load_or_default(path: Option<&str>) -> Result<Config, DeskcalError> {
        if path.is_some() {
            return Self::load(path);
        }
        match Self::resolve_config_path(None) {
            Ok(config_path) => Self::load_from(&config_path),
            Err(DeskcalError::Domain(crate::error::DomainError::ConfigNotFound { path })) => {
                tracing::warn!("{}; using built-in defaults", path);
                Ok(Config::default())
            }
            Err(e) => Err(e),
        }
    }

    pub fn load_from(config_path: &Path) -> Result<Config, DeskcalError> {
        let content = std::fs::read_to_string(config_path)
            .map_err(|e| DeskcalError::config_parse_error(format!("Failed to read: {}", e)))?;
        let config: Config = serde_yml::from_str(&content)
            .map_err(|e| DeskcalError::config_parse_error(format!("Failed to parse: {}", e)))?;
        tracing::debug!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    /// Resolve configuration file path
    fn resolve_config_path(path: Option<&str>) -> Result<PathBuf, DeskcalError> {
        if let Some(p) = path {
            let p = PathBuf::from(p);
            if !p.exists() {
                return Err(DeskcalError::config_not_found(format!(
                    "Config not found at {}",
                    p.display()
                )));
            }
            return Ok(p);
        }

        let default_paths = [
            default_deskcal_dir().join("config.yaml"),
            PathBuf::from("./deskcal.yaml"),
        ];

        default_paths
            .into_iter()
            .find(|p| p.exists())
            .ok_or_else(|| {
                DeskcalError::config_not_found(
                    "Config not found. Run `deskcal config-sample` or create ~/.deskcal/config.yaml",
                )
            })
    }
}

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate configuration
    pub fn validate(config: &Config) -> Result<(), DeskcalError> {
        if config.gateway.port == 0 {
            return Err(DeskcalError::config_invalid(
                "gateway.port",
                "Port must not be zero",
            ));
        }

        if !config.gateway.ws_path.starts_with('/') {
            return Err(DeskcalError::config_invalid(
                "gateway.ws_path",
                format!("Path '{}' must start with '/'", config.gateway.ws_path),
            ));
        }

        let mut seen = HashSet::new();
        for location in &config.locations {
            let id = location.id.trim();
            if id.is_empty() {
                return Err(DeskcalError::config_invalid(
                    "locations.id",
                    "Location id cannot be empty",
                ));
            }
            // Room keys are colon-delimited.
            if id.contains(':') {
                return Err(DeskcalError::config_invalid(
                    "locations.id",
                    format!("Location id '{}' must not contain ':'", id),
                ));
            }
            if !seen.insert(id) {
                return Err(DeskcalError::config_invalid(
                    "locations.id",
                    format!("Duplicate location id '{}'", id),
                ));
            }
        }

        Ok(())
    }
}

impl Config {
    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), DeskcalError> {
        let content = serde_yml::to_string(self).map_err(|e| {
            DeskcalError::config_parse_error(format!("Serialization failed: {}", e))
        })?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Generate a sample configuration
    pub fn sample() -> Self {
        Config {
            gateway: GatewayConfig::default(),
            store: StoreConfig::default(),
            locations: vec![
                LocationSeed {
                    id: "loc1".to_string(),
                    name: "Head Office".to_string(),
                    capacity: 21,
                },
                LocationSeed {
                    id: "loc2".to_string(),
                    name: "Harbour Annex".to_string(),
                    capacity: 12,
                },
            ],
        }
    }
}
