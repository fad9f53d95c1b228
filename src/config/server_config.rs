//! Server configuration loaded with Figment.
//!
//! Sources, lowest to highest precedence:
//! 1. Built-in defaults
//! 2. TOML file (default `config/daq_integration.toml`, missing file is fine)
//! 3. Environment variables prefixed with `DAQ_INTEGRATION_`, nested keys
//!    separated by `__` (e.g. `DAQ_INTEGRATION_SERVER__PORT=10001`)
//! 4. Command-line overrides merged by the binary

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/daq_integration.toml";
/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "DAQ_INTEGRATION_";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File, environment or override could not be read or extracted
    #[error("Configuration load error: {0}")]
    LoadError(#[from] Box<figment::Error>),
    /// Values were read but are not usable
    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}

/// Top-level server configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// REST listener
    pub server: ListenConfig,
    /// Backend service
    pub backend: BackendConfig,
    /// Writer node
    pub writer: WriterConfig,
    /// Detector command-line tools
    pub detector: DetectorConfig,
    /// Subsystem HTTP clients
    pub client: ClientConfig,
    /// Logging
    pub logging: LoggingConfig,
}

/// Where the REST API listens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// Interface to bind to
    pub interface: String,
    /// TCP port
    pub port: u16,
}

/// Backend service location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL, without the `/v1` suffix
    pub url: String,
}

/// Writer node location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Base URL of the node server
    pub url: String,
    /// Name of the writer instance on that server
    pub instance_name: String,
}

/// Detector command-line tools
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Executable used to read parameters
    pub get_command: String,
    /// Executable used to write parameters
    pub put_command: String,
}

/// HTTP client settings shared by backend and writer clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error)
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            interface: "0.0.0.0".to_string(),
            port: 10000,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
        }
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8083".to_string(),
            instance_name: "writer".to_string(),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            get_command: "sls_detector_get".to_string(),
            put_command: "sls_detector_put".to_string(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { timeout_ms: 5000 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "debug".to_string(),
            json: false,
        }
    }
}

impl ClientConfig {
    /// Request timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// ============================================================================
// Configuration Loading and Validation
// ============================================================================

impl ServerConfig {
    /// Figment with defaults, the given TOML file and environment overrides.
    ///
    /// Callers may merge further providers (e.g. CLI flags) before passing
    /// the result to [`ServerConfig::from_figment`].
    pub fn figment<P: AsRef<Path>>(path: P) -> Figment {
        Figment::from(Serialized::defaults(ServerConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load configuration from the default file location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment(path))
    }

    /// Extract and validate.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment
            .extract()
            .map_err(|e| ConfigError::LoadError(Box::new(e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    ///
    /// Checks:
    /// - Log level is valid (trace, debug, info, warn, error)
    /// - Port is not 0
    /// - Backend and writer URLs are http(s) URLs
    /// - Writer instance and detector commands are not empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            )));
        }

        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be > 0".to_string(),
            ));
        }

        for (name, url) in [("backend", &self.backend.url), ("writer", &self.writer.url)] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid {name} url '{url}'. Must start with http:// or https://"
                )));
            }
        }

        if self.writer.instance_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Writer instance name cannot be empty".to_string(),
            ));
        }

        if self.detector.get_command.trim().is_empty()
            || self.detector.put_command.trim().is_empty()
        {
            return Err(ConfigError::ValidationError(
                "Detector get/put commands cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// `interface:port` to bind the REST API to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.interface, self.server.port)
    }
}
