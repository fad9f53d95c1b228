//! Server configuration
//!
//! Configuration management for the integration server using Figment.
//!
//! # Configuration Sources
//!
//! Configuration is loaded from (in order of precedence):
//! 1. Command-line flags (merged by the binary)
//! 2. Environment variables prefixed with `DAQ_INTEGRATION_`
//! 3. TOML configuration file (default: `config/daq_integration.toml`)
//! 4. Built-in defaults
//!
//! # Example
//!
//! ```no_run
//! use daq_integration::config::ServerConfig;
//!
//! let config = ServerConfig::load().unwrap();
//! println!("Listening on {}", config.bind_address());
//! println!("Backend: {}", config.backend.url);
//! ```
//!
//! # Environment Variables
//!
//! Nested keys are separated by a double underscore:
//!
//! ```text
//! DAQ_INTEGRATION_SERVER__PORT=10001
//! DAQ_INTEGRATION_BACKEND__URL=http://backend:8080
//! DAQ_INTEGRATION_LOGGING__LEVEL=info
//! ```

pub mod server_config;

pub use server_config::{
    BackendConfig, ClientConfig, ConfigError, DetectorConfig, ListenConfig, LoggingConfig,
    ServerConfig, WriterConfig, DEFAULT_CONFIG_PATH, ENV_PREFIX,
};
