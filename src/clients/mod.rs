//! Subsystem client contracts and implementations.
//!
//! The manager only depends on the three traits defined here. Concrete
//! clients:
//!
//! - [`BackendRestClient`] and [`WriterRestClient`] talk HTTP/JSON via `reqwest`.
//! - [`DetectorCliClient`] drives the detector command-line tools.
//! - [`mock`] provides in-process doubles for tests and `--mock` mode.
//!
//! Retries and backoff are not handled here; a failed call surfaces to the
//! manager as an error.

pub mod backend;
pub mod detector;
pub mod mock;
pub mod writer;

pub use backend::BackendRestClient;
pub use detector::DetectorCliClient;
pub use mock::{CallJournal, MockBackendClient, MockDetectorClient, MockWriterClient};
pub use writer::WriterRestClient;

use crate::core::ConfigSection;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status body reported by the writer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriterStatus {
    /// Whether the writer is currently writing.
    pub is_running: bool,
}

/// Backend stream-processing service.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Where the backend lives, for logs and server info.
    fn address(&self) -> String;

    /// Open the backend for incoming data.
    async fn open(&self) -> Result<()>;

    /// Close the backend.
    async fn close(&self) -> Result<()>;

    /// Return the backend to its initialized state.
    async fn reset(&self) -> Result<()>;

    /// Push a configuration. Only accepted while initialized.
    async fn set_config(&self, config: &ConfigSection) -> Result<()>;

    /// Current backend state name.
    async fn get_status(&self) -> Result<String>;
}

/// Data writer.
#[async_trait]
pub trait WriterClient: Send + Sync {
    /// Where the writer lives, for logs and server info.
    fn address(&self) -> String;

    /// Start writing.
    async fn start(&self) -> Result<()>;

    /// Stop writing. Stopping an idle writer is not an error.
    async fn stop(&self) -> Result<()>;

    /// Push writer parameters.
    async fn set_parameters(&self, parameters: &ConfigSection) -> Result<()>;

    /// Current writer status.
    async fn get_status(&self) -> Result<WriterStatus>;
}

/// Detector controller.
#[async_trait]
pub trait DetectorClient: Send + Sync {
    /// Start the acquisition.
    async fn start(&self) -> Result<()>;

    /// Stop the acquisition.
    async fn stop(&self) -> Result<()>;

    /// Push a configuration, one parameter at a time.
    async fn set_config(&self, config: &ConfigSection) -> Result<()>;

    /// Current detector state; its shape is up to the detector.
    async fn get_status(&self) -> Result<Value>;

    /// Read a single detector parameter.
    async fn get_value(&self, name: &str) -> Result<Value>;

    /// Write a single detector parameter and return the value now set.
    async fn set_value(&self, name: &str, value: &Value) -> Result<Value>;
}
