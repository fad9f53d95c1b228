//! Core data types shared by the integration manager, the validators and the
//! REST layer.
//!
//! # Overview
//!
//! - [`IntegrationStatus`]: the unified state of the acquisition system. It is
//!   never stored, only derived from a fresh [`StatusDetails`] snapshot.
//! - [`StatusDetails`]: the three raw signals reported by writer, backend and
//!   detector.
//! - [`AcquisitionConfig`]: the three per-subsystem configuration sections.
//! - [`ConfigUpdate`]: a partial configuration, merged key-wise into an
//!   existing [`AcquisitionConfig`].
//!
//! Configuration sections are open JSON objects. There is no schema shared
//! between subsystems; each validator decides which keys it requires.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// An open configuration section (string keys to arbitrary JSON values).
pub type ConfigSection = Map<String, Value>;

/// The three subsystems coordinated by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subsystem {
    /// Data writer (file sink).
    Writer,
    /// Backend stream-processing service.
    Backend,
    /// Detector controller (data source).
    Detector,
}

impl Subsystem {
    /// Name used as key in JSON bodies and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Subsystem::Writer => "writer",
            Subsystem::Backend => "backend",
            Subsystem::Detector => "detector",
        }
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified state of the whole acquisition system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrationStatus {
    /// All subsystems idle, backend waiting for configuration.
    Initialized,
    /// All subsystems idle, backend configured.
    Configured,
    /// Writer and detector running, backend open.
    Running,
    /// Any combination of signals that is not consistent across subsystems.
    Error,
}

impl IntegrationStatus {
    /// Wire representation, e.g. `"CONFIGURED"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationStatus::Initialized => "INITIALIZED",
            IntegrationStatus::Configured => "CONFIGURED",
            IntegrationStatus::Running => "RUNNING",
            IntegrationStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for IntegrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw status signals read from the three subsystems.
///
/// The three reads are independent and may observe slightly different points
/// in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusDetails {
    /// Whether the writer reports `is_running`.
    pub writer: bool,
    /// Backend state name (e.g. `"INITIALIZED"`, `"CONFIGURED"`, `"OPEN"`).
    pub backend: String,
    /// Detector state, opaque to the manager.
    pub detector: Value,
}

/// The last applied configuration of all three subsystems.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Writer parameters.
    pub writer: ConfigSection,
    /// Backend configuration.
    pub backend: ConfigSection,
    /// Detector configuration.
    pub detector: ConfigSection,
}

impl AcquisitionConfig {
    /// Build a config from the three sections.
    pub fn new(writer: ConfigSection, backend: ConfigSection, detector: ConfigSection) -> Self {
        Self {
            writer,
            backend,
            detector,
        }
    }

    /// Borrow one section.
    pub fn section(&self, subsystem: Subsystem) -> &ConfigSection {
        match subsystem {
            Subsystem::Writer => &self.writer,
            Subsystem::Backend => &self.backend,
            Subsystem::Detector => &self.detector,
        }
    }

    fn section_mut(&mut self, subsystem: Subsystem) -> &mut ConfigSection {
        match subsystem {
            Subsystem::Writer => &mut self.writer,
            Subsystem::Backend => &mut self.backend,
            Subsystem::Detector => &mut self.detector,
        }
    }
}

/// Partial configuration. Missing, `null` or empty sections leave the
/// corresponding stored section untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigUpdate {
    /// Keys to merge into the writer section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writer: Option<ConfigSection>,
    /// Keys to merge into the backend section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<ConfigSection>,
    /// Keys to merge into the detector section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detector: Option<ConfigSection>,
}

impl ConfigUpdate {
    /// Borrow the update for one subsystem, if it carries any keys.
    pub fn section(&self, subsystem: Subsystem) -> Option<&ConfigSection> {
        let section = match subsystem {
            Subsystem::Writer => self.writer.as_ref(),
            Subsystem::Backend => self.backend.as_ref(),
            Subsystem::Detector => self.detector.as_ref(),
        };
        section.filter(|s| !s.is_empty())
    }

    /// Merge this update key-wise into `base` and return the result.
    pub fn merged_into(&self, mut base: AcquisitionConfig) -> AcquisitionConfig {
        for subsystem in [Subsystem::Writer, Subsystem::Backend, Subsystem::Detector] {
            if let Some(update) = self.section(subsystem) {
                let target = base.section_mut(subsystem);
                for (key, value) in update {
                    target.insert(key.clone(), value.clone());
                }
            }
        }
        base
    }
}

/// What an operator may read directly from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendQuery {
    /// The backend's own state string.
    Status,
    /// The last backend section applied through this server.
    Config,
}

impl BackendQuery {
    /// Every supported query, in the order they are listed to users.
    pub const ALL: [BackendQuery; 2] = [BackendQuery::Status, BackendQuery::Config];

    /// Path segment naming this query.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendQuery::Status => "status",
            BackendQuery::Config => "config",
        }
    }
}

impl std::str::FromStr for BackendQuery {
    type Err = String;

    fn from_str(action: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|query| query.as_str() == action)
            .ok_or_else(|| {
                let supported: Vec<_> = Self::ALL.iter().map(BackendQuery::as_str).collect();
                format!(
                    "Action '{action}' not supported. Currently supported actions: {}",
                    supported.join(", ")
                )
            })
    }
}

impl fmt::Display for BackendQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static information about this integration server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Crate version.
    pub version: String,
    /// Name of the validator the manager was built with.
    pub validator: String,
    /// Backend address as reported by its client.
    pub backend_address: String,
    /// Writer address as reported by its client.
    pub writer_address: String,
    /// When the manager was created.
    pub started_at: DateTime<Utc>,
}
