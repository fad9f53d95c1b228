//! Configuration validation and status interpretation.
//!
//! A [`Validator`] is chosen when the [`IntegrationManager`](crate::manager::IntegrationManager)
//! is built. It encodes the knowledge specific to one beamline setup: which
//! keys each subsystem requires, how the writer output path is normalized, and
//! how the opaque detector state is read.
//!
//! The decision table mapping the three raw signals onto one
//! [`IntegrationStatus`] is shared by all validators through
//! [`interpret_status`].

pub mod csaxs;

pub use csaxs::CsaxsEiger9mValidator;

use crate::core::{ConfigSection, IntegrationStatus, StatusDetails, Subsystem};
use crate::error::{AppResult, IntegrationError};
use serde_json::Value;

/// Detector states that count as "running".
const DETECTOR_RUNNING_STATES: [&str; 3] = ["running", "waiting", "transmitting"];

/// Validation capability of the integration manager.
///
/// All methods are pure: they never talk to a subsystem.
pub trait Validator: Send + Sync {
    /// Short identifier reported in the server info.
    fn name(&self) -> &'static str;

    /// Check the writer section. May normalize values in place.
    fn validate_writer_config(&self, config: &mut ConfigSection) -> AppResult<()>;

    /// Check the backend section.
    fn validate_backend_config(&self, config: &ConfigSection) -> AppResult<()>;

    /// Check the detector section. Accepts anything by default; the detector
    /// validates its own parameters.
    fn validate_detector_config(&self, _config: &ConfigSection) -> AppResult<()> {
        Ok(())
    }

    /// Whether the opaque detector state means "acquiring".
    fn is_detector_running(&self, detector_state: &Value) -> bool {
        match detector_state {
            Value::Bool(running) => *running,
            Value::String(state) => {
                let state = state.trim().to_ascii_lowercase();
                DETECTOR_RUNNING_STATES.contains(&state.as_str())
            }
            _ => false,
        }
    }

    /// Map the raw subsystem signals onto one logical state.
    fn interpret_status(&self, details: &StatusDetails) -> IntegrationStatus {
        interpret_status(
            details.writer,
            &details.backend,
            self.is_detector_running(&details.detector),
        )
    }
}

/// Decision table over the three subsystem signals.
///
/// "All idle" is checked first, then "all running"; every other combination
/// is `Error`. Mixed states are never reclassified as configured or running.
pub fn interpret_status(
    writer_running: bool,
    backend_state: &str,
    detector_running: bool,
) -> IntegrationStatus {
    if !writer_running && !detector_running {
        match backend_state {
            "INITIALIZED" => return IntegrationStatus::Initialized,
            "CONFIGURED" => return IntegrationStatus::Configured,
            _ => {}
        }
    } else if writer_running && detector_running && backend_state == "OPEN" {
        return IntegrationStatus::Running;
    }

    IntegrationStatus::Error
}

/// Fail with `InvalidConfig` when any of `required` is absent from `config`.
pub fn require_keys(
    subsystem: Subsystem,
    config: &ConfigSection,
    required: &[&str],
) -> AppResult<()> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|key| !config.contains_key(*key))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(IntegrationError::InvalidConfig(format!(
            "{} configuration missing mandatory parameters: {}",
            subsystem,
            missing.join(", ")
        )))
    }
}
