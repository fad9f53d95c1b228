//! Validator for the cSAXS Eiger 9M setup.
//!
//! The writer needs an `output_file` ending in `.h5` (appended when missing).
//! The backend needs `bit_depth`, `period` and `n_frames`. Detector parameters
//! are left to the detector itself.

use super::{require_keys, Validator};
use crate::core::{ConfigSection, Subsystem};
use crate::error::{AppResult, IntegrationError};
use serde_json::Value;

/// Keys the writer refuses to start without.
pub const WRITER_REQUIRED_KEYS: [&str; 1] = ["output_file"];
/// Keys the backend refuses to configure without.
pub const BACKEND_REQUIRED_KEYS: [&str; 3] = ["bit_depth", "period", "n_frames"];
/// Suffix enforced on the writer output file.
pub const OUTPUT_FILE_SUFFIX: &str = ".h5";

/// cSAXS Eiger 9M validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsaxsEiger9mValidator;

impl Validator for CsaxsEiger9mValidator {
    fn name(&self) -> &'static str {
        "csaxs_eiger9m"
    }

    fn validate_writer_config(&self, config: &mut ConfigSection) -> AppResult<()> {
        require_keys(Subsystem::Writer, config, &WRITER_REQUIRED_KEYS)?;

        match config.get_mut("output_file") {
            Some(Value::String(path)) => {
                if !path.ends_with(OUTPUT_FILE_SUFFIX) {
                    path.push_str(OUTPUT_FILE_SUFFIX);
                }
                Ok(())
            }
            other => Err(IntegrationError::InvalidConfig(format!(
                "writer 'output_file' must be a string, got {}",
                other.map(|value| value.to_string()).unwrap_or_default()
            ))),
        }
    }

    fn validate_backend_config(&self, config: &ConfigSection) -> AppResult<()> {
        require_keys(Subsystem::Backend, config, &BACKEND_REQUIRED_KEYS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{IntegrationStatus, StatusDetails};
    use serde_json::json;

    fn section(value: Value) -> ConfigSection {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_output_file_suffix_appended() {
        let mut config = section(json!({"output_file": "/tmp/a"}));
        CsaxsEiger9mValidator.validate_writer_config(&mut config).unwrap();
        assert_eq!(config["output_file"], json!("/tmp/a.h5"));
    }

    #[test]
    fn test_output_file_suffix_kept() {
        let mut config = section(json!({"output_file": "/tmp/a.h5", "user_id": 3}));
        CsaxsEiger9mValidator.validate_writer_config(&mut config).unwrap();
        assert_eq!(config, section(json!({"output_file": "/tmp/a.h5", "user_id": 3})));
    }

    #[test]
    fn test_writer_missing_output_file() {
        let mut config = section(json!({"user_id": 0}));
        let err = CsaxsEiger9mValidator
            .validate_writer_config(&mut config)
            .unwrap_err();
        assert!(matches!(err, IntegrationError::InvalidConfig(_)));
    }

    #[test]
    fn test_writer_output_file_not_a_string() {
        let mut config = section(json!({"output_file": 42}));
        assert!(CsaxsEiger9mValidator
            .validate_writer_config(&mut config)
            .is_err());
    }

    #[test]
    fn test_backend_each_key_required() {
        let full = section(json!({"bit_depth": 16, "period": 0.1, "n_frames": 10}));
        CsaxsEiger9mValidator.validate_backend_config(&full).unwrap();

        for key in BACKEND_REQUIRED_KEYS {
            let mut partial = full.clone();
            partial.remove(key);
            let err = CsaxsEiger9mValidator
                .validate_backend_config(&partial)
                .unwrap_err();
            assert!(err.to_string().contains(key), "{err}");
        }
    }

    #[test]
    fn test_detector_accepts_anything() {
        CsaxsEiger9mValidator
            .validate_detector_config(&section(json!({"whatever": [1, 2, 3]})))
            .unwrap();
        CsaxsEiger9mValidator
            .validate_detector_config(&ConfigSection::new())
            .unwrap();
    }

    #[test]
    fn test_detector_state_reading() {
        let v = CsaxsEiger9mValidator;
        assert!(v.is_detector_running(&json!("running")));
        assert!(v.is_detector_running(&json!("Waiting")));
        assert!(v.is_detector_running(&json!(true)));
        assert!(!v.is_detector_running(&json!("idle")));
        assert!(!v.is_detector_running(&json!(null)));
        assert!(!v.is_detector_running(&json!({"status": "running"})));
    }

    #[test]
    fn test_interpret_status_with_detector_strings() {
        let details = StatusDetails {
            writer: true,
            backend: "OPEN".to_string(),
            detector: json!("running"),
        };
        assert_eq!(
            CsaxsEiger9mValidator.interpret_status(&details),
            IntegrationStatus::Running
        );

        let details = StatusDetails {
            writer: false,
            backend: "CONFIGURED".to_string(),
            detector: json!("idle"),
        };
        assert_eq!(
            CsaxsEiger9mValidator.interpret_status(&details),
            IntegrationStatus::Configured
        );
    }
}
