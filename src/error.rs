//! Custom error types for the integration layer.
//!
//! `IntegrationError` is the single error type returned by the manager and the
//! REST layer. Built with `thiserror`, it separates the three failure kinds the
//! manager can produce from the plumbing errors of the server around it:
//!
//! - **`InvalidStateTransition`**: the requested operation is not permitted in
//!   the current derived state (e.g. `start` while `INITIALIZED`).
//! - **`InvalidConfig`**: a configuration section failed validation. Raised
//!   before any subsystem is touched.
//! - **`SubsystemCallFailed`**: a call into the writer, backend or detector
//!   client failed. Propagated as-is; partially issued calls are not rolled back.
//! - **`InvalidRequest`**: a malformed REST request body.
//! - **`Config`** / **`Io`**: server configuration loading and socket errors.

use crate::core::{IntegrationStatus, Subsystem};
use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, IntegrationError>;

#[allow(missing_docs)]
#[derive(Error, Debug)]
pub enum IntegrationError {
    #[error("Cannot {operation} in {state} state.")]
    InvalidStateTransition {
        operation: &'static str,
        state: IntegrationStatus,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{subsystem} call failed: {message}")]
    SubsystemCallFailed {
        subsystem: Subsystem,
        message: String,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntegrationError {
    /// Wrap a client failure, keeping the full `anyhow` context chain.
    pub fn subsystem(subsystem: Subsystem, err: anyhow::Error) -> Self {
        IntegrationError::SubsystemCallFailed {
            subsystem,
            message: format!("{err:#}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IntegrationError::InvalidStateTransition {
            operation: "start acquisition",
            state: IntegrationStatus::Initialized,
        };
        assert_eq!(
            err.to_string(),
            "Cannot start acquisition in INITIALIZED state."
        );
    }

    #[test]
    fn test_subsystem_error_keeps_context() {
        let cause = anyhow::anyhow!("connection refused").context("POST /state/open");
        let err = IntegrationError::subsystem(Subsystem::Backend, cause);
        assert_eq!(
            err.to_string(),
            "backend call failed: POST /state/open: connection refused"
        );
    }
}
