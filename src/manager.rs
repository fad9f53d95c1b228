//! The integration manager: one state machine over writer, backend and detector.
//!
//! # State
//!
//! The manager never stores the system state. Every decision starts from a
//! fresh [`StatusDetails`] snapshot interpreted by the [`Validator`]:
//!
//! ```text
//! INITIALIZED --configure--> CONFIGURED --start--> RUNNING
//!      ^                         |                    |
//!      +---------reset-----------+--------stop--------+
//! ```
//!
//! `configure` is also accepted in `CONFIGURED` (an implicit reset runs
//! first, the backend only takes configuration while initialized). `ERROR`
//! is left through `reset`.
//!
//! # Ordering
//!
//! Subsystem calls are issued one after the other, never in parallel:
//!
//! - configure: backend, writer, detector
//! - start: backend open, writer start, detector start (sink before source)
//! - stop: backend close, writer stop, detector stop, then reset
//! - reset: backend reset, writer stop, detector stop
//!
//! Failed calls are propagated, not retried and not rolled back. The next
//! status query reports whatever the subsystems now say, usually `ERROR`.
//!
//! # Concurrency
//!
//! Mutating operations hold one async mutex from the first status read to the
//! last subsystem call, so two callers cannot interleave a configure with a
//! reset. The same mutex guards the last applied configuration, which is only
//! ever replaced as a whole.

use crate::clients::{BackendClient, DetectorClient, WriterClient};
use crate::core::{
    AcquisitionConfig, BackendQuery, ConfigSection, ConfigUpdate, IntegrationStatus, ServerInfo,
    StatusDetails, Subsystem,
};
use crate::error::{AppResult, IntegrationError};
use crate::logging::AUDIT_TARGET;
use crate::validation::Validator;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

async fn call<T>(
    subsystem: Subsystem,
    fut: impl Future<Output = anyhow::Result<T>>,
) -> AppResult<T> {
    fut.await
        .map_err(|err| IntegrationError::subsystem(subsystem, err))
}

/// Coordinates the three subsystems behind one state machine.
pub struct IntegrationManager {
    backend: Arc<dyn BackendClient>,
    writer: Arc<dyn WriterClient>,
    detector: Arc<dyn DetectorClient>,
    validator: Arc<dyn Validator>,
    /// Last applied configuration. Locked for the whole duration of every
    /// mutating operation.
    last_config: Mutex<AcquisitionConfig>,
    started_at: DateTime<Utc>,
}

impl IntegrationManager {
    /// Build a manager over the given clients and validator.
    pub fn new(
        backend: Arc<dyn BackendClient>,
        writer: Arc<dyn WriterClient>,
        detector: Arc<dyn DetectorClient>,
        validator: Arc<dyn Validator>,
    ) -> Self {
        info!(
            target: AUDIT_TARGET,
            backend = %backend.address(),
            writer = %writer.address(),
            validator = validator.name(),
            "Setting up integration manager"
        );

        Self {
            backend,
            writer,
            detector,
            validator,
            last_config: Mutex::new(AcquisitionConfig::default()),
            started_at: Utc::now(),
        }
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Read the raw signals of all three subsystems. Never cached.
    pub async fn get_status_details(&self) -> AppResult<StatusDetails> {
        let writer = call(Subsystem::Writer, self.writer.get_status()).await?;
        let backend = call(Subsystem::Backend, self.backend.get_status()).await?;
        let detector = call(Subsystem::Detector, self.detector.get_status()).await?;

        let details = StatusDetails {
            writer: writer.is_running,
            backend,
            detector,
        };
        debug!(?details, "Detailed status requested");
        Ok(details)
    }

    /// Derive the unified state from a fresh status snapshot.
    pub async fn get_status(&self) -> AppResult<IntegrationStatus> {
        let details = self.get_status_details().await?;
        Ok(self.validator.interpret_status(&details))
    }

    /// Copy of the last successfully applied configuration.
    pub async fn get_acquisition_config(&self) -> AcquisitionConfig {
        self.last_config.lock().await.clone()
    }

    /// Versions and addresses of this server.
    pub fn get_server_info(&self) -> ServerInfo {
        ServerInfo {
            version: env!("CARGO_PKG_VERSION").to_string(),
            validator: self.validator.name().to_string(),
            backend_address: self.backend.address(),
            writer_address: self.writer.address(),
            started_at: self.started_at,
        }
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Validate and apply a full configuration to all three subsystems.
    ///
    /// Returns the configuration as stored (writer output path normalized).
    pub async fn set_acquisition_config(
        &self,
        config: AcquisitionConfig,
    ) -> AppResult<AcquisitionConfig> {
        let mut stored = self.last_config.lock().await;
        info!(
            target: AUDIT_TARGET,
            writer = %serde_json::Value::Object(config.writer.clone()),
            backend = %serde_json::Value::Object(config.backend.clone()),
            detector = %serde_json::Value::Object(config.detector.clone()),
            "Set acquisition configuration"
        );
        *stored = self.configure_locked(config).await?;
        Ok(stored.clone())
    }

    /// Merge a partial configuration into the last applied one and apply the
    /// result as a whole.
    pub async fn update_config(&self, update: ConfigUpdate) -> AppResult<AcquisitionConfig> {
        let mut stored = self.last_config.lock().await;
        info!(
            target: AUDIT_TARGET,
            update = %serde_json::to_value(&update).unwrap_or_default(),
            "Update acquisition configuration"
        );
        let merged = update.merged_into(stored.clone());
        *stored = self.configure_locked(merged).await?;
        Ok(stored.clone())
    }

    /// Apply the last stored configuration again, e.g. after a reset.
    pub async fn set_last_config(&self) -> AppResult<AcquisitionConfig> {
        let mut stored = self.last_config.lock().await;
        info!(target: AUDIT_TARGET, "Re-applying last acquisition configuration");
        *stored = self.configure_locked(stored.clone()).await?;
        Ok(stored.clone())
    }

    /// Shared body of every configure variant. The caller holds the config
    /// lock and stores the returned value only on success.
    async fn configure_locked(&self, config: AcquisitionConfig) -> AppResult<AcquisitionConfig> {
        let status = self.get_status().await?;
        if !matches!(
            status,
            IntegrationStatus::Initialized | IntegrationStatus::Configured
        ) {
            return Err(IntegrationError::InvalidStateTransition {
                operation: "set config",
                state: status,
            });
        }

        // All three sections must pass before any subsystem is touched.
        let AcquisitionConfig {
            mut writer,
            backend,
            detector,
        } = config;
        self.validator.validate_writer_config(&mut writer)?;
        self.validator.validate_backend_config(&backend)?;
        self.validator.validate_detector_config(&detector)?;

        if status == IntegrationStatus::Configured {
            self.reset_locked().await?;
        }

        call(Subsystem::Backend, self.backend.set_config(&backend)).await?;
        call(Subsystem::Writer, self.writer.set_parameters(&writer)).await?;
        call(Subsystem::Detector, self.detector.set_config(&detector)).await?;

        Ok(AcquisitionConfig::new(writer, backend, detector))
    }

    // =========================================================================
    // Acquisition control
    // =========================================================================

    /// Start an acquisition. Only allowed in `CONFIGURED`.
    pub async fn start_acquisition(&self) -> AppResult<()> {
        let _guard = self.last_config.lock().await;
        info!(target: AUDIT_TARGET, "Starting acquisition");

        let status = self.get_status().await?;
        if status != IntegrationStatus::Configured {
            return Err(IntegrationError::InvalidStateTransition {
                operation: "start acquisition",
                state: status,
            });
        }

        call(Subsystem::Backend, self.backend.open()).await?;
        call(Subsystem::Writer, self.writer.start()).await?;
        call(Subsystem::Detector, self.detector.start()).await?;

        let status = self.get_status().await?;
        if status == IntegrationStatus::Running {
            info!("Acquisition running");
        } else {
            warn!(%status, "Acquisition started but system is not running");
        }
        Ok(())
    }

    /// Stop a running acquisition and reset. On a system that is not
    /// running this is the same as [`reset`](Self::reset).
    pub async fn stop_acquisition(&self) -> AppResult<()> {
        let _guard = self.last_config.lock().await;
        info!(target: AUDIT_TARGET, "Stopping acquisition");
        self.stop_locked().await
    }

    async fn stop_locked(&self) -> AppResult<()> {
        if self.get_status().await? == IntegrationStatus::Running {
            call(Subsystem::Backend, self.backend.close()).await?;
            call(Subsystem::Writer, self.writer.stop()).await?;
            call(Subsystem::Detector, self.detector.stop()).await?;
        }
        self.reset_locked().await
    }

    /// Bring every subsystem back to its idle, unconfigured state. Idempotent
    /// and allowed from any state. The stored configuration is kept for
    /// [`set_last_config`](Self::set_last_config).
    pub async fn reset(&self) -> AppResult<()> {
        let _guard = self.last_config.lock().await;
        info!(target: AUDIT_TARGET, "Resetting integration api");
        self.reset_locked().await
    }

    async fn reset_locked(&self) -> AppResult<()> {
        call(Subsystem::Backend, self.backend.reset()).await?;
        call(Subsystem::Writer, self.writer.stop()).await?;
        call(Subsystem::Detector, self.detector.stop()).await?;
        Ok(())
    }

    // =========================================================================
    // Detector pass-through
    // =========================================================================

    /// Read one detector parameter.
    pub async fn get_detector_value(&self, name: &str) -> AppResult<Value> {
        call(Subsystem::Detector, self.detector.get_value(name)).await
    }

    /// Write one detector parameter and return the value now set.
    pub async fn set_detector_value(&self, name: &str, value: Value) -> AppResult<Value> {
        let _guard = self.last_config.lock().await;
        info!(target: AUDIT_TARGET, name, value = %value, "Set detector value");
        call(Subsystem::Detector, self.detector.set_value(name, &value)).await
    }

    // =========================================================================
    // Backend pass-through
    // =========================================================================

    /// Read the backend state or the stored backend section.
    pub async fn get_backend(&self, query: BackendQuery) -> AppResult<Value> {
        match query {
            BackendQuery::Status => call(Subsystem::Backend, self.backend.get_status())
                .await
                .map(Value::String),
            BackendQuery::Config => Ok(Value::Object(
                self.last_config.lock().await.backend.clone(),
            )),
        }
    }

    /// Validate and push a backend section on its own, leaving writer and
    /// detector alone. Returns the stored backend section.
    pub async fn set_backend_config(&self, config: ConfigSection) -> AppResult<ConfigSection> {
        let mut stored = self.last_config.lock().await;
        info!(
            target: AUDIT_TARGET,
            backend = %serde_json::Value::Object(config.clone()),
            "Set backend configuration"
        );

        self.validator.validate_backend_config(&config)?;
        call(Subsystem::Backend, self.backend.set_config(&config)).await?;

        stored.backend = config;
        Ok(stored.backend.clone())
    }

    // =========================================================================
    // Debug operations
    // =========================================================================

    /// Push whatever configuration is given and start everything, bypassing
    /// validation and the state machine. For commissioning only.
    pub async fn debug_start(&self, update: ConfigUpdate) -> AppResult<()> {
        let _guard = self.last_config.lock().await;
        info!(
            target: AUDIT_TARGET,
            update = %serde_json::to_value(&update).unwrap_or_default(),
            "Debug start"
        );

        self.stop_locked().await?;

        if let Some(writer) = update.section(Subsystem::Writer) {
            call(Subsystem::Writer, self.writer.set_parameters(writer)).await?;
        }
        // The backend has to see a config call before it can be opened.
        let backend = update
            .section(Subsystem::Backend)
            .cloned()
            .unwrap_or_else(ConfigSection::new);
        call(Subsystem::Backend, self.backend.set_config(&backend)).await?;
        if let Some(detector) = update.section(Subsystem::Detector) {
            call(Subsystem::Detector, self.detector.set_config(detector)).await?;
        }

        call(Subsystem::Writer, self.writer.start()).await?;
        call(Subsystem::Backend, self.backend.open()).await?;
        call(Subsystem::Detector, self.detector.start()).await?;
        Ok(())
    }

    /// Counterpart of [`debug_start`](Self::debug_start).
    pub async fn debug_stop(&self) -> AppResult<()> {
        let _guard = self.last_config.lock().await;
        info!(target: AUDIT_TARGET, "Debug stop");
        self.stop_locked().await
    }
}
