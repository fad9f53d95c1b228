//! Mock subsystem clients.
//!
//! In-process doubles for the backend, the writer and the detector, used by
//! the test suite and by the binary's `--mock` mode.
//!
//! All three mocks share one [`CallJournal`]. It records every call in the
//! order it was issued (`"backend.open"`, `"writer.start"`, ...) and can be
//! told to make a given call fail, which is how partial failures are
//! exercised.
//!
//! State behaviour follows the real subsystems closely enough for the
//! manager's decision table:
//!
//! - backend: `INITIALIZED` → `set_config` → `CONFIGURED` → `open` → `OPEN`
//!   → `close` → `CLOSE`; `reset` always returns to `INITIALIZED`. Like the
//!   real backend it refuses configuration unless `INITIALIZED`.
//! - writer: `is_running` toggled by `start`/`stop`.
//! - detector: `"idle"` / `"running"`; values are read from its last config.

use super::{BackendClient, DetectorClient, WriterClient, WriterStatus};
use crate::core::ConfigSection;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Default)]
struct JournalInner {
    calls: Vec<String>,
    failing: HashSet<String>,
}

/// Shared, ordered record of calls made to the mock clients.
#[derive(Debug, Clone, Default)]
pub struct CallJournal {
    inner: Arc<Mutex<JournalInner>>,
}

impl CallJournal {
    /// Create an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded calls, oldest first.
    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().calls.clone()
    }

    /// Recorded calls that change subsystem state (status reads filtered out).
    pub fn commands(&self) -> Vec<String> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| !c.ends_with(".get_status"))
            .cloned()
            .collect()
    }

    /// Forget recorded calls. Failure injections are kept.
    pub fn clear(&self) {
        self.inner.lock().calls.clear();
    }

    /// Make every future `call` (e.g. `"writer.start"`) fail.
    pub fn fail_on(&self, call: &str) {
        self.inner.lock().failing.insert(call.to_string());
    }

    /// Undo a previous [`fail_on`](Self::fail_on).
    pub fn heal(&self, call: &str) {
        self.inner.lock().failing.remove(call);
    }

    fn record(&self, call: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(call.to_string());
        if inner.failing.contains(call) {
            bail!("injected failure in {call}");
        }
        Ok(())
    }
}

/// Mock backend.
#[derive(Debug)]
pub struct MockBackendClient {
    journal: CallJournal,
    status: Mutex<String>,
    config: Mutex<Option<ConfigSection>>,
}

impl MockBackendClient {
    /// Create a backend in `INITIALIZED` state.
    pub fn new(journal: CallJournal) -> Self {
        Self {
            journal,
            status: Mutex::new("INITIALIZED".to_string()),
            config: Mutex::new(None),
        }
    }

    /// Last configuration accepted by the backend.
    pub fn config(&self) -> Option<ConfigSection> {
        self.config.lock().clone()
    }

    /// Force the reported state, bypassing the journal.
    pub fn force_status(&self, status: &str) {
        *self.status.lock() = status.to_string();
    }
}

#[async_trait]
impl BackendClient for MockBackendClient {
    fn address(&self) -> String {
        "mock://backend".to_string()
    }

    async fn open(&self) -> Result<()> {
        self.journal.record("backend.open")?;
        *self.status.lock() = "OPEN".to_string();
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.journal.record("backend.close")?;
        *self.status.lock() = "CLOSE".to_string();
        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        self.journal.record("backend.reset")?;
        *self.status.lock() = "INITIALIZED".to_string();
        Ok(())
    }

    async fn set_config(&self, config: &ConfigSection) -> Result<()> {
        self.journal.record("backend.set_config")?;
        let mut status = self.status.lock();
        if status.as_str() != "INITIALIZED" {
            bail!("backend cannot be configured in {} state", status);
        }
        *status = "CONFIGURED".to_string();
        *self.config.lock() = Some(config.clone());
        Ok(())
    }

    async fn get_status(&self) -> Result<String> {
        self.journal.record("backend.get_status")?;
        Ok(self.status.lock().clone())
    }
}

/// Mock writer.
#[derive(Debug)]
pub struct MockWriterClient {
    journal: CallJournal,
    is_running: Mutex<bool>,
    parameters: Mutex<Option<ConfigSection>>,
}

impl MockWriterClient {
    /// Create an idle writer.
    pub fn new(journal: CallJournal) -> Self {
        Self {
            journal,
            is_running: Mutex::new(false),
            parameters: Mutex::new(None),
        }
    }

    /// Last parameters pushed to the writer.
    pub fn parameters(&self) -> Option<ConfigSection> {
        self.parameters.lock().clone()
    }

    /// Force the running flag, bypassing the journal.
    pub fn force_running(&self, running: bool) {
        *self.is_running.lock() = running;
    }
}

#[async_trait]
impl WriterClient for MockWriterClient {
    fn address(&self) -> String {
        "mock://writer".to_string()
    }

    async fn start(&self) -> Result<()> {
        self.journal.record("writer.start")?;
        *self.is_running.lock() = true;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.journal.record("writer.stop")?;
        *self.is_running.lock() = false;
        Ok(())
    }

    async fn set_parameters(&self, parameters: &ConfigSection) -> Result<()> {
        self.journal.record("writer.set_parameters")?;
        *self.parameters.lock() = Some(parameters.clone());
        Ok(())
    }

    async fn get_status(&self) -> Result<WriterStatus> {
        self.journal.record("writer.get_status")?;
        Ok(WriterStatus {
            is_running: *self.is_running.lock(),
        })
    }
}

/// Mock detector.
#[derive(Debug)]
pub struct MockDetectorClient {
    journal: CallJournal,
    status: Mutex<String>,
    config: Mutex<ConfigSection>,
}

impl MockDetectorClient {
    /// Create an idle detector with an empty configuration.
    pub fn new(journal: CallJournal) -> Self {
        Self {
            journal,
            status: Mutex::new("idle".to_string()),
            config: Mutex::new(ConfigSection::new()),
        }
    }

    /// Current detector configuration.
    pub fn config(&self) -> ConfigSection {
        self.config.lock().clone()
    }
}

#[async_trait]
impl DetectorClient for MockDetectorClient {
    async fn start(&self) -> Result<()> {
        self.journal.record("detector.start")?;
        *self.status.lock() = "running".to_string();
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.journal.record("detector.stop")?;
        *self.status.lock() = "idle".to_string();
        Ok(())
    }

    async fn set_config(&self, config: &ConfigSection) -> Result<()> {
        self.journal.record("detector.set_config")?;
        *self.config.lock() = config.clone();
        Ok(())
    }

    async fn get_status(&self) -> Result<Value> {
        self.journal.record("detector.get_status")?;
        Ok(Value::String(self.status.lock().clone()))
    }

    async fn get_value(&self, name: &str) -> Result<Value> {
        self.journal.record("detector.get_value")?;
        self.config
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("detector has no parameter '{name}'"))
    }

    async fn set_value(&self, name: &str, value: &Value) -> Result<Value> {
        self.journal.record("detector.set_value")?;
        self.config.lock().insert(name.to_string(), value.clone());
        Ok(value.clone())
    }
}
