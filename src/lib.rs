//! Core library for the daq_integration server.
//!
//! The server drives the three subsystems of an acquisition pipeline (a
//! backend stream processor, a data writer and a detector) as one system
//! with a single configuration, a single start/stop command and one unified
//! status.
//!
//! - [`manager`]: the [`IntegrationManager`] state machine
//! - [`validation`]: per-setup configuration checks and status interpretation
//! - [`clients`]: subsystem client traits, real and mock implementations
//! - [`api`]: REST interface and its client
//! - [`config`], [`logging`]: server plumbing

pub mod api;
pub mod clients;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod manager;
pub mod validation;

pub use crate::core::{AcquisitionConfig, ConfigUpdate, IntegrationStatus, StatusDetails};
pub use error::{AppResult, IntegrationError};
pub use manager::IntegrationManager;
