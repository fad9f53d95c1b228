//! Tracing setup.
//!
//! Operator commands are additionally recorded under the `audit_trail`
//! target, so they can be filtered or routed separately, e.g.
//! `RUST_LOG=warn,audit_trail=info`.

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Target of audit-trail records.
pub const AUDIT_TARGET: &str = "audit_trail";

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.level.to_ascii_lowercase()))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.json {
        builder
            .json()
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install JSON subscriber: {e}"))
    } else {
        builder
            .with_target(true)
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install subscriber: {e}"))
    }
}
