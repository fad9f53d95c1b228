//! Detector client driving the detector command-line tools.
//!
//! Every operation spawns one `get` or `put` process:
//!
//! ```text
//! sls_detector_put status start
//! sls_detector_get status        -> "status idle"
//! sls_detector_put exptime 0.01  -> "exptime 0.01"
//! sls_detector_put roi 0 255     (array values, one argument per element)
//! ```
//!
//! The tool prints `<name> <value>`; the value part is parsed back into JSON
//! (number, bool, or plain string).

use super::DetectorClient;
use crate::core::ConfigSection;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

/// Detector client backed by the vendor command-line tools.
pub struct DetectorCliClient {
    get_command: String,
    put_command: String,
}

impl DetectorCliClient {
    /// Create a client using the given `get` and `put` executables.
    pub fn new(get_command: impl Into<String>, put_command: impl Into<String>) -> Self {
        Self {
            get_command: get_command.into(),
            put_command: put_command.into(),
        }
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        debug!(program, ?args, "running detector command");

        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .with_context(|| format!("spawning '{program}'"))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "'{} {}' exited with {}: {}",
                program,
                args.join(" "),
                output.status,
                stderr.trim()
            );
        }
        if let Some(line) = stdout.lines().find(|l| l.trim_start().starts_with("ERROR")) {
            bail!("'{} {}' reported: {}", program, args.join(" "), line.trim());
        }
        Ok(stdout)
    }

    async fn put(&self, name: &str, values: &[String]) -> Result<Value> {
        let args: Vec<&str> = std::iter::once(name)
            .chain(values.iter().map(String::as_str))
            .collect();
        let stdout = self.run(&self.put_command, &args).await?;
        Ok(parse_reply(name, &stdout))
    }

    async fn get(&self, name: &str) -> Result<Value> {
        let stdout = self.run(&self.get_command, &[name]).await?;
        Ok(parse_reply(name, &stdout))
    }
}

/// Render a JSON value as command-line arguments, one per array element.
fn format_arguments(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().flat_map(format_arguments).collect(),
        Value::String(s) => vec![s.clone()],
        other => vec![other.to_string()],
    }
}

/// Extract the value from a `<name> <value>` reply line.
fn parse_reply(name: &str, stdout: &str) -> Value {
    let line = stdout
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with(name))
        .or_else(|| stdout.lines().map(str::trim).find(|l| !l.is_empty()))
        .unwrap_or_default();

    let raw = line.strip_prefix(name).unwrap_or(line).trim();
    serde_json::from_str::<Value>(raw)
        .ok()
        .filter(|v| v.is_number() || v.is_boolean())
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

#[async_trait]
impl DetectorClient for DetectorCliClient {
    async fn start(&self) -> Result<()> {
        self.put("status", &["start".to_string()]).await?;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.put("status", &["stop".to_string()]).await?;
        Ok(())
    }

    async fn set_config(&self, config: &ConfigSection) -> Result<()> {
        for (name, value) in config {
            self.put(name, &format_arguments(value))
                .await
                .with_context(|| format!("setting detector parameter '{name}'"))?;
        }
        Ok(())
    }

    async fn get_status(&self) -> Result<Value> {
        self.get("status").await
    }

    async fn get_value(&self, name: &str) -> Result<Value> {
        self.get(name).await
    }

    async fn set_value(&self, name: &str, value: &Value) -> Result<Value> {
        self.put(name, &format_arguments(value)).await
    }
}
