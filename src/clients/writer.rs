//! REST client for the data writer node.
//!
//! The writer is addressed as `<url>/api/v1/<instance>/...` with the
//! `start`, `stop`, `status` and `parameters` endpoints.

use super::{WriterClient, WriterStatus};
use crate::core::ConfigSection;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// HTTP client for the writer.
pub struct WriterRestClient {
    client: Client,
    api_address: String,
}

impl WriterRestClient {
    /// Create a client for the writer `instance_name` served at `url`.
    pub fn new(url: &str, instance_name: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("building writer HTTP client")?;

        Ok(Self {
            client,
            api_address: format!("{}/api/v1/{}", url.trim_end_matches('/'), instance_name),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.api_address, endpoint)
    }

    async fn send(request: RequestBuilder, what: &str) -> Result<reqwest::Response> {
        let response = request
            .send()
            .await
            .with_context(|| format!("writer {what}"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("writer {what} returned HTTP {status}: {body}");
        }
        Ok(response)
    }
}

/// The node either nests the flags under `"status"` or returns them flat.
fn parse_status(reply: &Value) -> Result<WriterStatus> {
    let is_running = reply
        .pointer("/status/is_running")
        .or_else(|| reply.get("is_running"))
        .and_then(Value::as_bool);

    match is_running {
        Some(is_running) => Ok(WriterStatus { is_running }),
        None => bail!("writer status reply has no boolean 'is_running' field: {reply}"),
    }
}

#[async_trait]
impl WriterClient for WriterRestClient {
    fn address(&self) -> String {
        self.api_address.clone()
    }

    async fn start(&self) -> Result<()> {
        debug!(address = %self.api_address, "starting writer");
        Self::send(self.client.post(self.url("start")), "start").await?;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        debug!(address = %self.api_address, "stopping writer");
        Self::send(self.client.post(self.url("stop")), "stop").await?;
        Ok(())
    }

    async fn set_parameters(&self, parameters: &ConfigSection) -> Result<()> {
        Self::send(
            self.client.post(self.url("parameters")).json(parameters),
            "parameters",
        )
        .await?;
        Ok(())
    }

    async fn get_status(&self) -> Result<WriterStatus> {
        let response = Self::send(self.client.get(self.url("status")), "status").await?;
        let reply: Value = response
            .json()
            .await
            .context("decoding writer status reply")?;
        parse_status(&reply)
    }
}
