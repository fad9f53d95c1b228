//! REST client for the backend stream-processing service.
//!
//! The backend exposes its API under `<url>/v1`:
//!
//! - `GET  /state` returns `{"state": "ok", "status": "<STATE>"}`
//! - `POST /state/open`, `/state/close`, `/state/reset`
//! - `PUT  /config`

use super::BackendClient;
use crate::core::ConfigSection;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Path suffix appended to the configured backend URL.
pub const BACKEND_URL_SUFFIX: &str = "/v1";

#[derive(Debug, Deserialize)]
struct BackendReply {
    state: String,
    #[serde(default)]
    status: String,
}

/// HTTP client for the backend.
pub struct BackendRestClient {
    client: Client,
    api_url: String,
}

impl BackendRestClient {
    /// Create a client for the backend at `url` (without the `/v1` suffix).
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("building backend HTTP client")?;

        Ok(Self {
            client,
            api_url: format!("{}{}", url.trim_end_matches('/'), BACKEND_URL_SUFFIX),
        })
    }

    async fn check(response: Response, what: &str) -> Result<BackendReply> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("backend {what} returned HTTP {status}: {body}");
        }

        let reply: BackendReply = response
            .json()
            .await
            .with_context(|| format!("decoding backend {what} reply"))?;
        if reply.state != "ok" {
            bail!("backend {what} failed: {}", reply.status);
        }
        Ok(reply)
    }

    async fn post_state(&self, action: &str) -> Result<()> {
        let url = format!("{}/state/{}", self.api_url, action);
        debug!(url = %url, "backend state change");

        let response = self
            .client
            .post(&url)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;
        Self::check(response, action).await?;
        Ok(())
    }
}

#[async_trait]
impl BackendClient for BackendRestClient {
    fn address(&self) -> String {
        self.api_url.clone()
    }

    async fn open(&self) -> Result<()> {
        self.post_state("open").await
    }

    async fn close(&self) -> Result<()> {
        self.post_state("close").await
    }

    async fn reset(&self) -> Result<()> {
        self.post_state("reset").await
    }

    async fn set_config(&self, config: &ConfigSection) -> Result<()> {
        let url = format!("{}/config", self.api_url);
        let response = self
            .client
            .put(&url)
            .json(config)
            .send()
            .await
            .with_context(|| format!("PUT {url}"))?;
        Self::check(response, "config").await?;
        Ok(())
    }

    async fn get_status(&self) -> Result<String> {
        let url = format!("{}/state", self.api_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        Ok(Self::check(response, "status").await?.status)
    }
}
