//! Async client for the integration REST API.
//!
//! Mirrors the server routes one method per route and unwraps the response
//! envelope: a reply with `"state": "error"` becomes [`ClientError::Server`].

use super::routes;
use crate::core::{
    AcquisitionConfig, BackendQuery, ConfigSection, ConfigUpdate, IntegrationStatus, ServerInfo,
    StatusDetails,
};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// Errors from the integration API client
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network/HTTP error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Server answered with the error envelope
    #[error("An exception happened on the server: {0}")]
    Server(String),

    /// Reply did not have the expected shape
    #[error("Malformed server response: {0}")]
    Malformed(String),

    /// `wait_for_status` gave up
    #[error("Timeout exceeded. Could not reach target status {targets:?}. Last received status: '{last}'.")]
    Timeout {
        /// States that were waited for
        targets: Vec<IntegrationStatus>,
        /// Last state seen
        last: IntegrationStatus,
    },
}

/// Unwrapped `ok` envelope.
#[derive(Debug, Clone)]
pub struct ApiReply {
    /// Unified status reported with the reply.
    pub status: IntegrationStatus,
    /// Remaining envelope fields (`config`, `details`, `value`, ...).
    pub fields: Map<String, Value>,
}

impl ApiReply {
    fn take<T: DeserializeOwned>(mut self, key: &str) -> Result<T, ClientError> {
        let value = self
            .fields
            .remove(key)
            .ok_or_else(|| ClientError::Malformed(format!("missing '{key}'")))?;
        serde_json::from_value(value).map_err(|e| ClientError::Malformed(format!("'{key}': {e}")))
    }
}

/// Client for a running integration server.
#[derive(Debug, Clone)]
pub struct IntegrationClient {
    client: Client,
    api_address: String,
}

impl IntegrationClient {
    /// Create a client for the server at `api_address` (e.g. `http://localhost:10000`).
    pub fn new(api_address: &str) -> Result<Self, ClientError> {
        Ok(Self {
            client: Client::builder().build()?,
            api_address: api_address.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_address, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<ApiReply, ClientError> {
        let body: Value = request.send().await?.json().await?;
        debug!(%body, "integration API reply");

        let Value::Object(mut fields) = body else {
            return Err(ClientError::Malformed("reply is not a JSON object".to_string()));
        };
        let state = fields.remove("state");
        let status = fields.remove("status").unwrap_or(Value::Null);

        if state != Some(json!("ok")) {
            let message = status
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| "Unknown error occurred.".to_string());
            return Err(ClientError::Server(message));
        }

        let status = serde_json::from_value(status)
            .map_err(|e| ClientError::Malformed(format!("'status': {e}")))?;
        Ok(ApiReply { status, fields })
    }

    /// Start the acquisition.
    pub async fn start(&self) -> Result<IntegrationStatus, ClientError> {
        Ok(self.send(self.client.post(self.url(routes::START))).await?.status)
    }

    /// Stop the acquisition.
    pub async fn stop(&self) -> Result<IntegrationStatus, ClientError> {
        Ok(self.send(self.client.post(self.url(routes::STOP))).await?.status)
    }

    /// Reset all subsystems.
    pub async fn reset(&self) -> Result<IntegrationStatus, ClientError> {
        Ok(self.send(self.client.post(self.url(routes::RESET))).await?.status)
    }

    /// Current unified status.
    pub async fn get_status(&self) -> Result<IntegrationStatus, ClientError> {
        Ok(self.send(self.client.get(self.url(routes::STATUS))).await?.status)
    }

    /// Raw subsystem signals.
    pub async fn get_status_details(&self) -> Result<StatusDetails, ClientError> {
        self.send(self.client.get(self.url(routes::STATUS_DETAILS)))
            .await?
            .take("details")
    }

    /// Last applied configuration.
    pub async fn get_config(&self) -> Result<AcquisitionConfig, ClientError> {
        self.send(self.client.get(self.url(routes::CONFIG)))
            .await?
            .take("config")
    }

    /// Apply a full configuration.
    pub async fn set_config(
        &self,
        config: &AcquisitionConfig,
    ) -> Result<AcquisitionConfig, ClientError> {
        self.send(self.client.put(self.url(routes::CONFIG)).json(config))
            .await?
            .take("config")
    }

    /// Load a `{writer, backend, detector}` JSON file and apply it.
    pub async fn set_config_from_file(
        &self,
        path: impl AsRef<std::path::Path>,
    ) -> Result<AcquisitionConfig, ClientError> {
        let text = tokio::fs::read_to_string(path.as_ref())
            .await
            .map_err(|e| ClientError::Malformed(format!("{}: {e}", path.as_ref().display())))?;
        let config: AcquisitionConfig = serde_json::from_str(&text)
            .map_err(|e| ClientError::Malformed(format!("{}: {e}", path.as_ref().display())))?;
        self.set_config(&config).await
    }

    /// Merge a partial configuration and apply it.
    pub async fn update_config(
        &self,
        update: &ConfigUpdate,
    ) -> Result<AcquisitionConfig, ClientError> {
        self.send(self.client.post(self.url(routes::CONFIG)).json(update))
            .await?
            .take("config")
    }

    /// Re-apply the last configuration.
    pub async fn set_last_config(&self) -> Result<AcquisitionConfig, ClientError> {
        self.send(self.client.post(self.url(routes::SET_LAST_CONFIG)))
            .await?
            .take("config")
    }

    /// Read one detector parameter.
    pub async fn get_detector_value(&self, name: &str) -> Result<Value, ClientError> {
        let url = format!("{}/{}", self.url(routes::DETECTOR_VALUE), name);
        self.send(self.client.get(url)).await?.take("value")
    }

    /// Write one detector parameter.
    pub async fn set_detector_value(&self, name: &str, value: Value) -> Result<Value, ClientError> {
        self.send(
            self.client
                .post(self.url(routes::DETECTOR_VALUE))
                .json(&json!({"name": name, "value": value})),
        )
        .await?
        .take("value")
    }

    /// Server information.
    pub async fn get_server_info(&self) -> Result<ServerInfo, ClientError> {
        self.send(self.client.get(self.url(routes::SERVER_INFO)))
            .await?
            .take("server_info")
    }

    /// Read the backend state or its stored section directly.
    pub async fn get_backend(&self, query: BackendQuery) -> Result<Value, ClientError> {
        let url = format!("{}/{}", self.url(routes::BACKEND), query);
        self.send(self.client.get(url)).await?.take("value")
    }

    /// Validate and push a backend section on its own.
    pub async fn put_backend_config(
        &self,
        config: &ConfigSection,
    ) -> Result<ConfigSection, ClientError> {
        let url = format!("{}/{}", self.url(routes::BACKEND), BackendQuery::Config);
        self.send(self.client.put(url).json(config))
            .await?
            .take("config")
    }

    /// Start everything with the given configuration, bypassing validation.
    pub async fn debug_start(
        &self,
        update: Option<&ConfigUpdate>,
    ) -> Result<IntegrationStatus, ClientError> {
        let mut request = self
            .client
            .post(self.url(&format!("{}{}", routes::DEBUG_PREFIX, routes::START)));
        if let Some(update) = update {
            request = request.json(update);
        }
        Ok(self.send(request).await?.status)
    }

    /// Stop a debug acquisition.
    pub async fn debug_stop(&self) -> Result<IntegrationStatus, ClientError> {
        let url = self.url(&format!("{}{}", routes::DEBUG_PREFIX, routes::STOP));
        Ok(self.send(self.client.post(url)).await?.status)
    }

    /// Poll the status until it is one of `targets`.
    pub async fn wait_for_status(
        &self,
        targets: &[IntegrationStatus],
        timeout: Option<Duration>,
        polling_interval: Duration,
    ) -> Result<(), ClientError> {
        let started = Instant::now();
        loop {
            let last = self.get_status().await?;
            if targets.contains(&last) {
                return Ok(());
            }
            if timeout.is_some_and(|t| started.elapsed() > t) {
                return Err(ClientError::Timeout {
                    targets: targets.to_vec(),
                    last,
                });
            }
            tokio::time::sleep(polling_interval).await;
        }
    }
}
