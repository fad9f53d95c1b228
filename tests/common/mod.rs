//! Common test utilities for daq_integration integration tests
//!
//! - A manager wired to mock subsystems sharing one call journal
//! - JSON helpers for building configuration sections
//! - An in-process REST server bound to an ephemeral port

#![allow(dead_code)] // Not every test file uses every helper

use daq_integration::api::{self, IntegrationClient};
use daq_integration::clients::{
    CallJournal, MockBackendClient, MockDetectorClient, MockWriterClient,
};
use daq_integration::core::{AcquisitionConfig, ConfigSection};
use daq_integration::validation::CsaxsEiger9mValidator;
use daq_integration::IntegrationManager;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Manager plus handles on its mock subsystems.
pub struct Harness {
    pub manager: Arc<IntegrationManager>,
    pub journal: CallJournal,
    pub backend: Arc<MockBackendClient>,
    pub writer: Arc<MockWriterClient>,
    pub detector: Arc<MockDetectorClient>,
}

impl Harness {
    pub fn new() -> Self {
        let journal = CallJournal::new();
        let backend = Arc::new(MockBackendClient::new(journal.clone()));
        let writer = Arc::new(MockWriterClient::new(journal.clone()));
        let detector = Arc::new(MockDetectorClient::new(journal.clone()));

        let manager = Arc::new(IntegrationManager::new(
            backend.clone(),
            writer.clone(),
            detector.clone(),
            Arc::new(CsaxsEiger9mValidator),
        ));

        Self {
            manager,
            journal,
            backend,
            writer,
            detector,
        }
    }
}

/// Turn a JSON object literal into a config section.
pub fn section(value: Value) -> ConfigSection {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// The configuration used by the lifecycle scenarios.
pub fn lifecycle_config() -> AcquisitionConfig {
    AcquisitionConfig::new(
        section(json!({"output_file": "/tmp/a"})),
        section(json!({"bit_depth": 16, "period": 0.1, "n_frames": 10})),
        ConfigSection::new(),
    )
}

/// A richer configuration resembling a real cSAXS Eiger 9M setup.
pub fn csaxs_config() -> AcquisitionConfig {
    AcquisitionConfig::new(
        section(json!({
            "output_file": "/tmp/test.h5",
            "user_id": 0,
            "group_id": 0,
        })),
        section(json!({"bit_depth": 16, "period": 0.1, "n_frames": 100})),
        section(json!({
            "period": 0.1,
            "frames": 100,
            "exptime": 0.01,
            "dr": 16,
        })),
    )
}

/// Serve the full REST interface (debug routes included) on an ephemeral
/// port and return its base url.
pub async fn spawn_server_url(manager: Arc<IntegrationManager>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let address = listener.local_addr().expect("local address");

    let app = api::router_with_debug(manager);
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server");
    });

    format!("http://{address}")
}

/// Like [`spawn_server_url`], returning a client pointing at the server.
pub async fn spawn_server(manager: Arc<IntegrationManager>) -> IntegrationClient {
    let url = spawn_server_url(manager).await;
    IntegrationClient::new(&url).expect("client")
}
