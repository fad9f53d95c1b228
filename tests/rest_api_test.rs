//! REST interface tests: an in-process server over mock subsystems, driven
//! through `IntegrationClient` and raw HTTP.

mod common;

use common::{csaxs_config, lifecycle_config, section, spawn_server, spawn_server_url, Harness};
use daq_integration::api::{self, routes, ClientError};
use daq_integration::core::{BackendQuery, ConfigUpdate};
use daq_integration::IntegrationStatus;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpListener;

async fn raw(request: reqwest::RequestBuilder) -> (reqwest::StatusCode, Value) {
    let response = request.send().await.unwrap();
    let status = response.status();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn test_client_workflow() {
    let h = Harness::new();
    let client = spawn_server(h.manager.clone()).await;

    assert_eq!(client.get_status().await.unwrap(), IntegrationStatus::Initialized);

    let applied = client.set_config(&lifecycle_config()).await.unwrap();
    assert_eq!(applied.writer["output_file"], json!("/tmp/a.h5"));
    assert_eq!(client.get_status().await.unwrap(), IntegrationStatus::Configured);
    assert_eq!(client.get_config().await.unwrap(), applied);

    assert_eq!(client.start().await.unwrap(), IntegrationStatus::Running);
    assert_eq!(client.stop().await.unwrap(), IntegrationStatus::Initialized);
}

#[tokio::test]
async fn test_invalid_transition_reported_in_band() {
    let h = Harness::new();
    let client = spawn_server(h.manager.clone()).await;

    let err = client.start().await.unwrap_err();

    match err {
        ClientError::Server(message) => {
            assert_eq!(message, "Cannot start acquisition in INITIALIZED state.")
        }
        other => panic!("expected server error, got {other}"),
    }
    assert!(h.journal.commands().is_empty());
}

#[tokio::test]
async fn test_error_envelope_uses_http_200() {
    let h = Harness::new();
    let url = spawn_server_url(h.manager.clone()).await;
    let http = reqwest::Client::new();

    let (status, body) = raw(http.post(format!("{url}{}", routes::START))).await;

    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(body["state"], json!("error"));
    assert!(body["status"].as_str().unwrap().contains("INITIALIZED"));
}

#[tokio::test]
async fn test_put_config_requires_three_roots() {
    let h = Harness::new();
    let url = spawn_server_url(h.manager.clone()).await;
    let http = reqwest::Client::new();

    let (status, body) = raw(
        http.put(format!("{url}{}", routes::CONFIG))
            .json(&json!({"writer": {}, "backend": {}})),
    )
    .await;

    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(body["state"], json!("error"));
    assert!(body["status"].as_str().unwrap().contains("3 root elements"));
    assert!(h.journal.commands().is_empty());
}

#[tokio::test]
async fn test_malformed_body_reported_in_band() {
    let h = Harness::new();
    let url = spawn_server_url(h.manager.clone()).await;
    let http = reqwest::Client::new();

    let (status, body) = raw(
        http.put(format!("{url}{}", routes::CONFIG))
            .header("content-type", "application/json")
            .body("{\"writer\": "),
    )
    .await;

    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(body["state"], json!("error"));
    assert!(body["status"]
        .as_str()
        .unwrap()
        .contains("malformed JSON body"));
}

#[tokio::test]
async fn test_invalid_config_names_missing_key() {
    let h = Harness::new();
    let client = spawn_server(h.manager.clone()).await;
    let mut config = lifecycle_config();
    config.backend.remove("n_frames");

    let err = client.set_config(&config).await.unwrap_err();

    assert!(matches!(&err, ClientError::Server(m) if m.contains("n_frames")), "{err}");
    assert!(h.journal.commands().is_empty());
    assert_eq!(client.get_status().await.unwrap(), IntegrationStatus::Initialized);
}

#[tokio::test]
async fn test_status_details() {
    let h = Harness::new();
    let client = spawn_server(h.manager.clone()).await;
    client.set_config(&lifecycle_config()).await.unwrap();
    client.start().await.unwrap();

    let details = client.get_status_details().await.unwrap();

    assert!(details.writer);
    assert_eq!(details.backend, "OPEN");
    assert_eq!(details.detector, json!("running"));
}

#[tokio::test]
async fn test_update_and_replay_config() {
    let h = Harness::new();
    let client = spawn_server(h.manager.clone()).await;
    client.set_config(&csaxs_config()).await.unwrap();

    let update = ConfigUpdate {
        detector: Some(section(json!({"exptime": 0.5}))),
        ..ConfigUpdate::default()
    };
    let updated = client.update_config(&update).await.unwrap();
    assert_eq!(updated.detector["exptime"], json!(0.5));
    assert_eq!(updated.detector["frames"], json!(100));
    assert_eq!(updated.writer, csaxs_config().writer);

    assert_eq!(client.reset().await.unwrap(), IntegrationStatus::Initialized);
    let replayed = client.set_last_config().await.unwrap();
    assert_eq!(replayed, updated);
    assert_eq!(client.get_status().await.unwrap(), IntegrationStatus::Configured);
}

#[tokio::test]
async fn test_set_config_from_file() {
    let h = Harness::new();
    let client = spawn_server(h.manager.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, serde_json::to_string(&csaxs_config()).unwrap()).unwrap();

    let applied = client.set_config_from_file(&path).await.unwrap();

    assert_eq!(applied, csaxs_config());
}

#[tokio::test]
async fn test_detector_values() {
    let h = Harness::new();
    let client = spawn_server(h.manager.clone()).await;

    let set = client.set_detector_value("dr", json!(32)).await.unwrap();
    assert_eq!(set, json!(32));
    assert_eq!(client.get_detector_value("dr").await.unwrap(), json!(32));
    assert!(matches!(
        client.get_detector_value("nope").await,
        Err(ClientError::Server(_))
    ));
}

#[tokio::test]
async fn test_set_detector_value_requires_name_and_value() {
    let h = Harness::new();
    let url = spawn_server_url(h.manager.clone()).await;
    let http = reqwest::Client::new();
    let endpoint = format!("{url}{}", routes::DETECTOR_VALUE);

    let (_, body) = raw(http.post(&endpoint).json(&json!({}))).await;
    assert_eq!(
        body["status"],
        json!("Set detector value JSON request cannot be empty.")
    );

    let (_, body) = raw(http.post(&endpoint).json(&json!({"name": "dr"}))).await;
    assert_eq!(
        body["status"],
        json!("'name' and 'value' must be set in JSON request.")
    );
    assert!(h.journal.commands().is_empty());
}

#[tokio::test]
async fn test_server_info() {
    let h = Harness::new();
    let client = spawn_server(h.manager.clone()).await;

    let info = client.get_server_info().await.unwrap();

    assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
    assert_eq!(info.validator, "csaxs_eiger9m");
    assert_eq!(info.backend_address, "mock://backend");
}

#[tokio::test]
async fn test_wait_for_status() {
    let h = Harness::new();
    let client = spawn_server(h.manager.clone()).await;
    client.set_config(&lifecycle_config()).await.unwrap();

    client
        .wait_for_status(
            &[IntegrationStatus::Configured],
            Some(Duration::from_secs(1)),
            Duration::from_millis(10),
        )
        .await
        .unwrap();

    let err = client
        .wait_for_status(
            &[IntegrationStatus::Running],
            Some(Duration::from_millis(50)),
            Duration::from_millis(10),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Timeout {
            last: IntegrationStatus::Configured,
            ..
        }
    ));
}

#[tokio::test]
async fn test_debug_routes() {
    let h = Harness::new();
    let client = spawn_server(h.manager.clone()).await;

    assert_eq!(client.debug_start(None).await.unwrap(), IntegrationStatus::Running);
    assert_eq!(client.debug_stop().await.unwrap(), IntegrationStatus::Initialized);

    let update = ConfigUpdate {
        writer: Some(section(json!({"output_file": "/tmp/debug"}))),
        ..ConfigUpdate::default()
    };
    client.debug_start(Some(&update)).await.unwrap();
    // No validation: the suffix is left alone.
    assert_eq!(
        h.writer.parameters().unwrap()["output_file"],
        json!("/tmp/debug")
    );
}

#[tokio::test]
async fn test_debug_routes_not_served_by_default() {
    let h = Harness::new();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let app = api::router(h.manager.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let response = reqwest::Client::new()
        .post(format!(
            "http://{address}{}{}",
            routes::DEBUG_PREFIX,
            routes::START
        ))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    assert!(h.journal.commands().is_empty());
}

#[tokio::test]
async fn test_backend_reads() {
    let h = Harness::new();
    let client = spawn_server(h.manager.clone()).await;

    assert_eq!(
        client.get_backend(BackendQuery::Status).await.unwrap(),
        json!("INITIALIZED")
    );
    assert_eq!(client.get_backend(BackendQuery::Config).await.unwrap(), json!({}));

    client.set_config(&lifecycle_config()).await.unwrap();
    assert_eq!(
        client.get_backend(BackendQuery::Status).await.unwrap(),
        json!("CONFIGURED")
    );
    assert_eq!(
        client.get_backend(BackendQuery::Config).await.unwrap(),
        json!({"bit_depth": 16, "period": 0.1, "n_frames": 10})
    );
}

#[tokio::test]
async fn test_put_backend_config_only_touches_backend() {
    let h = Harness::new();
    let client = spawn_server(h.manager.clone()).await;
    let backend = section(json!({"bit_depth": 32, "period": 0.5, "n_frames": 3}));

    let stored = client.put_backend_config(&backend).await.unwrap();

    assert_eq!(stored, backend);
    assert_eq!(h.journal.commands(), vec!["backend.set_config"]);
    assert_eq!(h.backend.config(), Some(backend.clone()));
    assert!(h.writer.parameters().is_none());
    let config = client.get_config().await.unwrap();
    assert_eq!(config.backend, backend);
    assert!(config.writer.is_empty());
    assert_eq!(client.get_status().await.unwrap(), IntegrationStatus::Configured);
}

#[tokio::test]
async fn test_put_backend_config_is_validated() {
    let h = Harness::new();
    let client = spawn_server(h.manager.clone()).await;

    let err = client
        .put_backend_config(&section(json!({"bit_depth": 32, "period": 0.5})))
        .await
        .unwrap_err();

    assert!(matches!(&err, ClientError::Server(m) if m.contains("n_frames")), "{err}");
    assert!(h.journal.commands().is_empty());
    assert!(client.get_config().await.unwrap().backend.is_empty());
}

#[tokio::test]
async fn test_put_backend_config_refused_keeps_stored_section() {
    let h = Harness::new();
    let client = spawn_server(h.manager.clone()).await;
    client.set_config(&lifecycle_config()).await.unwrap();
    let before = client.get_config().await.unwrap();

    // The backend only takes configuration while initialized.
    let err = client
        .put_backend_config(&section(json!({"bit_depth": 8, "period": 1, "n_frames": 1})))
        .await
        .unwrap_err();

    assert!(matches!(&err, ClientError::Server(m) if m.contains("backend call failed")), "{err}");
    assert_eq!(client.get_config().await.unwrap(), before);
}

#[tokio::test]
async fn test_backend_actions_are_restricted() {
    let h = Harness::new();
    let url = spawn_server_url(h.manager.clone()).await;
    let http = reqwest::Client::new();

    let (_, body) = raw(http.get(format!("{url}{}/metrics", routes::BACKEND))).await;
    assert_eq!(body["state"], json!("error"));
    assert!(body["status"].as_str().unwrap().contains("not supported"));

    let (_, body) = raw(
        http.put(format!("{url}{}/status", routes::BACKEND))
            .json(&json!({"bit_depth": 16, "period": 0.1, "n_frames": 1})),
    )
    .await;
    assert_eq!(body["state"], json!("error"));
    assert!(body["status"].as_str().unwrap().contains("supported actions: config"));

    let (_, body) = raw(
        http.put(format!("{url}{}/config", routes::BACKEND))
            .json(&json!([1, 2])),
    )
    .await;
    assert_eq!(body["state"], json!("error"));
    assert!(h.journal.commands().is_empty());
}
