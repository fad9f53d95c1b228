//! REST interface of the integration server.
//!
//! Every response uses the same envelope:
//!
//! ```json
//! {"state": "ok", "status": "CONFIGURED", "config": {...}}
//! {"state": "error", "status": "Cannot start acquisition in INITIALIZED state."}
//! ```
//!
//! Errors are reported in-band with HTTP 200; the HTTP status only tells
//! whether the request reached the server. Malformed bodies are reported the
//! same way.

pub mod client;

pub use client::{ClientError, IntegrationClient};

use crate::core::{AcquisitionConfig, BackendQuery, ConfigSection, ConfigUpdate, Subsystem};
use crate::error::{AppResult, IntegrationError};
use crate::logging::AUDIT_TARGET;
use crate::manager::IntegrationManager;
use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, Span};

/// Route paths, shared by the server and [`IntegrationClient`].
pub mod routes {
    /// Start acquisition.
    pub const START: &str = "/api/v1/start";
    /// Stop acquisition.
    pub const STOP: &str = "/api/v1/stop";
    /// Reset all subsystems.
    pub const RESET: &str = "/api/v1/reset";
    /// Unified status.
    pub const STATUS: &str = "/api/v1/status";
    /// Raw subsystem signals.
    pub const STATUS_DETAILS: &str = "/api/v1/status_details";
    /// GET current, PUT full, POST partial configuration.
    pub const CONFIG: &str = "/api/v1/config";
    /// Re-apply the last configuration.
    pub const SET_LAST_CONFIG: &str = "/api/v1/configure";
    /// Detector parameter access (`GET .../{name}`, `POST` with body).
    pub const DETECTOR_VALUE: &str = "/api/v1/detector/value";
    /// Server information.
    pub const SERVER_INFO: &str = "/api/v1/info";
    /// Backend pass-through (`GET .../{status,config}`, `PUT .../config`).
    pub const BACKEND: &str = "/api/v1/backend";
    /// Prefix of the debug routes.
    pub const DEBUG_PREFIX: &str = "/debug";
}

type SharedManager = Arc<IntegrationManager>;
type ApiResult = Result<Json<Value>, ApiError>;

/// Error wrapper rendering the in-band error envelope.
#[derive(Debug)]
pub struct ApiError(IntegrationError);

impl From<IntegrationError> for ApiError {
    fn from(err: IntegrationError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.0.to_string();
        error!("{}", message);
        error!(target: AUDIT_TARGET, "{}", message);

        (
            StatusCode::OK,
            Json(json!({"state": "error", "status": message})),
        )
            .into_response()
    }
}

/// Build the `ok` envelope with the current status and extra fields.
async fn envelope(
    manager: &IntegrationManager,
    extra: impl IntoIterator<Item = (&'static str, Value)>,
) -> ApiResult {
    let status = manager.get_status().await?;

    let mut body = Map::new();
    body.insert("state".to_string(), json!("ok"));
    body.insert("status".to_string(), json!(status.as_str()));
    for (key, value) in extra {
        body.insert(key.to_string(), value);
    }
    Ok(Json(Value::Object(body)))
}

fn config_value(config: &AcquisitionConfig) -> Value {
    json!({
        "writer": config.writer,
        "backend": config.backend,
        "detector": config.detector,
    })
}

/// Parse a JSON body, treating an empty body as `None`.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> AppResult<Option<T>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| IntegrationError::InvalidRequest(format!("malformed JSON body: {e}")))
}

fn full_config_from(body: &Bytes) -> AppResult<AcquisitionConfig> {
    const ROOT_ERROR: &str =
        "Specify config JSON with 3 root elements: 'writer', 'backend', 'detector'.";

    let Some(Value::Object(mut root)) = parse_body::<Value>(body)? else {
        return Err(IntegrationError::InvalidRequest(ROOT_ERROR.to_string()));
    };
    let expected = [Subsystem::Writer, Subsystem::Backend, Subsystem::Detector];
    if root.len() != expected.len() || !expected.iter().all(|s| root.contains_key(s.as_str())) {
        return Err(IntegrationError::InvalidRequest(ROOT_ERROR.to_string()));
    }

    let mut take = |subsystem: Subsystem| -> AppResult<ConfigSection> {
        match root.remove(subsystem.as_str()) {
            Some(Value::Object(section)) => Ok(section),
            _ => Err(IntegrationError::InvalidRequest(format!(
                "'{subsystem}' config must be a JSON object."
            ))),
        }
    };
    Ok(AcquisitionConfig::new(
        take(Subsystem::Writer)?,
        take(Subsystem::Backend)?,
        take(Subsystem::Detector)?,
    ))
}

// =============================================================================
// Handlers
// =============================================================================

async fn start(State(manager): State<SharedManager>) -> ApiResult {
    manager.start_acquisition().await?;
    envelope(&manager, []).await
}

async fn stop(State(manager): State<SharedManager>) -> ApiResult {
    manager.stop_acquisition().await?;
    envelope(&manager, []).await
}

async fn reset(State(manager): State<SharedManager>) -> ApiResult {
    manager.reset().await?;
    envelope(&manager, []).await
}

async fn get_status(State(manager): State<SharedManager>) -> ApiResult {
    envelope(&manager, []).await
}

async fn get_status_details(State(manager): State<SharedManager>) -> ApiResult {
    let details = manager.get_status_details().await?;
    envelope(
        &manager,
        [(
            "details",
            json!({
                "writer": details.writer,
                "backend": details.backend,
                "detector": details.detector,
            }),
        )],
    )
    .await
}

async fn get_config(State(manager): State<SharedManager>) -> ApiResult {
    let config = manager.get_acquisition_config().await;
    envelope(&manager, [("config", config_value(&config))]).await
}

async fn set_config(State(manager): State<SharedManager>, body: Bytes) -> ApiResult {
    let config = full_config_from(&body)?;
    let applied = manager.set_acquisition_config(config).await?;
    envelope(&manager, [("config", config_value(&applied))]).await
}

async fn update_config(State(manager): State<SharedManager>, body: Bytes) -> ApiResult {
    let update: ConfigUpdate = parse_body(&body)?.unwrap_or_default();
    let applied = manager.update_config(update).await?;
    envelope(&manager, [("config", config_value(&applied))]).await
}

async fn set_last_config(State(manager): State<SharedManager>) -> ApiResult {
    let applied = manager.set_last_config().await?;
    envelope(&manager, [("config", config_value(&applied))]).await
}

async fn get_detector_value(
    State(manager): State<SharedManager>,
    Path(name): Path<String>,
) -> ApiResult {
    let value = manager.get_detector_value(&name).await?;
    envelope(&manager, [("value", value)]).await
}

async fn set_detector_value(State(manager): State<SharedManager>, body: Bytes) -> ApiResult {
    let request: Map<String, Value> = parse_body(&body)?
        .filter(|r: &Map<String, Value>| !r.is_empty())
        .ok_or_else(|| {
            IntegrationError::InvalidRequest(
                "Set detector value JSON request cannot be empty.".to_string(),
            )
        })?;

    let (Some(Value::String(name)), Some(value)) = (request.get("name"), request.get("value"))
    else {
        return Err(IntegrationError::InvalidRequest(
            "'name' and 'value' must be set in JSON request.".to_string(),
        )
        .into());
    };

    let value = manager.set_detector_value(name, value.clone()).await?;
    envelope(&manager, [("value", value)]).await
}

async fn get_server_info(State(manager): State<SharedManager>) -> ApiResult {
    let info = serde_json::to_value(manager.get_server_info()).unwrap_or_default();
    envelope(&manager, [("server_info", info)]).await
}

async fn get_backend(
    State(manager): State<SharedManager>,
    Path(action): Path<String>,
) -> ApiResult {
    let query: BackendQuery = action.parse().map_err(IntegrationError::InvalidRequest)?;
    let value = manager.get_backend(query).await?;
    envelope(&manager, [("value", value)]).await
}

async fn put_backend(
    State(manager): State<SharedManager>,
    Path(action): Path<String>,
    body: Bytes,
) -> ApiResult {
    if action.parse::<BackendQuery>() != Ok(BackendQuery::Config) {
        return Err(IntegrationError::InvalidRequest(format!(
            "Action '{action}' not supported. Currently supported actions: config"
        ))
        .into());
    }
    let Some(Value::Object(config)) = parse_body::<Value>(&body)? else {
        return Err(IntegrationError::InvalidRequest(
            "Backend config must be a JSON object.".to_string(),
        )
        .into());
    };

    let stored = manager.set_backend_config(config).await?;
    envelope(&manager, [("config", Value::Object(stored))]).await
}

async fn debug_start(State(manager): State<SharedManager>, body: Bytes) -> ApiResult {
    let update: ConfigUpdate = parse_body(&body)?.unwrap_or_default();
    manager.debug_start(update).await?;
    envelope(&manager, []).await
}

async fn debug_stop(State(manager): State<SharedManager>) -> ApiResult {
    manager.debug_stop().await?;
    envelope(&manager, []).await
}

// =============================================================================
// Router and server
// =============================================================================

fn api_routes() -> Router<SharedManager> {
    Router::new()
        .route(routes::START, post(start))
        .route(routes::STOP, post(stop))
        .route(routes::RESET, post(reset))
        .route(routes::STATUS, get(get_status))
        .route(routes::STATUS_DETAILS, get(get_status_details))
        .route(
            routes::CONFIG,
            get(get_config).put(set_config).post(update_config),
        )
        .route(routes::SET_LAST_CONFIG, post(set_last_config))
        .route(routes::DETECTOR_VALUE, post(set_detector_value))
        .route(
            &format!("{}/{{name}}", routes::DETECTOR_VALUE),
            get(get_detector_value),
        )
        .route(routes::SERVER_INFO, get(get_server_info))
        .route(
            &format!("{}/{{action}}", routes::BACKEND),
            get(get_backend).put(put_backend),
        )
}

fn debug_routes() -> Router<SharedManager> {
    Router::new()
        .route(
            &format!("{}{}", routes::DEBUG_PREFIX, routes::START),
            post(debug_start),
        )
        .route(
            &format!("{}{}", routes::DEBUG_PREFIX, routes::STOP),
            post(debug_stop),
        )
}

/// Layers go on last so they wrap every merged route.
fn finish(routes: Router<SharedManager>, manager: SharedManager) -> Router {
    routes
        .layer(
            TraceLayer::new_for_http().on_request(|request: &Request<Body>, _span: &Span| {
                debug!(method = %request.method(), uri = %request.uri(), "Handling request");
            }),
        )
        .with_state(manager)
}

/// Router with the regular REST interface.
pub fn router(manager: SharedManager) -> Router {
    finish(api_routes(), manager)
}

/// Router with the regular interface plus the `/debug` routes.
pub fn router_with_debug(manager: SharedManager) -> Router {
    finish(api_routes().merge(debug_routes()), manager)
}

/// Bind `address` and serve until Ctrl-C.
pub async fn serve(manager: SharedManager, address: &str, debug_routes: bool) -> AppResult<()> {
    let app = if debug_routes {
        router_with_debug(manager)
    } else {
        router(manager)
    };

    let listener = TcpListener::bind(address).await?;
    info!(address = %listener.local_addr()?, "Integration REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutting down");
        })
        .await?;
    Ok(())
}
