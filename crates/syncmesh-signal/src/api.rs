//! HTTP API of the signalling server.
//!
//! Endpoints:
//! - GET  /ping
//! - GET  /discover[?excludeId=]
//! - POST /register
//! - POST /unregister?clientId=
//! - POST /heartbeat?clientId=

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use log::debug;
use serde::Deserialize;
use syncmesh_common::api::{
    ClientSnapshot, DiscoverResponse, PingResponse, RegisterRequest, RegisterResponse,
    StatusResponse, SystemInfo, STATUS_AVAILABLE, STATUS_SUCCESS,
};
use syncmesh_common::HostPort;
use tower_http::catch_panic::CatchPanicLayer;

use crate::error::{ApiError, ApiResult};
use crate::registry::Registry;

/// Build the API router around a registry.
pub fn build_router(registry: Arc<Registry>) -> Router {
    let router = Router::new()
        .route("/ping", get(ping))
        .route("/discover", get(discover))
        .route("/register", post(register))
        .route("/unregister", post(unregister))
        .route("/heartbeat", post(heartbeat))
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .with_state(registry);
    with_fault_boundary(router)
}

/// Turn a panic in any handler into a 500 for that request alone.
pub fn with_fault_boundary<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(CatchPanicLayer::custom(handle_panic))
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    ApiError::Internal(anyhow::anyhow!("handler panicked: {}", detail)).into_response()
}

// ---------- Query parameters ----------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClientIdQuery {
    client_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiscoverQuery {
    exclude_id: Option<String>,
}

// ---------- Handlers ----------

async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        status: STATUS_AVAILABLE.to_string(),
        system_info: SystemInfo {
            server_timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        },
    })
}

async fn register(
    State(registry): State<Arc<Registry>>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> ApiResult<Json<RegisterResponse>> {
    let request = parse_register_body(&body)?;
    let public = HostPort::from_socket_addr(remote);
    let client_id = registry.register(public, request.local_address()).await;

    Ok(Json(RegisterResponse {
        status: STATUS_SUCCESS.to_string(),
        client_id,
    }))
}

/// An empty body registers without a local address.
fn parse_register_body(body: &[u8]) -> ApiResult<RegisterRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RegisterRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        debug!("Rejected register body: {}", e);
        ApiError::bad_request("invalid JSON body")
    })
}

async fn unregister(
    State(registry): State<Arc<Registry>>,
    Query(query): Query<ClientIdQuery>,
) -> Json<StatusResponse> {
    if let Some(id) = query.client_id.as_deref() {
        registry.unregister(id).await;
    }
    Json(StatusResponse::success())
}

async fn heartbeat(
    State(registry): State<Arc<Registry>>,
    Query(query): Query<ClientIdQuery>,
) -> ApiResult<Json<StatusResponse>> {
    let id = query
        .client_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("clientId is required"))?;

    if !registry.touch(&id).await {
        return Err(ApiError::not_found("client not found"));
    }
    Ok(Json(StatusResponse::success()))
}

async fn discover(
    State(registry): State<Arc<Registry>>,
    Query(query): Query<DiscoverQuery>,
) -> Json<DiscoverResponse> {
    let clients = registry
        .list()
        .await
        .into_iter()
        .filter(|(id, _)| query.exclude_id.as_deref() != Some(id.as_str()))
        .map(|(client_id, record)| {
            let local = record.local_address.unwrap_or_default();
            ClientSnapshot {
                client_id,
                public_ip: record.public_address.host,
                public_port: record.public_address.port,
                local_ip: local.host,
                local_port: local.port,
            }
        })
        .collect();

    Json(DiscoverResponse {
        status: STATUS_SUCCESS.to_string(),
        clients,
    })
}

async fn not_found() -> ApiError {
    ApiError::not_found("the requested resource could not be found")
}

async fn method_not_allowed(method: Method) -> ApiError {
    ApiError::MethodNotAllowed(method)
}
