//! HTTP surface
//!
//! A thin axum adapter over [`CoreAdmin`](crate::admin::CoreAdmin) and
//! the cores' handler tables.
//!
//! | Path | Target |
//! |------|--------|
//! | `/admin/metrics` | Prometheus text |
//! | `/admin`, `/admin/cores?action=` | admin action (default `STATUS`) |
//! | `/admin/monitors` | `MONITORS` |
//! | `/admin/cluster` | `CLUSTER` |
//! | `/admin/cluster/{ping,join,attach,hosts}` | cluster handshakes |
//! | `/<core>/<handler...>` | the core's handler, longest prefix match |

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use ch_04_core_cluster::{
    HostState, ATTACH_PATH, CLUSTER_ID_HEADER, HOSTS_PATH, JOIN_PATH, PING_PATH, SECRET_HEADER,
};
use core_telemetry::{encode_metrics, CORES_LOADED, FETCH_FAILURES, HOSTS_KNOWN};
use serde_json::json;
use shared_types::{CoreError, CoreResult, NamedList};
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::admin::{AdminAction, AdminRequest};
use crate::container::CoreContainers;
use crate::cores::CoreRequest;
use crate::error::AdminError;

pub const ADMIN_PATH: &str = "/admin";
pub const METRICS_PATH: &str = "/admin/metrics";

#[derive(Clone)]
struct AppState {
    containers: Arc<CoreContainers>,
}

pub fn router(containers: Arc<CoreContainers>) -> Router {
    Router::new()
        .route(METRICS_PATH, get(metrics))
        .fallback(dispatch)
        .with_state(AppState { containers })
}

/// Bind `addr` and serve until `shutdown` resolves.
pub async fn serve<F>(containers: Arc<CoreContainers>, addr: SocketAddr, shutdown: F) -> CoreResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| CoreError::io(addr.to_string(), e))?;
    serve_on(listener, containers, shutdown).await
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve_on<F>(listener: TcpListener, containers: Arc<CoreContainers>, shutdown: F) -> CoreResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener
        .local_addr()
        .map_err(|e| CoreError::io("http listener", e))?;
    info!(addr = %addr, "[http] Serving");
    axum::serve(listener, router(containers))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| CoreError::io(addr.to_string(), e))?;
    info!(addr = %addr, "[http] Stopped");
    Ok(())
}

async fn metrics(State(state): State<AppState>) -> Response {
    let cluster = state.containers.cluster();
    CORES_LOADED.set(state.containers.core_count() as i64);
    HOSTS_KNOWN.set(cluster.hosts_in_state(HostState::Known).len() as i64);
    FETCH_FAILURES.set(cluster.stats().fetch_failures as i64);
    match encode_metrics() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

async fn dispatch(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Response {
    let path = uri.path();
    debug!(path, "[http] Request");

    let body = if body.is_empty() {
        None
    } else {
        match serde_json::from_slice::<serde_json::Value>(&body) {
            Ok(value) => Some(value),
            Err(e) => {
                return error_response(StatusCode::BAD_REQUEST, &format!("invalid JSON body: {e}"))
            }
        }
    };
    let params: NamedList = query.into_iter().collect();

    if path == ADMIN_PATH || path.starts_with("/admin/") {
        admin(&state, path, &headers, params, body)
    } else {
        core(&state, path, params, body)
    }
}

fn admin(
    state: &AppState,
    path: &str,
    headers: &HeaderMap,
    params: NamedList,
    body: Option<serde_json::Value>,
) -> Response {
    let action = match admin_action(path, params.get_str("action")) {
        Ok(action) => action,
        Err(e) => return admin_error(&e),
    };
    let Some(admin) = state.containers.admin() else {
        return admin_error(&AdminError::Unavailable);
    };
    let request = AdminRequest {
        action,
        params,
        body,
        secret: header_value(headers, SECRET_HEADER),
        cluster_id: header_value(headers, CLUSTER_ID_HEADER),
    };
    match admin.handle(&request) {
        Ok(value) => Json(value).into_response(),
        Err(e) => admin_error(&e),
    }
}

/// Map an admin path to its action. `/admin` and `/admin/cores` take the
/// `action` parameter.
pub fn admin_action(path: &str, action: Option<&str>) -> Result<AdminAction, AdminError> {
    let path = path.trim_end_matches('/');
    match path {
        p if p == PING_PATH => Ok(AdminAction::Ping),
        p if p == JOIN_PATH => Ok(AdminAction::Join),
        p if p == ATTACH_PATH => Ok(AdminAction::Attach),
        p if p == HOSTS_PATH => Ok(AdminAction::Hosts),
        "/admin/cluster" => Ok(AdminAction::Cluster),
        "/admin/monitors" => Ok(AdminAction::Monitors),
        "" | "/admin" | "/admin/cores" => match action {
            Some(a) if !a.is_empty() => a.parse(),
            _ => Ok(AdminAction::Status),
        },
        other => Err(AdminError::Core(CoreError::NotFound(other.to_string()))),
    }
}

fn core(state: &AppState, path: &str, params: NamedList, body: Option<serde_json::Value>) -> Response {
    let trimmed = path.trim_start_matches('/');
    let (name, handler_path) = match trimmed.split_once('/') {
        Some((name, rest)) => (name, format!("/{rest}")),
        None => (trimmed, String::new()),
    };
    let Some(core) = state.containers.get_core(name) else {
        return error_response(StatusCode::NOT_FOUND, &format!("no core '{name}'"));
    };
    let request = CoreRequest {
        path: handler_path,
        params,
        body,
    };
    match core.handle(&request) {
        Ok(response) => Json(response.to_json()).into_response(),
        Err(e) => admin_error(&AdminError::Core(e)),
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn admin_error(err: &AdminError) -> Response {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    error_response(status, &err.to_string())
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "error": { "status": status.as_u16(), "message": message } })),
    )
        .into_response()
}
