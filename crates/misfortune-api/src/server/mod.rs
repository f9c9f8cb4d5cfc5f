use std::net::SocketAddr;
use std::path::Path;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path as UrlPath, Query, Request, State};
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::Method;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use contracts::{
    ApiError, ChatCard, ConnectedUser, DisplayCue, ErrorCode, LogViewEntry, Notice,
    ReplicationMessage, RollTestEvent, TrackerControl, TrackerRender, TriggerConfig,
    TriggerConfigPatch, UserRole, SCHEMA_VERSION_V1, SOCKET_NAME,
};
use misfortune_core::{
    replication, AuthorityError, ChatCommand, ChatDisposition, ControlOutcome, Discard,
    MisfortuneModule, Outbox, RollOutcome, TrackerView,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use crate::{open_table, TableError};

const DEFAULT_SQLITE_PATH: &str = "misfortune.sqlite";
const STREAM_CAPACITY: usize = 1024;

include!("error.rs");
include!("state.rs");
include!("routes/session.rs");
include!("routes/table.rs");
include!("routes/stream.rs");
include!("util.rs");

/// Serve the table until ctrl-c, then flush the pool and log to disk.
pub async fn serve(addr: SocketAddr, sqlite_path: Option<&Path>) -> Result<(), ServerError> {
    let sqlite_path = sqlite_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_sqlite_path().into());
    let state = AppState::open(&sqlite_path)?;
    let app = router(state.clone());

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, sqlite_path = %sqlite_path.display(), "misfortune table listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let mut inner = state.inner.lock().await;
    inner.module.flush()?;
    info!("pool flushed, shutting down");

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/session/connect", post(connect_user))
        .route("/api/v1/session/disconnect", post(disconnect_user))
        .route("/api/v1/roster", get(get_roster))
        .route("/api/v1/rolls", post(submit_roll))
        .route("/api/v1/chat", post(submit_chat))
        .route("/api/v1/tracker", get(get_tracker))
        .route("/api/v1/tracker/reset/confirm", post(confirm_reset))
        .route("/api/v1/tracker/{control}", post(press_control))
        .route("/api/v1/log", get(get_log))
        .route("/api/v1/config", get(get_config).put(update_config))
        .route("/api/v1/stream", get(stream_table))
        .layer(middleware::from_fn(cors_middleware))
        .with_state(state)
}

async fn cors_middleware(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = Response::new(axum::body::Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(response.headers_mut());
    response
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
