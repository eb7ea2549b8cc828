//! Liveness endpoint: `GET /healthz` reports the current service state.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::info;

use crate::lifecycle::Lifecycle;
use crate::shutdown::Shutdown;

pub fn router(lifecycle: Lifecycle) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .with_state(lifecycle)
}

/// 200 while the service is live, 503 once it is shutting down.
async fn healthz(State(lifecycle): State<Lifecycle>) -> (StatusCode, Json<Value>) {
    let state = lifecycle.current();
    let status = if state.is_live() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(json!({ "status": state.as_str() })))
}

/// Serves on `listener` until shutdown fires.
pub async fn serve_health(
    listener: TcpListener,
    lifecycle: Lifecycle,
    mut shutdown: Shutdown,
) -> std::io::Result<()> {
    info!(addr = ?listener.local_addr().ok(), "Liveness endpoint listening");
    axum::serve(listener, router(lifecycle))
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await
}
