use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use tracing::warn;

use crate::db;
use crate::state::AppState;

/// GET /health
/// Liveness: the process is up and serving.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "hirehub-api"
    }))
}

/// GET /health/ready
/// Readiness: PostgreSQL and Redis both answer.
pub async fn ready_handler(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let database = match db::ping(&state.db).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Readiness: database unreachable: {e}");
            false
        }
    };
    let cache = match state.cache.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!("Readiness: cache unreachable: {e}");
            false
        }
    };

    let ready = database && cache;
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "status": if ready { "ready" } else { "unavailable" },
            "checks": { "database": database, "cache": cache }
        })),
    )
}
