//! Operational HTTP endpoints.
//!
//! - `/healthz`  : liveness
//! - `/readyz`   : readiness (503 while shutting down)
//! - `/metrics`  : latest reported cycle as a JSON array
//! - `/requests` : request timing trees from the latest cycle

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::app_state::AppState;

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    if state.is_draining() {
        (StatusCode::SERVICE_UNAVAILABLE, "draining")
    } else {
        (StatusCode::OK, "ready")
    }
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    latest(&state, |c| c.metrics.clone())
}

pub async fn requests(State(state): State<AppState>) -> Response {
    latest(&state, |c| c.requests.clone())
}

fn latest(state: &AppState, pick: impl Fn(&crate::sinks::json::JsonCycle) -> String) -> Response {
    let Some(buffer) = state.json_buffer() else {
        return (StatusCode::NOT_FOUND, "json sink disabled").into_response();
    };
    let body = buffer.latest().map(|c| pick(&c)).unwrap_or_else(|| "[]".to_string());
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response()
}
