//! Axum router assembly.

use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use visionhub_app::ports::{DeviceRepository, UserRepository};
use visionhub_domain::time::{Timestamp, now};

use crate::state::AppState;

#[derive(Serialize)]
struct Health {
    status: &'static str,
    timestamp: Timestamp,
}

/// Build the top-level axum [`Router`].
///
/// Nests the JSON API under `/api/v1` and mounts the WebSocket stream at
/// `/ws/devices`. Includes a [`TraceLayer`] that logs each HTTP
/// request/response at the `DEBUG` level using the `tracing` ecosystem.
pub fn build<DR, UR>(state: AppState<DR, UR>) -> Router
where
    DR: DeviceRepository + Send + Sync + 'static,
    UR: UserRepository + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .route("/ws/devices", get(crate::ws::devices::<DR, UR>))
        .nest("/api/v1", crate::api::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> Json<Health> {
    Json(Health {
        status: "ok",
        timestamp: now(),
    })
}
