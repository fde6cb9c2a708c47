//! JSON REST API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod devices;
#[allow(clippy::missing_errors_doc)]
pub mod stream;
#[allow(clippy::missing_errors_doc)]
pub mod users;

use std::str::FromStr;

use axum::Router;
use axum::routing::{get, patch, post};

use visionhub_app::ports::{DeviceRepository, UserRepository};
use visionhub_domain::id::{DeviceId, UserId};

use crate::error::ApiError;
use crate::state::AppState;

/// Build the `/api/v1` sub-router.
pub fn routes<DR, UR>() -> Router<AppState<DR, UR>>
where
    DR: DeviceRepository + Send + Sync + 'static,
    UR: UserRepository + Send + Sync + 'static,
{
    Router::new()
        // Devices
        .route(
            "/devices",
            get(devices::list::<DR, UR>).post(devices::create::<DR, UR>),
        )
        .route("/devices/statistics", get(devices::statistics::<DR, UR>))
        .route("/devices/snapshot", get(stream::snapshot::<DR, UR>))
        .route("/devices/stream", get(stream::stream::<DR, UR>))
        .route(
            "/devices/batch/status",
            patch(devices::update_statuses::<DR, UR>),
        )
        .route(
            "/devices/{id}",
            get(devices::get::<DR, UR>).delete(devices::delete::<DR, UR>),
        )
        .route(
            "/devices/{id}/status",
            patch(devices::update_status::<DR, UR>),
        )
        .route(
            "/devices/{id}/heartbeat",
            post(devices::heartbeat::<DR, UR>),
        )
        // Users
        .route(
            "/users",
            get(users::list::<DR, UR>).post(users::create::<DR, UR>),
        )
        .route(
            "/users/{id}",
            get(users::get::<DR, UR>).delete(users::delete::<DR, UR>),
        )
}

/// Unparseable ids cannot name a stored device, so they are a 404.
fn parse_device_id(raw: &str) -> Result<DeviceId, ApiError> {
    DeviceId::from_str(raw).map_err(|_| ApiError::not_found("Device", raw))
}

fn parse_user_id(raw: &str) -> Result<UserId, ApiError> {
    UserId::from_str(raw).map_err(|_| ApiError::not_found("User", raw))
}
