//! Live device status: point-in-time snapshot and Server-Sent Events stream.

use axum::Json;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use visionhub_app::ports::{DeviceRepository, UserRepository};
use visionhub_app::status_registry::{Snapshot, StatusEntry};

use crate::error::ApiError;
use crate::state::AppState;

/// SSE event name carrying a full status snapshot.
pub const DEVICE_STATUS_EVENT: &str = "device_status";

/// `GET /api/v1/devices/snapshot` — the registry's current view.
pub async fn snapshot<DR, UR>(
    State(state): State<AppState<DR, UR>>,
) -> Result<Json<Vec<StatusEntry>>, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    UR: UserRepository + Send + Sync + 'static,
{
    let registry = state.registry();
    registry.ensure_loaded().await?;
    Ok(Json(registry.current_snapshot().to_vec()))
}

/// `GET /api/v1/devices/stream` — one `device_status` event per snapshot.
///
/// The first event carries the snapshot current at connect time. A client
/// that reads slowly only ever gets the newest snapshot; once it
/// disconnects, the next broadcast detaches its subscription.
pub async fn stream<DR, UR>(
    State(state): State<AppState<DR, UR>>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, axum::Error>>>, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    UR: UserRepository + Send + Sync + 'static,
{
    let registry = state.registry();
    let subscription = registry.subscribe().await?;
    let (tx, rx) = mpsc::channel::<Snapshot>(1);
    registry.on_broadcast(subscription, move |snapshot| {
        let tx = tx.clone();
        async move { tx.send(snapshot).await }
    });

    let events = ReceiverStream::new(rx).map(|snapshot| {
        Event::default()
            .event(DEVICE_STATUS_EVENT)
            .json_data(&*snapshot)
    });
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
