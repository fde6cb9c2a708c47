//! WebSocket endpoint pushing device status snapshots.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use serde::Serialize;

use visionhub_app::ports::{DeviceRepository, UserRepository};
use visionhub_app::status_registry::{StatusEntry, Subscription};

use crate::error::ApiError;
use crate::state::AppState;

/// Text frame sent for every snapshot.
#[derive(Debug, Serialize)]
pub struct StatusFrame<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub data: &'a [StatusEntry],
}

impl<'a> StatusFrame<'a> {
    #[must_use]
    pub fn new(data: &'a [StatusEntry]) -> Self {
        Self {
            kind: "device_status",
            data,
        }
    }
}

/// `GET /ws/devices`
///
/// The subscription is taken before the upgrade so a failing initial load
/// is reported as a plain HTTP error.
///
/// # Errors
///
/// Returns [`ApiError`] when the registry cannot load the device statuses.
pub async fn devices<DR, UR>(
    State(state): State<AppState<DR, UR>>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    UR: UserRepository + Send + Sync + 'static,
{
    let subscription = state.registry().subscribe().await?;
    Ok(ws.on_upgrade(move |socket| pump(socket, subscription)))
}

async fn pump(mut socket: WebSocket, mut subscription: Subscription) {
    loop {
        tokio::select! {
            snapshot = subscription.next() => {
                let Some(snapshot) = snapshot else { break };
                let frame = match serde_json::to_string(&StatusFrame::new(&snapshot)) {
                    Ok(frame) => frame,
                    Err(err) => {
                        tracing::warn!(%err, "failed to encode status frame");
                        continue;
                    }
                };
                if socket.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    tracing::debug!(subscription = %subscription.id(), "websocket closed");
    subscription.detach();
}
