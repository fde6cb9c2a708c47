//! Shared application state for axum handlers.

use std::sync::Arc;

use visionhub_app::ports::{DeviceRepository, UserRepository};
use visionhub_app::services::{DeviceService, UserService};
use visionhub_app::status_registry::StatusRegistry;

/// Application state shared across all axum handlers.
///
/// Generic over the repository types to avoid dynamic dispatch.
/// `Clone` is implemented manually so the underlying types themselves do not
/// need to be `Clone` — only the `Arc` wrappers are cloned.
pub struct AppState<DR, UR> {
    /// Device CRUD and status changes.
    pub device_service: Arc<DeviceService<DR>>,
    /// User CRUD service.
    pub user_service: Arc<UserService<UR>>,
}

impl<DR, UR> Clone for AppState<DR, UR> {
    fn clone(&self) -> Self {
        Self {
            device_service: Arc::clone(&self.device_service),
            user_service: Arc::clone(&self.user_service),
        }
    }
}

impl<DR, UR> AppState<DR, UR>
where
    DR: DeviceRepository + Send + Sync + 'static,
    UR: UserRepository + Send + Sync + 'static,
{
    /// Create a new application state from service instances.
    pub fn new(device_service: DeviceService<DR>, user_service: UserService<UR>) -> Self {
        Self::from_arcs(Arc::new(device_service), Arc::new(user_service))
    }

    /// Create a new application state from pre-wrapped `Arc` services.
    ///
    /// Use this when services need to be shared with background tasks
    /// before constructing the HTTP state.
    pub fn from_arcs(
        device_service: Arc<DeviceService<DR>>,
        user_service: Arc<UserService<UR>>,
    ) -> Self {
        Self {
            device_service,
            user_service,
        }
    }

    /// The live status registry behind the device service.
    #[must_use]
    pub fn registry(&self) -> &Arc<StatusRegistry<DR>> {
        self.device_service.registry()
    }
}
