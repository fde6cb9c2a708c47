//! Storage port — repository traits for persistence.
//!
//! The core only depends on these contracts; the `SQLite` adapter (or the
//! in-memory fakes used in tests) provides the implementations.

use std::future::Future;
use std::sync::Arc;

use visionhub_domain::device::{Device, DeviceStatus, DeviceType};
use visionhub_domain::error::VisionHubError;
use visionhub_domain::id::{DeviceId, UserId};
use visionhub_domain::time::Timestamp;
use visionhub_domain::user::User;

/// Persistence contract for devices.
pub trait DeviceRepository {
    /// Insert or replace a device. A failed save leaves no partial write behind.
    fn save(&self, device: &Device) -> impl Future<Output = Result<(), VisionHubError>> + Send;

    /// Look up a device; `Ok(None)` when it does not exist.
    fn find_by_id(
        &self,
        id: DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, VisionHubError>> + Send;

    /// Every stored device.
    fn find_all(&self) -> impl Future<Output = Result<Vec<Device>, VisionHubError>> + Send;

    /// Devices currently in `status`.
    fn find_by_status(
        &self,
        status: DeviceStatus,
    ) -> impl Future<Output = Result<Vec<Device>, VisionHubError>> + Send;

    /// Devices of the given kind.
    fn find_by_type(
        &self,
        device_type: DeviceType,
    ) -> impl Future<Output = Result<Vec<Device>, VisionHubError>> + Send;

    /// Devices whose last heartbeat is older than `threshold`. Devices that
    /// never reported a heartbeat are not included.
    fn find_stale(
        &self,
        threshold: Timestamp,
    ) -> impl Future<Output = Result<Vec<Device>, VisionHubError>> + Send;

    /// Devices whose name, location, IP address or id contains `keyword`,
    /// ignoring ASCII case.
    fn search(
        &self,
        keyword: &str,
    ) -> impl Future<Output = Result<Vec<Device>, VisionHubError>> + Send;

    /// Remove a device.
    ///
    /// Fails with [`VisionHubError::NotFound`] when nothing was removed; the
    /// check and the removal are a single operation.
    fn delete(&self, id: DeviceId) -> impl Future<Output = Result<(), VisionHubError>> + Send;
}

impl<T: DeviceRepository + Send + Sync> DeviceRepository for Arc<T> {
    fn save(&self, device: &Device) -> impl Future<Output = Result<(), VisionHubError>> + Send {
        (**self).save(device)
    }

    fn find_by_id(
        &self,
        id: DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, VisionHubError>> + Send {
        (**self).find_by_id(id)
    }

    fn find_all(&self) -> impl Future<Output = Result<Vec<Device>, VisionHubError>> + Send {
        (**self).find_all()
    }

    fn find_by_status(
        &self,
        status: DeviceStatus,
    ) -> impl Future<Output = Result<Vec<Device>, VisionHubError>> + Send {
        (**self).find_by_status(status)
    }

    fn find_by_type(
        &self,
        device_type: DeviceType,
    ) -> impl Future<Output = Result<Vec<Device>, VisionHubError>> + Send {
        (**self).find_by_type(device_type)
    }

    fn find_stale(
        &self,
        threshold: Timestamp,
    ) -> impl Future<Output = Result<Vec<Device>, VisionHubError>> + Send {
        (**self).find_stale(threshold)
    }

    fn search(
        &self,
        keyword: &str,
    ) -> impl Future<Output = Result<Vec<Device>, VisionHubError>> + Send {
        (**self).search(keyword)
    }

    fn delete(&self, id: DeviceId) -> impl Future<Output = Result<(), VisionHubError>> + Send {
        (**self).delete(id)
    }
}

/// Persistence contract for users. Same shape as [`DeviceRepository`].
pub trait UserRepository {
    fn save(&self, user: &User) -> impl Future<Output = Result<(), VisionHubError>> + Send;

    fn find_by_id(
        &self,
        id: UserId,
    ) -> impl Future<Output = Result<Option<User>, VisionHubError>> + Send;

    fn find_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<User>, VisionHubError>> + Send;

    fn find_all(&self) -> impl Future<Output = Result<Vec<User>, VisionHubError>> + Send;

    /// Remove a user; [`VisionHubError::NotFound`] when nothing was removed.
    fn delete(&self, id: UserId) -> impl Future<Output = Result<(), VisionHubError>> + Send;
}
