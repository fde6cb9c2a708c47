//! Device service — use-cases for managing devices and their status.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use visionhub_domain::device::{Device, DeviceConfig, DeviceStatus, DeviceType};
use visionhub_domain::error::{NotFoundError, VisionHubError};
use visionhub_domain::id::DeviceId;
use visionhub_domain::time::{minutes_before, now};

use crate::device_locks::DeviceLocks;
use crate::ports::DeviceRepository;
use crate::status_registry::{StatusEntry, StatusRegistry};

/// Input of [`DeviceService::create_device`].
#[derive(Debug, Clone)]
pub struct CreateDevice {
    pub name: String,
    pub device_type: DeviceType,
    pub location: String,
    pub ip_address: Option<String>,
    pub mac_address: Option<String>,
    pub config: DeviceConfig,
    /// Initial status; `offline` when absent.
    pub status: Option<DeviceStatus>,
}

/// Input of [`DeviceService::update_device_status`].
///
/// Both fields are raw strings because they come straight from the outside.
#[derive(Debug, Clone)]
pub struct UpdateDeviceStatus {
    pub device_id: String,
    pub status: String,
    pub reason: Option<String>,
}

/// Device counts per status and per type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatistics {
    pub total: usize,
    pub by_status: HashMap<DeviceStatus, usize>,
    pub by_type: HashMap<DeviceType, usize>,
}

impl DeviceStatistics {
    fn from_devices(devices: &[Device]) -> Self {
        let mut by_status: HashMap<DeviceStatus, usize> =
            DeviceStatus::ALL.into_iter().map(|s| (s, 0)).collect();
        let mut by_type: HashMap<DeviceType, usize> =
            DeviceType::ALL.into_iter().map(|t| (t, 0)).collect();
        for device in devices {
            *by_status.entry(device.status).or_default() += 1;
            *by_type.entry(device.device_type).or_default() += 1;
        }
        Self {
            total: devices.len(),
            by_status,
            by_type,
        }
    }
}

fn not_found(id: impl ToString) -> VisionHubError {
    NotFoundError {
        entity: "Device",
        id: id.to_string(),
    }
    .into()
}

/// Application service for device CRUD and status changes.
///
/// Every write to one device runs under that device's lock, so the
/// persisted record and the registry entry move together.
pub struct DeviceService<R> {
    repo: R,
    registry: Arc<StatusRegistry<R>>,
    locks: DeviceLocks,
}

impl<R: DeviceRepository> DeviceService<R> {
    /// Create a new service backed by the given repository and registry.
    pub fn new(repo: R, registry: Arc<StatusRegistry<R>>) -> Self {
        Self {
            repo,
            registry,
            locks: DeviceLocks::new(),
        }
    }

    /// The registry this service keeps up to date.
    #[must_use]
    pub fn registry(&self) -> &Arc<StatusRegistry<R>> {
        &self.registry
    }

    /// Create and persist a new device with a fresh id.
    ///
    /// The device is added to the registry without notifying subscribers.
    ///
    /// # Errors
    ///
    /// Returns [`VisionHubError::Validation`] if invariants fail, or a
    /// storage error propagated from the repository.
    #[tracing::instrument(skip(self, cmd), fields(device_name = %cmd.name))]
    pub async fn create_device(&self, cmd: CreateDevice) -> Result<Device, VisionHubError> {
        let mut builder = Device::builder()
            .name(cmd.name)
            .device_type(cmd.device_type)
            .location(cmd.location)
            .config(cmd.config);
        if let Some(ip_address) = cmd.ip_address {
            builder = builder.ip_address(ip_address);
        }
        if let Some(mac_address) = cmd.mac_address {
            builder = builder.mac_address(mac_address);
        }
        if let Some(status) = cmd.status {
            builder = builder.status(status);
        }
        let device = builder.build()?;

        self.repo.save(&device).await?;
        self.registry.track(StatusEntry::from(&device));
        tracing::info!(device_id = %device.id, "device created");
        Ok(device)
    }

    /// Move a device to a new status.
    ///
    /// An id that does not parse is reported as not found, like any other
    /// unknown id.
    ///
    /// # Errors
    ///
    /// Returns [`VisionHubError::NotFound`] for an unknown device,
    /// [`VisionHubError::InvalidStatus`] for an unknown status, or a storage
    /// error. The registry is untouched on every error.
    #[tracing::instrument(skip(self, cmd), fields(device_id = %cmd.device_id, status = %cmd.status))]
    pub async fn update_device_status(
        &self,
        cmd: UpdateDeviceStatus,
    ) -> Result<Device, VisionHubError> {
        let id = DeviceId::from_str(&cmd.device_id).map_err(|_| not_found(&cmd.device_id))?;
        self.apply_status(id, &cmd.status, cmd.reason).await
    }

    async fn apply_status(
        &self,
        id: DeviceId,
        status: &str,
        reason: Option<String>,
    ) -> Result<Device, VisionHubError> {
        let _guard = self.locks.lock(id).await;
        let mut device = self.repo.find_by_id(id).await?.ok_or_else(|| not_found(id))?;
        let status = DeviceStatus::from_str(status)?;

        if let Some(reason) = reason.as_deref() {
            tracing::info!(device_id = %id, from = %device.status, to = %status, reason, "device status changed");
        } else {
            tracing::info!(device_id = %id, from = %device.status, to = %status, "device status changed");
        }
        device.update_status(status, reason, now());
        self.repo.save(&device).await?;
        self.registry.record(StatusEntry::from(&device));
        Ok(device)
    }

    /// Apply the same status to several devices, in order.
    ///
    /// Each device is updated on its own; updates applied before a failure
    /// stay applied.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first failure, as for
    /// [`update_device_status`](Self::update_device_status).
    #[tracing::instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn update_device_statuses(
        &self,
        ids: &[DeviceId],
        status: &str,
        reason: Option<String>,
    ) -> Result<Vec<Device>, VisionHubError> {
        DeviceStatus::from_str(status)?;
        let mut updated = Vec::with_capacity(ids.len());
        for id in ids {
            updated.push(self.apply_status(*id, status, reason.clone()).await?);
        }
        Ok(updated)
    }

    /// Record a heartbeat: the device is marked online.
    ///
    /// # Errors
    ///
    /// Returns [`VisionHubError::NotFound`] for an unknown device, or a
    /// storage error.
    #[tracing::instrument(skip(self))]
    pub async fn record_heartbeat(&self, id: DeviceId) -> Result<Device, VisionHubError> {
        let _guard = self.locks.lock(id).await;
        let mut device = self.repo.find_by_id(id).await?.ok_or_else(|| not_found(id))?;
        let was_online = device.is_online();

        device.record_heartbeat(now());
        self.repo.save(&device).await?;
        if was_online {
            self.registry.track(StatusEntry::from(&device));
        } else {
            self.registry.record(StatusEntry::from(&device));
        }
        Ok(device)
    }

    /// Look up a device by id.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn get_device(&self, id: DeviceId) -> Result<Option<Device>, VisionHubError> {
        self.repo.find_by_id(id).await
    }

    /// List all devices.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_devices(&self) -> Result<Vec<Device>, VisionHubError> {
        self.repo.find_all().await
    }

    /// List devices currently in `status`.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_devices_by_status(
        &self,
        status: DeviceStatus,
    ) -> Result<Vec<Device>, VisionHubError> {
        self.repo.find_by_status(status).await
    }

    /// List devices of one kind.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_devices_by_type(
        &self,
        device_type: DeviceType,
    ) -> Result<Vec<Device>, VisionHubError> {
        self.repo.find_by_type(device_type).await
    }

    /// Devices whose last heartbeat is more than `minutes` old.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_stale_devices(&self, minutes: u32) -> Result<Vec<Device>, VisionHubError> {
        self.repo.find_stale(minutes_before(now(), minutes)).await
    }

    /// Devices whose name, location, IP address or id contains `keyword`.
    /// A blank keyword matches every device.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn search_devices(&self, keyword: &str) -> Result<Vec<Device>, VisionHubError> {
        self.repo.search(keyword.trim()).await
    }

    /// Count devices per status and per type.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn device_statistics(&self) -> Result<DeviceStatistics, VisionHubError> {
        let devices = self.repo.find_all().await?;
        Ok(DeviceStatistics::from_devices(&devices))
    }

    /// Delete a device and drop it from the registry.
    ///
    /// # Errors
    ///
    /// Returns [`VisionHubError::NotFound`] when the repository had no such
    /// device, or a storage error.
    #[tracing::instrument(skip(self))]
    pub async fn delete_device(&self, id: DeviceId) -> Result<(), VisionHubError> {
        {
            let _guard = self.locks.lock(id).await;
            self.repo.delete(id).await?;
            self.registry.evict(id);
        }
        self.locks.forget(id);
        tracing::info!(device_id = %id, "device deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status_registry::{RegistryConfig, Snapshot, Subscription};
    use crate::test_support::{InMemoryDeviceRepo, camera};
    use std::time::Duration;
    use visionhub_domain::error::ValidationError;

    type Service = DeviceService<Arc<InMemoryDeviceRepo>>;

    fn make_service_with(repo: InMemoryDeviceRepo) -> (Service, Arc<InMemoryDeviceRepo>) {
        let repo = Arc::new(repo);
        let registry = Arc::new(StatusRegistry::new(
            Arc::clone(&repo),
            RegistryConfig::default(),
        ));
        (DeviceService::new(Arc::clone(&repo), registry), repo)
    }

    fn make_service() -> Service {
        make_service_with(InMemoryDeviceRepo::default()).0
    }

    fn cam1() -> CreateDevice {
        CreateDevice {
            name: "Cam1".to_string(),
            device_type: DeviceType::Camera,
            location: "dock-1".to_string(),
            ip_address: None,
            mac_address: None,
            config: DeviceConfig::new(),
            status: None,
        }
    }

    fn set_status(id: DeviceId, status: &str) -> UpdateDeviceStatus {
        UpdateDeviceStatus {
            device_id: id.to_string(),
            status: status.to_string(),
            reason: None,
        }
    }

    async fn next_snapshot(sub: &mut Subscription) -> Option<Snapshot> {
        tokio::time::timeout(Duration::from_millis(200), sub.next())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test]
    async fn should_create_offline_device_with_unique_id() {
        let svc = make_service();

        let a = svc.create_device(cam1()).await.unwrap();
        let b = svc.create_device(cam1()).await.unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(a.status, DeviceStatus::Offline);
        assert_eq!(b.status, DeviceStatus::Offline);
    }

    #[tokio::test]
    async fn should_honour_explicit_initial_status() {
        let svc = make_service();
        let cmd = CreateDevice {
            status: Some(DeviceStatus::Maintenance),
            ..cam1()
        };

        let device = svc.create_device(cmd).await.unwrap();
        assert_eq!(device.status, DeviceStatus::Maintenance);
    }

    #[tokio::test]
    async fn should_reject_create_when_location_is_empty() {
        let svc = make_service();
        let cmd = CreateDevice {
            location: String::new(),
            ..cam1()
        };

        let result = svc.create_device(cmd).await;
        assert!(matches!(
            result,
            Err(VisionHubError::Validation(ValidationError::EmptyLocation))
        ));
        assert!(svc.list_devices().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_track_created_device_without_broadcasting() {
        let svc = make_service();
        let mut sub = svc.registry().subscribe().await.unwrap();
        next_snapshot(&mut sub).await.unwrap();

        let device = svc.create_device(cam1()).await.unwrap();

        assert!(next_snapshot(&mut sub).await.is_none());
        let snapshot = svc.registry().current_snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, device.id);
        assert_eq!(snapshot[0].status, DeviceStatus::Offline);
    }

    #[tokio::test]
    async fn should_update_status_and_read_it_back() {
        let svc = make_service();
        let device = svc.create_device(cam1()).await.unwrap();

        let updated = svc
            .update_device_status(set_status(device.id, "online"))
            .await
            .unwrap();
        assert_eq!(updated.status, DeviceStatus::Online);

        let fetched = svc.get_device(device.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, DeviceStatus::Online);
    }

    #[tokio::test]
    async fn should_keep_reason_with_status() {
        let svc = make_service();
        let device = svc.create_device(cam1()).await.unwrap();

        let updated = svc
            .update_device_status(UpdateDeviceStatus {
                reason: Some("firmware upgrade".to_string()),
                ..set_status(device.id, "maintenance")
            })
            .await
            .unwrap();

        assert_eq!(updated.status_reason.as_deref(), Some("firmware upgrade"));
    }

    #[tokio::test]
    async fn should_reflect_update_in_snapshot_with_later_timestamp() {
        let svc = make_service();
        let device = svc.create_device(cam1()).await.unwrap();
        let called_at = now();

        svc.update_device_status(set_status(device.id, "online"))
            .await
            .unwrap();

        let snapshot = svc.registry().current_snapshot();
        let entry = snapshot.iter().find(|e| e.id == device.id).unwrap();
        assert_eq!(entry.status, DeviceStatus::Online);
        assert!(entry.last_changed_at >= called_at);
    }

    #[tokio::test]
    async fn should_notify_subscribers_on_status_change() {
        let svc = make_service();
        let device = svc.create_device(cam1()).await.unwrap();
        let mut sub = svc.registry().subscribe().await.unwrap();
        next_snapshot(&mut sub).await.unwrap();

        svc.update_device_status(set_status(device.id, "online"))
            .await
            .unwrap();

        let snapshot = next_snapshot(&mut sub).await.unwrap();
        assert_eq!(snapshot[0].status, DeviceStatus::Online);
    }

    #[tokio::test]
    async fn should_return_not_found_for_unknown_id() {
        let svc = make_service();
        let result = svc
            .update_device_status(set_status(DeviceId::new(), "online"))
            .await;
        assert!(matches!(result, Err(VisionHubError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_return_not_found_for_unparseable_id() {
        let svc = make_service();
        let result = svc
            .update_device_status(UpdateDeviceStatus {
                device_id: "unknown".to_string(),
                status: "online".to_string(),
                reason: None,
            })
            .await;
        assert!(matches!(result, Err(VisionHubError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_return_invalid_status_for_bad_status() {
        let svc = make_service();
        let device = svc.create_device(cam1()).await.unwrap();

        let result = svc
            .update_device_status(set_status(device.id, "broken"))
            .await;

        assert!(matches!(result, Err(VisionHubError::InvalidStatus(_))));
        let fetched = svc.get_device(device.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, DeviceStatus::Offline);
    }

    #[tokio::test]
    async fn should_leave_registry_untouched_when_save_fails() {
        let (svc, repo) = make_service_with(InMemoryDeviceRepo::default());
        let device = svc.create_device(cam1()).await.unwrap();

        repo.fail_saves(true);
        let result = svc
            .update_device_status(set_status(device.id, "online"))
            .await;

        assert!(matches!(result, Err(VisionHubError::Storage(_))));
        let snapshot = svc.registry().current_snapshot();
        assert_eq!(snapshot[0].status, DeviceStatus::Offline);
    }

    #[tokio::test]
    async fn should_converge_on_one_input_under_concurrent_updates() {
        let (svc, repo) = make_service_with(InMemoryDeviceRepo::default());
        let svc = Arc::new(svc);
        let device = svc.create_device(cam1()).await.unwrap();
        let id = device.id;

        let mut tasks = Vec::new();
        for i in 0..20 {
            let svc = Arc::clone(&svc);
            let status = if i % 2 == 0 { "online" } else { "maintenance" };
            tasks.push(tokio::spawn(async move {
                svc.update_device_status(set_status(id, status)).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let stored = repo.stored(id).unwrap();
        let snapshot = svc.registry().current_snapshot();
        let entry = snapshot.iter().find(|e| e.id == id).unwrap();
        assert!(matches!(
            stored.status,
            DeviceStatus::Online | DeviceStatus::Maintenance
        ));
        assert_eq!(entry.status, stored.status);
        assert_eq!(entry.last_changed_at, stored.status_changed_at);
    }

    #[tokio::test]
    async fn should_list_devices_by_status_and_type() {
        let svc = make_service();
        let cam = svc.create_device(cam1()).await.unwrap();
        svc.create_device(CreateDevice {
            name: "Moisture".to_string(),
            device_type: DeviceType::Sensor,
            ..cam1()
        })
        .await
        .unwrap();
        svc.update_device_status(set_status(cam.id, "online"))
            .await
            .unwrap();

        let online = svc
            .list_devices_by_status(DeviceStatus::Online)
            .await
            .unwrap();
        assert_eq!(online.len(), 1);
        assert_eq!(online[0].id, cam.id);

        let sensors = svc.list_devices_by_type(DeviceType::Sensor).await.unwrap();
        assert_eq!(sensors.len(), 1);
        assert_eq!(svc.list_devices().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn should_return_none_for_missing_device() {
        let svc = make_service();
        assert!(svc.get_device(DeviceId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_delete_device_and_evict_from_registry() {
        let svc = make_service();
        let device = svc.create_device(cam1()).await.unwrap();

        svc.delete_device(device.id).await.unwrap();

        assert!(svc.get_device(device.id).await.unwrap().is_none());
        assert!(svc.registry().current_snapshot().is_empty());
    }

    #[tokio::test]
    async fn should_return_not_found_when_deleting_unknown_device() {
        let svc = make_service();
        let result = svc.delete_device(DeviceId::new()).await;
        assert!(matches!(result, Err(VisionHubError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_mark_device_online_on_heartbeat() {
        let svc = make_service();
        let device = svc.create_device(cam1()).await.unwrap();

        let beat = svc.record_heartbeat(device.id).await.unwrap();

        assert_eq!(beat.status, DeviceStatus::Online);
        assert!(beat.last_heartbeat.is_some());
        assert_eq!(
            svc.registry().current_snapshot()[0].status,
            DeviceStatus::Online
        );
    }

    #[tokio::test]
    async fn should_update_several_devices_in_batch() {
        let svc = make_service();
        let a = svc.create_device(cam1()).await.unwrap();
        let b = svc.create_device(cam1()).await.unwrap();

        let updated = svc
            .update_device_statuses(&[a.id, b.id], "maintenance", None)
            .await
            .unwrap();

        assert_eq!(updated.len(), 2);
        assert!(updated.iter().all(|d| d.status == DeviceStatus::Maintenance));
    }

    #[tokio::test]
    async fn should_reject_batch_with_bad_status_before_touching_devices() {
        let svc = make_service();
        let a = svc.create_device(cam1()).await.unwrap();

        let result = svc.update_device_statuses(&[a.id], "broken", None).await;

        assert!(matches!(result, Err(VisionHubError::InvalidStatus(_))));
        let fetched = svc.get_device(a.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, DeviceStatus::Offline);
    }

    #[tokio::test]
    async fn should_count_devices_per_status_and_type() {
        let repo = InMemoryDeviceRepo::with_devices([camera("a"), camera("b")]);
        let (svc, _) = make_service_with(repo);

        let stats = svc.device_statistics().await.unwrap();

        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_status[&DeviceStatus::Offline], 2);
        assert_eq!(stats.by_status[&DeviceStatus::Online], 0);
        assert_eq!(stats.by_type[&DeviceType::Camera], 2);
        assert_eq!(stats.by_type[&DeviceType::Other], 0);
    }

    #[tokio::test]
    async fn should_list_devices_silent_for_longer_than_given_minutes() {
        let mut silent = camera("silent");
        silent.record_heartbeat(minutes_before(now(), 45));
        let mut chatty = camera("chatty");
        chatty.record_heartbeat(now());
        let repo = InMemoryDeviceRepo::with_devices([silent.clone(), chatty, camera("never")]);
        let (svc, _) = make_service_with(repo);

        let stale = svc.list_stale_devices(15).await.unwrap();

        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, silent.id);
        assert!(svc.list_stale_devices(60).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_search_devices_by_trimmed_keyword() {
        let svc = make_service();
        let gate = svc
            .create_device(CreateDevice {
                name: "Gate".to_string(),
                ip_address: Some("10.1.2.3".to_string()),
                ..cam1()
            })
            .await
            .unwrap();
        svc.create_device(cam1()).await.unwrap();

        let found = svc.search_devices("  gate ").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, gate.id);
        assert_eq!(svc.search_devices("10.1").await.unwrap().len(), 1);
        assert_eq!(svc.search_devices("dock").await.unwrap().len(), 2);
        assert_eq!(svc.search_devices("").await.unwrap().len(), 2);
    }
}
