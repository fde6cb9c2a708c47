//! In-memory port implementations shared by the unit tests of this crate.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use visionhub_domain::device::{Device, DeviceStatus, DeviceType};
use visionhub_domain::error::{NotFoundError, VisionHubError};
use visionhub_domain::id::{DeviceId, UserId};
use visionhub_domain::time::Timestamp;
use visionhub_domain::user::User;

use crate::ports::{DeviceRepository, UserRepository};

#[derive(Default)]
pub struct InMemoryDeviceRepo {
    store: Mutex<HashMap<DeviceId, Device>>,
    fail_saves: AtomicBool,
    fail_reads: AtomicBool,
    find_all_calls: AtomicUsize,
}

impl InMemoryDeviceRepo {
    pub fn with_devices(devices: impl IntoIterator<Item = Device>) -> Self {
        let repo = Self::default();
        {
            let mut store = repo.store.lock().unwrap();
            for device in devices {
                store.insert(device.id, device);
            }
        }
        repo
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn find_all_calls(&self) -> usize {
        self.find_all_calls.load(Ordering::SeqCst)
    }

    pub fn stored(&self, id: DeviceId) -> Option<Device> {
        self.store.lock().unwrap().get(&id).cloned()
    }

    fn unavailable() -> VisionHubError {
        VisionHubError::Storage(Box::new(std::io::Error::other("store unavailable")))
    }

    fn filtered(&self, keep: impl Fn(&Device) -> bool) -> Result<Vec<Device>, VisionHubError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        let store = self.store.lock().unwrap();
        Ok(store.values().filter(|d| keep(d)).cloned().collect())
    }
}

impl DeviceRepository for InMemoryDeviceRepo {
    fn save(&self, device: &Device) -> impl Future<Output = Result<(), VisionHubError>> + Send {
        let result = if self.fail_saves.load(Ordering::SeqCst) {
            Err(Self::unavailable())
        } else {
            self.store.lock().unwrap().insert(device.id, device.clone());
            Ok(())
        };
        async { result }
    }

    fn find_by_id(
        &self,
        id: DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, VisionHubError>> + Send {
        let result = self
            .filtered(|d| d.id == id)
            .map(|found| found.into_iter().next());
        async { result }
    }

    fn find_all(&self) -> impl Future<Output = Result<Vec<Device>, VisionHubError>> + Send {
        self.find_all_calls.fetch_add(1, Ordering::SeqCst);
        let result = self.filtered(|_| true);
        async { result }
    }

    fn find_by_status(
        &self,
        status: DeviceStatus,
    ) -> impl Future<Output = Result<Vec<Device>, VisionHubError>> + Send {
        let result = self.filtered(|d| d.status == status);
        async { result }
    }

    fn find_by_type(
        &self,
        device_type: DeviceType,
    ) -> impl Future<Output = Result<Vec<Device>, VisionHubError>> + Send {
        let result = self.filtered(|d| d.device_type == device_type);
        async { result }
    }

    fn find_stale(
        &self,
        threshold: Timestamp,
    ) -> impl Future<Output = Result<Vec<Device>, VisionHubError>> + Send {
        let result = self.filtered(|d| d.is_heartbeat_older_than(threshold));
        async { result }
    }

    fn search(
        &self,
        keyword: &str,
    ) -> impl Future<Output = Result<Vec<Device>, VisionHubError>> + Send {
        let result = self.filtered(|d| d.matches_keyword(keyword));
        async { result }
    }

    fn delete(&self, id: DeviceId) -> impl Future<Output = Result<(), VisionHubError>> + Send {
        let removed = self.store.lock().unwrap().remove(&id);
        let result = match removed {
            Some(_) => Ok(()),
            None => Err(NotFoundError {
                entity: "Device",
                id: id.to_string(),
            }
            .into()),
        };
        async { result }
    }
}

#[derive(Default)]
pub struct InMemoryUserRepo {
    store: Mutex<HashMap<UserId, User>>,
}

impl UserRepository for InMemoryUserRepo {
    fn save(&self, user: &User) -> impl Future<Output = Result<(), VisionHubError>> + Send {
        self.store.lock().unwrap().insert(user.id, user.clone());
        async { Ok(()) }
    }

    fn find_by_id(
        &self,
        id: UserId,
    ) -> impl Future<Output = Result<Option<User>, VisionHubError>> + Send {
        let result = self.store.lock().unwrap().get(&id).cloned();
        async { Ok(result) }
    }

    fn find_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<User>, VisionHubError>> + Send {
        let result = self
            .store
            .lock()
            .unwrap()
            .values()
            .find(|u| u.username == username)
            .cloned();
        async { Ok(result) }
    }

    fn find_all(&self) -> impl Future<Output = Result<Vec<User>, VisionHubError>> + Send {
        let result: Vec<User> = self.store.lock().unwrap().values().cloned().collect();
        async { Ok(result) }
    }

    fn delete(&self, id: UserId) -> impl Future<Output = Result<(), VisionHubError>> + Send {
        let removed = self.store.lock().unwrap().remove(&id);
        let result = match removed {
            Some(_) => Ok(()),
            None => Err(NotFoundError {
                entity: "User",
                id: id.to_string(),
            }
            .into()),
        };
        async { result }
    }
}

pub fn camera(name: &str) -> Device {
    Device::builder()
        .name(name)
        .device_type(DeviceType::Camera)
        .location("dock-1")
        .build()
        .unwrap()
}
