//! In-memory repositories backing the router tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use visionhub_app::ports::{DeviceRepository, UserRepository};
use visionhub_app::services::{DeviceService, UserService};
use visionhub_app::status_registry::{RegistryConfig, StatusRegistry};
use visionhub_domain::device::{Device, DeviceStatus, DeviceType};
use visionhub_domain::error::{NotFoundError, VisionHubError};
use visionhub_domain::id::{DeviceId, UserId};
use visionhub_domain::time::Timestamp;
use visionhub_domain::user::User;

use crate::state::AppState;

#[derive(Default)]
pub struct MemDeviceRepo(Mutex<HashMap<DeviceId, Device>>);

impl MemDeviceRepo {
    fn filtered(&self, keep: impl Fn(&Device) -> bool) -> Vec<Device> {
        self.0
            .lock()
            .unwrap()
            .values()
            .filter(|d| keep(d))
            .cloned()
            .collect()
    }
}

impl DeviceRepository for MemDeviceRepo {
    async fn save(&self, device: &Device) -> Result<(), VisionHubError> {
        self.0.lock().unwrap().insert(device.id, device.clone());
        Ok(())
    }
    async fn find_by_id(&self, id: DeviceId) -> Result<Option<Device>, VisionHubError> {
        Ok(self.0.lock().unwrap().get(&id).cloned())
    }
    async fn find_all(&self) -> Result<Vec<Device>, VisionHubError> {
        Ok(self.filtered(|_| true))
    }
    async fn find_by_status(&self, status: DeviceStatus) -> Result<Vec<Device>, VisionHubError> {
        Ok(self.filtered(|d| d.status == status))
    }
    async fn find_by_type(&self, device_type: DeviceType) -> Result<Vec<Device>, VisionHubError> {
        Ok(self.filtered(|d| d.device_type == device_type))
    }
    async fn find_stale(&self, threshold: Timestamp) -> Result<Vec<Device>, VisionHubError> {
        Ok(self.filtered(|d| d.is_heartbeat_older_than(threshold)))
    }
    async fn search(&self, keyword: &str) -> Result<Vec<Device>, VisionHubError> {
        Ok(self.filtered(|d| d.matches_keyword(keyword)))
    }
    async fn delete(&self, id: DeviceId) -> Result<(), VisionHubError> {
        match self.0.lock().unwrap().remove(&id) {
            Some(_) => Ok(()),
            None => Err(NotFoundError {
                entity: "Device",
                id: id.to_string(),
            }
            .into()),
        }
    }
}

#[derive(Default)]
pub struct MemUserRepo(Mutex<HashMap<UserId, User>>);

impl UserRepository for MemUserRepo {
    async fn save(&self, user: &User) -> Result<(), VisionHubError> {
        self.0.lock().unwrap().insert(user.id, user.clone());
        Ok(())
    }
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, VisionHubError> {
        Ok(self.0.lock().unwrap().get(&id).cloned())
    }
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, VisionHubError> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .values()
            .find(|u| u.username == username)
            .cloned())
    }
    async fn find_all(&self) -> Result<Vec<User>, VisionHubError> {
        Ok(self.0.lock().unwrap().values().cloned().collect())
    }
    async fn delete(&self, id: UserId) -> Result<(), VisionHubError> {
        match self.0.lock().unwrap().remove(&id) {
            Some(_) => Ok(()),
            None => Err(NotFoundError {
                entity: "User",
                id: id.to_string(),
            }
            .into()),
        }
    }
}

pub type TestState = AppState<Arc<MemDeviceRepo>, MemUserRepo>;

pub fn test_state() -> TestState {
    test_state_with(Arc::new(MemDeviceRepo::default()))
}

pub fn test_state_with(devices: Arc<MemDeviceRepo>) -> TestState {
    let registry = Arc::new(StatusRegistry::new(
        Arc::clone(&devices),
        RegistryConfig::default(),
    ));
    AppState::new(
        DeviceService::new(devices, registry),
        UserService::new(MemUserRepo::default()),
    )
}
