//! Device — a monitored physical unit (camera, sensor, …) with a status and
//! free-form configuration.

mod device_type;
mod status;

pub use device_type::DeviceType;
pub use status::DeviceStatus;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, VisionHubError};
use crate::id::DeviceId;
use crate::time::{Timestamp, now};

/// Open key/value configuration attached to a device.
pub type DeviceConfig = HashMap<String, serde_json::Value>;

/// A monitored physical unit.
///
/// The `id` never changes after construction. The status only changes
/// through [`Device::update_status`] and [`Device::record_heartbeat`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub location: String,
    pub ip_address: Option<String>,
    pub mac_address: Option<String>,
    #[serde(default)]
    pub config: DeviceConfig,
    pub status: DeviceStatus,
    /// Free-text reason given with the latest status update.
    pub status_reason: Option<String>,
    pub status_changed_at: Timestamp,
    pub last_heartbeat: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Device {
    /// Create a builder for constructing a [`Device`].
    #[must_use]
    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`VisionHubError::Validation`] when `name` or `location` is empty.
    pub fn validate(&self) -> Result<(), VisionHubError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.location.trim().is_empty() {
            return Err(ValidationError::EmptyLocation.into());
        }
        Ok(())
    }

    /// Move the device to `status`, remembering the optional `reason`.
    ///
    /// Any status may follow any other. Persisting the change is the caller's job.
    pub fn update_status(&mut self, status: DeviceStatus, reason: Option<String>, at: Timestamp) {
        self.status = status;
        self.status_reason = reason;
        self.status_changed_at = at;
        self.updated_at = at;
    }

    /// Record a heartbeat received at `at`; a device that reports in is online.
    pub fn record_heartbeat(&mut self, at: Timestamp) {
        self.last_heartbeat = Some(at);
        if self.is_online() {
            self.updated_at = at;
        } else {
            self.update_status(DeviceStatus::Online, None, at);
        }
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.status == DeviceStatus::Online
    }

    /// Whether the last heartbeat is older than `threshold`.
    ///
    /// A device that never sent one is not considered stale.
    #[must_use]
    pub fn is_heartbeat_older_than(&self, threshold: Timestamp) -> bool {
        self.last_heartbeat.is_some_and(|at| at < threshold)
    }

    /// Whether name, location, IP address or id contains `keyword`,
    /// ignoring ASCII case.
    #[must_use]
    pub fn matches_keyword(&self, keyword: &str) -> bool {
        let needle = keyword.to_ascii_lowercase();
        let hit = |field: &str| field.to_ascii_lowercase().contains(&needle);
        hit(&self.name)
            || hit(&self.location)
            || self.ip_address.as_deref().is_some_and(hit)
            || hit(&self.id.to_string())
    }
}

/// Step-by-step builder for [`Device`].
#[derive(Debug, Default)]
pub struct DeviceBuilder {
    id: Option<DeviceId>,
    name: Option<String>,
    device_type: Option<DeviceType>,
    location: Option<String>,
    ip_address: Option<String>,
    mac_address: Option<String>,
    config: DeviceConfig,
    status: Option<DeviceStatus>,
}

impl DeviceBuilder {
    #[must_use]
    pub fn id(mut self, id: DeviceId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn device_type(mut self, device_type: DeviceType) -> Self {
        self.device_type = Some(device_type);
        self
    }

    #[must_use]
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    #[must_use]
    pub fn ip_address(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }

    #[must_use]
    pub fn mac_address(mut self, mac_address: impl Into<String>) -> Self {
        self.mac_address = Some(mac_address.into());
        self
    }

    #[must_use]
    pub fn config(mut self, config: DeviceConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn config_entry(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn status(mut self, status: DeviceStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Consume the builder, validate, and return a [`Device`].
    ///
    /// A fresh id is generated when none was supplied.
    ///
    /// # Errors
    ///
    /// Returns [`VisionHubError::Validation`] if `name`, `device_type`, or
    /// `location` is missing or empty.
    pub fn build(self) -> Result<Device, VisionHubError> {
        let device_type = self.device_type.ok_or(ValidationError::MissingDeviceType)?;
        let ts = now();
        let device = Device {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            device_type,
            location: self.location.unwrap_or_default(),
            ip_address: self.ip_address,
            mac_address: self.mac_address,
            config: self.config,
            status: self.status.unwrap_or_default(),
            status_reason: None,
            status_changed_at: ts,
            last_heartbeat: None,
            created_at: ts,
            updated_at: ts,
        };
        device.validate()?;
        Ok(device)
    }
}
