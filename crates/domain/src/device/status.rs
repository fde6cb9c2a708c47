//! Device status — the operational state a device reports or is put into.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InvalidStatusError;

/// Operational status of a device.
///
/// Transitions between statuses are free-form; any status may follow any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    #[default]
    Offline,
    Maintenance,
}

impl DeviceStatus {
    /// Every status, in declaration order.
    pub const ALL: [Self; 3] = [Self::Online, Self::Offline, Self::Maintenance];

    /// Canonical lowercase name, as stored and sent on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Maintenance => "maintenance",
        }
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceStatus {
    type Err = InvalidStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| InvalidStatusError {
                value: s.to_string(),
            })
    }
}
