//! Application services — use-case implementations.
//!
//! Each service struct accepts port trait implementations via generic parameters
//! (constructor injection), keeping this layer decoupled from concrete adapters.

pub mod device_service;
pub mod user_service;

pub use device_service::{CreateDevice, DeviceService, DeviceStatistics, UpdateDeviceStatus};
pub use user_service::{CreateUser, UserService};
