//! # visionhub-app
//!
//! Application layer — use-cases, **port definitions** (traits) and the live
//! device status registry.
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `DeviceRepository` — CRUD and lookups for devices
//!   - `UserRepository` — CRUD for users
//! - Define **driving/inbound ports** as use-case structs:
//!   - `DeviceService` — create, change status, heartbeat, list, delete
//!   - `UserService` — create, list, get, delete
//! - Provide **in-process infrastructure** that doesn't need IO:
//!   - `StatusRegistry` — the in-memory status map and its subscribers
//!   - `DeviceLocks` — per-device serialization of writes
//!
//! ## Dependency rule
//! Depends on `visionhub-domain` only (plus `tokio::sync` and `dashmap` for
//! in-process state). Never imports adapter crates. Adapters depend on *this*
//! crate, not the reverse.

pub mod device_locks;
pub mod ports;
pub mod services;
pub mod status_registry;

#[cfg(test)]
mod test_support;
