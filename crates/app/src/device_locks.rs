//! Per-device mutual exclusion for write paths.
//!
//! Writes to one device id are serialized; writes to different ids never
//! share a lock.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use visionhub_domain::id::DeviceId;

/// A lazily populated map of one async mutex per device id.
#[derive(Debug, Default)]
pub struct DeviceLocks {
    locks: DashMap<DeviceId, Arc<Mutex<()>>>,
}

impl DeviceLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`. Access is released when the guard drops.
    pub async fn lock(&self, id: DeviceId) -> OwnedMutexGuard<()> {
        // The shard guard must be released before awaiting.
        let mutex = Arc::clone(self.locks.entry(id).or_default().value());
        mutex.lock_owned().await
    }

    /// Drop the lock slot of a deleted device, unless someone is still using it.
    pub fn forget(&self, id: DeviceId) {
        self.locks
            .remove_if(&id, |_, mutex| Arc::strong_count(mutex) == 1);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
