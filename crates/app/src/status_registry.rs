//! Live device status registry with change notification.
//!
//! The registry keeps the last known status of every device in a sharded
//! map and pushes the *full* snapshot to each subscriber whenever a status
//! changes, plus on a fixed fallback interval.
//!
//! Every subscriber owns a single-slot latest-value channel. A subscriber
//! that has not consumed its previous snapshot simply gets it replaced by the
//! newest one, so a slow consumer never queues unboundedly and never holds
//! up the others. A subscriber whose channel is gone is dropped on the next
//! delivery attempt; everyone else is unaffected.
//!
//! Subscriber lifecycle: `Attached -> Active -> Detached` (terminal).

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use tokio::sync::{OnceCell, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use visionhub_domain::device::{Device, DeviceStatus};
use visionhub_domain::error::VisionHubError;
use visionhub_domain::id::DeviceId;
use visionhub_domain::time::Timestamp;

use crate::ports::DeviceRepository;

/// Fallback re-broadcast period used when none is configured.
pub const DEFAULT_BROADCAST_INTERVAL: Duration = Duration::from_secs(5);

/// Last known status of one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub id: DeviceId,
    pub status: DeviceStatus,
    pub last_changed_at: Timestamp,
}

impl From<&Device> for StatusEntry {
    fn from(device: &Device) -> Self {
        Self {
            id: device.id,
            status: device.status,
            last_changed_at: device.status_changed_at,
        }
    }
}

/// Full set of known statuses, ordered by device id.
pub type Snapshot = Arc<[StatusEntry]>;

/// Registry tuning.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Period of the fallback re-broadcast.
    pub broadcast_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            broadcast_interval: DEFAULT_BROADCAST_INTERVAL,
        }
    }
}

/// Where a subscriber is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    /// Subscribed, initial snapshot not consumed yet.
    Attached,
    /// Has received at least one snapshot.
    Active,
    /// Unsubscribed, failed, or closed. Terminal.
    Detached,
}

const ATTACHED: u8 = 0;
const ACTIVE: u8 = 1;
const DETACHED: u8 = 2;

#[derive(Debug)]
struct StateCell(AtomicU8);

impl StateCell {
    fn new() -> Self {
        Self(AtomicU8::new(ATTACHED))
    }

    fn get(&self) -> SubscriberState {
        match self.0.load(Ordering::Acquire) {
            ATTACHED => SubscriberState::Attached,
            ACTIVE => SubscriberState::Active,
            _ => SubscriberState::Detached,
        }
    }

    fn is_detached(&self) -> bool {
        self.0.load(Ordering::Acquire) == DETACHED
    }

    fn activate(&self) {
        let _ = self
            .0
            .compare_exchange(ATTACHED, ACTIVE, Ordering::AcqRel, Ordering::Acquire);
    }

    fn detach(&self) {
        self.0.store(DETACHED, Ordering::Release);
    }
}

/// Opaque identifier of one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

struct Subscriber {
    sender: watch::Sender<Snapshot>,
    state: Arc<StateCell>,
}

/// State shared between the registry, its subscriptions, and the
/// re-broadcast task.
#[derive(Default)]
struct Shared {
    entries: DashMap<DeviceId, StatusEntry>,
    subscribers: DashMap<SubscriptionId, Subscriber>,
    next_subscription: AtomicU64,
    /// Set while the first load is in flight.
    loading: AtomicBool,
    /// Devices evicted while `loading` was set; never seeded.
    evicted: DashSet<DeviceId>,
}

impl Shared {
    fn snapshot(&self) -> Snapshot {
        let mut entries: Vec<StatusEntry> = self.entries.iter().map(|e| *e.value()).collect();
        entries.sort_unstable_by_key(|e| e.id);
        entries.into()
    }

    fn attach(&self) -> (SubscriptionId, watch::Receiver<Snapshot>, Arc<StateCell>) {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        let placeholder = Snapshot::from(Vec::new());
        let (sender, receiver) = watch::channel(Arc::clone(&placeholder));
        let state = Arc::new(StateCell::new());
        self.subscribers.insert(
            id,
            Subscriber {
                sender,
                state: Arc::clone(&state),
            },
        );
        // Registered first so no change can fall between the initial
        // snapshot and the first broadcast.
        if let Some(subscriber) = self.subscribers.get(&id) {
            publish_initial(&subscriber.sender, &placeholder, self.snapshot());
        }
        (id, receiver, state)
    }

    /// Seed entries from persisted devices, skipping known ones and those
    /// evicted during the load. Returns the number of entries added.
    fn seed(&self, devices: &[Device]) -> usize {
        let mut added = 0;
        for device in devices {
            // The tombstone is checked under the entry's shard lock, so an
            // eviction either lands before it or removes the seeded entry.
            if let Entry::Vacant(slot) = self.entries.entry(device.id)
                && !self.evicted.contains(&device.id)
            {
                slot.insert(StatusEntry::from(device));
                added += 1;
            }
        }
        added
    }

    fn detach(&self, id: SubscriptionId) -> bool {
        match self.subscribers.remove(&id) {
            Some((_, subscriber)) => {
                subscriber.state.detach();
                tracing::debug!(subscription = %id, "subscriber detached");
                true
            }
            None => false,
        }
    }

    fn broadcast(&self) {
        if self.subscribers.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        let mut failed = Vec::new();
        for subscriber in &self.subscribers {
            let delivered = !subscriber.state.is_detached()
                && subscriber.sender.send(Arc::clone(&snapshot)).is_ok();
            if !delivered {
                failed.push(*subscriber.key());
            }
        }
        // Removal must wait until the iteration released its shard guards.
        for id in failed {
            self.detach(id);
        }
    }
}

/// Hand the initial snapshot to a fresh channel unless a broadcast already
/// replaced the placeholder with a newer one.
fn publish_initial(sender: &watch::Sender<Snapshot>, placeholder: &Snapshot, snapshot: Snapshot) -> bool {
    sender.send_if_modified(|current| {
        if Arc::ptr_eq(current, placeholder) {
            *current = snapshot;
            true
        } else {
            false
        }
    })
}

/// Resets the loading flag when the first load ends, even when cancelled.
struct LoadGuard<'a>(&'a Shared);

impl<'a> LoadGuard<'a> {
    fn start(shared: &'a Shared) -> Self {
        shared.loading.store(true, Ordering::SeqCst);
        Self(shared)
    }
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        self.0.loading.store(false, Ordering::SeqCst);
        self.0.evicted.clear();
    }
}

/// A live subscription to status snapshots.
///
/// The first call to [`next`](Self::next) yields the snapshot current at
/// subscribe time. Dropping the subscription detaches it.
pub struct Subscription {
    id: SubscriptionId,
    receiver: watch::Receiver<Snapshot>,
    state: Arc<StateCell>,
    shared: Weak<Shared>,
}

impl Subscription {
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    #[must_use]
    pub fn state(&self) -> SubscriberState {
        self.state.get()
    }

    /// Wait for the next snapshot.
    ///
    /// Returns `None` once the subscription is detached. Nothing is
    /// delivered after [`StatusRegistry::unsubscribe`] returned, even if a
    /// broadcast raced the call.
    pub async fn next(&mut self) -> Option<Snapshot> {
        if self.state.is_detached() {
            return None;
        }
        let changed = self.receiver.changed().await;
        if changed.is_err() || self.state.is_detached() {
            self.state.detach();
            return None;
        }
        let snapshot = Arc::clone(&self.receiver.borrow_and_update());
        self.state.activate();
        Some(snapshot)
    }

    /// Stop receiving snapshots. Idempotent.
    pub fn detach(&self) {
        self.state.detach();
        if let Some(shared) = self.shared.upgrade() {
            shared.detach(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}

/// In-memory view of device statuses that notifies subscribers on change.
///
/// Reads and writes touch one shard of the status map at a time, so updates
/// to different devices never contend and snapshots never block writers.
pub struct StatusRegistry<R> {
    repo: R,
    shared: Arc<Shared>,
    loaded: OnceCell<()>,
    config: RegistryConfig,
}

impl<R: DeviceRepository> StatusRegistry<R> {
    /// Create an empty registry. Statuses are loaded from `repo` when the
    /// first subscriber attaches.
    pub fn new(repo: R, config: RegistryConfig) -> Self {
        Self {
            repo,
            shared: Arc::new(Shared::default()),
            loaded: OnceCell::new(),
            config,
        }
    }

    /// Seed the registry from the repository, once.
    ///
    /// Entries recorded before the load finished are never overwritten by
    /// the (possibly older) persisted state, and devices evicted while the
    /// load was running are not brought back. A failed load is retried by
    /// the next caller.
    ///
    /// # Errors
    ///
    /// Returns the repository error when listing devices fails.
    pub async fn ensure_loaded(&self) -> Result<(), VisionHubError> {
        self.loaded
            .get_or_try_init(|| async {
                let _guard = LoadGuard::start(&self.shared);
                let devices = self.repo.find_all().await?;
                let added = self.shared.seed(&devices);
                tracing::debug!(devices = devices.len(), added, "status registry loaded");
                Ok::<(), VisionHubError>(())
            })
            .await?;
        Ok(())
    }

    /// Attach a new subscriber.
    ///
    /// # Errors
    ///
    /// Returns the repository error when the initial load fails.
    pub async fn subscribe(&self) -> Result<Subscription, VisionHubError> {
        if let Err(err) = self.ensure_loaded().await {
            tracing::warn!(error = %err, "failed to load device statuses");
            return Err(err);
        }
        let (id, receiver, state) = self.shared.attach();
        tracing::debug!(subscription = %id, "subscriber attached");
        Ok(Subscription {
            id,
            receiver,
            state,
            shared: Arc::downgrade(&self.shared),
        })
    }
}

impl<R> StatusRegistry<R> {
    /// Detach a subscriber. Returns `false` if it was already detached.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        subscription.state.detach();
        self.shared.detach(subscription.id)
    }

    /// The current snapshot, ordered by device id.
    #[must_use]
    pub fn current_snapshot(&self) -> Snapshot {
        self.shared.snapshot()
    }

    /// Record a confirmed status change and broadcast the new snapshot.
    pub fn record(&self, entry: StatusEntry) {
        self.shared.entries.insert(entry.id, entry);
        self.shared.broadcast();
    }

    /// Record an entry without notifying anyone.
    pub fn track(&self, entry: StatusEntry) {
        self.shared.entries.insert(entry.id, entry);
    }

    /// Forget a device and broadcast the new snapshot if it was known.
    ///
    /// The device must already be gone from the repository.
    pub fn evict(&self, id: DeviceId) {
        if self.shared.loading.load(Ordering::SeqCst) {
            self.shared.evicted.insert(id);
        }
        if self.shared.entries.remove(&id).is_some() {
            self.shared.broadcast();
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.len()
    }

    #[must_use]
    pub fn broadcast_interval(&self) -> Duration {
        self.config.broadcast_interval
    }

    /// Spawn the fallback re-broadcast loop.
    ///
    /// The task stops by itself once the registry is dropped.
    pub fn spawn_rebroadcast(&self) -> JoinHandle<()> {
        let shared = Arc::downgrade(&self.shared);
        let period = self.config.broadcast_interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(shared) = shared.upgrade() else {
                    break;
                };
                shared.broadcast();
            }
        })
    }

    /// Drive `subscription` on a background task, handing every snapshot
    /// to `callback`.
    ///
    /// The callback is awaited before the next snapshot is taken, so it
    /// never runs twice concurrently for one subscription. A callback error
    /// detaches the subscription.
    pub fn on_broadcast<F, Fut, E>(
        &self,
        mut subscription: Subscription,
        mut callback: F,
    ) -> JoinHandle<()>
    where
        F: FnMut(Snapshot) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            while let Some(snapshot) = subscription.next().await {
                if let Err(err) = callback(snapshot).await {
                    tracing::debug!(subscription = %subscription.id(), error = %err, "snapshot delivery failed");
                    break;
                }
            }
            subscription.state.detach();
            shared.detach(subscription.id());
        })
    }
}
