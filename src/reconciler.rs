// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polling state reconciler.
//!
//! The reconciler is the only writer of the device snapshot. Each cycle lists
//! the devices over REST, normalises them into a new [`Snapshot`] and swaps
//! it in whole; readers hold an `Arc<Snapshot>` and never see a partial
//! update. A failed cycle leaves the previous snapshot in place.
//!
//! Cycles run on a fixed interval, on [`Reconciler::refresh_now`], and on
//! [`RefreshHandle::request_refresh`] (used after a successful control call).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::event::{DeviceEvent, EventBus};
use crate::protocol::RestTransport;
use crate::state::Snapshot;

/// Fire-and-forget trigger for a reconciler cycle.
///
/// Requests made while a cycle is pending are coalesced into one.
#[derive(Debug, Clone)]
pub struct RefreshHandle {
    wake: Arc<Notify>,
}

impl RefreshHandle {
    /// Asks the poll task to run a cycle as soon as possible.
    pub fn request_refresh(&self) {
        self.wake.notify_one();
    }
}

/// Polls the device list and publishes snapshots.
#[derive(Debug)]
pub struct Reconciler<S> {
    rest: Arc<S>,
    snapshot_tx: watch::Sender<Arc<Snapshot>>,
    events: EventBus,
    cycle: Mutex<()>,
    wake: Arc<Notify>,
}

impl<S: RestTransport + 'static> Reconciler<S> {
    /// Creates a reconciler holding the empty snapshot.
    #[must_use]
    pub fn new(rest: Arc<S>, events: EventBus) -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::new(Snapshot::empty()));
        Self {
            rest,
            snapshot_tx,
            events,
            cycle: Mutex::new(()),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot_tx.borrow())
    }

    /// Returns a receiver notified on every snapshot replacement.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshot_tx.subscribe()
    }

    /// Returns a handle for requesting cycles without waiting for them.
    #[must_use]
    pub fn refresh_handle(&self) -> RefreshHandle {
        RefreshHandle {
            wake: Arc::clone(&self.wake),
        }
    }

    /// Runs one cycle and returns the resulting snapshot.
    ///
    /// Concurrent calls are serialised; each performs its own listing.
    ///
    /// # Errors
    ///
    /// Returns the listing error. The previous snapshot stays published and a
    /// [`DeviceEvent::RefreshFailed`] is emitted.
    pub async fn refresh_now(&self) -> Result<Arc<Snapshot>, Error> {
        let _cycle = self.cycle.lock().await;

        let devices = match self.rest.list_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                tracing::warn!(error = %e, "Device refresh failed, keeping previous snapshot");
                self.events.publish(DeviceEvent::RefreshFailed {
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        let generation = self.snapshot_tx.borrow().generation() + 1;
        let snapshot = Arc::new(Snapshot::from_devices(generation, devices));
        let previous = self.snapshot_tx.send_replace(Arc::clone(&snapshot));

        tracing::debug!(
            generation,
            devices = snapshot.len(),
            "Published device snapshot"
        );

        self.publish_diff(&snapshot, &previous);
        Ok(snapshot)
    }

    fn publish_diff(&self, current: &Snapshot, previous: &Snapshot) {
        let diff = current.diff(previous);

        for device_id in diff.added {
            let name = current
                .get(&device_id)
                .map(|entry| entry.device.name.clone())
                .unwrap_or_default();
            self.events.publish(DeviceEvent::device_added(device_id, name));
        }

        for device_id in diff.removed {
            self.events.publish(DeviceEvent::device_removed(device_id));
        }

        for device_id in diff.changed {
            if let Some(entry) = current.get(&device_id) {
                self.events.publish(DeviceEvent::StateChanged {
                    device_id,
                    connected: entry.device.connected,
                    state: entry.state.clone(),
                });
            }
        }
    }

    /// Spawns the poll task.
    ///
    /// The first tick is skipped: the caller is expected to have run an
    /// initial [`refresh_now`](Self::refresh_now).
    pub fn spawn(self: &Arc<Self>, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let reconciler = Arc::clone(self);
        tokio::spawn(async move { reconciler.poll_task(interval, cancel).await })
    }

    async fn poll_task(&self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = self.wake.notified() => {
                    tracing::debug!("Refresh requested");
                    let _ = self.refresh_now().await;
                    ticker.reset();
                }
                _ = ticker.tick() => {
                    let _ = self.refresh_now().await;
                }
            }
        }

        tracing::debug!("Reconciler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NetworkError;
    use crate::state::Device;
    use crate::types::RawState;
    use parking_lot::Mutex as SyncMutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeRest {
        devices: SyncMutex<Option<Vec<Device>>>,
        calls: AtomicUsize,
    }

    impl FakeRest {
        fn set(&self, devices: Option<Vec<Device>>) {
            *self.devices.lock() = devices;
        }
    }

    impl RestTransport for FakeRest {
        async fn list_devices(&self) -> Result<Vec<Device>, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.devices.lock().clone().ok_or_else(|| {
                NetworkError::Status {
                    endpoint: "/things".to_string(),
                    status: 503,
                }
                .into()
            })
        }

        async fn send_preferences_control(&self, _: &str, _: &RawState) -> Result<(), Error> {
            Ok(())
        }

        async fn force_sync(&self, _: &str) -> Result<(), Error> {
            Ok(())
        }
    }

    fn device(id: &str, pow: i64) -> Device {
        let mut state = RawState::new();
        state.insert("pow".to_string(), json!(pow));
        Device::new(id).with_state(state).with_connected(true)
    }

    fn reconciler(rest: &Arc<FakeRest>) -> (Arc<Reconciler<FakeRest>>, EventBus) {
        let bus = EventBus::new();
        (Arc::new(Reconciler::new(Arc::clone(rest), bus.clone())), bus)
    }

    #[tokio::test]
    async fn refresh_publishes_new_generation() {
        let rest = Arc::new(FakeRest::default());
        rest.set(Some(vec![device("a", 1)]));
        let (reconciler, _) = reconciler(&rest);

        assert_eq!(reconciler.snapshot().generation(), 0);

        let snapshot = reconciler.refresh_now().await.unwrap();
        assert_eq!(snapshot.generation(), 1);
        assert!(reconciler.snapshot().get("a").unwrap().state.power);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let rest = Arc::new(FakeRest::default());
        rest.set(Some(vec![device("a", 1)]));
        let (reconciler, bus) = reconciler(&rest);
        reconciler.refresh_now().await.unwrap();

        let mut events = bus.subscribe();
        rest.set(None);
        let err = reconciler.refresh_now().await.unwrap_err();
        assert!(err.is_retryable());

        let snapshot = reconciler.snapshot();
        assert_eq!(snapshot.generation(), 1);
        assert!(snapshot.contains("a"));
        assert!(matches!(
            events.recv().await.unwrap(),
            DeviceEvent::RefreshFailed { .. }
        ));
    }

    #[tokio::test]
    async fn diff_events_are_published() {
        let rest = Arc::new(FakeRest::default());
        rest.set(Some(vec![device("a", 1), device("b", 1)]));
        let (reconciler, bus) = reconciler(&rest);
        reconciler.refresh_now().await.unwrap();

        let mut events = bus.subscribe();
        rest.set(Some(vec![device("b", 0), device("c", 1)]));
        reconciler.refresh_now().await.unwrap();

        let received: Vec<DeviceEvent> = (0..3).map(|_| events.try_recv().unwrap()).collect();
        assert_eq!(
            received[0],
            DeviceEvent::device_added("c", "Bluestar AC c")
        );
        assert_eq!(received[1], DeviceEvent::device_removed("a"));
        assert!(matches!(
            &received[2],
            DeviceEvent::StateChanged { device_id, state, .. } if device_id == "b" && !state.power
        ));
    }

    #[tokio::test]
    async fn watch_receivers_see_replacement() {
        let rest = Arc::new(FakeRest::default());
        rest.set(Some(vec![device("a", 1)]));
        let (reconciler, _) = reconciler(&rest);
        let mut rx = reconciler.watch();

        reconciler.refresh_now().await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().generation(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_task_ticks_and_stops_on_cancel() {
        let rest = Arc::new(FakeRest::default());
        rest.set(Some(vec![device("a", 1)]));
        let (reconciler, _) = reconciler(&rest);
        let cancel = CancellationToken::new();

        let task = reconciler.spawn(Duration::from_secs(30), cancel.clone());
        tokio::time::sleep(Duration::from_secs(95)).await;
        assert_eq!(rest.calls.load(Ordering::SeqCst), 3);

        cancel.cancel();
        task.await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(rest.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn request_refresh_runs_cycle_before_tick() {
        let rest = Arc::new(FakeRest::default());
        rest.set(Some(vec![device("a", 1)]));
        let (reconciler, _) = reconciler(&rest);
        let cancel = CancellationToken::new();
        let task = reconciler.spawn(Duration::from_secs(30), cancel.clone());

        let mut rx = reconciler.watch();
        reconciler.refresh_handle().request_refresh();
        tokio::time::timeout(Duration::from_secs(1), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rest.calls.load(Ordering::SeqCst), 1);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn readers_never_observe_mixed_snapshots() {
        let rest = Arc::new(FakeRest::default());
        let (reconciler, _) = reconciler(&rest);

        let set_a: Vec<Device> = (0..50).map(|i| device(&format!("a{i:02}"), 0)).collect();
        let set_b: Vec<Device> = (0..50).map(|i| device(&format!("b{i:02}"), 1)).collect();
        rest.set(Some(set_a.clone()));
        reconciler.refresh_now().await.unwrap();

        let writer = {
            let reconciler = Arc::clone(&reconciler);
            let rest = Arc::clone(&rest);
            tokio::spawn(async move {
                for round in 0..200 {
                    let next = if round % 2 == 0 { &set_b } else { &set_a };
                    rest.set(Some(next.clone()));
                    reconciler.refresh_now().await.unwrap();
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let reconciler = Arc::clone(&reconciler);
                tokio::spawn(async move {
                    for _ in 0..500 {
                        let snapshot = reconciler.snapshot();
                        assert_eq!(snapshot.len(), 50);
                        let ids = snapshot.device_ids();
                        let prefix = &ids[0][..1];
                        assert!(ids.iter().all(|id| id.starts_with(prefix)));
                        let power = prefix == "b";
                        assert!(snapshot.iter().all(|entry| entry.state.power == power));
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
        assert_eq!(reconciler.snapshot().generation(), 201);
    }
}
