// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Immutable device snapshots.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::{CanonicalDeviceState, Device};

/// A device together with its normalised state.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSnapshot {
    /// The device record as listed.
    pub device: Device,
    /// Canonical projection of `device.state`.
    pub state: CanonicalDeviceState,
}

impl DeviceSnapshot {
    /// Builds the snapshot entry for a device.
    #[must_use]
    pub fn new(device: Device) -> Self {
        let state = device.canonical_state();
        Self { device, state }
    }
}

/// The full set of devices observed by one poll.
///
/// Snapshots are never modified after construction. The reconciler publishes
/// a new `Arc<Snapshot>` for every successful poll, so a reader holding a
/// snapshot always sees a device set from a single poll.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    generation: u64,
    fetched_at: Option<DateTime<Utc>>,
    devices: BTreeMap<String, DeviceSnapshot>,
}

impl Snapshot {
    /// Creates the empty snapshot published before the first poll.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a snapshot from a freshly listed device set.
    #[must_use]
    pub fn from_devices(generation: u64, devices: Vec<Device>) -> Self {
        let devices = devices
            .into_iter()
            .map(|device| (device.id.clone(), DeviceSnapshot::new(device)))
            .collect();

        Self {
            generation,
            fetched_at: Some(Utc::now()),
            devices,
        }
    }

    /// Monotonic counter of successful polls, `0` before the first one.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// When the device list was fetched.
    #[must_use]
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    /// Returns the entry for a device.
    #[must_use]
    pub fn get(&self, device_id: &str) -> Option<&DeviceSnapshot> {
        self.devices.get(device_id)
    }

    /// Returns `true` if the device is part of this snapshot.
    #[must_use]
    pub fn contains(&self, device_id: &str) -> bool {
        self.devices.contains_key(device_id)
    }

    /// Iterates over all entries, ordered by device id.
    pub fn iter(&self) -> impl Iterator<Item = &DeviceSnapshot> {
        self.devices.values()
    }

    /// Returns the device ids, ordered.
    #[must_use]
    pub fn device_ids(&self) -> Vec<String> {
        self.devices.keys().cloned().collect()
    }

    /// Returns the listed devices.
    #[must_use]
    pub fn devices(&self) -> Vec<Device> {
        self.devices.values().map(|d| d.device.clone()).collect()
    }

    /// Number of devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Returns `true` if no device is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Compares this snapshot against the one it replaces.
    #[must_use]
    pub fn diff(&self, previous: &Snapshot) -> SnapshotDiff {
        let added = self
            .devices
            .keys()
            .filter(|id| !previous.devices.contains_key(*id))
            .cloned()
            .collect();

        let removed = previous
            .devices
            .keys()
            .filter(|id| !self.devices.contains_key(*id))
            .cloned()
            .collect();

        let changed = self
            .devices
            .iter()
            .filter(|(id, current)| {
                previous.devices.get(*id).is_some_and(|before| {
                    before.device.state != current.device.state
                        || before.device.connected != current.device.connected
                })
            })
            .map(|(id, _)| id.clone())
            .collect();

        SnapshotDiff {
            added,
            removed,
            changed,
        }
    }
}

/// Device-level differences between two consecutive snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    /// Devices present only in the new snapshot.
    pub added: Vec<String>,
    /// Devices present only in the old snapshot.
    pub removed: Vec<String>,
    /// Devices whose raw state or connectivity changed.
    pub changed: Vec<String>,
}

impl SnapshotDiff {
    /// Returns `true` if nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawState;
    use serde_json::json;

    fn device(id: &str, pow: i64) -> Device {
        let mut state = RawState::new();
        state.insert("pow".to_string(), json!(pow));
        Device::new(id).with_state(state).with_connected(true)
    }

    #[test]
    fn empty_snapshot() {
        let snapshot = Snapshot::empty();
        assert_eq!(snapshot.generation(), 0);
        assert!(snapshot.is_empty());
        assert!(snapshot.fetched_at().is_none());
    }

    #[test]
    fn from_devices_normalises_each_device() {
        let snapshot = Snapshot::from_devices(1, vec![device("a", 1), device("b", 0)]);

        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.get("a").unwrap().state.power);
        assert!(!snapshot.get("b").unwrap().state.power);
        assert_eq!(snapshot.device_ids(), vec!["a", "b"]);
    }

    #[test]
    fn diff_reports_added_removed_and_changed() {
        let before = Snapshot::from_devices(1, vec![device("a", 1), device("b", 1)]);
        let after = Snapshot::from_devices(2, vec![device("b", 0), device("c", 1)]);

        let diff = after.diff(&before);
        assert_eq!(diff.added, vec!["c"]);
        assert_eq!(diff.removed, vec!["a"]);
        assert_eq!(diff.changed, vec!["b"]);
    }

    #[test]
    fn identical_snapshots_have_empty_diff() {
        let before = Snapshot::from_devices(1, vec![device("a", 1)]);
        let after = Snapshot::from_devices(2, vec![device("a", 1)]);
        assert!(after.diff(&before).is_empty());
    }
}
