// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Callback management for realtime updates.
//!
//! - [`SubscriptionId`] - Unique identifier for unsubscribing
//! - [`RealtimeUpdate`] - The value handed to callbacks
//! - [`CallbackRegistry`] - Registry for storing and dispatching callbacks

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::state::{CanonicalDeviceState, Snapshot};
use crate::types::RawState;

/// Unique identifier for a subscription.
///
/// Returned by `on_realtime_update` and accepted by `unsubscribe`. IDs are
/// never reused by the same registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    #[must_use]
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

/// A state report pushed by a device over the realtime channel.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeUpdate {
    /// The reporting device.
    pub device_id: String,
    /// The attributes carried by the report.
    pub attributes: RawState,
    /// Canonical state of the last known attributes with the report applied.
    pub state: CanonicalDeviceState,
}

impl RealtimeUpdate {
    /// Builds an update by overlaying the pushed attributes on the device's
    /// raw state in `snapshot`.
    ///
    /// The snapshot is left untouched. A device missing from the snapshot is
    /// normalised from the pushed attributes alone.
    #[must_use]
    pub fn from_report(snapshot: &Snapshot, device_id: impl Into<String>, attributes: RawState) -> Self {
        let device_id = device_id.into();
        let mut merged = snapshot
            .get(&device_id)
            .map(|entry| entry.device.state.clone())
            .unwrap_or_default();
        merged.extend(attributes.iter().map(|(key, value)| (key.clone(), value.clone())));

        Self {
            state: CanonicalDeviceState::from_raw(&merged),
            device_id,
            attributes,
        }
    }
}

/// Type alias for realtime update callbacks.
type UpdateCallback = Arc<dyn Fn(&RealtimeUpdate) + Send + Sync>;

/// Registry for realtime update callbacks.
///
/// Fully thread-safe; callbacks are stored behind `parking_lot::RwLock` and
/// called synchronously from the realtime consumer task.
pub struct CallbackRegistry {
    next_id: AtomicU64,
    callbacks: RwLock<HashMap<SubscriptionId, UpdateCallback>>,
}

impl CallbackRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            callbacks: RwLock::new(HashMap::new()),
        }
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers a callback for realtime updates.
    pub fn on_realtime_update<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&RealtimeUpdate) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.callbacks.write().insert(id, Arc::new(callback));
        id
    }

    /// Removes a callback.
    ///
    /// Returns `true` if the subscription existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.callbacks.write().remove(&id).is_some()
    }

    /// Removes all callbacks.
    pub fn clear(&self) {
        self.callbacks.write().clear();
    }

    /// Calls every registered callback with `update`.
    ///
    /// Callbacks are cloned out of the lock first, so a callback may
    /// register or remove subscriptions without deadlocking.
    pub fn dispatch(&self, update: &RealtimeUpdate) {
        let callbacks: Vec<UpdateCallback> = self.callbacks.read().values().cloned().collect();
        for callback in callbacks {
            callback(update);
        }
    }

    /// Returns the number of registered callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    /// Returns `true` if there are no registered callbacks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.read().is_empty()
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("callbacks", &self.len())
            .finish_non_exhaustive()
    }
}
