// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device event types.

use crate::state::CanonicalDeviceState;

/// Events emitted by the client.
///
/// Device lifecycle and state events come from diffing consecutive
/// snapshots, so they are only emitted after a successful poll.
///
/// # Examples
///
/// ```
/// use bluestar_lib::event::DeviceEvent;
///
/// let added = DeviceEvent::device_added("24587ca091f8", "Bedroom");
/// assert_eq!(added.device_id(), Some("24587ca091f8"));
/// assert!(added.is_lifecycle());
///
/// let failed = DeviceEvent::RefreshFailed { error: "timeout".to_string() };
/// assert_eq!(failed.device_id(), None);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// A device appeared in the device list.
    DeviceAdded {
        /// The device id.
        device_id: String,
        /// The display name.
        name: String,
    },

    /// A device is no longer listed.
    DeviceRemoved {
        /// The device id.
        device_id: String,
    },

    /// A device's raw state or connectivity changed between two polls.
    StateChanged {
        /// The device id.
        device_id: String,
        /// Whether the device is online.
        connected: bool,
        /// The new canonical state.
        state: CanonicalDeviceState,
    },

    /// The realtime channel connected or disconnected.
    RealtimeConnectionChanged {
        /// Whether the channel is now connected.
        connected: bool,
    },

    /// A poll failed; the previous snapshot is kept.
    RefreshFailed {
        /// Description of the failure.
        error: String,
    },
}

impl DeviceEvent {
    /// Returns the device id, for device-scoped events.
    #[must_use]
    pub fn device_id(&self) -> Option<&str> {
        match self {
            Self::DeviceAdded { device_id, .. }
            | Self::DeviceRemoved { device_id }
            | Self::StateChanged { device_id, .. } => Some(device_id),
            Self::RealtimeConnectionChanged { .. } | Self::RefreshFailed { .. } => None,
        }
    }

    /// Returns `true` for added/removed events.
    #[must_use]
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::DeviceAdded { .. } | Self::DeviceRemoved { .. })
    }

    /// Returns `true` for state change events.
    #[must_use]
    pub fn is_state_change(&self) -> bool {
        matches!(self, Self::StateChanged { .. })
    }

    /// Creates a device added event.
    #[must_use]
    pub fn device_added(device_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::DeviceAdded {
            device_id: device_id.into(),
            name: name.into(),
        }
    }

    /// Creates a device removed event.
    #[must_use]
    pub fn device_removed(device_id: impl Into<String>) -> Self {
        Self::DeviceRemoved {
            device_id: device_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_scoped_events_expose_id() {
        assert_eq!(
            DeviceEvent::device_removed("abc").device_id(),
            Some("abc")
        );

        let changed = DeviceEvent::StateChanged {
            device_id: "abc".to_string(),
            connected: true,
            state: CanonicalDeviceState::default(),
        };
        assert_eq!(changed.device_id(), Some("abc"));
        assert!(changed.is_state_change());
        assert!(!changed.is_lifecycle());
    }

    #[test]
    fn connection_events_have_no_device() {
        let event = DeviceEvent::RealtimeConnectionChanged { connected: false };
        assert_eq!(event.device_id(), None);
        assert!(!event.is_lifecycle());
    }
}
