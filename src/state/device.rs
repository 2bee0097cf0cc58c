// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device record as returned by the listing endpoint.

use chrono::{DateTime, Utc};

use crate::types::RawState;
use crate::types::raw::int_value;

use super::CanonicalDeviceState;

/// Mode code assumed when a device does not report one (cool).
pub const DEFAULT_MODE_CODE: i64 = 2;

/// A device discovered through the REST listing.
///
/// Devices are rediscovered on every poll and replace the previous record
/// wholesale; this type is never patched in place.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Device {
    /// Vendor-assigned identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Raw attributes in the vendor vocabulary.
    pub state: RawState,
    /// Whether the device is currently online.
    pub connected: bool,
    /// When the device last reported its state.
    pub last_update: Option<DateTime<Utc>>,
}

impl Device {
    /// Creates a device record with an empty state.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: Self::default_name(&id),
            id,
            state: RawState::new(),
            connected: false,
            last_update: None,
        }
    }

    /// Sets the raw state.
    #[must_use]
    pub fn with_state(mut self, state: RawState) -> Self {
        self.state = state;
        self
    }

    /// Sets the connectivity flag.
    #[must_use]
    pub fn with_connected(mut self, connected: bool) -> Self {
        self.connected = connected;
        self
    }

    /// Name used when the API does not provide one.
    #[must_use]
    pub fn default_name(id: &str) -> String {
        let short: String = id.chars().take(8).collect();
        format!("Bluestar AC {short}")
    }

    /// Normalises the raw state.
    #[must_use]
    pub fn canonical_state(&self) -> CanonicalDeviceState {
        CanonicalDeviceState::from_raw(&self.state)
    }

    /// Returns the raw mode code, or the cool mode code when none is reported.
    #[must_use]
    pub fn current_mode_code(&self) -> i64 {
        self.state
            .get("mode")
            .and_then(int_value)
            .unwrap_or(DEFAULT_MODE_CODE)
    }
}
