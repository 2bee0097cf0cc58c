// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device control.
//!
//! A [`ControlIntent`] describes the attributes to change on one device; the
//! [`ControlDispatcher`] delivers it through the realtime channel, the REST
//! API, or as a last resort a forced resync.

mod dispatcher;
mod intent;

pub use dispatcher::ControlDispatcher;
pub use intent::ControlIntent;

use std::fmt;

/// A step of the control fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlTier {
    /// Desired state published over MQTT.
    Realtime,
    /// Preferences or state document posted over HTTP.
    Rest,
    /// Device asked to re-report its state; the change was not sent.
    ForcedResync,
}

impl ControlTier {
    /// Returns a short lowercase label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Realtime => "realtime",
            Self::Rest => "rest",
            Self::ForcedResync => "forced resync",
        }
    }
}

impl fmt::Display for ControlTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlOutcome {
    /// The targeted device.
    pub device_id: String,
    /// The tier that succeeded.
    pub tier: ControlTier,
    /// Failures of the tiers tried before it.
    pub failures: Vec<(ControlTier, String)>,
}

impl ControlOutcome {
    /// Returns `true` if the requested change was delivered.
    ///
    /// A forced resync only asks the device to report its state again.
    #[must_use]
    pub fn applied(&self) -> bool {
        self.tier != ControlTier::ForcedResync
    }
}
