// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state types.
//!
//! A [`Device`] is the record returned by the listing endpoint, with its
//! attributes in the vendor's raw vocabulary. [`CanonicalDeviceState`] is the
//! typed projection of those attributes, and a [`Snapshot`] is the immutable
//! set of all devices seen by one poll.
//!
//! # Examples
//!
//! ```
//! use bluestar_lib::state::{Device, Snapshot};
//! use bluestar_lib::types::RawState;
//! use serde_json::json;
//!
//! let mut raw = RawState::new();
//! raw.insert("pow".to_string(), json!(1));
//!
//! let snapshot = Snapshot::from_devices(1, vec![Device::new("24587ca091f8").with_state(raw)]);
//! assert!(snapshot.get("24587ca091f8").unwrap().state.power);
//! ```

mod device;
mod device_state;
mod snapshot;

pub use device::{DEFAULT_MODE_CODE, Device};
pub use device_state::CanonicalDeviceState;
pub use snapshot::{DeviceSnapshot, Snapshot, SnapshotDiff};
