// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Callbacks for realtime state reports.
//!
//! Devices push their state over MQTT between polls. Each report is turned
//! into a [`RealtimeUpdate`] and handed to every callback registered with
//! [`CallbackRegistry::on_realtime_update`]. The stored snapshot is not
//! modified by a report; the client requests a poll instead.
//!
//! # Usage
//!
//! ```no_run
//! use bluestar_lib::{BluestarClient, ClientConfig};
//!
//! # async fn example() -> bluestar_lib::Result<()> {
//! let client = BluestarClient::connect(ClientConfig::new(), "9876543210", "secret").await?;
//!
//! let sub_id = client.on_realtime_update(|update| {
//!     println!("{} is now {:?}", update.device_id, update.state.mode);
//! });
//!
//! // Later, unsubscribe
//! client.unsubscribe(sub_id);
//! # Ok(())
//! # }
//! ```

mod callback;

pub use callback::{CallbackRegistry, RealtimeUpdate, SubscriptionId};
