// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `BlueStar` Lib - A Rust library to control Blue Star smart air conditioners.
//!
//! This library talks to the Blue Star cloud the way the mobile app does:
//! a REST API for login, device listing and control, and an MQTT broker for
//! realtime control and pushed state reports.
//!
//! # Supported Features
//!
//! - **Login**: Phone number and password, with optional realtime credentials
//! - **Device state**: Polled snapshot normalised to a canonical model
//! - **Control**: Power, mode, temperature, fan speed, louvers, display
//! - **Fallback**: Realtime publish, then REST, then a forced resync
//! - **Events**: Device lifecycle, state changes, realtime connection status
//!
//! # Quick Start
//!
//! ```no_run
//! use bluestar_lib::{BluestarClient, ClientConfig, ControlIntent};
//! use bluestar_lib::types::{AcMode, FanSpeed};
//!
//! #[tokio::main]
//! async fn main() -> bluestar_lib::Result<()> {
//!     let client = BluestarClient::connect(ClientConfig::new(), "9876543210", "secret").await?;
//!
//!     for entry in client.snapshot().iter() {
//!         println!("{}: {:?} at {:?}", entry.device.name, entry.state.mode, entry.state.target_temperature);
//!     }
//!
//!     let intent = ControlIntent::new("24587ca091f8")
//!         .power(true)
//!         .mode(AcMode::Cool)
//!         .fan_speed(FanSpeed::Auto)
//!         .target_temperature(24.0)?;
//!     client.send_control(&intent).await?;
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## REST Only
//!
//! ```no_run
//! use bluestar_lib::{BluestarClient, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> bluestar_lib::Result<()> {
//!     let config = ClientConfig::new().rest_only();
//!     let client = BluestarClient::connect(config, "9876543210", "secret").await?;
//!     assert!(!client.is_realtime_connected());
//!     Ok(())
//! }
//! ```
//!
//! ## Events and Callbacks
//!
//! ```no_run
//! use bluestar_lib::{BluestarClient, ClientConfig};
//! use bluestar_lib::event::DeviceEvent;
//!
//! #[tokio::main]
//! async fn main() -> bluestar_lib::Result<()> {
//!     let client = BluestarClient::connect(ClientConfig::new(), "9876543210", "secret").await?;
//!
//!     client.on_realtime_update(|update| {
//!         println!("{} reported {:?}", update.device_id, update.attributes);
//!     });
//!
//!     let mut events = client.subscribe();
//!     while let Ok(event) = events.recv().await {
//!         if let DeviceEvent::StateChanged { device_id, state, .. } = event {
//!             println!("{device_id}: {state:?}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod client;
pub mod config;
pub mod control;
pub mod error;
pub mod event;
pub mod protocol;
pub mod reconciler;
pub mod session;
pub mod state;
pub mod subscription;
pub mod types;

pub use client::BluestarClient;
pub use config::{ClientConfig, RealtimeConfig};
pub use control::{ControlIntent, ControlOutcome, ControlTier};
pub use error::{
    AuthError, ControlError, Error, NetworkError, ProtocolError, Result, TransportError,
    ValueError,
};
pub use event::{DeviceEvent, EventBus};
pub use session::{Session, TransportDescriptor};
pub use state::{CanonicalDeviceState, Device, DeviceSnapshot, Snapshot};
pub use subscription::{RealtimeUpdate, SubscriptionId};
pub use types::{AcMode, FanSpeed, RawState, SwingPosition};
