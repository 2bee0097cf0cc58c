// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transports to the Bluestar cloud.
//!
//! Two transports reach a device:
//!
//! - [`RealtimeClient`]: a persistent MQTT connection to the vendor's managed
//!   broker, used to publish desired state and receive pushed updates
//! - [`RestClient`]: stateless HTTP calls for device listing and the control
//!   fallback path
//!
//! The control dispatcher and the reconciler only see the [`RealtimeTransport`]
//! and [`RestTransport`] traits.

mod realtime;
mod rest;

pub use realtime::{RealtimeClient, RealtimeEvent};
pub use rest::{RestClient, parse_device_list, preferences_payload};

use std::future::Future;

use chrono::Utc;
use serde_json::{Value, json};

use crate::error::{Error, TransportError};
use crate::state::Device;
use crate::types::RawState;

/// Key of the source tag added to desired state documents.
pub const SRC_KEY: &str = "src";
/// Source tag identifying app-originated commands.
pub const SRC_VALUE: &str = "anmq";
/// Key of the command timestamp (milliseconds since the epoch).
pub const TS_KEY: &str = "ts";
/// Key of the force-fetch flag.
pub const FORCE_FETCH_KEY: &str = "fpsh";

/// Shadow update topic of a device.
#[must_use]
pub fn state_update_topic(device_id: &str) -> String {
    format!("$aws/things/{device_id}/shadow/update")
}

/// Topic on which the broker confirms accepted shadow updates.
#[must_use]
pub fn state_accepted_topic(device_id: &str) -> String {
    format!("$aws/things/{device_id}/shadow/update/accepted")
}

/// Control topic of a device.
#[must_use]
pub fn control_topic(device_id: &str) -> String {
    format!("things/{device_id}/control")
}

/// Extracts the device id from a shadow topic.
#[must_use]
pub fn device_id_from_topic(topic: &str) -> Option<&str> {
    let rest = topic.strip_prefix("$aws/things/")?;
    let (device_id, _) = rest.split_once("/shadow/")?;
    (!device_id.is_empty()).then_some(device_id)
}

/// Wraps attributes into a shadow document: `{state:{desired:{...}}}`.
///
/// The source tag and a millisecond timestamp are added to the attributes.
#[must_use]
pub fn desired_state_envelope(attributes: &RawState) -> Value {
    let mut desired = attributes.clone();
    desired.insert(SRC_KEY.to_string(), Value::from(SRC_VALUE));
    desired.insert(TS_KEY.to_string(), Value::from(Utc::now().timestamp_millis()));
    json!({ "state": { "desired": desired } })
}

/// Payload asking a device to re-report its full state.
#[must_use]
pub fn force_fetch_payload() -> Value {
    json!({ FORCE_FETCH_KEY: 1 })
}

/// The realtime (publish/subscribe) channel as seen by the dispatcher.
pub trait RealtimeTransport: Send + Sync {
    /// Returns `true` while the broker connection is acknowledged.
    fn is_connected(&self) -> bool;

    /// Publishes a desired state document for a device.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotConnected`] when disconnected, or the
    /// publish failure.
    fn publish_desired_state(
        &self,
        device_id: &str,
        attributes: &RawState,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Asks a device to re-report its state.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotConnected`] when disconnected, or the
    /// publish failure.
    fn publish_force_resync(
        &self,
        device_id: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// The REST API as seen by the dispatcher and the reconciler.
pub trait RestTransport: Send + Sync {
    /// Lists all devices of the account.
    ///
    /// # Errors
    ///
    /// Returns an auth, network or protocol error.
    fn list_devices(&self) -> impl Future<Output = Result<Vec<Device>, Error>> + Send;

    /// Sends a control request through the preferences endpoint, falling back
    /// to the direct state endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::InvalidMode`](crate::error::ValueError::InvalidMode)
    /// before any request when `mode` is not an integer code, and the last
    /// failure when both request shapes fail.
    fn send_preferences_control(
        &self,
        device_id: &str,
        attributes: &RawState,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Asks a device to re-report its state over HTTP.
    ///
    /// # Errors
    ///
    /// Returns a network error when the request fails.
    fn force_sync(&self, device_id: &str) -> impl Future<Output = Result<(), Error>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_substitute_device_id() {
        assert_eq!(
            state_update_topic("24587ca091f8"),
            "$aws/things/24587ca091f8/shadow/update"
        );
        assert_eq!(
            state_accepted_topic("24587ca091f8"),
            "$aws/things/24587ca091f8/shadow/update/accepted"
        );
        assert_eq!(control_topic("24587ca091f8"), "things/24587ca091f8/control");
    }

    #[test]
    fn device_id_parsed_from_shadow_topic() {
        assert_eq!(
            device_id_from_topic("$aws/things/abc/shadow/update/accepted"),
            Some("abc")
        );
        assert_eq!(device_id_from_topic("things/abc/control"), None);
        assert_eq!(device_id_from_topic("$aws/things//shadow/update"), None);
    }

    #[test]
    fn envelope_adds_source_and_timestamp() {
        let mut attributes = RawState::new();
        attributes.insert("pow".to_string(), json!(0));

        let envelope = desired_state_envelope(&attributes);
        let desired = &envelope["state"]["desired"];

        assert_eq!(desired["pow"], json!(0));
        assert_eq!(desired["src"], json!("anmq"));
        assert!(desired["ts"].as_i64().unwrap() > 0);
    }

    #[test]
    fn force_fetch_is_single_flag() {
        assert_eq!(force_fetch_payload(), json!({"fpsh": 1}));
    }
}
