// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! REST transport.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};

use crate::config::ClientConfig;
use crate::error::{AuthError, Error, NetworkError, ProtocolError, ValueError};
use crate::protocol::{RestTransport, desired_state_envelope, force_fetch_payload};
use crate::session::Session;
use crate::state::Device;
use crate::types::RawState;
use crate::types::raw::{int_value, string_value};

/// Values of `state_ts` below this are seconds, above are milliseconds.
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// HTTP client for the Bluestar cloud API.
///
/// Every request carries the session headers and its own timeout. Device ids
/// are percent-encoded before being placed in URL paths.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use bluestar_lib::config::ClientConfig;
/// use bluestar_lib::protocol::{RestClient, RestTransport};
/// use bluestar_lib::session::Session;
/// use secrecy::SecretString;
///
/// # async fn example() -> bluestar_lib::Result<()> {
/// let config = ClientConfig::new();
/// let http = reqwest::Client::new();
/// let password = SecretString::from("password".to_string());
/// let session = Arc::new(Session::login(&http, &config, "9876543210", password).await?);
///
/// let rest = RestClient::new(http, &config, session);
/// for device in rest.list_devices().await? {
///     println!("{} ({})", device.name, device.id);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RestClient {
    http: Client,
    base_url: String,
    session: Arc<Session>,
    http_timeout: Duration,
    control_timeout: Duration,
}

impl RestClient {
    /// Creates a REST client bound to a session.
    #[must_use]
    pub fn new(http: Client, config: &ClientConfig, session: Arc<Session>) -> Self {
        Self {
            http,
            base_url: config.base_url().to_string(),
            session,
            http_timeout: config.http_timeout(),
            control_timeout: config.control_timeout(),
        }
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn device_path(device_id: &str, action: &str) -> String {
        format!("/things/{}/{action}", urlencoding::encode(device_id))
    }

    /// Posts a JSON body to an endpoint, mapping status codes to errors.
    async fn post(&self, path: &str, body: &Value) -> Result<(), Error> {
        let url = format!("{}{path}", self.base_url);

        tracing::debug!(url = %url, "Sending REST request");

        let response = self
            .http
            .post(&url)
            .headers(self.session.headers())
            .json(body)
            .timeout(self.control_timeout)
            .send()
            .await
            .map_err(NetworkError::Http)?;

        check_status(path, response.status())
    }
}

impl RestTransport for RestClient {
    async fn list_devices(&self) -> Result<Vec<Device>, Error> {
        let path = "/things";
        let url = format!("{}{path}", self.base_url);

        tracing::debug!(url = %url, "Fetching device list");

        let response = self
            .http
            .get(&url)
            .headers(self.session.headers())
            .timeout(self.http_timeout)
            .send()
            .await
            .map_err(NetworkError::Http)?;

        check_status(path, response.status())?;

        let body = response.text().await.map_err(NetworkError::Http)?;
        let value: Value = serde_json::from_str(&body).map_err(ProtocolError::Json)?;
        let devices = parse_device_list(&value)?;

        tracing::debug!(count = devices.len(), "Fetched devices");
        Ok(devices)
    }

    async fn send_preferences_control(
        &self,
        device_id: &str,
        attributes: &RawState,
    ) -> Result<(), Error> {
        let requested_mode = attributes
            .get("mode")
            .map(|value| int_value(value).ok_or_else(|| ValueError::InvalidMode(string_value(value))))
            .transpose()?;

        let devices = self.list_devices().await?;
        let device = devices
            .iter()
            .find(|d| d.id == device_id)
            .ok_or_else(|| ProtocolError::DeviceNotFound(device_id.to_string()))?;

        let mode = requested_mode.unwrap_or_else(|| device.current_mode_code());

        let payload = preferences_payload(mode, attributes);
        let path = Self::device_path(device_id, "preferences");

        match self.post(&path, &payload).await {
            Ok(()) => {
                tracing::debug!(device_id = %device_id, mode, "Preferences control accepted");
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(
                    device_id = %device_id,
                    error = %e,
                    "Preferences control failed, trying state endpoint"
                );
            }
        }

        let path = Self::device_path(device_id, "state");
        self.post(&path, &desired_state_envelope(attributes)).await?;
        tracing::debug!(device_id = %device_id, "State control accepted");
        Ok(())
    }

    async fn force_sync(&self, device_id: &str) -> Result<(), Error> {
        let path = Self::device_path(device_id, "control");
        self.post(&path, &force_fetch_payload()).await
    }
}

fn check_status(endpoint: &str, status: StatusCode) -> Result<(), Error> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(AuthError::SessionExpired.into());
    }
    if !status.is_success() {
        return Err(NetworkError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        }
        .into());
    }
    Ok(())
}

/// Builds the mode-keyed preferences document.
///
/// Every attribute is converted to its string form and nested under the mode
/// code: `{preferences:{mode:{"<mode>":{attr:"value",...}}}}`.
///
/// # Examples
///
/// ```
/// use bluestar_lib::protocol::preferences_payload;
/// use bluestar_lib::types::RawState;
/// use serde_json::json;
///
/// let mut attributes = RawState::new();
/// attributes.insert("pow".to_string(), json!(0));
///
/// assert_eq!(
///     preferences_payload(2, &attributes),
///     json!({"preferences": {"mode": {"2": {"pow": "0"}}}})
/// );
/// ```
#[must_use]
pub fn preferences_payload(mode: i64, attributes: &RawState) -> Value {
    let mode_config: Map<String, Value> = attributes
        .iter()
        .map(|(key, value)| (key.clone(), Value::String(string_value(value))))
        .collect();

    let mut modes = Map::new();
    modes.insert(mode.to_string(), Value::Object(mode_config));

    let mut preferences = Map::new();
    preferences.insert("mode".to_string(), Value::Object(modes));

    let mut root = Map::new();
    root.insert("preferences".to_string(), Value::Object(preferences));
    Value::Object(root)
}

/// Parses a device listing response.
///
/// Three shapes are accepted:
///
/// 1. a flat array of device objects
/// 2. `{things:[...], states:{id:{...}}}`, joined by device id
/// 3. `{states:{id:{...}}}`
///
/// # Errors
///
/// Returns [`ProtocolError::UnexpectedShape`] for any other shape and
/// [`ProtocolError::MissingField`] when an array entry has no id.
pub fn parse_device_list(value: &Value) -> Result<Vec<Device>, ProtocolError> {
    match value {
        Value::Array(records) => records
            .iter()
            .map(|record| -> Result<Device, ProtocolError> {
                let object = record.as_object().ok_or_else(|| {
                    ProtocolError::UnexpectedShape(format!(
                        "device entry is {}",
                        describe(record)
                    ))
                })?;
                let id = record_id(object).ok_or_else(|| ProtocolError::MissingField("id".into()))?;
                Ok(device_from_records(id, Some(object), None))
            })
            .collect(),
        Value::Object(root) => {
            let states = match root.get("states") {
                Some(Value::Object(states)) => Some(states),
                Some(Value::Null) | None => None,
                Some(other) => {
                    return Err(ProtocolError::UnexpectedShape(format!(
                        "states is {}",
                        describe(other)
                    )));
                }
            };

            match root.get("things") {
                Some(Value::Array(things)) => Ok(join_things(things, states)),
                Some(other) => Err(ProtocolError::UnexpectedShape(format!(
                    "things is {}",
                    describe(other)
                ))),
                None => {
                    let states = states.ok_or_else(|| {
                        ProtocolError::UnexpectedShape(
                            "object without things or states".to_string(),
                        )
                    })?;
                    Ok(states
                        .iter()
                        .map(|(id, entry)| device_from_records(id.clone(), None, entry.as_object()))
                        .collect())
                }
            }
        }
        other => Err(ProtocolError::UnexpectedShape(describe(other).to_string())),
    }
}

fn join_things(things: &[Value], states: Option<&Map<String, Value>>) -> Vec<Device> {
    let mut seen = HashSet::new();
    let mut devices = Vec::with_capacity(things.len());

    for thing in things {
        let Some(object) = thing.as_object() else {
            tracing::warn!("Skipping non-object thing entry");
            continue;
        };
        let Some(id) = record_id(object) else {
            tracing::warn!("Skipping thing entry without id");
            continue;
        };
        let state = states.and_then(|s| s.get(&id)).and_then(Value::as_object);
        seen.insert(id.clone());
        devices.push(device_from_records(id, Some(object), state));
    }

    if let Some(states) = states {
        for (id, entry) in states {
            if !seen.contains(id) {
                devices.push(device_from_records(id.clone(), None, entry.as_object()));
            }
        }
    }

    devices
}

fn record_id(record: &Map<String, Value>) -> Option<String> {
    record
        .get("id")
        .or_else(|| record.get("thing_id"))
        .filter(|v| v.is_string() || v.is_number())
        .map(string_value)
        .filter(|id| !id.is_empty())
}

/// Builds a device from a `things` entry and/or a `states` entry.
///
/// The states entry wins for state and connectivity, the thing entry for the
/// name.
fn device_from_records(
    id: String,
    thing: Option<&Map<String, Value>>,
    state: Option<&Map<String, Value>>,
) -> Device {
    let field = |key: &str| {
        state
            .and_then(|s| s.get(key))
            .or_else(|| thing.and_then(|t| t.get(key)))
    };

    let name = thing
        .and_then(|t| t.get("name"))
        .or_else(|| state.and_then(|s| s.get("name")))
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .map_or_else(|| Device::default_name(&id), str::to_string);

    let raw_state: RawState = match field("state") {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::Null) | None => RawState::new(),
        Some(other) => {
            tracing::warn!(device_id = %id, kind = describe(other), "Ignoring non-object state");
            RawState::new()
        }
    };

    let connected = field("connected")
        .and_then(int_value)
        .is_some_and(|v| v != 0);

    let last_update = field("state_ts").and_then(int_value).and_then(timestamp);

    Device {
        id,
        name,
        state: raw_state,
        connected,
        last_update,
    }
}

/// Accepts both second and millisecond epoch timestamps; zero means unknown.
fn timestamp(value: i64) -> Option<DateTime<Utc>> {
    match value {
        v if v <= 0 => None,
        v if v >= MILLIS_THRESHOLD => DateTime::from_timestamp_millis(v),
        v => DateTime::from_timestamp(v, 0),
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
