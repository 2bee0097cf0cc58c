// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the Bluestar library.
//!
//! The hierarchy follows the failure classes of the engine: authentication,
//! realtime transport, REST network access, unexpected payloads, and exhausted
//! control dispatch. Setup callers use [`Error::is_retryable`] to decide whether
//! a failed connection attempt is worth repeating.

use thiserror::Error;

use crate::control::ControlTier;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Authentication failed or the session is no longer accepted.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// The realtime (MQTT) channel failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A REST call failed at the network level.
    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    /// A response did not have the expected shape.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Every control tier failed.
    #[error("control error: {0}")]
    Control(#[from] ControlError),

    /// Invalid input supplied by the caller.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// The device is not present in the current snapshot.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// The client has been closed.
    #[error("client is closed")]
    Closed,
}

impl Error {
    /// Returns `true` if retrying the failed operation may succeed.
    ///
    /// Timeouts, connection failures and server-side errors are retryable.
    /// Rejected credentials and malformed payloads are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Transport(_) | Self::Control(_) => true,
            Self::Auth(AuthError::Rejected { status }) => *status >= 500,
            Self::Auth(_)
            | Self::Protocol(_)
            | Self::Value(_)
            | Self::DeviceNotFound(_)
            | Self::Closed => false,
        }
    }
}

/// Errors related to login and session validity.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The server refused the phone number / password pair.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The login endpoint answered with an unexpected status.
    #[error("login rejected with HTTP {status}")]
    Rejected {
        /// HTTP status code returned by the server.
        status: u16,
    },

    /// The login response did not contain a session token.
    #[error("no session token in login response")]
    MissingSession,

    /// An authenticated call was refused.
    #[error("session expired or not authenticated")]
    SessionExpired,
}

/// Errors related to the realtime MQTT channel.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The realtime channel is not connected.
    #[error("realtime channel is not connected")]
    NotConnected,

    /// The MQTT client rejected a request.
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// The operation did not complete in time.
    #[error("operation timed out after {0} ms")]
    Timeout(u64),

    /// The connection could not be established.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
}

/// Errors related to REST calls.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("{endpoint} returned HTTP {status}")]
    Status {
        /// The endpoint path that was called.
        endpoint: String,
        /// HTTP status code.
        status: u16,
    },
}

/// Errors related to unexpected response content.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Expected field is missing from the response.
    #[error("missing field in response: {0}")]
    MissingField(String),

    /// The response shape is not one of the known variants.
    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),

    /// The embedded transport credentials could not be decoded.
    #[error("invalid transport credentials: {0}")]
    InvalidCredentials(String),

    /// The device list did not contain the requested device.
    #[error("device {0} not present in device list")]
    DeviceNotFound(String),
}

/// Errors produced by the control dispatcher.
#[derive(Debug, Error)]
pub enum ControlError {
    /// Every dispatch tier was attempted and failed.
    #[error("all control tiers failed for device {device_id}: {}", describe_failures(.failures))]
    Exhausted {
        /// The targeted device.
        device_id: String,
        /// The failure recorded for each attempted tier, in order.
        failures: Vec<(ControlTier, String)>,
    },
}

fn describe_failures(failures: &[(ControlTier, String)]) -> String {
    failures
        .iter()
        .map(|(tier, message)| format!("{tier}: {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors related to caller-supplied values.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValueError {
    /// A control intent without any attribute.
    #[error("control intent for device {0} has no attributes")]
    EmptyIntent(String),

    /// A temperature that is not a finite number.
    #[error("invalid temperature: {0}")]
    InvalidTemperature(f32),

    /// A temperature outside the supported setpoint range.
    #[error("temperature {value} outside {min}..={max}")]
    TemperatureOutOfRange {
        /// The requested temperature.
        value: f32,
        /// Lowest accepted setpoint.
        min: f32,
        /// Highest accepted setpoint.
        max: f32,
    },

    /// A `mode` attribute that is not an integer code.
    #[error("mode must be an integer code, got {0}")]
    InvalidMode(String),

    /// A raw value that does not belong to a known enumeration.
    #[error("unknown {kind} code: {code}")]
    UnknownCode {
        /// The enumeration that was being parsed.
        kind: &'static str,
        /// The offending raw code.
        code: i64,
    },

    /// A name that does not match any variant.
    #[error("unknown {kind} name: {name}")]
    UnknownName {
        /// The enumeration that was being parsed.
        kind: &'static str,
        /// The offending name.
        name: String,
    },
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
