// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decoding of the realtime credentials embedded in the login response.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};

use crate::error::ProtocolError;

const SEPARATOR: &str = "::";

/// Connection parameters of the realtime channel.
///
/// The login response carries them as a base64 blob (`mi`) of the form
/// `endpoint::access_key::secret_key`. The descriptor is derived once per
/// session and never changes afterwards.
///
/// # Examples
///
/// ```
/// use bluestar_lib::session::TransportDescriptor;
///
/// // base64("broker.example.com::AKIA123::s3cr3t")
/// let mi = "YnJva2VyLmV4YW1wbGUuY29tOjpBS0lBMTIzOjpzM2NyM3Q=";
/// let descriptor = TransportDescriptor::decode(mi, "session-1").unwrap();
///
/// assert_eq!(descriptor.endpoint(), "broker.example.com");
/// assert_eq!(descriptor.access_key(), "AKIA123");
/// ```
#[derive(Debug, Clone)]
pub struct TransportDescriptor {
    endpoint: String,
    access_key: String,
    secret_key: SecretString,
    session_id: SecretString,
}

impl TransportDescriptor {
    /// Decodes the `mi` blob.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidCredentials`] if the blob is not valid
    /// base64, not UTF-8, or does not split into exactly three non-empty parts.
    pub fn decode(mi: &str, session_id: impl Into<String>) -> Result<Self, ProtocolError> {
        let bytes = STANDARD
            .decode(mi.trim())
            .map_err(|e| ProtocolError::InvalidCredentials(format!("invalid base64: {e}")))?;

        let decoded = String::from_utf8(bytes)
            .map_err(|e| ProtocolError::InvalidCredentials(format!("invalid UTF-8: {e}")))?;

        let parts: Vec<&str> = decoded.split(SEPARATOR).collect();
        let [endpoint, access_key, secret_key] = parts.as_slice() else {
            return Err(ProtocolError::InvalidCredentials(format!(
                "expected 3 parts, found {}",
                parts.len()
            )));
        };

        if endpoint.is_empty() || access_key.is_empty() {
            return Err(ProtocolError::InvalidCredentials(
                "empty endpoint or access key".to_string(),
            ));
        }

        Ok(Self {
            endpoint: (*endpoint).to_string(),
            access_key: (*access_key).to_string(),
            secret_key: SecretString::from((*secret_key).to_string()),
            session_id: SecretString::from(session_id.into()),
        })
    }

    /// Broker host name.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Access key, used as the MQTT user name.
    #[must_use]
    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    /// Secret key paired with the access key.
    #[must_use]
    pub fn secret_key(&self) -> &str {
        self.secret_key.expose_secret()
    }

    /// Session token the descriptor was issued with.
    #[must_use]
    pub fn session_id(&self) -> &str {
        self.session_id.expose_secret()
    }

    /// Access key shortened for log output.
    #[must_use]
    pub fn access_key_hint(&self) -> String {
        let short: String = self.access_key.chars().take(8).collect();
        format!("{short}...")
    }
}
