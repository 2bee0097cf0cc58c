// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Authenticated session management.
//!
//! A [`Session`] is created by [`Session::login`] and then shared through an
//! `Arc` with every component that talks to the cloud API. There is exactly
//! one session per [`BluestarClient`](crate::BluestarClient).
//!
//! The login response may embed the realtime channel credentials. When they
//! are missing or malformed the session is still valid, but only for REST
//! calls ([`Session::descriptor`] returns `None`).

mod credentials;

pub use credentials::TransportDescriptor;

use std::sync::atomic::{AtomicBool, Ordering};

use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::{AuthError, Error, NetworkError, ProtocolError};
use crate::types::raw::string_value;

/// Header carrying the session token on authenticated calls.
pub const SESSION_HEADER: &str = "X-APP-SESSION";

/// Authentication type used by phone number logins.
const AUTH_TYPE_PHONE: u8 = 1;

#[derive(Debug, serde::Serialize)]
struct LoginRequest<'a> {
    auth_id: &'a str,
    auth_type: u8,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    session: Option<String>,
    mi: Option<String>,
    user: Option<LoginUser>,
}

#[derive(Debug, Deserialize)]
struct LoginUser {
    id: Option<Value>,
}

/// An authenticated session against the cloud API.
///
/// The token and transport descriptor never change after login.
#[derive(Debug)]
pub struct Session {
    phone: String,
    password: SecretString,
    token: SecretString,
    descriptor: Option<TransportDescriptor>,
    user_id: Option<String>,
    app_headers: Vec<(String, String)>,
    closed: AtomicBool,
}

impl Session {
    /// Logs in with a phone number and password.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidCredentials`] when the server answers 401 or 403
    /// - [`AuthError::Rejected`] for any other non-success status
    /// - [`AuthError::MissingSession`] when the response has no session token
    /// - [`NetworkError`] when the request fails or times out
    /// - [`ProtocolError`] when the body is not JSON
    pub async fn login(
        http: &reqwest::Client,
        config: &ClientConfig,
        phone: impl Into<String>,
        password: SecretString,
    ) -> Result<Self, Error> {
        let phone = phone.into();
        let url = format!("{}/auth/login", config.base_url());

        tracing::debug!(url = %url, "Logging in");

        let request = LoginRequest {
            auth_id: &phone,
            auth_type: AUTH_TYPE_PHONE,
            password: password.expose_secret(),
        };

        let response = http
            .post(&url)
            .headers(build_headers(config.app_headers(), None))
            .json(&request)
            .timeout(config.http_timeout())
            .send()
            .await
            .map_err(NetworkError::Http)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AuthError::InvalidCredentials.into());
        }
        if !status.is_success() {
            return Err(AuthError::Rejected {
                status: status.as_u16(),
            }
            .into());
        }

        let body = response.text().await.map_err(NetworkError::Http)?;
        let login: LoginResponse = serde_json::from_str(&body).map_err(ProtocolError::Json)?;

        let token = login
            .session
            .filter(|s| !s.is_empty())
            .ok_or(AuthError::MissingSession)?;

        let descriptor = match login.mi.as_deref() {
            Some(mi) => match TransportDescriptor::decode(mi, token.clone()) {
                Ok(descriptor) => {
                    tracing::debug!(
                        endpoint = %descriptor.endpoint(),
                        access_key = %descriptor.access_key_hint(),
                        "Realtime credentials extracted"
                    );
                    Some(descriptor)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Invalid realtime credentials, using REST only");
                    None
                }
            },
            None => {
                tracing::warn!("No realtime credentials in login response, using REST only");
                None
            }
        };

        let user_id = login
            .user
            .and_then(|user| user.id)
            .filter(|id| !id.is_null())
            .map(|id| string_value(&id));

        tracing::info!(realtime = descriptor.is_some(), "Logged in");

        Ok(Self {
            phone,
            password,
            token: SecretString::from(token),
            descriptor,
            user_id,
            app_headers: config.app_headers().to_vec(),
            closed: AtomicBool::new(false),
        })
    }

    /// Phone number the session was opened with.
    #[must_use]
    pub fn phone(&self) -> &str {
        &self.phone
    }

    /// Password the session was opened with.
    #[must_use]
    pub fn password(&self) -> &SecretString {
        &self.password
    }

    /// Server-issued session token.
    #[must_use]
    pub fn token(&self) -> &str {
        self.token.expose_secret()
    }

    /// Realtime credentials, if the login response carried valid ones.
    #[must_use]
    pub fn descriptor(&self) -> Option<&TransportDescriptor> {
        self.descriptor.as_ref()
    }

    /// User id reported at login.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Headers for authenticated REST calls.
    #[must_use]
    pub fn headers(&self) -> HeaderMap {
        build_headers(&self.app_headers, Some(self.token.expose_secret()))
    }

    /// Marks the session closed. Calling it again has no effect.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!("Session closed");
        }
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) fn for_tests(token: &str, descriptor: Option<TransportDescriptor>) -> Self {
        Self {
            phone: "9999999999".to_string(),
            password: SecretString::from("secret".to_string()),
            token: SecretString::from(token.to_string()),
            descriptor,
            user_id: None,
            app_headers: ClientConfig::new().app_headers().to_vec(),
            closed: AtomicBool::new(false),
        }
    }
}

fn build_headers(app_headers: &[(String, String)], token: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    for (name, value) in app_headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Skipping invalid header"),
        }
    }

    if let Some(token) = token {
        match HeaderValue::from_str(token) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(SESSION_HEADER, value);
            }
            Err(_) => tracing::warn!("Session token is not a valid header value"),
        }
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    #[test]
    fn headers_include_session_token() {
        let session = Session::for_tests("tok1", None);
        let headers = session.headers();

        assert_eq!(headers.get(SESSION_HEADER).unwrap(), "tok1");
        assert_eq!(headers.get("X-APP-VER").unwrap(), "v4.11.4-133");
        assert_eq!(headers.get("X-OS-NAME").unwrap(), "Android");
        assert_eq!(
            headers.get("User-Agent").unwrap(),
            "com.bluestarindia.bluesmart"
        );
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn login_headers_have_no_session() {
        let headers = build_headers(ClientConfig::new().app_headers(), None);
        assert!(headers.get(SESSION_HEADER).is_none());
    }

    #[test]
    fn close_is_idempotent() {
        let session = Session::for_tests("tok1", None);
        assert!(!session.is_closed());
        session.close();
        session.close();
        assert!(session.is_closed());
    }

    #[test]
    fn token_not_in_debug_output() {
        let mi = base64::engine::general_purpose::STANDARD.encode("ep::ak::sk");
        let descriptor = TransportDescriptor::decode(&mi, "SUPERSECRETTOKEN").unwrap();
        let session = Session::for_tests("SUPERSECRETTOKEN", Some(descriptor));

        let debug = format!("{session:?}");
        assert!(!debug.contains("SUPERSECRETTOKEN"));
        assert!(!debug.contains("secret\""));
    }

    #[test]
    fn session_without_descriptor_is_rest_only() {
        let session = Session::for_tests("tok1", None);
        assert!(session.descriptor().is_none());
        assert_eq!(session.token(), "tok1");
    }
}
