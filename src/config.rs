// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client configuration.
//!
//! # Examples
//!
//! ```
//! use bluestar_lib::config::{ClientConfig, RealtimeConfig};
//! use std::time::Duration;
//!
//! let config = ClientConfig::new()
//!     .with_poll_interval(Duration::from_secs(60))
//!     .with_realtime(RealtimeConfig::new().with_connect_wait(Duration::from_secs(1)));
//!
//! assert_eq!(config.poll_interval(), Duration::from_secs(60));
//! ```

use std::time::Duration;

/// Production REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://n3on22cp53.execute-api.ap-south-1.amazonaws.com/prod";

/// Identification headers sent with every REST call, as the mobile app does.
pub const DEFAULT_APP_HEADERS: [(&str, &str); 4] = [
    ("X-APP-VER", "v4.11.4-133"),
    ("X-OS-NAME", "Android"),
    ("X-OS-VER", "v13-33"),
    ("User-Agent", "com.bluestarindia.bluesmart"),
];

/// Configuration of a [`BluestarClient`](crate::BluestarClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    base_url: String,
    http_timeout: Duration,
    control_timeout: Duration,
    poll_interval: Duration,
    app_headers: Vec<(String, String)>,
    event_capacity: usize,
    realtime: RealtimeConfig,
}

impl ClientConfig {
    /// Default timeout for login and listing calls.
    pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);
    /// Default timeout for control calls.
    pub const DEFAULT_CONTROL_TIMEOUT: Duration = Duration::from_secs(10);
    /// Default reconciler poll interval.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
    /// Default event bus capacity.
    pub const DEFAULT_EVENT_CAPACITY: usize = 256;

    /// Creates the production configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            http_timeout: Self::DEFAULT_HTTP_TIMEOUT,
            control_timeout: Self::DEFAULT_CONTROL_TIMEOUT,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            app_headers: DEFAULT_APP_HEADERS
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            event_capacity: Self::DEFAULT_EVENT_CAPACITY,
            realtime: RealtimeConfig::default(),
        }
    }

    /// Overrides the REST base URL. A trailing slash is removed.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the timeout of login and listing calls.
    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Sets the timeout of each control call.
    #[must_use]
    pub fn with_control_timeout(mut self, timeout: Duration) -> Self {
        self.control_timeout = timeout;
        self
    }

    /// Sets the reconciler poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Adds or replaces an identification header.
    #[must_use]
    pub fn with_app_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self
            .app_headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.app_headers.push((name, value)),
        }
        self
    }

    /// Sets the event bus capacity.
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Sets the realtime channel configuration.
    #[must_use]
    pub fn with_realtime(mut self, realtime: RealtimeConfig) -> Self {
        self.realtime = realtime;
        self
    }

    /// Disables the realtime channel; all control goes through REST.
    #[must_use]
    pub fn rest_only(mut self) -> Self {
        self.realtime.enabled = false;
        self
    }

    /// Returns the REST base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the login and listing timeout.
    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }

    /// Returns the control call timeout.
    #[must_use]
    pub fn control_timeout(&self) -> Duration {
        self.control_timeout
    }

    /// Returns the poll interval.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Returns the identification headers.
    #[must_use]
    pub fn app_headers(&self) -> &[(String, String)] {
        &self.app_headers
    }

    /// Returns the event bus capacity.
    #[must_use]
    pub fn event_capacity(&self) -> usize {
        self.event_capacity
    }

    /// Returns the realtime configuration.
    #[must_use]
    pub fn realtime(&self) -> &RealtimeConfig {
        &self.realtime
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration of the realtime MQTT channel.
///
/// The broker host is not configured here: it comes from the credentials
/// embedded in the login response.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    enabled: bool,
    port: u16,
    use_tls: bool,
    connect_wait: Duration,
    keep_alive: Duration,
    publish_timeout: Duration,
    client_id_prefix: String,
}

impl RealtimeConfig {
    /// Default MQTT over TLS port.
    pub const DEFAULT_PORT: u16 = 8883;
    /// Default wait for the connection acknowledgment.
    pub const DEFAULT_CONNECT_WAIT: Duration = Duration::from_secs(2);
    /// Default keep-alive interval.
    pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(30);
    /// Default publish timeout.
    pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);
    /// Default client id prefix.
    pub const DEFAULT_CLIENT_ID_PREFIX: &'static str = "bluestar";

    /// Creates the production configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            enabled: true,
            port: Self::DEFAULT_PORT,
            use_tls: true,
            connect_wait: Self::DEFAULT_CONNECT_WAIT,
            keep_alive: Self::DEFAULT_KEEP_ALIVE,
            publish_timeout: Self::DEFAULT_PUBLISH_TIMEOUT,
            client_id_prefix: Self::DEFAULT_CLIENT_ID_PREFIX.to_string(),
        }
    }

    /// Enables or disables the realtime channel.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the broker port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Enables or disables TLS.
    #[must_use]
    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    /// Sets how long `connect` waits for the acknowledgment.
    #[must_use]
    pub fn with_connect_wait(mut self, wait: Duration) -> Self {
        self.connect_wait = wait;
        self
    }

    /// Sets the keep-alive interval.
    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Sets the publish timeout.
    #[must_use]
    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    /// Sets the client id prefix.
    #[must_use]
    pub fn with_client_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.client_id_prefix = prefix.into();
        self
    }

    /// Returns whether the realtime channel is used at all.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the broker port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns whether TLS is used.
    #[must_use]
    pub fn use_tls(&self) -> bool {
        self.use_tls
    }

    /// Returns the connect wait window.
    #[must_use]
    pub fn connect_wait(&self) -> Duration {
        self.connect_wait
    }

    /// Returns the keep-alive interval.
    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        self.keep_alive
    }

    /// Returns the publish timeout.
    #[must_use]
    pub fn publish_timeout(&self) -> Duration {
        self.publish_timeout
    }

    /// Returns the client id prefix.
    #[must_use]
    pub fn client_id_prefix(&self) -> &str {
        &self.client_id_prefix
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self::new()
    }
}
