// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Realtime MQTT transport.
//!
//! The connection is driven by one background task that polls the `rumqttc`
//! event loop. Connection changes and pushed state documents are forwarded
//! as [`RealtimeEvent`]s on an mpsc channel so that a single consumer
//! handles them.
//!
//! # Examples
//!
//! ```no_run
//! use bluestar_lib::config::RealtimeConfig;
//! use bluestar_lib::protocol::{RealtimeClient, RealtimeTransport};
//! use bluestar_lib::session::TransportDescriptor;
//!
//! # async fn example(descriptor: TransportDescriptor) -> bluestar_lib::Result<()> {
//! let (client, mut events) = RealtimeClient::connect(&descriptor, &RealtimeConfig::new()).await?;
//!
//! if client.is_connected() {
//!     client.subscribe_device("24587ca091f8").await?;
//! }
//!
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS, Transport};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::RealtimeConfig;
use crate::error::TransportError;
use crate::protocol::{
    RealtimeTransport, control_topic, desired_state_envelope, device_id_from_topic,
    force_fetch_payload, state_accepted_topic, state_update_topic,
};
use crate::session::TransportDescriptor;
use crate::types::RawState;

/// Capacity of the request channel between the client and the event loop.
const REQUEST_CAPACITY: usize = 16;
/// Capacity of the realtime event channel.
const EVENT_CAPACITY: usize = 64;
/// Delay before polling again after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);
/// Time allowed for the DISCONNECT packet to leave on shutdown.
const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

/// Something that happened on the realtime channel.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    /// The broker acknowledged the connection.
    Connected,
    /// The connection was lost.
    Disconnected,
    /// A device state document was pushed by the broker.
    StateReported {
        /// The reporting device.
        device_id: String,
        /// Attributes carried by the document.
        attributes: RawState,
    },
}

/// Connection to the vendor's MQTT broker.
///
/// Cheaply cloneable; all clones share the same connection.
#[derive(Clone)]
pub struct RealtimeClient {
    inner: Arc<RealtimeInner>,
}

struct RealtimeInner {
    client: AsyncClient,
    client_id: String,
    endpoint: String,
    config: RealtimeConfig,
    connected: AtomicBool,
    subscriptions: Mutex<BTreeSet<String>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RealtimeClient {
    /// Connects to the broker named by the descriptor.
    ///
    /// Waits up to [`RealtimeConfig::connect_wait`] for the acknowledgment.
    /// When the broker does not answer in time the client is still returned,
    /// disconnected, and keeps trying in the background.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionFailed`] if the descriptor has no
    /// endpoint.
    pub async fn connect(
        descriptor: &TransportDescriptor,
        config: &RealtimeConfig,
    ) -> Result<(Self, mpsc::Receiver<RealtimeEvent>), TransportError> {
        if descriptor.endpoint().is_empty() {
            return Err(TransportError::ConnectionFailed(
                "broker endpoint is required".to_string(),
            ));
        }

        let client_id = format!(
            "{}_{}",
            config.client_id_prefix(),
            uuid::Uuid::new_v4().simple()
        );

        let mut options = MqttOptions::new(&client_id, descriptor.endpoint(), config.port());
        options.set_keep_alive(config.keep_alive());
        options.set_clean_session(true);
        options.set_credentials(descriptor.access_key(), descriptor.session_id());
        if config.use_tls() {
            options.set_transport(Transport::tls_with_default_config());
        }

        let (client, event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);

        let inner = Arc::new(RealtimeInner {
            client,
            client_id,
            endpoint: descriptor.endpoint().to_string(),
            config: config.clone(),
            connected: AtomicBool::new(false),
            subscriptions: Mutex::new(BTreeSet::new()),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        });

        let (event_tx, event_rx) = mpsc::channel(EVENT_CAPACITY);
        let (connack_tx, connack_rx) = oneshot::channel();

        tracing::debug!(
            endpoint = %inner.endpoint,
            port = config.port(),
            client_id = %inner.client_id,
            access_key = %descriptor.access_key_hint(),
            "Connecting to realtime broker"
        );

        let task = tokio::spawn(handle_realtime_events(
            event_loop,
            Arc::clone(&inner),
            event_tx,
            connack_tx,
        ));
        *inner.task.lock() = Some(task);

        match tokio::time::timeout(config.connect_wait(), connack_rx).await {
            Ok(Ok(())) => {
                tracing::info!(endpoint = %inner.endpoint, "Connected to realtime broker");
            }
            Ok(Err(_)) | Err(_) => {
                tracing::warn!(
                    endpoint = %inner.endpoint,
                    wait_ms = duration_ms(config.connect_wait()),
                    "Realtime connection not acknowledged, using REST fallback"
                );
            }
        }

        Ok((Self { inner }, event_rx))
    }

    /// Returns the MQTT client identifier.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.inner.client_id
    }

    /// Returns the broker host.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    /// Subscribes to the pushed state documents of a device.
    ///
    /// The subscription is remembered and restored after a reconnect. While
    /// disconnected it is only recorded.
    ///
    /// # Errors
    ///
    /// Returns error if the subscribe request cannot be queued in time.
    pub async fn subscribe_device(&self, device_id: &str) -> Result<(), TransportError> {
        if !self.inner.subscriptions.lock().insert(device_id.to_string()) {
            return Ok(());
        }
        if !self.is_connected() {
            tracing::debug!(device_id = %device_id, "Subscription deferred until connected");
            return Ok(());
        }

        let topic = state_accepted_topic(device_id);
        let request = self.inner.client.subscribe(&topic, QoS::AtMostOnce);
        match tokio::time::timeout(self.inner.config.publish_timeout(), request).await {
            Ok(Ok(())) => {
                tracing::debug!(topic = %topic, "Subscribed to device state");
                Ok(())
            }
            Ok(Err(e)) => {
                self.inner.subscriptions.lock().remove(device_id);
                Err(TransportError::Mqtt(e))
            }
            Err(_) => {
                self.inner.subscriptions.lock().remove(device_id);
                Err(TransportError::Timeout(duration_ms(
                    self.inner.config.publish_timeout(),
                )))
            }
        }
    }

    /// Returns the devices with an active subscription.
    #[must_use]
    pub fn subscribed_devices(&self) -> Vec<String> {
        self.inner.subscriptions.lock().iter().cloned().collect()
    }

    /// Stops the background task and closes the connection.
    ///
    /// Safe to call when not connected; later calls have no effect.
    pub async fn disconnect(&self) {
        if self.inner.cancel.is_cancelled() {
            return;
        }

        tracing::info!(endpoint = %self.inner.endpoint, "Disconnecting from realtime broker");

        self.inner.cancel.cancel();
        let task = self.inner.task.lock().take();
        if let Some(task) = task
            && tokio::time::timeout(DISCONNECT_GRACE * 2, task).await.is_err()
        {
            tracing::warn!("Realtime event task did not stop in time");
        }

        self.inner.connected.store(false, Ordering::Release);
        self.inner.subscriptions.lock().clear();
    }

    /// Signals the background task to stop without waiting for it.
    ///
    /// Used where awaiting is not possible, such as in `Drop`.
    pub fn stop_background(&self) {
        self.inner.cancel.cancel();
    }

    async fn publish(&self, topic: String, payload: &Value) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        let bytes = payload.to_string().into_bytes();
        tracing::debug!(topic = %topic, payload = %payload, "Publishing realtime message");

        let timeout = self.inner.config.publish_timeout();
        let request = self
            .inner
            .client
            .publish(topic, QoS::AtMostOnce, false, bytes);

        match tokio::time::timeout(timeout, request).await {
            Ok(result) => result.map_err(TransportError::Mqtt),
            Err(_) => Err(TransportError::Timeout(duration_ms(timeout))),
        }
    }
}

impl RealtimeTransport for RealtimeClient {
    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    async fn publish_desired_state(
        &self,
        device_id: &str,
        attributes: &RawState,
    ) -> Result<(), TransportError> {
        self.publish(
            state_update_topic(device_id),
            &desired_state_envelope(attributes),
        )
        .await
    }

    async fn publish_force_resync(&self, device_id: &str) -> Result<(), TransportError> {
        self.publish(control_topic(device_id), &force_fetch_payload())
            .await
    }
}

impl std::fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("endpoint", &self.inner.endpoint)
            .field("client_id", &self.inner.client_id)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

/// Drives the MQTT event loop until cancelled.
async fn handle_realtime_events(
    mut event_loop: EventLoop,
    inner: Arc<RealtimeInner>,
    events: mpsc::Sender<RealtimeEvent>,
    connack_tx: oneshot::Sender<()>,
) {
    let mut connack_tx = Some(connack_tx);

    loop {
        let polled = tokio::select! {
            biased;
            () = inner.cancel.cancelled() => {
                shutdown(&mut event_loop, &inner).await;
                break;
            }
            polled = event_loop.poll() => polled,
        };

        match polled {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                tracing::debug!(?connack, "Realtime broker connected");
                inner.connected.store(true, Ordering::Release);
                if let Some(tx) = connack_tx.take() {
                    let _ = tx.send(());
                }
                resubscribe(&inner);
                let _ = events.send(RealtimeEvent::Connected).await;
            }
            Ok(Event::Incoming(Packet::SubAck(suback))) => {
                tracing::debug!(?suback, "Realtime subscription acknowledged");
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let Some(event) = parse_state_report(&publish.topic, &publish.payload) else {
                    tracing::debug!(topic = %publish.topic, "Ignoring realtime message");
                    continue;
                };
                let _ = events.send(event).await;
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                tracing::info!("Realtime broker closed the connection");
                mark_disconnected(&inner, &events).await;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Realtime event loop error");
                mark_disconnected(&inner, &events).await;

                tokio::select! {
                    () = inner.cancel.cancelled() => break,
                    () = tokio::time::sleep(RECONNECT_DELAY) => {}
                }
            }
        }
    }

    tracing::debug!("Realtime event task stopped");
}

async fn mark_disconnected(inner: &RealtimeInner, events: &mpsc::Sender<RealtimeEvent>) {
    if inner.connected.swap(false, Ordering::AcqRel) {
        let _ = events.send(RealtimeEvent::Disconnected).await;
    }
}

/// Restores subscriptions after a clean-session reconnect.
fn resubscribe(inner: &RealtimeInner) {
    for device_id in inner.subscriptions.lock().iter() {
        let topic = state_accepted_topic(device_id);
        if let Err(e) = inner.client.try_subscribe(&topic, QoS::AtMostOnce) {
            tracing::warn!(topic = %topic, error = %e, "Failed to restore subscription");
        }
    }
}

/// Lets a DISCONNECT packet reach the broker before the loop is dropped.
async fn shutdown(event_loop: &mut EventLoop, inner: &RealtimeInner) {
    if !inner.connected.load(Ordering::Acquire) || inner.client.try_disconnect().is_err() {
        return;
    }

    let flush = async {
        loop {
            match event_loop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    };
    let _ = tokio::time::timeout(DISCONNECT_GRACE, flush).await;
}

/// Extracts the attributes of a shadow document.
///
/// Reported state wins over desired state; a document whose `state` is a
/// flat attribute map is accepted as is.
fn parse_state_report(topic: &str, payload: &[u8]) -> Option<RealtimeEvent> {
    let device_id = device_id_from_topic(topic)?;
    let document: Value = serde_json::from_slice(payload).ok()?;
    let state = document.get("state")?.as_object()?;

    let attributes = match (state.get("reported"), state.get("desired")) {
        (Some(Value::Object(reported)), _) => reported.clone(),
        (_, Some(Value::Object(desired))) => desired.clone(),
        (None, None) => state.clone(),
        _ => return None,
    };

    Some(RealtimeEvent::StateReported {
        device_id: device_id.to_string(),
        attributes,
    })
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bytes(value: &Value) -> Vec<u8> {
        value.to_string().into_bytes()
    }

    #[test]
    fn reported_state_is_extracted() {
        let event = parse_state_report(
            "$aws/things/abc/shadow/update/accepted",
            &bytes(&json!({"state": {"reported": {"pow": 1, "stemp": "23"}}})),
        )
        .unwrap();

        let RealtimeEvent::StateReported {
            device_id,
            attributes,
        } = event
        else {
            panic!("expected state report");
        };
        assert_eq!(device_id, "abc");
        assert_eq!(attributes.get("stemp"), Some(&json!("23")));
    }

    #[test]
    fn desired_state_used_without_reported() {
        let event = parse_state_report(
            "$aws/things/abc/shadow/update/accepted",
            &bytes(&json!({"state": {"desired": {"pow": 0, "src": "anmq"}}})),
        )
        .unwrap();

        assert!(matches!(
            event,
            RealtimeEvent::StateReported { ref attributes, .. } if attributes.get("pow") == Some(&json!(0))
        ));
    }

    #[test]
    fn flat_state_accepted() {
        let event = parse_state_report(
            "$aws/things/abc/shadow/update",
            &bytes(&json!({"state": {"mode": 3}})),
        );
        assert!(event.is_some());
    }

    #[test]
    fn foreign_topics_and_bad_payloads_ignored() {
        assert!(parse_state_report("things/abc/control", &bytes(&json!({"fpsh": 1}))).is_none());
        assert!(parse_state_report("$aws/things/abc/shadow/update/accepted", b"not json").is_none());
        assert!(
            parse_state_report(
                "$aws/things/abc/shadow/update/accepted",
                &bytes(&json!({"state": {"reported": 5}}))
            )
            .is_none()
        );
    }

    #[test]
    fn duration_ms_converts() {
        assert_eq!(duration_ms(Duration::from_secs(2)), 2000);
    }
}
