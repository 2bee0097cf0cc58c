// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client facade for Home Assistant style adapters.
//!
//! [`BluestarClient`] owns the session, both transports, the reconciler and
//! the background tasks. Adapters read devices from the published snapshot,
//! send [`ControlIntent`]s and register realtime callbacks; everything else
//! happens in the background until [`BluestarClient::close`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use secrecy::SecretString;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::control::{ControlDispatcher, ControlIntent, ControlOutcome};
use crate::error::{Error, NetworkError};
use crate::event::{DeviceEvent, EventBus};
use crate::protocol::{RealtimeClient, RealtimeEvent, RealtimeTransport, RestClient};
use crate::reconciler::{Reconciler, RefreshHandle};
use crate::session::Session;
use crate::state::{Device, DeviceSnapshot, Snapshot};
use crate::subscription::{CallbackRegistry, RealtimeUpdate, SubscriptionId};
use crate::types::RawState;

/// Time allowed for background tasks to stop on close.
const TASK_STOP_GRACE: Duration = Duration::from_secs(2);

/// Connected Blue Star cloud client.
///
/// # Examples
///
/// ```no_run
/// use bluestar_lib::{BluestarClient, ClientConfig, ControlIntent};
/// use bluestar_lib::types::AcMode;
///
/// #[tokio::main]
/// async fn main() -> bluestar_lib::Result<()> {
///     let client = BluestarClient::connect(ClientConfig::new(), "9876543210", "secret").await?;
///
///     for device in client.list_devices()? {
///         println!("{} ({})", device.name, device.id);
///     }
///
///     let intent = ControlIntent::new("24587ca091f8")
///         .power(true)
///         .mode(AcMode::Cool)
///         .target_temperature(24.0)?;
///     let outcome = client.send_control(&intent).await?;
///     println!("delivered via {}", outcome.tier);
///
///     client.close().await;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct BluestarClient {
    session: Arc<Session>,
    realtime: Option<RealtimeClient>,
    reconciler: Arc<Reconciler<RestClient>>,
    dispatcher: ControlDispatcher<RealtimeClient, RestClient>,
    callbacks: Arc<CallbackRegistry>,
    events: EventBus,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl BluestarClient {
    /// Logs in and starts the client.
    ///
    /// Realtime problems only degrade the client to REST-only operation. The
    /// initial device listing must succeed.
    ///
    /// # Errors
    ///
    /// Returns the login error or the initial listing error. Use
    /// [`Error::is_retryable`] to tell network trouble from bad credentials.
    pub async fn connect(
        config: ClientConfig,
        phone: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.http_timeout())
            .build()
            .map_err(NetworkError::Http)?;

        let password = SecretString::from(password.into());
        let session = Arc::new(Session::login(&http, &config, phone, password).await?);

        let (realtime, realtime_rx) = match session.descriptor() {
            Some(descriptor) if config.realtime().enabled() => {
                match RealtimeClient::connect(descriptor, config.realtime()).await {
                    Ok((client, rx)) => (Some(client), Some(rx)),
                    Err(e) => {
                        tracing::warn!(error = %e, "Realtime unavailable, using REST only");
                        (None, None)
                    }
                }
            }
            Some(_) => {
                tracing::info!("Realtime disabled by configuration");
                (None, None)
            }
            None => (None, None),
        };

        let rest = Arc::new(RestClient::new(http, &config, Arc::clone(&session)));
        let events = EventBus::with_capacity(config.event_capacity());
        let reconciler = Arc::new(Reconciler::new(Arc::clone(&rest), events.clone()));

        let snapshot = match reconciler.refresh_now().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                if let Some(realtime) = &realtime {
                    realtime.disconnect().await;
                }
                session.close();
                return Err(e);
            }
        };

        if let Some(realtime) = &realtime {
            for device_id in snapshot.device_ids() {
                if let Err(e) = realtime.subscribe_device(&device_id).await {
                    tracing::warn!(device_id = %device_id, error = %e, "Failed to subscribe to device");
                }
            }
        }

        let dispatcher = ControlDispatcher::new(realtime.clone().map(Arc::new), rest)
            .with_refresh(reconciler.refresh_handle());
        let callbacks = Arc::new(CallbackRegistry::new());
        let cancel = CancellationToken::new();

        let poll_task = reconciler.spawn(config.poll_interval(), cancel.child_token());
        let consumer = EventConsumer {
            realtime: realtime.clone(),
            reconciler: Arc::clone(&reconciler),
            refresh: reconciler.refresh_handle(),
            callbacks: Arc::clone(&callbacks),
            events: events.clone(),
        };
        let consumer_task = tokio::spawn(consumer.run(realtime_rx, events.subscribe(), cancel.child_token()));

        tracing::info!(
            devices = snapshot.len(),
            realtime = realtime.is_some(),
            "Blue Star client started"
        );

        Ok(Self {
            session,
            realtime,
            reconciler,
            dispatcher,
            callbacks,
            events,
            cancel,
            tasks: Mutex::new(vec![poll_task, consumer_task]),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        Ok(())
    }

    // =========================================================================
    // Devices
    // =========================================================================

    /// Returns the devices of the current snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] after [`close`](Self::close).
    pub fn list_devices(&self) -> Result<Vec<Device>, Error> {
        self.ensure_open()?;
        Ok(self.reconciler.snapshot().devices())
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.reconciler.snapshot()
    }

    /// Returns one device of the current snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceNotFound`] if the device is not in the snapshot
    /// and [`Error::Closed`] after [`close`](Self::close).
    pub fn get_snapshot(&self, device_id: &str) -> Result<DeviceSnapshot, Error> {
        self.ensure_open()?;
        self.reconciler
            .snapshot()
            .get(device_id)
            .cloned()
            .ok_or_else(|| Error::DeviceNotFound(device_id.to_string()))
    }

    /// Returns a receiver notified on every snapshot replacement.
    #[must_use]
    pub fn watch_snapshot(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.reconciler.watch()
    }

    /// Polls the device list now and returns the new snapshot.
    ///
    /// # Errors
    ///
    /// Returns the listing error; the previous snapshot stays published.
    pub async fn refresh_now(&self) -> Result<Arc<Snapshot>, Error> {
        self.ensure_open()?;
        self.reconciler.refresh_now().await
    }

    // =========================================================================
    // Control
    // =========================================================================

    /// Sends a control intent through the fallback chain.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::EmptyIntent`](crate::error::ValueError::EmptyIntent)
    /// for an empty intent and
    /// [`ControlError::Exhausted`](crate::error::ControlError::Exhausted) when
    /// every tier failed.
    pub async fn send_control(&self, intent: &ControlIntent) -> Result<ControlOutcome, Error> {
        self.ensure_open()?;
        self.dispatcher.dispatch(intent).await
    }

    /// Sends raw attributes to a device.
    ///
    /// # Errors
    ///
    /// See [`send_control`](Self::send_control).
    pub async fn send_control_attributes(
        &self,
        device_id: &str,
        attributes: RawState,
    ) -> Result<ControlOutcome, Error> {
        self.send_control(&ControlIntent::from_attributes(device_id, attributes))
            .await
    }

    /// Asks a device to report its state again.
    ///
    /// # Errors
    ///
    /// Returns the transport failure.
    pub async fn force_sync(&self, device_id: &str) -> Result<(), Error> {
        self.ensure_open()?;
        self.dispatcher.force_sync(device_id).await
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Registers a callback for realtime state reports.
    ///
    /// Callbacks run on the client's event task and should return quickly.
    pub fn on_realtime_update<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&RealtimeUpdate) + Send + Sync + 'static,
    {
        self.callbacks.on_realtime_update(callback)
    }

    /// Removes a realtime callback. Returns `true` if it existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.callbacks.unsubscribe(id)
    }

    /// Subscribes to device and connection events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.events.subscribe()
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Returns `true` while the realtime channel is connected.
    #[must_use]
    pub fn is_realtime_connected(&self) -> bool {
        self.realtime
            .as_ref()
            .is_some_and(|realtime| realtime.is_connected())
    }

    /// Returns the login session.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Returns `true` after [`close`](Self::close).
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stops the background tasks, disconnects realtime and ends the session.
    ///
    /// REST calls already in flight finish or time out on their own. Calling
    /// `close` again has no effect.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        tracing::info!("Closing Blue Star client");

        self.cancel.cancel();
        if let Some(realtime) = &self.realtime {
            realtime.disconnect().await;
        }

        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if tokio::time::timeout(TASK_STOP_GRACE, task).await.is_err() {
                tracing::warn!("Background task did not stop in time");
            }
        }

        self.callbacks.clear();
        self.session.close();
    }
}

impl Drop for BluestarClient {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(realtime) = &self.realtime {
            realtime.stop_background();
        }
    }
}

/// Handles realtime events and newly discovered devices.
struct EventConsumer {
    realtime: Option<RealtimeClient>,
    reconciler: Arc<Reconciler<RestClient>>,
    refresh: RefreshHandle,
    callbacks: Arc<CallbackRegistry>,
    events: EventBus,
}

impl EventConsumer {
    async fn run(
        self,
        mut realtime_rx: Option<mpsc::Receiver<RealtimeEvent>>,
        mut device_events: broadcast::Receiver<DeviceEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                event = next_realtime_event(&mut realtime_rx) => match event {
                    Some(event) => self.handle_realtime(event),
                    None => realtime_rx = None,
                },
                event = device_events.recv() => match event {
                    Ok(DeviceEvent::DeviceAdded { device_id, .. }) => {
                        self.subscribe_device(&device_id).await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Device events lagged, resubscribing all devices");
                        for device_id in self.reconciler.snapshot().device_ids() {
                            self.subscribe_device(&device_id).await;
                        }
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        tracing::debug!("Event consumer stopped");
    }

    fn handle_realtime(&self, event: RealtimeEvent) {
        match event {
            RealtimeEvent::Connected => {
                self.events
                    .publish(DeviceEvent::RealtimeConnectionChanged { connected: true });
            }
            RealtimeEvent::Disconnected => {
                self.events
                    .publish(DeviceEvent::RealtimeConnectionChanged { connected: false });
            }
            RealtimeEvent::StateReported {
                device_id,
                attributes,
            } => {
                tracing::debug!(device_id = %device_id, attributes = attributes.len(), "Realtime state report");
                let update =
                    RealtimeUpdate::from_report(&self.reconciler.snapshot(), device_id, attributes);
                self.callbacks.dispatch(&update);
                self.refresh.request_refresh();
            }
        }
    }

    async fn subscribe_device(&self, device_id: &str) {
        let Some(realtime) = &self.realtime else {
            return;
        };
        if let Err(e) = realtime.subscribe_device(device_id).await {
            tracing::warn!(device_id = %device_id, error = %e, "Failed to subscribe to device");
        }
    }
}

/// Waits for the next realtime event; pends forever without a channel.
async fn next_realtime_event(
    rx: &mut Option<mpsc::Receiver<RealtimeEvent>>,
) -> Option<RealtimeEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
