// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tiered control dispatch.

use std::sync::Arc;

use crate::error::{ControlError, Error, ValueError};
use crate::protocol::{RealtimeTransport, RestTransport};
use crate::reconciler::RefreshHandle;

use super::{ControlIntent, ControlOutcome, ControlTier};

/// Sends control intents through the first transport that accepts them.
///
/// Tiers are tried in order, stopping at the first success:
///
/// 1. realtime publish, only while the realtime channel is connected
/// 2. REST preferences control (with its state endpoint fallback)
/// 3. forced resync over realtime if connected, over HTTP otherwise
///
/// A failing tier is logged and the next one is tried. Only when every tier
/// failed is [`ControlError::Exhausted`] returned. Success means the request
/// was accepted, not that the device changed state; a reconciler refresh is
/// requested so the next snapshot reflects the outcome.
#[derive(Debug)]
pub struct ControlDispatcher<R, S> {
    realtime: Option<Arc<R>>,
    rest: Arc<S>,
    refresh: Option<RefreshHandle>,
}

impl<R: RealtimeTransport, S: RestTransport> ControlDispatcher<R, S> {
    /// Creates a dispatcher. Pass `None` for a REST-only session.
    #[must_use]
    pub fn new(realtime: Option<Arc<R>>, rest: Arc<S>) -> Self {
        Self {
            realtime,
            rest,
            refresh: None,
        }
    }

    /// Requests a reconciler refresh after each successful dispatch.
    #[must_use]
    pub fn with_refresh(mut self, refresh: RefreshHandle) -> Self {
        self.refresh = Some(refresh);
        self
    }

    fn connected_realtime(&self) -> Option<&R> {
        self.realtime.as_deref().filter(|rt| rt.is_connected())
    }

    /// Dispatches an intent.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::EmptyIntent`] for an intent without attributes,
    /// [`ValueError::InvalidMode`] for a non-integer `mode`, and
    /// [`ControlError::Exhausted`] when every tier failed.
    pub async fn dispatch(&self, intent: &ControlIntent) -> Result<ControlOutcome, Error> {
        let device_id = intent.device_id();
        let attributes = intent.attributes();

        if intent.is_empty() {
            return Err(ValueError::EmptyIntent(device_id.to_string()).into());
        }
        intent.validate()?;

        let mut failures = Vec::new();

        if let Some(realtime) = self.connected_realtime() {
            match realtime.publish_desired_state(device_id, attributes).await {
                Ok(()) => return Ok(self.succeeded(device_id, ControlTier::Realtime, failures)),
                Err(e) => {
                    tracing::warn!(device_id = %device_id, error = %e, "Realtime control failed");
                    failures.push((ControlTier::Realtime, e.to_string()));
                }
            }
        } else {
            tracing::debug!(device_id = %device_id, "Realtime unavailable, using REST");
        }

        match self.rest.send_preferences_control(device_id, attributes).await {
            Ok(()) => return Ok(self.succeeded(device_id, ControlTier::Rest, failures)),
            Err(e) => {
                tracing::warn!(device_id = %device_id, error = %e, "REST control failed");
                failures.push((ControlTier::Rest, e.to_string()));
            }
        }

        let resync = match self.connected_realtime() {
            Some(realtime) => realtime
                .publish_force_resync(device_id)
                .await
                .map_err(Error::from),
            None => self.rest.force_sync(device_id).await,
        };

        match resync {
            Ok(()) => {
                tracing::info!(device_id = %device_id, "Control not applied, forced resync sent");
                Ok(self.succeeded(device_id, ControlTier::ForcedResync, failures))
            }
            Err(e) => {
                tracing::error!(device_id = %device_id, error = %e, "All control tiers failed");
                failures.push((ControlTier::ForcedResync, e.to_string()));
                Err(ControlError::Exhausted {
                    device_id: device_id.to_string(),
                    failures,
                }
                .into())
            }
        }
    }

    /// Requests a resync without sending any change.
    ///
    /// # Errors
    ///
    /// Returns the transport failure.
    pub async fn force_sync(&self, device_id: &str) -> Result<(), Error> {
        match self.connected_realtime() {
            Some(realtime) => realtime.publish_force_resync(device_id).await?,
            None => self.rest.force_sync(device_id).await?,
        }
        if let Some(refresh) = &self.refresh {
            refresh.request_refresh();
        }
        Ok(())
    }

    fn succeeded(
        &self,
        device_id: &str,
        tier: ControlTier,
        failures: Vec<(ControlTier, String)>,
    ) -> ControlOutcome {
        tracing::debug!(device_id = %device_id, tier = %tier, "Control dispatched");
        if let Some(refresh) = &self.refresh {
            refresh.request_refresh();
        }
        ControlOutcome {
            device_id: device_id.to_string(),
            tier,
            failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NetworkError, TransportError};
    use crate::state::Device;
    use crate::types::RawState;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Records every transport call in order.
    type CallLog = Arc<Mutex<Vec<&'static str>>>;

    struct FakeRealtime {
        connected: AtomicBool,
        publish_ok: bool,
        resync_ok: bool,
        log: CallLog,
    }

    impl RealtimeTransport for FakeRealtime {
        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        async fn publish_desired_state(
            &self,
            _: &str,
            _: &RawState,
        ) -> Result<(), TransportError> {
            self.log.lock().push("realtime.publish");
            if self.publish_ok {
                Ok(())
            } else {
                Err(TransportError::Timeout(5000))
            }
        }

        async fn publish_force_resync(&self, _: &str) -> Result<(), TransportError> {
            self.log.lock().push("realtime.resync");
            if self.resync_ok {
                Ok(())
            } else {
                Err(TransportError::NotConnected)
            }
        }
    }

    struct FakeRest {
        control_ok: bool,
        sync_ok: bool,
        log: CallLog,
    }

    fn http_500(endpoint: &str) -> Error {
        NetworkError::Status {
            endpoint: endpoint.to_string(),
            status: 500,
        }
        .into()
    }

    impl RestTransport for FakeRest {
        async fn list_devices(&self) -> Result<Vec<Device>, Error> {
            Ok(Vec::new())
        }

        async fn send_preferences_control(&self, _: &str, _: &RawState) -> Result<(), Error> {
            self.log.lock().push("rest.control");
            if self.control_ok {
                Ok(())
            } else {
                Err(http_500("/things/abc/state"))
            }
        }

        async fn force_sync(&self, _: &str) -> Result<(), Error> {
            self.log.lock().push("rest.sync");
            if self.sync_ok {
                Ok(())
            } else {
                Err(http_500("/things/abc/control"))
            }
        }
    }

    struct Setup {
        realtime_connected: bool,
        publish_ok: bool,
        resync_ok: bool,
        control_ok: bool,
        sync_ok: bool,
    }

    impl Default for Setup {
        fn default() -> Self {
            Self {
                realtime_connected: true,
                publish_ok: true,
                resync_ok: true,
                control_ok: true,
                sync_ok: true,
            }
        }
    }

    fn dispatcher(setup: &Setup) -> (ControlDispatcher<FakeRealtime, FakeRest>, CallLog) {
        let log = CallLog::default();
        let realtime = FakeRealtime {
            connected: AtomicBool::new(setup.realtime_connected),
            publish_ok: setup.publish_ok,
            resync_ok: setup.resync_ok,
            log: Arc::clone(&log),
        };
        let rest = FakeRest {
            control_ok: setup.control_ok,
            sync_ok: setup.sync_ok,
            log: Arc::clone(&log),
        };
        (
            ControlDispatcher::new(Some(Arc::new(realtime)), Arc::new(rest)),
            log,
        )
    }

    fn power_off() -> ControlIntent {
        ControlIntent::new("abc").power(false)
    }

    #[tokio::test]
    async fn connected_realtime_wins() {
        let (dispatcher, log) = dispatcher(&Setup::default());

        let outcome = dispatcher.dispatch(&power_off()).await.unwrap();
        assert_eq!(outcome.tier, ControlTier::Realtime);
        assert!(outcome.applied());
        assert_eq!(*log.lock(), vec!["realtime.publish"]);
    }

    #[tokio::test]
    async fn disconnected_realtime_is_never_published() {
        let (dispatcher, log) = dispatcher(&Setup {
            realtime_connected: false,
            ..Setup::default()
        });

        let outcome = dispatcher.dispatch(&power_off()).await.unwrap();
        assert_eq!(outcome.tier, ControlTier::Rest);
        assert!(outcome.failures.is_empty());
        assert_eq!(*log.lock(), vec!["rest.control"]);
    }

    #[tokio::test]
    async fn realtime_failure_falls_back_to_rest() {
        let (dispatcher, log) = dispatcher(&Setup {
            publish_ok: false,
            ..Setup::default()
        });

        let outcome = dispatcher.dispatch(&power_off()).await.unwrap();
        assert_eq!(outcome.tier, ControlTier::Rest);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].0, ControlTier::Realtime);
        assert_eq!(*log.lock(), vec!["realtime.publish", "rest.control"]);
    }

    #[tokio::test]
    async fn rest_failure_without_realtime_uses_http_force_sync() {
        let (dispatcher, log) = dispatcher(&Setup {
            realtime_connected: false,
            control_ok: false,
            ..Setup::default()
        });

        let outcome = dispatcher.dispatch(&power_off()).await.unwrap();
        assert_eq!(outcome.tier, ControlTier::ForcedResync);
        assert!(!outcome.applied());
        assert_eq!(*log.lock(), vec!["rest.control", "rest.sync"]);
    }

    #[tokio::test]
    async fn rest_failure_with_realtime_uses_realtime_resync() {
        let (dispatcher, log) = dispatcher(&Setup {
            publish_ok: false,
            control_ok: false,
            ..Setup::default()
        });

        let outcome = dispatcher.dispatch(&power_off()).await.unwrap();
        assert_eq!(outcome.tier, ControlTier::ForcedResync);
        assert_eq!(
            *log.lock(),
            vec!["realtime.publish", "rest.control", "realtime.resync"]
        );
    }

    #[tokio::test]
    async fn all_tiers_failing_is_exhausted() {
        let (dispatcher, log) = dispatcher(&Setup {
            realtime_connected: false,
            control_ok: false,
            sync_ok: false,
            ..Setup::default()
        });

        let err = dispatcher.dispatch(&power_off()).await.unwrap_err();
        let Error::Control(ControlError::Exhausted {
            device_id,
            failures,
        }) = err
        else {
            panic!("expected exhausted control error");
        };
        assert_eq!(device_id, "abc");
        let tiers: Vec<ControlTier> = failures.iter().map(|(tier, _)| *tier).collect();
        assert_eq!(tiers, vec![ControlTier::Rest, ControlTier::ForcedResync]);
        assert_eq!(*log.lock(), vec!["rest.control", "rest.sync"]);
    }

    #[tokio::test]
    async fn empty_intent_rejected_before_any_call() {
        let (dispatcher, log) = dispatcher(&Setup::default());

        let err = dispatcher
            .dispatch(&ControlIntent::new("abc"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Value(ValueError::EmptyIntent(_))));
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn non_integer_mode_rejected_before_any_call() {
        let (dispatcher, log) = dispatcher(&Setup::default());
        let intent = ControlIntent::new("abc").attribute("mode", "3.5");

        let err = dispatcher.dispatch(&intent).await.unwrap_err();
        assert!(matches!(err, Error::Value(ValueError::InvalidMode(m)) if m == "3.5"));
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn rest_only_dispatcher() {
        let log = CallLog::default();
        let rest = FakeRest {
            control_ok: true,
            sync_ok: true,
            log: Arc::clone(&log),
        };
        let dispatcher: ControlDispatcher<FakeRealtime, FakeRest> =
            ControlDispatcher::new(None, Arc::new(rest));

        let outcome = dispatcher.dispatch(&power_off()).await.unwrap();
        assert_eq!(outcome.tier, ControlTier::Rest);
    }

    #[tokio::test]
    async fn force_sync_prefers_realtime() {
        let (dispatcher, log) = dispatcher(&Setup::default());
        dispatcher.force_sync("abc").await.unwrap();
        assert_eq!(*log.lock(), vec!["realtime.resync"]);
    }
}
