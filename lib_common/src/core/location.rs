//! # Location Coordinator
//!
//! Handles the server's `request_location` event: one bounded high-accuracy
//! position fix, persisted on success, with the outcome reported both
//! upstream (`location_response` with coordinates or null) and to local
//! subscribers (granted/denied). Each request is a fresh negotiation; there
//! is no automatic retry.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::time::timeout;

use crate::core::dispatcher::EventBus;
use crate::core::model::{GeoCoordinate, LocationOutcome};
use crate::ingestors::search_wss::EmitHandle;
use crate::loggers::sink::{Diag, DiagnosticSink};
use crate::storage::local_store::{DeviceStore, USER_LOCATION_KEY};

#[derive(Debug, Error)]
pub enum PositionError {
    #[error("position permission denied")]
    PermissionDenied,
    #[error("position unavailable: {0}")]
    Unavailable(String),
}

/// # Position Provider
///
/// Seam for the host device's positioning capability: a single-shot
/// "current position" fix. Implementations should request the most accurate
/// fix the device offers; the coordinator bounds the wait. Environments
/// without positioning pass no provider to the coordinator at all.
pub trait PositionProvider: Send + Sync {
    fn current_position(&self) -> BoxFuture<'_, Result<GeoCoordinate, PositionError>>;
}

/// Provider backed by fixed coordinates, for configured deployments and tests.
pub struct FixedPositionProvider {
    coords: GeoCoordinate,
}

impl FixedPositionProvider {
    pub fn new(coords: GeoCoordinate) -> Self {
        Self { coords }
    }
}

impl PositionProvider for FixedPositionProvider {
    fn current_position(&self) -> BoxFuture<'_, Result<GeoCoordinate, PositionError>> {
        Box::pin(async move { Ok(self.coords) })
    }
}

/// # Location Coordinator
///
/// Owns the permission negotiation triggered by an inbound location request.
/// Never invoked directly by callers; the channel's event loop spawns it so
/// an in-flight fix does not stall inbound event processing.
pub struct LocationCoordinator {
    provider: Option<Arc<dyn PositionProvider>>,
    store: Arc<DeviceStore>,
    fix_timeout: Duration,
    diag: Diag,
}

impl LocationCoordinator {
    pub fn new(
        provider: Option<Arc<dyn PositionProvider>>,
        store: Arc<DeviceStore>,
        fix_timeout: Duration,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            provider,
            store,
            fix_timeout,
            diag: Diag::new("location", sink),
        }
    }

    /// Resolves one location request. Every path terminates with an upstream
    /// `location_response` and a local outcome; a request is never left
    /// pending.
    pub async fn handle_request(&self, emitter: &EmitHandle, bus: &EventBus) {
        let Some(provider) = &self.provider else {
            self.diag.warn("positioning capability unavailable", None);
            self.deny(emitter, bus);
            return;
        };

        match timeout(self.fix_timeout, provider.current_position()).await {
            Ok(Ok(coords)) => {
                if let Err(e) = self.store.put(USER_LOCATION_KEY, &coords) {
                    // The fix is still usable upstream even if persistence failed.
                    self.diag.warn(
                        "failed to persist location",
                        Some(json!({"error": e.to_string()})),
                    );
                }
                emitter.emit(
                    "location_response",
                    json!({"lat": coords.lat, "lon": coords.lon}),
                );
                bus.location().publish(&LocationOutcome::Granted);
            }
            Ok(Err(e)) => {
                self.diag
                    .warn("position fix failed", Some(json!({"error": e.to_string()})));
                self.deny(emitter, bus);
            }
            Err(_) => {
                self.diag.warn(
                    "position fix timed out",
                    Some(json!({"timeout_ms": self.fix_timeout.as_millis() as u64})),
                );
                self.deny(emitter, bus);
            }
        }
    }

    fn deny(&self, emitter: &EmitHandle, bus: &EventBus) {
        emitter.emit("location_response", Value::Null);
        bus.location().publish(&LocationOutcome::Denied);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::WireFrame;
    use crate::loggers::diagrecord::DiagLevel;
    use crate::loggers::sink::MemorySink;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tempfile::tempdir;
    use tokio::sync::mpsc;

    struct FailingProvider;
    impl PositionProvider for FailingProvider {
        fn current_position(&self) -> BoxFuture<'_, Result<GeoCoordinate, PositionError>> {
            Box::pin(async { Err(PositionError::PermissionDenied) })
        }
    }

    struct HangingProvider;
    impl PositionProvider for HangingProvider {
        fn current_position(&self) -> BoxFuture<'_, Result<GeoCoordinate, PositionError>> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(PositionError::Unavailable("never".into()))
            })
        }
    }

    struct Fixture {
        coordinator: LocationCoordinator,
        emitter: EmitHandle,
        outbound_rx: mpsc::UnboundedReceiver<WireFrame>,
        bus: EventBus,
        outcomes: Arc<Mutex<Vec<LocationOutcome>>>,
        store: Arc<DeviceStore>,
        sink: Arc<MemorySink>,
        _handle: crate::core::dispatcher::SubscriptionHandle,
        _dir: tempfile::TempDir,
    }

    fn fixture(provider: Option<Arc<dyn PositionProvider>>, fix_timeout: Duration) -> Fixture {
        let dir = tempdir().expect("tempdir");
        let store = Arc::new(DeviceStore::open(dir.path().join("device_store.json")));
        let sink = Arc::new(MemorySink::new());
        let sink_dyn: Arc<dyn DiagnosticSink> = Arc::clone(&sink) as Arc<dyn DiagnosticSink>;

        let (tx, outbound_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(true));
        let emitter = EmitHandle::new(tx, connected, Arc::clone(&sink_dyn));

        let bus = EventBus::new(Arc::clone(&sink_dyn));
        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&outcomes);
        let handle = bus.on_location_outcome(move |outcome| seen.lock().unwrap().push(*outcome));

        let coordinator =
            LocationCoordinator::new(provider, Arc::clone(&store), fix_timeout, sink_dyn);

        Fixture {
            coordinator,
            emitter,
            outbound_rx,
            bus,
            outcomes,
            store,
            sink,
            _handle: handle,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn no_capability_reports_null_and_denied() {
        let mut f = fixture(None, Duration::from_secs(10));
        f.coordinator.handle_request(&f.emitter, &f.bus).await;

        let frame = f.outbound_rx.try_recv().expect("upstream response");
        assert_eq!(frame.event, "location_response");
        assert!(frame.data.is_null());
        assert_eq!(*f.outcomes.lock().unwrap(), vec![LocationOutcome::Denied]);
        assert!(f.sink.contains(DiagLevel::Warn, "unavailable"));
    }

    #[tokio::test]
    async fn successful_fix_persists_and_reports_granted() {
        let coords = GeoCoordinate { lat: 30.05, lon: 31.23 };
        let provider: Arc<dyn PositionProvider> = Arc::new(FixedPositionProvider::new(coords));
        let mut f = fixture(Some(provider), Duration::from_secs(10));

        f.coordinator.handle_request(&f.emitter, &f.bus).await;

        let frame = f.outbound_rx.try_recv().expect("upstream response");
        assert_eq!(frame.event, "location_response");
        assert_eq!(frame.data, json!({"lat": 30.05, "lon": 31.23}));
        assert_eq!(*f.outcomes.lock().unwrap(), vec![LocationOutcome::Granted]);
        assert_eq!(f.store.get_json::<GeoCoordinate>(USER_LOCATION_KEY), Some(coords));
    }

    #[tokio::test]
    async fn provider_failure_reports_null_and_denied() {
        let provider: Arc<dyn PositionProvider> = Arc::new(FailingProvider);
        let mut f = fixture(Some(provider), Duration::from_secs(10));

        f.coordinator.handle_request(&f.emitter, &f.bus).await;

        let frame = f.outbound_rx.try_recv().expect("upstream response");
        assert!(frame.data.is_null());
        assert_eq!(*f.outcomes.lock().unwrap(), vec![LocationOutcome::Denied]);
        assert!(f.store.get(USER_LOCATION_KEY).is_none());
    }

    #[tokio::test]
    async fn bounded_wait_times_out_to_denied() {
        let provider: Arc<dyn PositionProvider> = Arc::new(HangingProvider);
        let mut f = fixture(Some(provider), Duration::from_millis(20));

        f.coordinator.handle_request(&f.emitter, &f.bus).await;

        let frame = f.outbound_rx.try_recv().expect("upstream response");
        assert!(frame.data.is_null());
        assert_eq!(*f.outcomes.lock().unwrap(), vec![LocationOutcome::Denied]);
        assert!(f.sink.contains(DiagLevel::Warn, "timed out"));
    }
}
