//! # Search Stream Client
//!
//! The persistent full-duplex channel to the backend search/AI service.
//! Owns the WebSocket for its whole lifetime: endpoint is resolved once at
//! construction, reconnection runs with jittered exponential backoff, and
//! every inbound frame passes a generic diagnostic trace before
//! category-specific handling. Inbound frames are processed strictly in
//! delivery order; only the device position fix runs concurrently.
//!
//! Constructed explicitly by the composition root and passed by reference;
//! there is no hidden global instance.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as WsMessage};

use crate::configs::config_sys::StreamConfig;
use crate::core::composer::compose_user_message;
use crate::core::dispatcher::EventBus;
use crate::core::location::{LocationCoordinator, PositionProvider};
use crate::core::model::WireFrame;
use crate::core::normalizer;
use crate::loggers::sink::{Diag, DiagnosticSink};
use crate::storage::local_store::DeviceStore;

// Monotonic id per connection attempt, for correlating lifecycle logs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// # Emit Handle
///
/// Cloneable sender half of the persistent channel. Any task may emit at any
/// time; writes are serialized by the client's single writer loop. While the
/// channel is down, outbound events are dropped (and logged) rather than
/// queued; there is no outbound buffer.
#[derive(Clone)]
pub struct EmitHandle {
    tx: mpsc::UnboundedSender<WireFrame>,
    connected: Arc<AtomicBool>,
    diag: Diag,
}

impl EmitHandle {
    pub fn new(
        tx: mpsc::UnboundedSender<WireFrame>,
        connected: Arc<AtomicBool>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            tx,
            connected,
            diag: Diag::new("search_wss", sink),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Sends `{event, data}` upstream. Fire-and-forget.
    pub fn emit(&self, event: &str, data: Value) {
        if !self.is_connected() {
            self.diag.warn(
                "channel down, dropping outbound event",
                Some(json!({ "event": event })),
            );
            return;
        }
        let frame = WireFrame {
            event: event.to_string(),
            data,
        };
        if self.tx.send(frame).is_err() {
            self.diag.warn(
                "writer task gone, dropping outbound event",
                Some(json!({ "event": event })),
            );
        }
    }
}

/// # Search Stream Client
///
/// One instance per process, owned by the composition root. `run` drives the
/// connection until shutdown; everything else is wiring around the fan-out
/// bus and the outbound channel.
pub struct SearchStreamClient {
    config: StreamConfig,
    bus: Arc<EventBus>,
    store: Arc<DeviceStore>,
    coordinator: Arc<LocationCoordinator>,
    outbound_tx: mpsc::UnboundedSender<WireFrame>,
    outbound_rx: Mutex<Option<mpsc::UnboundedReceiver<WireFrame>>>,
    connected: Arc<AtomicBool>,
    diag: Diag,
}

impl SearchStreamClient {
    pub fn new(
        config: StreamConfig,
        bus: Arc<EventBus>,
        store: Arc<DeviceStore>,
        provider: Option<Arc<dyn PositionProvider>>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let coordinator = Arc::new(LocationCoordinator::new(
            provider,
            Arc::clone(&store),
            config.location_fix_timeout,
            Arc::clone(&sink),
        ));
        Self {
            config,
            bus,
            store,
            coordinator,
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            connected: Arc::new(AtomicBool::new(false)),
            diag: Diag::new("search_wss", sink),
        }
    }

    pub fn bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.bus)
    }

    pub fn emit_handle(&self) -> EmitHandle {
        EmitHandle::new(
            self.outbound_tx.clone(),
            Arc::clone(&self.connected),
            self.diag.sink(),
        )
    }

    /// Sends a user query, enriched with the stored device location when one
    /// exists. Fire-and-forget: results arrive through the bus.
    pub fn send_query(&self, message: &str) {
        let payload = compose_user_message(message, &self.store);
        self.emit_handle().emit("user_message", payload);
    }

    /// The connection loop: connect, pump frames, reconnect on any close or
    /// error with jittered exponential backoff, until `shutdown` fires.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let Some(mut outbound_rx) = self.outbound_rx.lock().await.take() else {
            self.diag.error("run() called twice on the same client", None);
            return;
        };

        let mut backoff = self.config.reconnect_base_delay;
        loop {
            if shutdown.try_recv().is_ok() {
                break;
            }

            let conn_id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
            self.diag.info(
                "connecting",
                Some(json!({
                    "connection": conn_id,
                    "endpoint": self.config.endpoint.as_str()
                })),
            );

            match connect_async(self.config.endpoint.as_str()).await {
                Ok((ws_stream, _)) => {
                    backoff = self.config.reconnect_base_delay;
                    self.connected.store(true, Ordering::SeqCst);
                    self.diag.info(
                        "connected",
                        Some(json!({ "connection": conn_id, "transport": "websocket" })),
                    );

                    let (mut write, mut read) = ws_stream.split();
                    let reason = loop {
                        tokio::select! {
                            _ = shutdown.recv() => {
                                let _ = write.close().await;
                                self.connected.store(false, Ordering::SeqCst);
                                self.diag.info("shutting down", Some(json!({ "connection": conn_id })));
                                return;
                            }
                            Some(frame) = outbound_rx.recv() => {
                                match serde_json::to_string(&frame) {
                                    Ok(text) => {
                                        if let Err(e) = write.send(WsMessage::Text(text.into())).await {
                                            self.diag.error(
                                                "write failed",
                                                Some(json!({ "connection": conn_id, "error": e.to_string() })),
                                            );
                                            break "write error";
                                        }
                                    }
                                    Err(e) => {
                                        // Undecodable outbound frames are dropped; the channel stays up.
                                        self.diag.error(
                                            "failed to encode outbound frame",
                                            Some(json!({ "event": frame.event, "error": e.to_string() })),
                                        );
                                    }
                                }
                            }
                            msg = read.next() => {
                                match msg {
                                    Some(Ok(WsMessage::Text(text))) => self.handle_text(conn_id, text.as_str()),
                                    Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => {}
                                    Some(Ok(WsMessage::Close(close))) => {
                                        let why = close
                                            .map(|c| c.reason.to_string())
                                            .unwrap_or_default();
                                        self.diag.info(
                                            "close frame received",
                                            Some(json!({ "connection": conn_id, "reason": why })),
                                        );
                                        break "closed by server";
                                    }
                                    Some(Ok(_)) => {}
                                    Some(Err(e)) => {
                                        // Recovery is the reconnect loop; nothing else to do here.
                                        self.diag.error(
                                            "transport error",
                                            Some(json!({ "connection": conn_id, "error": e.to_string() })),
                                        );
                                        break "transport error";
                                    }
                                    None => break "stream ended",
                                }
                            }
                        }
                    };

                    self.connected.store(false, Ordering::SeqCst);
                    self.diag.warn(
                        "disconnected, awaiting reconnect",
                        Some(json!({ "connection": conn_id, "reason": reason })),
                    );
                }
                Err(e) => {
                    self.diag.error(
                        "failed to connect",
                        Some(json!({
                            "connection": conn_id,
                            "error": e.to_string(),
                            "retry_in_ms": backoff.as_millis() as u64
                        })),
                    );
                }
            }

            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(jittered(backoff)) => {}
            }
            backoff = std::cmp::min(backoff * 2, self.config.reconnect_max_delay);
        }
    }

    fn handle_text(&self, conn_id: u64, text: &str) {
        let frame: WireFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                self.diag.warn(
                    "undecodable inbound frame, dropping",
                    Some(json!({ "connection": conn_id, "error": e.to_string() })),
                );
                return;
            }
        };
        self.dispatch_frame(frame);
    }

    // Synchronous with respect to the read loop: one frame is fully fanned
    // out before the next is picked up.
    fn dispatch_frame(&self, frame: WireFrame) {
        // Generic trace before category-specific handling.
        self.diag.trace(
            "inbound event",
            Some(json!({ "event": frame.event, "shape": shape_of(&frame.data) })),
        );

        match frame.event.as_str() {
            "ai_message" => {
                let message = normalizer::normalize_chat(frame.data);
                self.bus.chat().publish(&message);
            }
            "search_results" => match normalizer::normalize_results(&frame.data) {
                Ok(event) => self.bus.search().publish(&event),
                Err(e) => self.diag.warn(
                    "unexpected search_results shape, dropping",
                    Some(json!({ "error": e.to_string() })),
                ),
            },
            "multi_search_results" => match normalizer::normalize_multi(&frame.data) {
                Ok(event) => self.bus.search().publish(&event),
                Err(e) => self.diag.warn(
                    "unexpected multi_search_results shape, dropping",
                    Some(json!({ "error": e.to_string() })),
                ),
            },
            "request_location" => {
                // The fix is bounded but slow; never stall the read loop on it.
                let coordinator = Arc::clone(&self.coordinator);
                let emitter = self.emit_handle();
                let bus = Arc::clone(&self.bus);
                tokio::spawn(async move {
                    coordinator.handle_request(&emitter, &bus).await;
                });
            }
            other => self
                .diag
                .debug("unhandled event", Some(json!({ "event": other }))),
        }
    }
}

// Shape preview for the generic inbound trace, mirroring what operators need
// to triage a misbehaving stream without dumping payloads.
fn shape_of(data: &Value) -> Value {
    match data {
        Value::Array(items) => json!({ "kind": "array", "len": items.len() }),
        Value::Object(map) => {
            json!({ "kind": "object", "keys": map.keys().cloned().collect::<Vec<_>>() })
        }
        Value::String(s) => json!({ "kind": "string", "len": s.len() }),
        Value::Null => json!({ "kind": "null" }),
        _ => json!({ "kind": "scalar" }),
    }
}

fn jittered(delay: Duration) -> Duration {
    let factor = rand::rng().random_range(0.9..=1.1);
    delay.mul_f64(factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loggers::diagrecord::DiagLevel;
    use crate::loggers::sink::MemorySink;

    #[test]
    fn emit_while_disconnected_drops_and_logs() {
        let sink = Arc::new(MemorySink::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = EmitHandle::new(
            tx,
            Arc::new(AtomicBool::new(false)),
            Arc::clone(&sink) as Arc<dyn DiagnosticSink>,
        );

        handle.emit("user_message", json!({"message": "anyone there?"}));

        assert!(rx.try_recv().is_err());
        assert!(sink.contains(DiagLevel::Warn, "channel down"));
    }

    #[test]
    fn emit_while_connected_forwards_frame() {
        let sink = Arc::new(MemorySink::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = EmitHandle::new(
            tx,
            Arc::new(AtomicBool::new(true)),
            sink as Arc<dyn DiagnosticSink>,
        );

        handle.emit("user_message", json!({"message": "hello"}));

        let frame = rx.try_recv().expect("frame forwarded");
        assert_eq!(frame.event, "user_message");
        assert_eq!(frame.data, json!({"message": "hello"}));
    }

    #[test]
    fn shape_preview_covers_wire_kinds() {
        assert_eq!(shape_of(&json!([1, 2, 3]))["len"], json!(3));
        assert_eq!(shape_of(&json!({"results": []}))["kind"], json!("object"));
        assert_eq!(shape_of(&json!("hi"))["kind"], json!("string"));
        assert_eq!(shape_of(&Value::Null)["kind"], json!("null"));
        assert_eq!(shape_of(&json!(4))["kind"], json!("scalar"));
    }

    #[test]
    fn jitter_stays_within_ten_percent() {
        let base = Duration::from_millis(1000);
        for _ in 0..50 {
            let d = jittered(base);
            assert!(d >= Duration::from_millis(900) && d <= Duration::from_millis(1100));
        }
    }
}
