//! # Typed Fan-out Dispatcher
//!
//! The subscriber registry for the streaming client. Each message category is
//! a `Dispatcher<T>` topic holding an ordered map of callbacks keyed by a
//! generated token: delivery follows registration order, removal is keyed,
//! and a panicking subscriber never takes down its siblings or the channel's
//! read loop.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use crate::core::model::{LocationOutcome, SearchEvent};
use crate::loggers::sink::{Diag, DiagnosticSink};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Subscribers<T> {
    next_token: u64,
    entries: BTreeMap<u64, Callback<T>>,
}

/// # Subscription Handle
///
/// Opaque token returned by every subscribe call. Consuming it removes
/// exactly the one callback it was issued for; handles for other callbacks,
/// including structurally identical ones, are unaffected. Dropping the
/// handle without calling [`SubscriptionHandle::unsubscribe`] leaves the
/// callback registered.
pub struct SubscriptionHandle {
    cancel: Box<dyn FnOnce() + Send>,
}

impl SubscriptionHandle {
    pub fn unsubscribe(self) {
        (self.cancel)();
    }
}

/// One fan-out topic.
pub struct Dispatcher<T> {
    topic: &'static str,
    subscribers: Arc<Mutex<Subscribers<T>>>,
    diag: Diag,
}

impl<T> Dispatcher<T> {
    pub fn new(topic: &'static str, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            topic,
            subscribers: Arc::new(Mutex::new(Subscribers {
                next_token: 1,
                entries: BTreeMap::new(),
            })),
            diag: Diag::new("dispatcher", sink),
        }
    }

    /// Appends `callback` to the topic and returns its removal handle.
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> SubscriptionHandle {
        let token = {
            let mut subs = self.subscribers.lock().expect("Dispatcher lock poisoned");
            let token = subs.next_token;
            subs.next_token += 1;
            subs.entries.insert(token, Arc::new(callback));
            token
        };

        let subscribers = Arc::clone(&self.subscribers);
        SubscriptionHandle {
            cancel: Box::new(move || {
                let mut subs = subscribers.lock().expect("Dispatcher lock poisoned");
                subs.entries.remove(&token);
            }),
        }
    }

    /// Invokes every currently-registered callback, synchronously, in
    /// registration order. A callback that panics is caught and reported to
    /// the diagnostic sink; later callbacks still run. With no subscribers
    /// the event is simply discarded (no buffering or replay).
    pub fn publish(&self, event: &T) {
        // Snapshot outside the lock so a callback can subscribe/unsubscribe
        // reentrantly without deadlocking.
        let snapshot: Vec<(u64, Callback<T>)> = {
            let subs = self.subscribers.lock().expect("Dispatcher lock poisoned");
            subs.entries
                .iter()
                .map(|(token, cb)| (*token, Arc::clone(cb)))
                .collect()
        };

        for (token, callback) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                self.diag.warn(
                    "subscriber callback panicked",
                    Some(json!({ "topic": self.topic, "token": token })),
                );
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .expect("Dispatcher lock poisoned")
            .entries
            .len()
    }
}

/// # Event Bus
///
/// The three fan-out channels of the streaming client: conversational
/// messages, canonical search events, and location-permission outcomes.
pub struct EventBus {
    chat: Dispatcher<Value>,
    search: Dispatcher<SearchEvent>,
    location: Dispatcher<LocationOutcome>,
}

impl EventBus {
    pub fn new(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            chat: Dispatcher::new("chat", Arc::clone(&sink)),
            search: Dispatcher::new("search", Arc::clone(&sink)),
            location: Dispatcher::new("location", sink),
        }
    }

    pub fn chat(&self) -> &Dispatcher<Value> {
        &self.chat
    }

    pub fn search(&self) -> &Dispatcher<SearchEvent> {
        &self.search
    }

    pub fn location(&self) -> &Dispatcher<LocationOutcome> {
        &self.location
    }

    /// Subscribes to conversational messages (canonical function-call JSON).
    pub fn on_chat_message(
        &self,
        callback: impl Fn(&Value) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        self.chat.subscribe(callback)
    }

    /// Subscribes to canonical search events.
    pub fn on_search_results(
        &self,
        callback: impl Fn(&SearchEvent) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        self.search.subscribe(callback)
    }

    /// Subscribes to location-permission outcomes.
    pub fn on_location_outcome(
        &self,
        callback: impl Fn(&LocationOutcome) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        self.location.subscribe(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loggers::diagrecord::DiagLevel;
    use crate::loggers::sink::MemorySink;

    fn test_dispatcher() -> (Dispatcher<u32>, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let dispatcher = Dispatcher::new("test", Arc::clone(&sink) as Arc<dyn DiagnosticSink>);
        (dispatcher, sink)
    }

    #[test]
    fn delivers_in_registration_order() {
        let (dispatcher, _sink) = test_dispatcher();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            dispatcher.subscribe(move |n: &u32| {
                seen.lock().unwrap().push((tag, *n));
            });
        }

        dispatcher.publish(&7);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("first", 7), ("second", 7), ("third", 7)]
        );
    }

    #[test]
    fn unsubscribe_removes_exactly_one_callback() {
        let (dispatcher, _sink) = test_dispatcher();
        let seen = Arc::new(Mutex::new(Vec::new()));

        // Two structurally identical callbacks; removal is identity-based.
        let seen_a = Arc::clone(&seen);
        let handle_a = dispatcher.subscribe(move |n: &u32| seen_a.lock().unwrap().push(("a", *n)));
        let seen_b = Arc::clone(&seen);
        let _handle_b = dispatcher.subscribe(move |n: &u32| seen_b.lock().unwrap().push(("b", *n)));

        handle_a.unsubscribe();
        dispatcher.publish(&1);

        assert_eq!(*seen.lock().unwrap(), vec![("b", 1)]);
        assert_eq!(dispatcher.subscriber_count(), 1);
    }

    #[test]
    fn panicking_callback_does_not_block_later_callbacks() {
        let (dispatcher, sink) = test_dispatcher();
        let seen = Arc::new(Mutex::new(Vec::new()));

        dispatcher.subscribe(|_: &u32| panic!("subscriber bug"));
        let seen_ok = Arc::clone(&seen);
        dispatcher.subscribe(move |n: &u32| seen_ok.lock().unwrap().push(*n));

        dispatcher.publish(&42);

        assert_eq!(*seen.lock().unwrap(), vec![42]);
        assert!(sink.contains(DiagLevel::Warn, "subscriber callback panicked"));
    }

    #[test]
    fn publish_with_no_subscribers_discards_event() {
        let (dispatcher, sink) = test_dispatcher();
        dispatcher.publish(&5);
        assert!(sink.records().is_empty());
    }

    #[test]
    fn bus_topics_are_independent() {
        let sink = Arc::new(MemorySink::new());
        let bus = EventBus::new(sink as Arc<dyn DiagnosticSink>);
        let chat_seen = Arc::new(Mutex::new(0u32));

        let chat_counter = Arc::clone(&chat_seen);
        let _chat = bus.on_chat_message(move |_| *chat_counter.lock().unwrap() += 1);
        let _search = bus.on_search_results(|_| panic!("search subscriber must not fire"));

        bus.chat().publish(&serde_json::json!({"function": "reply"}));
        assert_eq!(*chat_seen.lock().unwrap(), 1);
    }
}
