//! In-process publish/subscribe registry keyed by event name.
//!
//! One [`EventBus`] is shared (as `Arc<EventBus>`) by every namespace and all
//! application code. Isolation between namespaces comes purely from distinct
//! event names such as `"counter:stateChange"`.
//!
//! # Delivery
//!
//! - Handlers for an event run synchronously, in registration order, on the
//!   publishing thread.
//! - The handler list is snapshotted when `publish` starts: handlers added or
//!   removed by a running handler take effect from the next publish.
//! - No lock is held while a handler runs, so handlers may subscribe,
//!   unsubscribe or publish re-entrantly.
//! - Each handler is isolated: a panic is caught, logged as
//!   [`StateError::Handler`], and the remaining handlers still run.
//!
//! Payloads are typed per subscription. A handler registered for `P` only sees
//! payloads published as `P`; a mismatched publish skips it with a warning.

use crate::domain::StateError;
use crate::infrastructure::sync::lock;
use std::any::{type_name, Any};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Unique identifier of one registration on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Returns the raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Type-erased handler; returns `false` when the payload type did not match.
type ErasedHandler = Arc<dyn Fn(&dyn Any) -> bool + Send + Sync>;

#[derive(Clone)]
struct Listener {
    id: SubscriptionId,
    payload_type: &'static str,
    handler: ErasedHandler,
}

/// Publish/subscribe registry mapping event names to ordered handler lists.
///
/// # Example
///
/// ```
/// use statebus::bus::EventBus;
/// use std::sync::{Arc, Mutex};
///
/// let bus = Arc::new(EventBus::new());
/// let seen = Arc::new(Mutex::new(Vec::new()));
///
/// let sink = Arc::clone(&seen);
/// let subscription = bus.subscribe("greeting", move |name: &String| {
///     sink.lock().unwrap().push(name.clone());
/// });
///
/// bus.publish("greeting", &"ada".to_string());
/// subscription.unsubscribe();
/// bus.publish("greeting", &"grace".to_string());
///
/// assert_eq!(*seen.lock().unwrap(), vec!["ada".to_string()]);
/// ```
pub struct EventBus {
    listeners: Mutex<HashMap<String, Vec<Listener>>>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers `handler` for `event` and returns its unsubscribe handle.
    ///
    /// Always succeeds. Registering the same closure twice yields two
    /// independent registrations that both fire.
    ///
    /// Dropping the returned [`Subscription`] does **not** unsubscribe; call
    /// [`Subscription::unsubscribe`] explicitly.
    pub fn subscribe<P, F>(self: &Arc<Self>, event: impl Into<String>, handler: F) -> Subscription
    where
        P: Any,
        F: Fn(&P) + Send + Sync + 'static,
    {
        let event = event.into();
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let erased: ErasedHandler = Arc::new(move |payload: &dyn Any| {
            payload.downcast_ref::<P>().map_or(false, |typed| {
                handler(typed);
                true
            })
        });

        lock(&self.listeners)
            .entry(event.clone())
            .or_default()
            .push(Listener {
                id,
                payload_type: type_name::<P>(),
                handler: erased,
            });

        tracing::trace!(event = %event, subscription = %id, "subscribed");

        Subscription {
            bus: Arc::downgrade(self),
            event,
            id,
            active: AtomicBool::new(true),
        }
    }

    /// Invokes every handler currently registered for `event` with `payload`.
    ///
    /// Returns the number of handlers that ran to completion. Publishing an
    /// event nobody listens to is a no-op returning `0`.
    pub fn publish<P: Any>(&self, event: &str, payload: &P) -> usize {
        let snapshot: Vec<Listener> = lock(&self.listeners)
            .get(event)
            .cloned()
            .unwrap_or_default();

        if snapshot.is_empty() {
            tracing::trace!(event = %event, "publish without listeners");
            return 0;
        }

        let _span = tracing::debug_span!("publish", event = %event, listeners = snapshot.len()).entered();

        let mut delivered = 0;
        for listener in &snapshot {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                (listener.handler)(payload as &dyn Any)
            }));
            match outcome {
                Ok(true) => delivered += 1,
                Ok(false) => tracing::warn!(
                    subscription = %listener.id,
                    expected = listener.payload_type,
                    published = type_name::<P>(),
                    "payload type mismatch, handler skipped"
                ),
                Err(panic) => {
                    let error = StateError::Handler {
                        event: event.to_string(),
                        message: panic_message(panic.as_ref()),
                    };
                    tracing::error!(subscription = %listener.id, error = %error, "subscriber failed");
                }
            }
        }

        tracing::debug!(delivered, "event published");
        delivered
    }

    /// Returns a snapshot of registered subscriptions per event.
    ///
    /// The map is a copy; modifying it does not affect the bus.
    #[must_use]
    pub fn listeners(&self) -> BTreeMap<String, Vec<SubscriptionId>> {
        lock(&self.listeners)
            .iter()
            .map(|(event, listeners)| {
                (event.clone(), listeners.iter().map(|l| l.id).collect())
            })
            .collect()
    }

    /// Number of handlers registered for `event`.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        lock(&self.listeners).get(event).map_or(0, Vec::len)
    }

    fn remove(&self, event: &str, id: SubscriptionId) -> bool {
        let mut listeners = lock(&self.listeners);
        let Some(handlers) = listeners.get_mut(event) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|l| l.id != id);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            listeners.remove(event);
        }
        removed
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners())
            .finish_non_exhaustive()
    }
}

/// Handle returned by [`EventBus::subscribe`].
///
/// Holds only a weak reference to the bus, so an outstanding handle never keeps
/// the bus alive.
pub struct Subscription {
    bus: Weak<EventBus>,
    event: String,
    id: SubscriptionId,
    active: AtomicBool,
}

impl Subscription {
    /// Removes exactly this registration, keeping the order of the others.
    ///
    /// Calling it again is a no-op.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(bus) = self.bus.upgrade() {
            let removed = bus.remove(&self.event, self.id);
            tracing::trace!(event = %self.event, subscription = %self.id, removed, "unsubscribed");
        }
    }

    /// Identifier of this registration.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Event name this registration listens to.
    #[must_use]
    pub fn event(&self) -> &str {
        &self.event
    }

    /// `false` once [`unsubscribe`](Self::unsubscribe) has been called.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &self.event)
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Box<dyn Fn(&u32) + Send + Sync>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let make = move |tag: &str| -> Box<dyn Fn(&u32) + Send + Sync> {
            let sink = Arc::clone(&sink);
            let tag = tag.to_string();
            Box::new(move |value: &u32| sink.lock().unwrap().push(format!("{tag}:{value}")))
        };
        (log, make)
    }

    #[test]
    fn publish_without_listeners_is_noop() {
        let bus = EventBus::new();
        assert_eq!(bus.publish("nobody", &1_u32), 0);
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let bus = Arc::new(EventBus::new());
        let (log, make) = recorder();
        let a = make("a");
        let b = make("b");
        let _sa = bus.subscribe("tick", move |v: &u32| a(v));
        let _sb = bus.subscribe("tick", move |v: &u32| b(v));

        assert_eq!(bus.publish("tick", &7_u32), 2);
        assert_eq!(*log.lock().unwrap(), vec!["a:7", "b:7"]);
    }

    #[test]
    fn duplicate_handlers_both_fire() {
        let bus = Arc::new(EventBus::new());
        let (log, make) = recorder();
        let shared: Arc<dyn Fn(&u32) + Send + Sync> = Arc::from(make("dup"));
        let first = Arc::clone(&shared);
        let second = Arc::clone(&shared);
        let _s1 = bus.subscribe("tick", move |v: &u32| first(v));
        let _s2 = bus.subscribe("tick", move |v: &u32| second(v));

        bus.publish("tick", &1_u32);
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn unsubscribe_removes_only_that_handler_and_is_idempotent() {
        let bus = Arc::new(EventBus::new());
        let (log, make) = recorder();
        let a = make("a");
        let b = make("b");
        let c = make("c");
        let _sa = bus.subscribe("tick", move |v: &u32| a(v));
        let sb = bus.subscribe("tick", move |v: &u32| b(v));
        let _sc = bus.subscribe("tick", move |v: &u32| c(v));

        sb.unsubscribe();
        sb.unsubscribe();
        assert!(!sb.is_active());
        assert_eq!(bus.listener_count("tick"), 2);

        bus.publish("tick", &2_u32);
        assert_eq!(*log.lock().unwrap(), vec!["a:2", "c:2"]);
    }

    #[test]
    fn panicking_handler_does_not_stop_the_others() {
        let bus = Arc::new(EventBus::new());
        let (log, make) = recorder();
        let a = make("a");
        let c = make("c");
        let _sa = bus.subscribe("tick", move |v: &u32| a(v));
        let _sb = bus.subscribe("tick", |_: &u32| panic!("boom"));
        let _sc = bus.subscribe("tick", move |v: &u32| c(v));

        assert_eq!(bus.publish("tick", &3_u32), 2);
        assert_eq!(*log.lock().unwrap(), vec!["a:3", "c:3"]);
    }

    #[test]
    fn mismatched_payload_type_is_skipped() {
        let bus = Arc::new(EventBus::new());
        let _s = bus.subscribe("tick", |_: &String| {});
        assert_eq!(bus.publish("tick", &1_u32), 0);
    }

    #[test]
    fn listeners_snapshot_is_detached() {
        let bus = Arc::new(EventBus::new());
        let s = bus.subscribe("a", |_: &u32| {});
        let _t = bus.subscribe("b", |_: &u32| {});

        let mut snapshot = bus.listeners();
        assert_eq!(snapshot["a"], vec![s.id()]);
        snapshot.clear();
        assert_eq!(bus.listeners().len(), 2);
    }

    #[test]
    fn handler_may_unsubscribe_during_publish() {
        let bus = Arc::new(EventBus::new());
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let hits = Arc::new(AtomicU64::new(0));

        let slot_in = Arc::clone(&slot);
        let hits_in = Arc::clone(&hits);
        let subscription = bus.subscribe("once", move |_: &()| {
            hits_in.fetch_add(1, Ordering::SeqCst);
            if let Some(s) = slot_in.lock().unwrap().as_ref() {
                s.unsubscribe();
            }
        });
        *slot.lock().unwrap() = Some(subscription);

        bus.publish("once", &());
        bus.publish("once", &());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropped_bus_makes_unsubscribe_harmless() {
        let bus = Arc::new(EventBus::new());
        let s = bus.subscribe("a", |_: &u32| {});
        drop(bus);
        s.unsubscribe();
        assert!(!s.is_active());
    }
}
