use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use statebus::app::{middleware_fn, Action, Dispatch, MiddlewareApi};
use statebus::demo::{CounterPatch, CounterState};
use statebus::storage::{KeyValueStore, MemoryStore, Persistence};
use statebus::{StateConfig, StateError, StateRegistry};
use std::sync::{Arc, Mutex};

statebus::partial_state! {
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Tally => TallyPatch {
        count: i64,
        label: String,
    }
}

fn tally() -> Tally {
    Tally {
        count: 0,
        label: "start".into(),
    }
}

fn recorder<T: Send + 'static>() -> (Arc<Mutex<Vec<T>>>, Arc<Mutex<Vec<T>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    (Arc::clone(&log), log)
}

#[test]
fn namespace_validation() {
    let registry = StateRegistry::in_memory();

    for bad in ["", "a:b"] {
        let err = registry.create_state(StateConfig::new(bad, tally())).unwrap_err();
        assert!(matches!(err, StateError::Configuration(_)), "{bad:?} -> {err}");
    }
    assert!(registry.create_state(StateConfig::new("valid", tally())).is_ok());
}

#[test]
fn reacquisition_shares_state() {
    let registry = StateRegistry::in_memory();
    let first = registry.create_state(StateConfig::new("shared", tally())).unwrap();
    let second = registry.create_state(StateConfig::new("shared", tally())).unwrap();

    first.set_state(TallyPatch::default().count(3));
    assert_eq!(second.get_state().count, 3);
}

#[test]
fn partial_merge_keeps_untouched_fields() {
    let t0 = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    let registry = StateRegistry::in_memory();
    let counter = registry
        .create_state(StateConfig::new("counter", CounterState { count: 0, last_updated: t0 }))
        .unwrap();

    counter.set_state(CounterPatch::default().count(5));
    assert_eq!(counter.get_state(), CounterState { count: 5, last_updated: t0 });
}

#[test]
fn subscribers_run_in_order_with_merged_state() {
    let registry = StateRegistry::in_memory();
    let state = registry.create_state(StateConfig::new("ordered", tally())).unwrap();
    let (log, sink) = recorder::<(char, Tally)>();

    let a = Arc::clone(&sink);
    let _sa = state.subscribe(move |s: &Tally| a.lock().unwrap().push(('A', s.clone())));
    let b = Arc::clone(&sink);
    let _sb = state.subscribe(move |s: &Tally| b.lock().unwrap().push(('B', s.clone())));

    state.set_state(TallyPatch::default().count(1));

    let expected = Tally { count: 1, label: "start".into() };
    assert_eq!(*log.lock().unwrap(), vec![('A', expected.clone()), ('B', expected)]);
}

#[test]
fn unsubscribe_stops_only_that_handler() {
    let registry = StateRegistry::in_memory();
    let state = registry.create_state(StateConfig::new("unsub", tally())).unwrap();
    let (log, sink) = recorder::<&'static str>();

    let a = Arc::clone(&sink);
    let sa = state.subscribe(move |_: &Tally| a.lock().unwrap().push("A"));
    let b = Arc::clone(&sink);
    let _sb = state.subscribe(move |_: &Tally| b.lock().unwrap().push("B"));

    state.set_state(TallyPatch::default().count(1));
    sa.unsubscribe();
    state.set_state(TallyPatch::default().count(2));

    assert_eq!(*log.lock().unwrap(), vec!["A", "B", "B"]);
}

#[test]
fn middleware_wraps_in_onion_order() {
    let registry = StateRegistry::in_memory();
    let (log, sink) = recorder::<String>();

    let tagged = |name: &'static str, sink: Arc<Mutex<Vec<String>>>| {
        middleware_fn(move |api: &MiddlewareApi<Tally>, next: &Dispatch<Tally>, action: Action<Tally>| {
            sink.lock().unwrap().push(format!("{name}:pre:{}", api.get_state().count));
            next(action);
            sink.lock().unwrap().push(format!("{name}:post:{}", api.get_state().count));
        })
    };

    let state = registry
        .create_state(
            StateConfig::new("onion", tally())
                .with_middleware(tagged("M1", Arc::clone(&sink)))
                .with_middleware(tagged("M2", Arc::clone(&sink))),
        )
        .unwrap();

    let reducer_log = Arc::clone(&sink);
    let increment = state.create_action("INCREMENT", move |s: &Tally, _: &()| {
        reducer_log.lock().unwrap().push("reduce".into());
        TallyPatch::default().count(s.count + 1)
    });
    increment.create(());

    assert_eq!(
        *log.lock().unwrap(),
        vec!["M1:pre:0", "M2:pre:0", "reduce", "M2:post:1", "M1:post:1"]
    );
}

#[test]
fn action_round_trip_notifies_once_per_create() {
    let registry = StateRegistry::in_memory();
    let state = registry.create_state(StateConfig::new("actions", tally())).unwrap();
    let notifications = Arc::new(Mutex::new(0));
    let seen = Arc::clone(&notifications);
    let _s = state.subscribe(move |_: &Tally| *seen.lock().unwrap() += 1);

    let increment = state.create_action("INCREMENT", |s: &Tally, _: &()| {
        TallyPatch::default().count(s.count + 1)
    });
    assert_eq!(increment.action_type(), "actions/INCREMENT");

    increment.create(());
    increment.create(());

    assert_eq!(state.get_state().count, 2);
    assert_eq!(*notifications.lock().unwrap(), 2);
}

#[test]
fn persisted_state_survives_reconstruction() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let config = || {
        StateConfig::new("persisted", tally())
            .with_persistence(Persistence::enabled().with_store(Arc::clone(&store)))
    };

    let before_reload = StateRegistry::in_memory();
    before_reload.create_state(config()).unwrap().set_state(TallyPatch::default().count(7));
    assert!(store.get("state_persisted").unwrap().is_some());

    let after_reload = StateRegistry::in_memory();
    assert_eq!(after_reload.create_state(config()).unwrap().get_state().count, 7);
}

struct BrokenStore;

impl KeyValueStore for BrokenStore {
    fn get(&self, _key: &str) -> statebus::Result<Option<String>> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &str) -> statebus::Result<()> {
        Err(StateError::Persistence("disk full".into()))
    }
}

#[test]
fn failing_store_does_not_block_updates() {
    let registry = StateRegistry::in_memory();
    let state = registry
        .create_state(
            StateConfig::new("fragile", tally())
                .with_persistence(Persistence::enabled().with_store(Arc::new(BrokenStore))),
        )
        .unwrap();
    let (log, sink) = recorder::<i64>();
    let _s = state.subscribe(move |s: &Tally| sink.lock().unwrap().push(s.count));

    state.set_state(TallyPatch::default().count(9));

    assert_eq!(state.get_state().count, 9);
    assert_eq!(*log.lock().unwrap(), vec![9]);
}

#[test]
fn reset_restores_initial_value() {
    let registry = StateRegistry::in_memory();
    let state = registry.create_state(StateConfig::new("resettable", tally())).unwrap();

    state.set_state(TallyPatch::default().count(4));
    state.set_state(TallyPatch::default().label("changed".into()));
    state.reset();

    assert_eq!(state.get_state(), tally());
    assert_eq!(state.initial_state(), &tally());
}

#[test]
fn panicking_subscriber_is_isolated() {
    let registry = StateRegistry::in_memory();
    let state = registry.create_state(StateConfig::new("panicky", tally())).unwrap();
    let (log, sink) = recorder::<i64>();

    let _bad = state.subscribe(|_: &Tally| panic!("subscriber bug"));
    let _good = state.subscribe(move |s: &Tally| sink.lock().unwrap().push(s.count));

    state.set_state(TallyPatch::default().count(1));

    assert_eq!(state.get_state().count, 1);
    assert_eq!(*log.lock().unwrap(), vec![1]);
}

#[test]
fn namespaces_are_isolated_on_a_shared_bus() {
    let registry = StateRegistry::in_memory();
    let left = registry.create_state(StateConfig::new("left", tally())).unwrap();
    let right = registry.create_state(StateConfig::new("right", tally())).unwrap();
    let (log, sink) = recorder::<i64>();
    let _s = right.subscribe(move |s: &Tally| sink.lock().unwrap().push(s.count));

    left.set_state(TallyPatch::default().count(5));

    assert!(log.lock().unwrap().is_empty());
    assert_eq!(right.get_state().count, 0);
    assert_eq!(registry.bus().listener_count("right:stateChange"), 1);
}

#[test]
fn concurrent_dispatch_loses_no_updates() {
    const THREADS: usize = 8;
    const PER_THREAD: i64 = 200;

    let registry = StateRegistry::in_memory();
    let yielding = middleware_fn(|_: &MiddlewareApi<Tally>, next: &Dispatch<Tally>, action: Action<Tally>| {
        std::thread::yield_now();
        next(action);
    });
    let state = registry
        .create_state(StateConfig::new("contended", tally()).with_middleware(yielding))
        .unwrap();
    let increment = state.create_action("INCREMENT", |s: &Tally, _: &()| {
        std::thread::yield_now();
        TallyPatch::default().count(s.count + 1)
    });

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _s = state.subscribe(move |s: &Tally| sink.lock().unwrap().push(s.count));

    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            let increment = increment.clone();
            std::thread::spawn(move || {
                for _ in 0..PER_THREAD {
                    increment.create(());
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let total = THREADS as i64 * PER_THREAD;
    assert_eq!(state.get_state().count, total);
    assert_eq!(*seen.lock().unwrap(), (1..=total).collect::<Vec<_>>());
}

#[test]
fn concurrent_set_state_and_dispatch_serialize() {
    let registry = StateRegistry::in_memory();
    let state = registry.create_state(StateConfig::new("mixed", tally())).unwrap();
    let increment = state.create_action("INCREMENT", |s: &Tally, _: &()| {
        TallyPatch::default().count(s.count + 1)
    });

    let writer = {
        let state = state.clone();
        std::thread::spawn(move || {
            for i in 0..100 {
                state.set_state(TallyPatch::default().label(format!("label-{i}")));
            }
        })
    };
    for _ in 0..100 {
        increment.create(());
    }
    writer.join().unwrap();

    assert_eq!(state.get_state(), Tally { count: 100, label: "label-99".into() });
}

#[test]
fn middleware_panic_reaches_the_caller_and_keeps_committed_state() {
    let registry = StateRegistry::in_memory();
    let explode_after = middleware_fn(|_: &MiddlewareApi<Tally>, next: &Dispatch<Tally>, action: Action<Tally>| {
        next(action);
        panic!("middleware failed after commit");
    });
    let state = registry
        .create_state(StateConfig::new("explosive", tally()).with_middleware(explode_after))
        .unwrap();
    let increment = state.create_action("INCREMENT", |s: &Tally, _: &()| {
        TallyPatch::default().count(s.count + 1)
    });

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| increment.create(())));

    assert!(outcome.is_err());
    assert_eq!(state.get_state().count, 1);
    state.set_state(TallyPatch::default().count(10));
    assert_eq!(state.get_state().count, 10);
}

#[test]
fn reducer_panic_reaches_the_caller_and_leaves_state_untouched() {
    let registry = StateRegistry::in_memory();
    let state = registry.create_state(StateConfig::new("faulty", tally())).unwrap();
    let broken = state.create_action("BROKEN", |_: &Tally, _: &()| -> TallyPatch {
        panic!("reducer bug");
    });

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| broken.create(())));

    assert!(outcome.is_err());
    assert_eq!(state.get_state(), tally());

    let worker = {
        let state = state.clone();
        std::thread::spawn(move || state.set_state(TallyPatch::default().count(2)))
    };
    worker.join().unwrap();
    assert_eq!(state.get_state().count, 2);
}

#[test]
fn reacquisition_ignores_the_store() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let registry = StateRegistry::new(Arc::new(statebus::EventBus::new()), Arc::clone(&store));
    let config = || StateConfig::new("cached", tally()).with_persistence(Persistence::enabled());

    registry.create_state(config()).unwrap().set_state(TallyPatch::default().count(3));
    store
        .set("state_cached", r#"{"count":99,"label":"from store"}"#)
        .unwrap();

    let again = registry.create_state(config()).unwrap();
    assert_eq!(again.get_state(), Tally { count: 3, label: "start".into() });
}

struct ReadBackStore {
    inner: MemoryStore,
    container: Mutex<Option<statebus::StateContainer<Tally>>>,
    seen: Mutex<Vec<i64>>,
}

impl KeyValueStore for ReadBackStore {
    fn get(&self, key: &str) -> statebus::Result<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> statebus::Result<()> {
        if let Some(container) = self.container.lock().unwrap().as_ref() {
            self.seen.lock().unwrap().push(container.get_state().count);
        }
        self.inner.set(key, value)
    }
}

#[test]
fn store_may_read_the_container_it_persists() {
    let store = Arc::new(ReadBackStore {
        inner: MemoryStore::new(),
        container: Mutex::new(None),
        seen: Mutex::new(Vec::new()),
    });
    let registry = StateRegistry::in_memory();
    let state = registry
        .create_state(
            StateConfig::new("readback", tally())
                .with_persistence(Persistence::enabled().with_store(store.clone())),
        )
        .unwrap();
    *store.container.lock().unwrap() = Some(state.clone());

    state.set_state(TallyPatch::default().count(4));

    assert_eq!(*store.seen.lock().unwrap(), vec![4]);
    store.container.lock().unwrap().take();
}
