//! Integration tests for Snapstore

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::thread;

use parking_lot::Mutex;
use serde_json::{json, Value};
use snapstore::{
    bind, create_store, state_map, ExternalStore, ReducerFactory, ScopeRegistry, StateMap, Store,
    StoreConfig, StoreError, StoreFactory, Subscription, SyncedSnapshot,
};

fn count(state: &StateMap) -> Value {
    state["count"].clone()
}

#[test]
fn store_integration() {
    let store = create_store(state_map(json!({ "count": 0, "name": "test" })));

    // Test get
    assert_eq!(store.get_state()["count"], json!(0));

    // Test set
    store
        .set_state(state_map(json!({ "count": 42, "name": "updated" })))
        .unwrap();
    assert_eq!(store.get_state()["count"], json!(42));
    assert_eq!(store.get_state()["name"], json!("updated"));

    // Test update
    store
        .update(|state| {
            let count = state["count"].as_i64().unwrap_or_default();
            state_map(json!({ "count": count + 58 }))
        })
        .unwrap();
    assert_eq!(store.get_state()["count"], json!(100));
    assert_eq!(store.get_state()["name"], json!("updated"));
}

#[test]
fn notification_follows_commit_in_registration_order() {
    let store = create_store(state_map(json!({ "count": 0 })));
    let log = Arc::new(Mutex::new(Vec::new()));

    let subscriptions: Vec<_> = ["a", "b", "c"]
        .into_iter()
        .map(|name| {
            let store = store.clone();
            let log = log.clone();
            store.clone().subscribe(move || {
                log.lock().push((name, store.get_state()["count"].clone()));
            })
        })
        .collect();

    store.set_state(state_map(json!({ "count": 1 }))).unwrap();
    store.set_state(state_map(json!({ "count": 2 }))).unwrap();

    assert_eq!(
        *log.lock(),
        vec![
            ("a", json!(1)),
            ("b", json!(1)),
            ("c", json!(1)),
            ("a", json!(2)),
            ("b", json!(2)),
            ("c", json!(2)),
        ]
    );
    drop(subscriptions);
}

#[test]
fn unsubscribe_many_times_removes_one_listener() {
    let store = create_store(state_map(json!({ "count": 0 })));
    let _a = store.subscribe(|| {});
    let b = store.subscribe(|| {});
    let _c = store.subscribe(|| {});

    for _ in 0..5 {
        b.unsubscribe();
    }
    assert_eq!(store.listener_count(), 2);
}

#[test]
fn selector_memoization() {
    let store = create_store(state_map(json!({ "count": 0 })));
    let binding = bind(store.clone(), count);

    let first = binding.snapshot();
    let second = binding.snapshot();
    assert!(Arc::ptr_eq(&first, &second));

    store.set_state(state_map(json!({ "count": 1 }))).unwrap();
    let third = binding.snapshot();
    assert_eq!(*third, json!(1));
    assert!(!Arc::ptr_eq(&first, &third));
}

#[test]
fn unrelated_field_stability() {
    let store = create_store(state_map(json!({ "count": 0, "name": "a" })));
    let binding = bind(store.clone(), count);
    let notified = Arc::new(AtomicUsize::new(0));
    let _subscription = binding.subscribe({
        let notified = notified.clone();
        move || {
            notified.fetch_add(1, Ordering::SeqCst);
        }
    });

    let before = binding.snapshot();
    store.set_state(state_map(json!({ "name": "b" }))).unwrap();

    assert_eq!(notified.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&before, &binding.snapshot()));
}

#[test]
fn instance_isolation() {
    let a = create_store(state_map(json!({ "count": 0 })));
    let b = create_store(state_map(json!({ "count": 0 })));

    a.set_state(state_map(json!({ "count": 5 }))).unwrap();
    assert_eq!(b.get_state()["count"], json!(0));
}

#[test]
fn scope_resolution() {
    let registry: ScopeRegistry<String, Store<StateMap>> = ScopeRegistry::new();
    assert!(matches!(
        registry.resolve(&"missing-scope".to_string()),
        Err(StoreError::NotBound { .. })
    ));

    let store = create_store(state_map(json!({ "count": 0 })));
    registry.register("s".to_string(), store.clone()).unwrap();
    for _ in 0..3 {
        assert!(registry.resolve(&"s".to_string()).unwrap().ptr_eq(&store));
    }
}

#[test]
fn self_unsubscribe_during_notification() {
    let store = create_store(state_map(json!({ "count": 0 })));
    let calls = Arc::new(Mutex::new(Vec::new()));
    let slot: Arc<Mutex<Option<Subscription<StateMap>>>> = Arc::new(Mutex::new(None));

    let _before = store.subscribe({
        let calls = calls.clone();
        move || calls.lock().push("before")
    });
    let once = store.subscribe({
        let calls = calls.clone();
        let slot = slot.clone();
        move || {
            calls.lock().push("once");
            if let Some(subscription) = slot.lock().as_ref() {
                subscription.unsubscribe();
            }
        }
    });
    *slot.lock() = Some(once);
    let _after = store.subscribe({
        let calls = calls.clone();
        move || calls.lock().push("after")
    });

    store.set_state(state_map(json!({ "count": 1 }))).unwrap();
    store.set_state(state_map(json!({ "count": 2 }))).unwrap();

    assert_eq!(
        *calls.lock(),
        vec!["before", "once", "after", "before", "after"]
    );
    assert_eq!(store.listener_count(), 2);
}

#[test]
fn panicking_listener_is_reported_after_the_pass() {
    let store = create_store(state_map(json!({ "count": 0 })));
    let ran = Arc::new(AtomicUsize::new(0));

    let _first = store.subscribe({
        let ran = ran.clone();
        move || {
            ran.fetch_add(1, Ordering::SeqCst);
        }
    });
    let _bad = store.subscribe(|| panic!("render failed"));
    let _last = store.subscribe({
        let ran = ran.clone();
        move || {
            ran.fetch_add(1, Ordering::SeqCst);
        }
    });

    let err = store
        .set_state(state_map(json!({ "count": 1 })))
        .unwrap_err();
    assert_eq!(ran.load(Ordering::SeqCst), 2);
    match err {
        StoreError::ListenerPanicked { failures } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].message, "render failed");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // The store keeps working.
    assert_eq!(store.get_state()["count"], json!(1));
}

#[test]
fn factories_select_the_implementation() {
    fn populate<Fct: StoreFactory<StateMap>>(factory: &Fct) -> (Fct::Store, Fct::Store) {
        (
            factory.create(state_map(json!({ "count": 0 }))),
            factory.create(state_map(json!({ "count": 0 }))),
        )
    }

    let (a, b) = populate(&StoreConfig::new().with_name("plain"));
    a.set_state(state_map(json!({ "count": 3 }))).unwrap();
    assert_eq!(b.get_state()["count"], json!(0));

    let reducer = ReducerFactory::new(|state: &StateMap, step: i64| {
        let count = state["count"].as_i64().unwrap_or_default();
        state_map(json!({ "count": count + step }))
    });
    let (c, d) = populate(&reducer);
    c.dispatch(4).unwrap();
    assert_eq!(c.get_state()["count"], json!(4));
    assert_eq!(d.get_state()["count"], json!(0));
}

#[test]
fn scoped_consumers_resync_independently() {
    let registry: ScopeRegistry<&str, Store<StateMap>> = ScopeRegistry::new();
    let left = registry
        .provide("left", create_store(state_map(json!({ "count": 0 }))))
        .unwrap();
    let _right = registry
        .provide("right", create_store(state_map(json!({ "count": 0 }))))
        .unwrap();

    let renders = Arc::new(Mutex::new(Vec::new()));
    let consumers: Vec<_> = ["left", "right"]
        .into_iter()
        .map(|scope| {
            let renders = renders.clone();
            SyncedSnapshot::new(registry.bind(&scope, count).unwrap(), move |snapshot| {
                if let Ok(value) = snapshot {
                    renders.lock().push((scope, (*value).clone()));
                }
            })
            .unwrap()
        })
        .collect();

    left.store()
        .set_state(state_map(json!({ "count": 1 })))
        .unwrap();

    assert_eq!(*renders.lock(), vec![("left", json!(1))]);
    assert_eq!(*consumers[1].current(), json!(0));

    drop(consumers);
    drop(left);
    assert!(!registry.contains(&"left"));
    assert!(registry.contains(&"right"));
}

#[test]
fn concurrent_writers_all_commit() {
    let store = create_store(state_map(json!({ "count": 0 })));
    let calls = Arc::new(AtomicUsize::new(0));
    let _subscription = store.subscribe({
        let calls = calls.clone();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
        }
    });

    let writers: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    store
                        .update(|state: &StateMap| {
                            let n = state["count"].as_i64().unwrap_or_default();
                            state_map(json!({ "count": n + 1 }))
                        })
                        .unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    assert_eq!(store.get_state()["count"], json!(400));
    assert_eq!(store.version(), 400);
    assert_eq!(calls.load(Ordering::SeqCst), 400);
}
