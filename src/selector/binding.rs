use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::store::ExternalStore;

type Selector<S, T, E> = Arc<dyn Fn(&S) -> Result<T, E> + Send + Sync>;
type Equality<T> = Arc<dyn Fn(&T, &T) -> bool + Send + Sync>;

struct Cached<S, T> {
    /// The state `value` was last confirmed against.
    source: Arc<S>,
    value: Arc<T>,
}

/// A store paired with a selector, exposing the `subscribe` + `get_snapshot`
/// shape an external synchronization loop consumes.
///
/// Snapshot identity is the change signal: [`get_snapshot`](Binding::get_snapshot)
/// returns the previously returned `Arc<T>` whenever the selected value is
/// equal to it, even though the underlying state moved on. Consumers compare
/// with [`Arc::ptr_eq`].
///
/// Selectors must be deterministic for a given state; memoization assumes
/// it but does not check it.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use snapstore::{bind, create_store, state_map};
/// use std::sync::Arc;
///
/// let store = create_store(state_map(json!({ "count": 0, "name": "a" })));
/// let count = bind(store.clone(), |state| state["count"].clone());
///
/// let before = count.snapshot();
/// store.set_state(state_map(json!({ "name": "b" }))).unwrap();
/// assert!(Arc::ptr_eq(&before, &count.snapshot()));
///
/// store.set_state(state_map(json!({ "count": 1 }))).unwrap();
/// assert_eq!(*count.snapshot(), json!(1));
/// ```
pub struct Binding<St: ExternalStore, T, E = Infallible> {
    store: St,
    selector: Selector<St::State, T, E>,
    equals: Equality<T>,
    cache: Arc<Mutex<Option<Cached<St::State, T>>>>,
}

impl<St, T, E> Binding<St, T, E>
where
    St: ExternalStore,
    T: Send + Sync + 'static,
    E: 'static,
{
    /// Bind a fallible selector with an explicit equality predicate.
    pub fn new<F, Q>(store: St, selector: F, equals: Q) -> Self
    where
        F: Fn(&St::State) -> Result<T, E> + Send + Sync + 'static,
        Q: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        Self {
            store,
            selector: Arc::new(selector),
            equals: Arc::new(equals),
            cache: Arc::new(Mutex::new(None)),
        }
    }

    /// Evaluate the selector against the current state.
    ///
    /// Returns the cached snapshot without running the selector if the state
    /// has not been replaced since it was computed, and the cached snapshot
    /// if the fresh result is equal to it. A selector error is returned as
    /// is and leaves the cache untouched.
    pub fn get_snapshot(&self) -> Result<Arc<T>, E> {
        let state = self.store.get_state();
        let previous = {
            let cache = self.cache.lock();
            match cache.as_ref() {
                Some(cached) if Arc::ptr_eq(&cached.source, &state) => {
                    return Ok(Arc::clone(&cached.value));
                }
                Some(cached) => Some(Arc::clone(&cached.value)),
                None => None,
            }
        };

        let selected = (self.selector)(&state)?;
        let value = match previous {
            Some(previous) if (self.equals)(&previous, &selected) => previous,
            _ => Arc::new(selected),
        };

        *self.cache.lock() = Some(Cached {
            source: state,
            value: Arc::clone(&value),
        });
        Ok(value)
    }

    /// Register `on_change` with the store.
    ///
    /// `on_change` runs on every store notification, whether or not the
    /// selected value changed; call [`get_snapshot`](Binding::get_snapshot)
    /// from it to find out.
    pub fn subscribe<F>(&self, on_change: F) -> St::Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.store.subscribe(on_change)
    }

    pub fn store(&self) -> &St {
        &self.store
    }
}

impl<St, T> Binding<St, T, Infallible>
where
    St: ExternalStore,
    T: Send + Sync + 'static,
{
    /// [`get_snapshot`](Binding::get_snapshot) for selectors that cannot fail.
    pub fn snapshot(&self) -> Arc<T> {
        match self.get_snapshot() {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }
}

impl<St: ExternalStore, T, E> Clone for Binding<St, T, E> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            selector: Arc::clone(&self.selector),
            equals: Arc::clone(&self.equals),
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<St: ExternalStore + fmt::Debug, T: fmt::Debug, E> fmt::Debug for Binding<St, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cache = self.cache.lock();
        f.debug_struct("Binding")
            .field("store", &self.store)
            .field("cached", &cache.as_ref().map(|cached| &cached.value))
            .finish()
    }
}

/// Bind an infallible selector, comparing results with `PartialEq`.
pub fn bind<St, T, F>(store: St, selector: F) -> Binding<St, T>
where
    St: ExternalStore,
    T: PartialEq + Send + Sync + 'static,
    F: Fn(&St::State) -> T + Send + Sync + 'static,
{
    bind_with(store, selector, |a: &T, b: &T| a == b)
}

/// Bind an infallible selector with a custom equality predicate.
pub fn bind_with<St, T, F, Q>(store: St, selector: F, equals: Q) -> Binding<St, T>
where
    St: ExternalStore,
    T: Send + Sync + 'static,
    F: Fn(&St::State) -> T + Send + Sync + 'static,
    Q: Fn(&T, &T) -> bool + Send + Sync + 'static,
{
    Binding::new(store, move |state: &St::State| Ok(selector(state)), equals)
}

/// Bind a fallible selector, comparing results with `PartialEq`.
pub fn try_bind<St, T, E, F>(store: St, selector: F) -> Binding<St, T, E>
where
    St: ExternalStore,
    T: PartialEq + Send + Sync + 'static,
    E: 'static,
    F: Fn(&St::State) -> Result<T, E> + Send + Sync + 'static,
{
    Binding::new(store, selector, |a: &T, b: &T| a == b)
}

/// Bind a fallible selector with a custom equality predicate.
pub fn try_bind_with<St, T, E, F, Q>(store: St, selector: F, equals: Q) -> Binding<St, T, E>
where
    St: ExternalStore,
    T: Send + Sync + 'static,
    E: 'static,
    F: Fn(&St::State) -> Result<T, E> + Send + Sync + 'static,
    Q: Fn(&T, &T) -> bool + Send + Sync + 'static,
{
    Binding::new(store, selector, equals)
}
