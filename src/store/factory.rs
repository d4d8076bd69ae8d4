use std::fmt;
use std::sync::Arc;

use super::config::StoreConfig;
use super::merge::ShallowMerge;
use super::store::{Store, Subscription};
use super::ExternalStore;
use crate::error::Result;

type Reducer<S, A> = Arc<dyn Fn(&S, A) -> <S as ShallowMerge>::Partial + Send + Sync>;

/// Builds fresh, independent stores from an initial state.
pub trait StoreFactory<S> {
    type Store: ExternalStore<State = S>;

    fn create(&self, initial: S) -> Self::Store;
}

impl<S> StoreFactory<S> for StoreConfig
where
    S: ShallowMerge + Send + Sync + 'static,
    S::Partial: Send + 'static,
{
    type Store = Store<S>;

    fn create(&self, initial: S) -> Store<S> {
        Store::with_config(initial, self.clone())
    }
}

/// Create a new store with default settings.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use snapstore::{create_store, state_map};
///
/// let a = create_store(state_map(json!({ "count": 0 })));
/// let b = create_store(state_map(json!({ "count": 0 })));
///
/// a.set_state(state_map(json!({ "count": 5 }))).unwrap();
/// assert_eq!(b.get_state()["count"], json!(0));
/// ```
pub fn create_store<S>(initial: S) -> Store<S>
where
    S: ShallowMerge + Send + Sync + 'static,
    S::Partial: Send + 'static,
{
    Store::new(initial)
}

/// A store whose writes come from actions run through a reducer.
///
/// The reducer maps the current state and an action to a partial update;
/// notification, re-entrancy and listener semantics are those of the
/// wrapped [`Store`]. Direct `set_state` calls bypass the reducer.
pub struct ReducerStore<S: ShallowMerge, A> {
    store: Store<S>,
    reducer: Reducer<S, A>,
}

impl<S, A> ReducerStore<S, A>
where
    S: ShallowMerge + Send + Sync + 'static,
    S::Partial: Send + 'static,
    A: Send + 'static,
{
    pub fn new<R>(initial: S, reducer: R) -> Self
    where
        R: Fn(&S, A) -> S::Partial + Send + Sync + 'static,
    {
        Self::with_config(initial, StoreConfig::default(), reducer)
    }

    pub fn with_config<R>(initial: S, config: StoreConfig, reducer: R) -> Self
    where
        R: Fn(&S, A) -> S::Partial + Send + Sync + 'static,
    {
        Self {
            store: Store::with_config(initial, config),
            reducer: Arc::new(reducer),
        }
    }

    /// Reduce `action` against the state it is applied to and commit the result.
    pub fn dispatch(&self, action: A) -> Result<()> {
        let reducer = Arc::clone(&self.reducer);
        self.store.update(move |state| reducer(state, action))
    }

    /// The underlying store.
    pub fn store(&self) -> &Store<S> {
        &self.store
    }
}

impl<S: ShallowMerge, A> Clone for ReducerStore<S, A> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            reducer: Arc::clone(&self.reducer),
        }
    }
}

impl<S: ShallowMerge, A> fmt::Debug for ReducerStore<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReducerStore")
            .field("store", &self.store)
            .finish()
    }
}

impl<S, A> ExternalStore for ReducerStore<S, A>
where
    S: ShallowMerge + Send + Sync + 'static,
    S::Partial: Send + 'static,
    A: Send + 'static,
{
    type State = S;
    type Subscription = Subscription<S>;

    fn get_state(&self) -> Arc<S> {
        self.store.get_state()
    }

    fn set_state(&self, partial: S::Partial) -> Result<()> {
        self.store.set_state(partial)
    }

    fn subscribe<F>(&self, listener: F) -> Subscription<S>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.store.subscribe(listener)
    }

    fn same_store(&self, other: &Self) -> bool {
        self.store.ptr_eq(&other.store)
    }
}

/// Produces [`ReducerStore`]s sharing one reducer but no state.
pub struct ReducerFactory<S: ShallowMerge, A> {
    reducer: Reducer<S, A>,
    config: StoreConfig,
}

impl<S, A> ReducerFactory<S, A>
where
    S: ShallowMerge + Send + Sync + 'static,
    S::Partial: Send + 'static,
    A: Send + 'static,
{
    pub fn new<R>(reducer: R) -> Self
    where
        R: Fn(&S, A) -> S::Partial + Send + Sync + 'static,
    {
        Self {
            reducer: Arc::new(reducer),
            config: StoreConfig::default(),
        }
    }

    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }
}

impl<S, A> StoreFactory<S> for ReducerFactory<S, A>
where
    S: ShallowMerge + Send + Sync + 'static,
    S::Partial: Send + 'static,
    A: Send + 'static,
{
    type Store = ReducerStore<S, A>;

    fn create(&self, initial: S) -> ReducerStore<S, A> {
        ReducerStore {
            store: Store::with_config(initial, self.config.clone()),
            reducer: Arc::clone(&self.reducer),
        }
    }
}
