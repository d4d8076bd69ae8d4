use std::any::Any;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use tracing::{trace, warn};

use super::config::{Reentrancy, StoreConfig};
use super::merge::ShallowMerge;
use super::{ExternalStore, Unsubscribe};
use crate::error::{ListenerFailure, Result, StoreError};

type Listener = Arc<dyn Fn() + Send + Sync>;
type Update<S> = Box<dyn FnOnce(&S) -> <S as ShallowMerge>::Partial + Send>;

/// Identifies one registration in a store's listener set.
///
/// Ids are allocated in increasing order, so ordering by id is
/// registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub(crate) u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The notification pass currently running on a store.
struct Pass {
    owner: ThreadId,
    depth: usize,
}

struct Inner<S: ShallowMerge> {
    state: Arc<S>,
    version: u64,
    listeners: BTreeMap<ListenerId, Listener>,
    next_listener: u64,
    pass: Option<Pass>,
    pending: VecDeque<Update<S>>,
}

struct Shared<S: ShallowMerge> {
    inner: Mutex<Inner<S>>,
    config: StoreConfig,
}

/// A thread-safe store holding one immutable-per-version state value.
///
/// Every write builds a new `Arc<S>` by shallow-merging a partial update into
/// the current state, commits it, and then synchronously calls each listener
/// in registration order. A listener that reads the store during
/// notification sees the state that triggered it (or a newer one, see
/// [`Reentrancy::Nested`]).
///
/// `Store` is a handle: clones share state and listeners. Two stores
/// created separately never observe each other's writes.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use snapstore::{state_map, Store};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let store = Store::new(state_map(json!({ "count": 0 })));
/// let calls = Arc::new(AtomicUsize::new(0));
///
/// let subscription = store.subscribe({
///     let calls = calls.clone();
///     move || {
///         calls.fetch_add(1, Ordering::SeqCst);
///     }
/// });
///
/// store.set_state(state_map(json!({ "count": 1 }))).unwrap();
/// assert_eq!(store.get_state()["count"], json!(1));
/// assert_eq!(calls.load(Ordering::SeqCst), 1);
///
/// subscription.unsubscribe();
/// store.set_state(state_map(json!({ "count": 2 }))).unwrap();
/// assert_eq!(calls.load(Ordering::SeqCst), 1);
/// ```
pub struct Store<S: ShallowMerge> {
    shared: Arc<Shared<S>>,
}

impl<S> Store<S>
where
    S: ShallowMerge + Send + Sync + 'static,
    S::Partial: Send + 'static,
{
    /// Create a new store with the given initial state.
    pub fn new(initial: S) -> Self {
        Self::with_config(initial, StoreConfig::default())
    }

    /// Create a new store with explicit settings.
    pub fn with_config(initial: S, config: StoreConfig) -> Self {
        trace!(store = config.label(), "store created");
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: Arc::new(initial),
                    version: 0,
                    listeners: BTreeMap::new(),
                    next_listener: 0,
                    pass: None,
                    pending: VecDeque::new(),
                }),
                config,
            }),
        }
    }

    /// Get the current state.
    pub fn get_state(&self) -> Arc<S> {
        Arc::clone(&self.shared.inner.lock().state)
    }

    /// Read the current state with a function.
    ///
    /// `f` runs against the snapshot current at the call, with the store
    /// unlocked, so it may write to this store.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&S) -> R,
    {
        let state = self.get_state();
        f(&state)
    }

    /// Merge `partial` into the current state and notify every listener.
    ///
    /// With no notification pass running, the write is committed and every
    /// listener has run when this returns. A write issued while a pass is
    /// running is queued instead and this returns `Ok(())` at once: the
    /// thread running the pass applies it before its own call returns and
    /// receives any listener failures it causes. This covers writes from a
    /// listener under [`Reentrancy::Queue`] and writes from other threads.
    /// Writers never block on another thread's pass.
    ///
    /// Returns [`StoreError::ListenerPanicked`] if a listener panicked in a
    /// pass this call ran; those writes are committed regardless. A panicking
    /// merge or `update` closure unwinds out of the call running the pass,
    /// after the rest of the queue has been applied.
    pub fn set_state(&self, partial: S::Partial) -> Result<()> {
        self.apply(Box::new(move |_: &S| partial))
    }

    /// Compute a partial update from the state it will be merged into.
    ///
    /// Queued and reported like [`set_state`](Store::set_state). When the
    /// write is queued behind a running notification, `f` sees the state
    /// current at the time the write is applied, not at the time of the
    /// call. `f` must not write to this store.
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&S) -> S::Partial + Send + 'static,
    {
        self.apply(Box::new(f))
    }

    /// Subscribe to state changes.
    ///
    /// The listener is called with no arguments after every committed write
    /// until the returned [`Subscription`] is unsubscribed or dropped.
    pub fn subscribe<F>(&self, listener: F) -> Subscription<S>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut inner = self.shared.inner.lock();
        let id = ListenerId(inner.next_listener);
        inner.next_listener += 1;
        inner.listeners.insert(id, Arc::new(listener));
        trace!(store = self.label(), listener = %id, "listener subscribed");

        Subscription {
            store: Arc::downgrade(&self.shared),
            id,
        }
    }

    /// Number of writes committed since construction.
    pub fn version(&self) -> u64 {
        self.shared.inner.lock().version
    }

    pub fn listener_count(&self) -> usize {
        self.shared.inner.lock().listeners.len()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.shared.config
    }

    /// Whether both handles refer to the same store instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    fn label(&self) -> &str {
        self.shared.config.label()
    }

    fn apply(&self, update: Update<S>) -> Result<()> {
        let me = thread::current().id();
        let reentrancy = self.shared.config.reentrancy;
        let nested = {
            let mut inner = self.shared.inner.lock();
            let nest = inner
                .pass
                .as_ref()
                .map(|pass| pass.owner == me && reentrancy == Reentrancy::Nested);
            match nest {
                Some(true) => {
                    if let Some(pass) = inner.pass.as_mut() {
                        pass.depth += 1;
                    }
                    Some(update)
                }
                Some(false) => {
                    inner.pending.push_back(update);
                    trace!(
                        store = self.label(),
                        queued = inner.pending.len(),
                        "write queued behind running notification"
                    );
                    return Ok(());
                }
                None => {
                    inner.pass = Some(Pass {
                        owner: me,
                        depth: 1,
                    });
                    inner.pending.push_back(update);
                    None
                }
            }
        };

        let mut pass = PassGuard {
            shared: &self.shared,
            open: true,
        };
        let mut failures = Vec::new();

        match nested {
            Some(update) => {
                self.commit_and_notify(update, &mut failures);
                pass.leave_nested();
            }
            None => {
                let mut unwound = None;
                while let Some(update) = pass.next_queued() {
                    let applied = panic::catch_unwind(AssertUnwindSafe(|| {
                        self.commit_and_notify(update, &mut failures)
                    }));
                    if let Err(payload) = applied {
                        warn!(
                            store = self.label(),
                            message = %panic_message(payload.as_ref()),
                            "write panicked before commit"
                        );
                        unwound.get_or_insert(payload);
                    }
                }
                if let Some(payload) = unwound {
                    panic::resume_unwind(payload);
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(StoreError::ListenerPanicked { failures })
        }
    }

    fn commit_and_notify(&self, update: Update<S>, failures: &mut Vec<ListenerFailure>) {
        // Only the pass owner commits, so the state cannot move between
        // this read and the commit below.
        let current = self.get_state();
        let next = Arc::new(current.merge(update(&*current)));

        let (version, listeners) = {
            let mut inner = self.shared.inner.lock();
            inner.state = next;
            inner.version += 1;
            let listeners: Vec<(ListenerId, Listener)> = inner
                .listeners
                .iter()
                .map(|(id, listener)| (*id, Arc::clone(listener)))
                .collect();
            (inner.version, listeners)
        };
        trace!(
            store = self.label(),
            version,
            listeners = listeners.len(),
            "state committed"
        );

        for (id, listener) in listeners {
            // Removed earlier in this pass.
            if !self.is_subscribed(id) {
                continue;
            }
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener())) {
                let message = panic_message(payload.as_ref());
                warn!(
                    store = self.label(),
                    listener = %id,
                    version,
                    %message,
                    "listener panicked"
                );
                failures.push(ListenerFailure {
                    listener: id,
                    version,
                    message,
                });
            }
        }
    }

    fn is_subscribed(&self, id: ListenerId) -> bool {
        self.shared.inner.lock().listeners.contains_key(&id)
    }
}

/// Ends the pass it was opened for, also when a nested merge unwinds.
struct PassGuard<'a, S: ShallowMerge> {
    shared: &'a Shared<S>,
    open: bool,
}

impl<S: ShallowMerge> PassGuard<'_, S> {
    /// Pop the next queued write, closing the pass once the queue is empty.
    fn next_queued(&mut self) -> Option<Update<S>> {
        let mut inner = self.shared.inner.lock();
        let next = inner.pending.pop_front();
        if next.is_none() {
            inner.pass = None;
            self.open = false;
        }
        next
    }

    fn leave_nested(&mut self) {
        let mut inner = self.shared.inner.lock();
        if let Some(pass) = inner.pass.as_mut() {
            pass.depth -= 1;
        }
        self.open = false;
    }
}

impl<S: ShallowMerge> Drop for PassGuard<'_, S> {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        let mut inner = self.shared.inner.lock();
        match inner.pass.as_mut() {
            Some(pass) if pass.depth > 1 => pass.depth -= 1,
            _ => inner.pass = None,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl<S: ShallowMerge> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S> Default for Store<S>
where
    S: ShallowMerge + Default + Send + Sync + 'static,
    S::Partial: Send + 'static,
{
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S: ShallowMerge> fmt::Debug for Store<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.inner.lock();
        f.debug_struct("Store")
            .field("name", &self.shared.config.name)
            .field("version", &inner.version)
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}

impl<S> ExternalStore for Store<S>
where
    S: ShallowMerge + Send + Sync + 'static,
    S::Partial: Send + 'static,
{
    type State = S;
    type Subscription = Subscription<S>;

    fn get_state(&self) -> Arc<S> {
        Store::get_state(self)
    }

    fn set_state(&self, partial: S::Partial) -> Result<()> {
        Store::set_state(self, partial)
    }

    fn subscribe<F>(&self, listener: F) -> Subscription<S>
    where
        F: Fn() + Send + Sync + 'static,
    {
        Store::subscribe(self, listener)
    }

    fn same_store(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

/// RAII guard for a store listener.
///
/// Dropping the guard unsubscribes. [`unsubscribe`](Subscription::unsubscribe)
/// may be called any number of times, including from inside a listener
/// while the store is notifying.
#[must_use = "dropping a Subscription unsubscribes its listener"]
pub struct Subscription<S: ShallowMerge> {
    store: Weak<Shared<S>>,
    id: ListenerId,
}

impl<S: ShallowMerge> Subscription<S> {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Remove the listener. Later calls are no-ops.
    pub fn unsubscribe(&self) {
        let Some(shared) = self.store.upgrade() else {
            return;
        };
        // Drop the listener after the lock is released: its captures may
        // hold subscriptions to this store.
        let removed = shared.inner.lock().listeners.remove(&self.id);
        if removed.is_some() {
            trace!(
                store = shared.config.label(),
                listener = %self.id,
                "listener unsubscribed"
            );
        }
    }

    /// Keep the listener registered for the lifetime of the store.
    pub fn detach(mut self) {
        self.store = Weak::new();
    }
}

impl<S: ShallowMerge> Unsubscribe for Subscription<S> {
    fn unsubscribe(&self) {
        Subscription::unsubscribe(self);
    }
}

impl<S: ShallowMerge> Drop for Subscription<S> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl<S: ShallowMerge> fmt::Debug for Subscription<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
