use std::convert::Infallible;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use super::binding::Binding;
use crate::store::{ExternalStore, Unsubscribe};

/// Keeps a consumer synchronized with a [`Binding`].
///
/// Reads an initial snapshot, subscribes, re-checks once so that a write
/// racing the subscription is not missed, and on every store notification
/// reads again, calling `on_change` only when the snapshot's identity
/// changed. Selector errors are handed to `on_change` as they occur.
/// Dropping the `SyncedSnapshot` unsubscribes.
pub struct SyncedSnapshot<St: ExternalStore, T, E = Infallible> {
    binding: Binding<St, T, E>,
    current: Arc<Mutex<Arc<T>>>,
    subscription: St::Subscription,
}

impl<St, T, E> SyncedSnapshot<St, T, E>
where
    St: ExternalStore,
    T: Send + Sync + 'static,
    E: 'static,
{
    /// Fails with the selector's error if the initial read fails.
    pub fn new<F>(binding: Binding<St, T, E>, on_change: F) -> Result<Self, E>
    where
        F: Fn(Result<Arc<T>, E>) + Send + Sync + 'static,
    {
        let current = Arc::new(Mutex::new(binding.get_snapshot()?));
        let on_change: Arc<dyn Fn(Result<Arc<T>, E>) + Send + Sync> = Arc::new(on_change);

        let subscription = binding.subscribe({
            let binding = binding.clone();
            let current = Arc::clone(&current);
            let on_change = Arc::clone(&on_change);
            move || resync(&binding, &current, &*on_change)
        });

        // A write may have landed between the first read and the subscribe.
        resync(&binding, &current, &*on_change);

        Ok(Self {
            binding,
            current,
            subscription,
        })
    }

    /// The last snapshot delivered to (or read before) `on_change`.
    pub fn current(&self) -> Arc<T> {
        Arc::clone(&self.current.lock())
    }

    pub fn binding(&self) -> &Binding<St, T, E> {
        &self.binding
    }
}

fn resync<St, T, E>(
    binding: &Binding<St, T, E>,
    current: &Mutex<Arc<T>>,
    on_change: &(dyn Fn(Result<Arc<T>, E>) + Send + Sync),
) where
    St: ExternalStore,
    T: Send + Sync + 'static,
    E: 'static,
{
    match binding.get_snapshot() {
        Ok(next) => {
            let changed = {
                let mut current = current.lock();
                if Arc::ptr_eq(&*current, &next) {
                    false
                } else {
                    *current = Arc::clone(&next);
                    true
                }
            };
            if changed {
                on_change(Ok(next));
            } else {
                trace!("snapshot unchanged, skipping resync");
            }
        }
        Err(err) => on_change(Err(err)),
    }
}

impl<St: ExternalStore, T, E> Drop for SyncedSnapshot<St, T, E> {
    fn drop(&mut self) {
        // The listener holds a binding clone, and with it a store handle.
        self.subscription.unsubscribe();
    }
}
