use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::selector::{bind, Binding};
use crate::store::ExternalStore;

/// Maps scope handles to store instances.
///
/// The registry is a cheap `Clone` handle; pass it to the code that needs
/// to resolve stores. While a scope is registered, every
/// [`resolve`](ScopeRegistry::resolve) returns the same store instance.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use snapstore::{create_store, state_map, ScopeRegistry, StateMap, Store, StoreError};
///
/// let registry: ScopeRegistry<&str, Store<StateMap>> = ScopeRegistry::new();
/// assert!(matches!(
///     registry.resolve(&"sidebar"),
///     Err(StoreError::NotBound { .. })
/// ));
///
/// let store = create_store(state_map(json!({ "open": true })));
/// registry.register("sidebar", store.clone()).unwrap();
/// assert!(registry.resolve(&"sidebar").unwrap().ptr_eq(&store));
/// ```
pub struct ScopeRegistry<K, St> {
    entries: Arc<RwLock<HashMap<K, St>>>,
}

impl<K, St> ScopeRegistry<K, St>
where
    K: Eq + Hash + Clone + fmt::Debug,
    St: ExternalStore,
{
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Bind `store` to `scope`.
    ///
    /// Registering the store already bound to `scope` again is a no-op;
    /// registering a different one fails with
    /// [`StoreError::DuplicateScope`].
    pub fn register(&self, scope: K, store: St) -> Result<()> {
        self.insert(scope, store).map(|_| ())
    }

    /// The store bound to `scope`, or [`StoreError::NotBound`].
    pub fn resolve(&self, scope: &K) -> Result<St> {
        self.entries
            .read()
            .get(scope)
            .cloned()
            .ok_or_else(|| StoreError::not_bound(scope))
    }

    /// Unbind `scope`, returning its store.
    ///
    /// Listeners are not notified. The store itself lives on while other
    /// handles to it exist.
    pub fn release(&self, scope: &K) -> Option<St> {
        let released = self.entries.write().remove(scope);
        if released.is_some() {
            debug!(scope = ?scope, "store released");
        }
        released
    }

    /// Register `store` under `scope` until the returned guard is dropped.
    ///
    /// If `scope` is already bound to `store`, the guard leaves that
    /// registration in place when dropped.
    pub fn provide(&self, scope: K, store: St) -> Result<ScopeGuard<K, St>> {
        let owned = self.insert(scope.clone(), store.clone())?;
        Ok(ScopeGuard {
            registry: self.clone(),
            scope,
            store,
            owned,
        })
    }

    /// Run `f` with `store` bound to `scope`, releasing it afterwards.
    pub fn with_scope<F, R>(&self, scope: K, store: St, f: F) -> Result<R>
    where
        F: FnOnce(&St) -> R,
    {
        let guard = self.provide(scope, store)?;
        Ok(f(guard.store()))
    }

    /// Resolve `scope` and bind `selector` to its store.
    pub fn bind<T, F>(&self, scope: &K, selector: F) -> Result<Binding<St, T>>
    where
        T: PartialEq + Send + Sync + 'static,
        F: Fn(&St::State) -> T + Send + Sync + 'static,
    {
        Ok(bind(self.resolve(scope)?, selector))
    }

    pub fn contains(&self, scope: &K) -> bool {
        self.entries.read().contains_key(scope)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Currently bound scopes, in no particular order.
    pub fn scopes(&self) -> Vec<K> {
        self.entries.read().keys().cloned().collect()
    }

    /// Bind `store` to `scope`, reporting whether a new entry was made.
    fn insert(&self, scope: K, store: St) -> Result<bool> {
        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(&scope) {
            return if existing.same_store(&store) {
                Ok(false)
            } else {
                Err(StoreError::duplicate_scope(&scope))
            };
        }
        debug!(scope = ?scope, "store registered");
        entries.insert(scope, store);
        Ok(true)
    }

    /// Unbind `scope` only if it is still bound to `store`.
    fn release_if_same(&self, scope: &K, store: &St) {
        let mut entries = self.entries.write();
        if entries.get(scope).is_some_and(|bound| bound.same_store(store)) {
            entries.remove(scope);
            debug!(scope = ?scope, "scope closed");
        }
    }
}

impl<K, St> Default for ScopeRegistry<K, St>
where
    K: Eq + Hash + Clone + fmt::Debug,
    St: ExternalStore,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, St> Clone for ScopeRegistry<K, St> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<K: fmt::Debug, St> fmt::Debug for ScopeRegistry<K, St> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeRegistry")
            .field("scopes", &self.entries.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A scope's registration, released when dropped.
///
/// Models the lifetime of a provider: consumers inside it resolve the
/// store, consumers outside get [`StoreError::NotBound`].
pub struct ScopeGuard<K, St>
where
    K: Eq + Hash + Clone + fmt::Debug,
    St: ExternalStore,
{
    registry: ScopeRegistry<K, St>,
    scope: K,
    store: St,
    owned: bool,
}

impl<K, St> ScopeGuard<K, St>
where
    K: Eq + Hash + Clone + fmt::Debug,
    St: ExternalStore,
{
    pub fn scope(&self) -> &K {
        &self.scope
    }

    pub fn store(&self) -> &St {
        &self.store
    }
}

impl<K, St> Drop for ScopeGuard<K, St>
where
    K: Eq + Hash + Clone + fmt::Debug,
    St: ExternalStore,
{
    fn drop(&mut self) {
        if self.owned {
            self.registry.release_if_same(&self.scope, &self.store);
        }
    }
}

impl<K, St> fmt::Debug for ScopeGuard<K, St>
where
    K: Eq + Hash + Clone + fmt::Debug,
    St: ExternalStore,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeGuard")
            .field("scope", &self.scope)
            .finish()
    }
}
