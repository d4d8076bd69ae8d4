//! Stores: owners of one state value plus a listener set.
//!
//! [`ExternalStore`] is the contract bindings and registries are written
//! against. [`Store`] is the standard implementation; [`ReducerStore`]
//! drives the same protocol from dispatched actions. Factories
//! ([`StoreFactory`]) pick the implementation at construction time.

mod config;
mod factory;
mod merge;
mod store;

use std::sync::Arc;

use crate::error::Result;

pub use config::{Reentrancy, StoreConfig};
pub use factory::{create_store, ReducerFactory, ReducerStore, StoreFactory};
pub use merge::{state_map, ShallowMerge, StateMap};
pub use store::{ListenerId, Store, Subscription};

/// A subscribe/read/write contract over a single state value.
///
/// Implementations are cheap `Clone` handles; clones refer to the same
/// instance, which [`same_store`](ExternalStore::same_store) detects.
pub trait ExternalStore: Clone + Send + Sync + 'static {
    type State: ShallowMerge + Send + Sync + 'static;
    type Subscription: Unsubscribe;

    /// The current state. Never blocks on listeners.
    fn get_state(&self) -> Arc<Self::State>;

    /// Shallow-merge `partial` into the state, then notify listeners.
    ///
    /// A write issued while a notification pass is running may be queued
    /// and applied by the thread running that pass; it is then not yet
    /// visible to the caller when this returns `Ok(())`.
    fn set_state(&self, partial: <Self::State as ShallowMerge>::Partial) -> Result<()>;

    /// Register a listener called after every committed write.
    fn subscribe<F>(&self, listener: F) -> Self::Subscription
    where
        F: Fn() + Send + Sync + 'static;

    fn same_store(&self, other: &Self) -> bool;
}

/// Handle that removes one listener registration.
pub trait Unsubscribe {
    /// Remove the registration. Calling this more than once is a no-op.
    fn unsubscribe(&self);
}
