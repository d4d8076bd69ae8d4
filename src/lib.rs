//! # Snapstore
//!
//! External state stores with selector snapshots for Rust.
//!
//! Snapstore keeps application state outside the code that renders it and
//! gives that code a consistent way to read and follow it:
//!
//! ## Stores
//!
//! - `Store<S>` - Thread-safe owner of one immutable-per-version state value
//! - Synchronous notification after every committed write
//! - Configurable handling of writes issued from inside listeners
//! - `ReducerStore<S, A>` - The same protocol driven by dispatched actions
//!
//! ## Selectors
//!
//! - `Binding` - A store plus a selector, exposing `subscribe` and `get_snapshot`
//! - Snapshots keep their identity while the selected value is unchanged
//! - `SyncedSnapshot` - Calls back only when a binding's snapshot changes
//!
//! ## Scopes
//!
//! - `ScopeRegistry<K, St>` - Explicit, scope-keyed store instances with no
//!   global default

pub mod error;
pub mod registry;
pub mod selector;
pub mod store;

// Re-export main types for convenience
pub use error::{ListenerFailure, Result, StoreError};
pub use registry::{ScopeGuard, ScopeRegistry};
pub use selector::{bind, bind_with, try_bind, try_bind_with, Binding, SyncedSnapshot};
pub use store::{
    create_store, state_map, ExternalStore, ListenerId, Reentrancy, ReducerFactory, ReducerStore,
    ShallowMerge, StateMap, Store, StoreConfig, StoreFactory, Subscription, Unsubscribe,
};
