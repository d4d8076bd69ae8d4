//! Selector bindings: derived, memoized reads over a store.
//!
//! A [`Binding`] turns a store and a selector into the `subscribe` +
//! `get_snapshot` pair an external synchronization loop consumes.
//! [`SyncedSnapshot`] is such a loop, for consumers that only need a
//! callback when the selected value changes.

mod binding;
mod sync;

pub use binding::{bind, bind_with, try_bind, try_bind_with, Binding};
pub use sync::SyncedSnapshot;
