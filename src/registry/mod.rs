//! Scope-keyed store instances.
//!
//! A [`ScopeRegistry`] answers "which store does this consumer read?" for a
//! scope handle passed down explicitly, so independent consumer groups can
//! hold independent stores without a process-wide default.

mod registry;

pub use registry::{ScopeGuard, ScopeRegistry};
