//! Error types for store, registry and notification failures.

use std::fmt;

use thiserror::Error;

use crate::store::ListenerId;

/// Errors surfaced by stores and scope registries.
///
/// Selector failures are not represented here: a fallible selector's own
/// error type is returned unchanged from
/// [`Binding::get_snapshot`](crate::Binding::get_snapshot).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    // Registry errors
    #[error("No store is bound to scope {scope}")]
    NotBound { scope: String },

    #[error("Scope {scope} is already bound to a different store")]
    DuplicateScope { scope: String },

    // Notification errors
    #[error("{} listener(s) panicked during notification", failures.len())]
    ListenerPanicked { failures: Vec<ListenerFailure> },
}

impl StoreError {
    pub(crate) fn not_bound(scope: &impl fmt::Debug) -> Self {
        StoreError::NotBound {
            scope: format!("{scope:?}"),
        }
    }

    pub(crate) fn duplicate_scope(scope: &impl fmt::Debug) -> Self {
        StoreError::DuplicateScope {
            scope: format!("{scope:?}"),
        }
    }
}

/// A listener that panicked while being notified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerFailure {
    pub listener: ListenerId,
    /// Store version the listener was being notified about.
    pub version: u64,
    pub message: String,
}

impl fmt::Display for ListenerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "listener {} panicked at version {}: {}",
            self.listener, self.version, self.message
        )
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
