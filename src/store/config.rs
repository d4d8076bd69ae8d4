/// What happens when `set_state` is called while the same store is
/// already notifying listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reentrancy {
    /// Append the write to a FIFO applied after the running pass completes.
    ///
    /// Every listener sees each committed version exactly once, in commit
    /// order. The re-entrant call returns before its write is visible.
    #[default]
    Queue,
    /// Commit and notify immediately from inside the running pass.
    ///
    /// Listeners later in the outer pass observe the newer state when they
    /// read. Writes from threads other than the one driving the pass are
    /// still queued.
    Nested,
}

/// Construction-time settings for a [`Store`](crate::Store).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreConfig {
    /// Name attached to the store's tracing events.
    pub name: Option<String>,
    pub reentrancy: Reentrancy,
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_reentrancy(mut self, reentrancy: Reentrancy) -> Self {
        self.reentrancy = reentrancy;
        self
    }

    /// The configured name, or `"anonymous"`.
    pub(crate) fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("anonymous")
    }
}
