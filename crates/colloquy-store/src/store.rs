use colloquy_types::{Result, Timestamp};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::clock::{Clock, SystemClock};
use crate::mutation::Mutation;
use crate::state::ChatState;

/// Shared handle to the conversation state
///
/// Constructed once and cloned into whatever needs it; clones share the same
/// state. Locks are never held across an `.await`, so a blocking lock is fine
/// and lets mutations run from synchronous callbacks and drop guards.
#[derive(Clone)]
pub struct Store {
    state: Arc<RwLock<ChatState>>,
    clock: Arc<dyn Clock>,
}

impl Store {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::from_state(ChatState::default(), clock)
    }

    pub fn from_state(state: ChatState, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
            clock,
        }
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Apply a mutation and report whether it took effect
    pub fn commit(&self, mutation: Mutation) -> Result<()> {
        let name = mutation.name();
        let now = self.clock.now();
        let result = self.write().apply(mutation, now);
        match &result {
            Ok(()) => tracing::trace!(mutation = name, "applied"),
            Err(e) => tracing::debug!(mutation = name, error = %e, "rejected"),
        }
        result
    }

    /// Apply a mutation, treating stale references as silent no-ops
    pub fn apply(&self, mutation: Mutation) {
        let name = mutation.name();
        if let Err(e) = self.commit(mutation) {
            if !e.is_not_found() {
                tracing::warn!(mutation = name, error = %e, "mutation refused");
            }
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&ChatState) -> R) -> R {
        f(&self.read_guard())
    }

    pub fn snapshot(&self) -> ChatState {
        self.read_guard().clone()
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, ChatState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ChatState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("state", &*self.read_guard())
            .finish()
    }
}
