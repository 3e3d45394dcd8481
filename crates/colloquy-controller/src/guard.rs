use colloquy_store::{Mutation, Store, StreamTarget};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Admission for assistant replies sent through one controller
///
/// At most one reply, atomic or streamed, is in flight across all threads.
/// The permit releases the slot when dropped. Controllers sharing a store
/// are kept apart by the store's single streaming target.
#[derive(Debug, Clone, Default)]
pub struct ReplySlot {
    held: Arc<AtomicBool>,
}

impl ReplySlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<ReplyPermit> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ReplyPermit {
                held: Arc::clone(&self.held),
            })
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct ReplyPermit {
    held: Arc<AtomicBool>,
}

impl Drop for ReplyPermit {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
    }
}

/// Counts flows that want `loading` set; the flag drops when the last one ends
#[derive(Debug, Clone, Default)]
pub(crate) struct LoadingTracker {
    active: Arc<Mutex<usize>>,
}

impl LoadingTracker {
    pub(crate) fn begin(&self, store: &Store) -> LoadingGuard {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        *active += 1;
        store.apply(Mutation::SetLoading(true));
        LoadingGuard {
            active: Arc::clone(&self.active),
            store: store.clone(),
        }
    }
}

pub(crate) struct LoadingGuard {
    active: Arc<Mutex<usize>>,
    store: Store,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        *active = active.saturating_sub(1);
        if *active == 0 {
            self.store.apply(Mutation::SetLoading(false));
        }
    }
}

/// Holds `typing` true for the guard's lifetime
pub(crate) struct TypingGuard {
    store: Store,
}

impl TypingGuard {
    pub(crate) fn begin(store: &Store) -> Self {
        store.apply(Mutation::SetTyping(true));
        Self {
            store: store.clone(),
        }
    }
}

impl Drop for TypingGuard {
    fn drop(&mut self) {
        self.store.apply(Mutation::SetTyping(false));
    }
}

/// Seals the streaming target it opened when dropped
pub(crate) struct StreamTargetGuard {
    store: Store,
    target: StreamTarget,
}

impl StreamTargetGuard {
    pub(crate) fn new(store: &Store, target: StreamTarget) -> Self {
        Self {
            store: store.clone(),
            target,
        }
    }
}

impl Drop for StreamTargetGuard {
    fn drop(&mut self) {
        self.store.apply(Mutation::EndStream(self.target));
    }
}
