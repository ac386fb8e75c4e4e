// Sequencer lock - guarded event storage shared with the sequencer thread
//
// Everything the real-time thread reads (note channels, control index, id
// table, last tick, track entries) lives inside a SeqLock. The control thread
// can only publish changes while holding the write guard; the sequencer thread
// only ever calls try_read() so it never waits on an editor.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};

/// Read guard handed out by [`SeqLock`]
pub type SeqReadGuard<'a, T> = RwLockReadGuard<'a, T>;

/// Write guard handed out by [`SeqLock`]
pub type SeqWriteGuard<'a, T> = RwLockWriteGuard<'a, T>;

/// Lock-guarded state shared between the control thread and the sequencer
///
/// Poisoning is ignored: a panic while holding the write guard means the
/// index is corrupt anyway, and the sequencer thread must keep running.
#[derive(Debug, Default)]
pub struct SeqLock<T> {
    inner: RwLock<T>,
}

impl<T> SeqLock<T> {
    /// Wrap a value in a new sequencer lock
    pub fn new(value: T) -> Self {
        Self {
            inner: RwLock::new(value),
        }
    }

    /// Acquire shared access (control thread)
    pub fn read(&self) -> SeqReadGuard<'_, T> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquire exclusive access to publish a change
    pub fn write(&self) -> SeqWriteGuard<'_, T> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Non-blocking read for the real-time thread
    ///
    /// Returns `None` while a writer holds the lock.
    pub fn try_read(&self) -> Option<SeqReadGuard<'_, T>> {
        match self.inner.try_read() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }
}
