//! Process-wide admission gate engaged by watch queries.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Observable state of the [`WatchLock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Admissions are accepted.
    Open,
    /// A watch is active; admissions are rejected until it is cancelled.
    Locked,
}

/// Shared flag consulted on every admission.
///
/// A query admitted concurrently with the lock engaging may slip through;
/// the gate only needs to stop the stream of admissions, not a single racer.
#[derive(Debug, Clone, Default)]
pub struct WatchLock {
    engaged: Arc<AtomicBool>,
}

impl WatchLock {
    /// Builds an open lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves to [`WatchState::Locked`]. Returns true if the lock was open.
    pub fn engage(&self) -> bool {
        !self.engaged.swap(true, Ordering::SeqCst)
    }

    /// Moves to [`WatchState::Open`]. Returns true if the lock was engaged.
    pub fn release(&self) -> bool {
        self.engaged.swap(false, Ordering::SeqCst)
    }

    /// Returns true while a watch is active.
    #[must_use]
    pub fn is_engaged(&self) -> bool {
        self.engaged.load(Ordering::SeqCst)
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> WatchState {
        if self.is_engaged() {
            WatchState::Locked
        } else {
            WatchState::Open
        }
    }
}
