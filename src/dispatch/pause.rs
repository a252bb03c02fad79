//! Process-wide pause switch.
//!
//! The surrounding application owns the flag and flips it (in `serve`, on
//! SIGUSR1/SIGUSR2). The dispatcher only reads it, once per exchange.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Read-only view of the pause switch.
pub trait PauseState: Send + Sync {
    /// Whether the broker currently refuses all operations.
    fn is_paused(&self) -> bool;
}

/// Shared atomic pause flag. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct PauseFlag(Arc<AtomicBool>);

impl PauseFlag {
    /// Create a flag with the given initial state.
    pub fn new(paused: bool) -> Self {
        Self(Arc::new(AtomicBool::new(paused)))
    }

    /// Refuse operations from now on.
    pub fn pause(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Accept operations again.
    pub fn resume(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Set the state explicitly.
    pub fn set_paused(&self, paused: bool) {
        self.0.store(paused, Ordering::SeqCst);
    }
}

impl PauseState for PauseFlag {
    fn is_paused(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
