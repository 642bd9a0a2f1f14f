//! Exactly-once shutdown latch

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Result, ServeError};

/// Compare-and-set latch guarding the composite shutdown
///
/// Exactly one caller ever acquires the latch, even under concurrent
/// invocation; every later call observes [`ServeError::AlreadyClosed`].
/// One instance guards a server for its whole lifetime.
#[derive(Debug, Default)]
pub struct ShutdownGuard {
    done: AtomicBool,
}

impl ShutdownGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the right to run the guarded shutdown.
    pub fn try_acquire(&self) -> Result<()> {
        if self
            .done
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            Ok(())
        } else {
            Err(ServeError::AlreadyClosed)
        }
    }

    /// Whether the guarded shutdown has been claimed.
    pub fn has_run(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }
}
