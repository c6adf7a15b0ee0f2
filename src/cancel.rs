//! Cooperative cancellation for long update runs.
//!
//! The token is a cheap clonable flag. The library never installs signal
//! handlers; the caller flips the flag (e.g. from a SIGINT handler) and the
//! run stops at the next checkpoint with no further disk mutation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Result, SummaryError};

/// Shared cancellation flag, checked between refs, sub-summaries, and
/// directory entries.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Checkpoint: return `Err(Cancelled)` once [`cancel`](Self::cancel) has
    /// been called.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(SummaryError::Cancelled)
        } else {
            Ok(())
        }
    }
}
