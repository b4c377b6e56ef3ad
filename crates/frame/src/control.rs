//! Progress reporting and cooperative cancellation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Progress sink, called with (done, total) on the worker thread
pub type ProgressFn = Box<dyn FnMut(u64, u64) + Send>;

/// Cancellation flag shared between a running pipeline and its caller
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise or clear the flag
    pub fn set(&self, cancel: bool) {
        self.0.store(cancel, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// How a pack or unpack run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Every frame was processed
    Complete,
    /// Stopped early on request; output up to that point is valid
    Cancelled,
}

impl Completion {
    pub fn is_cancelled(self) -> bool {
        self == Completion::Cancelled
    }
}

/// Per-invocation progress and cancellation state
#[derive(Default)]
pub struct Controller {
    cancel: CancelFlag,
    progress: Option<ProgressFn>,
}

impl Controller {
    /// Create a controller with a fresh flag and no progress sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a progress sink, replacing any previous one
    pub fn set_progress<F>(&mut self, f: F)
    where
        F: FnMut(u64, u64) + Send + 'static,
    {
        self.progress = Some(Box::new(f));
    }

    pub fn clear_progress(&mut self) {
        self.progress = None;
    }

    /// Handle to the flag, for another thread to cancel through
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Forward a progress update to the sink, if one is installed
    pub fn report(&mut self, done: u64, total: u64) {
        if let Some(f) = self.progress.as_mut() {
            f(done, total);
        }
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("cancel", &self.cancel)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}
