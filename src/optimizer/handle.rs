//! Background run handle.

use super::result::OptimizationResult;
use crate::error::Result;
use crate::progress::{CancelToken, Progress, ProgressSnapshot};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Handle to an optimization running on a background thread.
///
/// Dropping the handle detaches the run; it keeps going until it finishes
/// on its own.
pub struct RunHandle {
    progress: Arc<Progress>,
    cancel: CancelToken,
    thread: JoinHandle<Result<OptimizationResult>>,
}

impl RunHandle {
    pub(crate) fn new(
        progress: Arc<Progress>,
        cancel: CancelToken,
        thread: JoinHandle<Result<OptimizationResult>>,
    ) -> Self {
        Self {
            progress,
            cancel,
            thread,
        }
    }

    /// Current phase, status, and best score.
    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    /// Requests a cooperative stop. Chains finish their current iteration
    /// and the refiner its current generation before returning.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Blocks until the run ends.
    ///
    /// A panic on the worker thread is resumed on the caller's thread.
    pub fn join(self) -> Result<OptimizationResult> {
        match self.thread.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}
