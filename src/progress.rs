//! Shared progress reporting for a running optimization.
//!
//! Workers only ever write monotonic counters and a best-so-far record;
//! none of them read another worker's search state through this type.

use crate::objective::ObjectiveVector;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Cooperative stop signal: an external flag plus an optional deadline.
///
/// Clones share the same flag. Workers poll [`CancelToken::is_cancelled`]
/// between units of work and never stop in the middle of one.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also trips once `limit` has elapsed from now.
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.deadline = Some(Instant::now() + limit);
        self
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.flag.load(Ordering::Relaxed) {
            return true;
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.cancel();
                true
            }
            _ => false,
        }
    }
}

/// Pipeline phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Phase {
    Pending,
    Annealing,
    Refining,
    Finished,
}

/// Overall run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RunStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// Point-in-time copy of [`Progress`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProgressSnapshot {
    pub phase: Phase,
    pub status: RunStatus,
    pub chains_total: usize,
    pub chains_completed: usize,
    /// Annealing iterations completed across all chains.
    pub iterations: usize,
    /// Refiner generations completed.
    pub generation: usize,
    /// Lowest scalarized score recorded so far.
    pub best_score: Option<f64>,
    /// Objectives of the layout with `best_score`.
    pub best_objectives: Option<ObjectiveVector>,
}

/// Thread-safe progress counters.
#[derive(Debug)]
pub struct Progress {
    phase: AtomicU8,
    status: AtomicU8,
    chains_total: AtomicUsize,
    chains_completed: AtomicUsize,
    iterations: AtomicUsize,
    generation: AtomicUsize,
    best: Mutex<Option<(f64, ObjectiveVector)>>,
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress {
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(Phase::Pending as u8),
            status: AtomicU8::new(RunStatus::Running as u8),
            chains_total: AtomicUsize::new(0),
            chains_completed: AtomicUsize::new(0),
            iterations: AtomicUsize::new(0),
            generation: AtomicUsize::new(0),
            best: Mutex::new(None),
        }
    }

    pub fn set_phase(&self, phase: Phase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    pub fn set_status(&self, status: RunStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    pub fn set_chains_total(&self, n: usize) {
        self.chains_total.store(n, Ordering::Relaxed);
    }

    pub fn chain_completed(&self) {
        self.chains_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn iteration_completed(&self) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_generation(&self, generation: usize) {
        self.generation.store(generation, Ordering::Relaxed);
    }

    /// Records `score` if it beats the best so far.
    pub fn record_best(&self, score: f64, objectives: ObjectiveVector) {
        if let Ok(mut best) = self.best.lock() {
            if best.as_ref().is_none_or(|(s, _)| score < *s) {
                *best = Some((score, objectives));
            }
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let best = self.best.lock().ok().and_then(|b| *b);
        ProgressSnapshot {
            phase: match self.phase.load(Ordering::Acquire) {
                0 => Phase::Pending,
                1 => Phase::Annealing,
                2 => Phase::Refining,
                _ => Phase::Finished,
            },
            status: match self.status.load(Ordering::Acquire) {
                0 => RunStatus::Running,
                1 => RunStatus::Completed,
                2 => RunStatus::Cancelled,
                _ => RunStatus::Failed,
            },
            chains_total: self.chains_total.load(Ordering::Relaxed),
            chains_completed: self.chains_completed.load(Ordering::Relaxed),
            iterations: self.iterations.load(Ordering::Relaxed),
            generation: self.generation.load(Ordering::Relaxed),
            best_score: best.map(|(s, _)| s),
            best_objectives: best.map(|(_, o)| o),
        }
    }
}
