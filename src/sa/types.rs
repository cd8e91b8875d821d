//! Chain state machine types.

use crate::objective::Candidate;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Lifecycle of an annealing chain.
///
/// `Initializing → Running → Converged | Exhausted | Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ChainState {
    /// No current layout yet.
    Initializing,
    /// Iterating.
    Running,
    /// Temperature dropped to `final_temp`.
    Converged,
    /// `max_iterations` reached first.
    Exhausted,
    /// Stopped early by an external signal after finishing an iteration.
    Cancelled,
}

impl ChainState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ChainState::Converged | ChainState::Exhausted | ChainState::Cancelled
        )
    }
}

/// Per-chain mutable search state. Owned by exactly one chain.
#[derive(Debug, Clone)]
pub struct AnnealingState {
    pub current: Candidate,
    pub best: Candidate,
    pub temperature: f64,
    pub iteration: usize,
}

/// Output of one annealing chain.
#[derive(Debug, Clone)]
pub struct ChainResult {
    /// Position of the chain within its coordinator.
    pub chain_index: usize,

    /// Seed of the chain's random stream.
    pub seed: u64,

    /// Terminal state.
    pub state: ChainState,

    /// Best layout seen over the run.
    pub best: Candidate,

    /// Iterations executed.
    pub iterations: usize,

    /// Temperature when the chain stopped.
    pub final_temperature: f64,

    /// Accepted moves (including improvements).
    pub accepted_moves: usize,

    /// Strictly improving moves.
    pub improving_moves: usize,

    /// Proposals where the operator gave up and left the layout unchanged.
    pub noop_moves: usize,

    /// Proposals dropped because evaluation was not finite.
    pub discarded: usize,

    /// Buildings the initial layout could not place cleanly.
    pub failed_placements: usize,

    /// Current layout sampled every `trajectory_interval` iterations.
    pub trajectory: Vec<Candidate>,

    /// Best score after every iteration (index 0 = initial layout).
    pub cost_history: Vec<f64>,

    /// Temperature after every iteration (index 0 = initial temperature).
    pub temperature_history: Vec<f64>,
}
