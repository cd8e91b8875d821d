//! Run output types.

use crate::error::Warning;
use crate::layout::Layout;
use crate::objective::{Candidate, ConstraintVector, ObjectiveKind, ObjectiveVector};
use crate::refine::Member;
use crate::sa::ChainState;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One layout of the returned Pareto front.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParetoMember {
    pub layout: Layout,
    pub objectives: ObjectiveVector,
    pub constraints: ConstraintVector,
    /// Always 0 for members of the returned front.
    pub rank: usize,
    /// Final-population members sharing this member's reference direction.
    pub niche_count: usize,
    /// Index of the associated reference direction.
    pub reference: usize,
    /// Perpendicular distance to that direction in normalized objective space.
    pub distance: f64,
    /// Scalarized score under the run's profile.
    pub score: f64,
}

impl ParetoMember {
    pub fn is_feasible(&self) -> bool {
        self.constraints.is_feasible()
    }
}

impl From<Member> for ParetoMember {
    fn from(m: Member) -> Self {
        Self {
            layout: m.candidate.layout,
            objectives: m.candidate.evaluation.objectives,
            constraints: m.candidate.evaluation.constraints,
            rank: m.rank,
            niche_count: m.niche_count,
            reference: m.association.reference,
            distance: m.association.distance,
            score: m.candidate.score,
        }
    }
}

/// What is needed to reproduce or audit a run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunMetadata {
    /// Master seed actually used.
    pub master_seed: u64,
    /// Seed of each annealing chain, by chain index.
    pub chain_seeds: Vec<u64>,
    /// Das–Dennis partitions (ignored when `two_layer` is set).
    pub n_partitions: usize,
    /// `(outer, inner)` partitions of a two-layer reference set.
    pub two_layer: Option<(usize, usize)>,
    /// Number of reference directions generated.
    pub reference_directions: usize,
    /// Objectives ranked by the refiner.
    pub active_objectives: Vec<ObjectiveKind>,
    /// Terminal state of each chain that produced a result.
    pub chain_states: Vec<ChainState>,
    /// Annealing iterations across all chains.
    pub annealing_iterations: usize,
    /// Refiner generations completed.
    pub generations: usize,
}

/// Final output of an optimization run.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OptimizationResult {
    /// Rank-0 layouts of the final population, sorted by active objectives.
    pub front: Vec<ParetoMember>,
    /// Best scalarized layout found by annealing.
    pub sa_best: Candidate,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
    pub metadata: RunMetadata,
    pub warnings: Vec<Warning>,
    /// Whether the run stopped early on cancellation or time limit.
    pub cancelled: bool,
}

impl OptimizationResult {
    /// The front member with the lowest scalarized score.
    pub fn best(&self) -> Option<&ParetoMember> {
        self.front.iter().min_by(|a, b| a.score.total_cmp(&b.score))
    }

    pub fn has_warning(&self, pred: impl Fn(&Warning) -> bool) -> bool {
        self.warnings.iter().any(pred)
    }
}
