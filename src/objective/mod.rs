//! Objective and constraint model.
//!
//! - [`ObjectiveProfile`]: validated weights over the closed set of
//!   [`ObjectiveKind`]s
//! - [`Evaluator`]: pure layout → ([`ObjectiveVector`], [`ConstraintVector`])
//!   function plus the penalized scalarization used by annealing
//! - [`Candidate`]: a layout bundled with its evaluation and score

mod evaluator;
mod profile;

pub use evaluator::{
    AdjacencyRules, ConstraintKind, ConstraintVector, Evaluation, Evaluator, EvaluatorParams,
    ObjectiveVector,
};
pub use profile::{ObjectiveKind, ObjectiveProfile};

use crate::layout::Layout;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An evaluated layout.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Candidate {
    pub layout: Layout,
    pub evaluation: Evaluation,
    /// Scalarized score under the run's profile. Lower is better.
    pub score: f64,
}

impl Candidate {
    /// Evaluates and scores `layout`.
    pub fn evaluate(
        layout: Layout,
        evaluator: &Evaluator,
        profile: &ObjectiveProfile,
    ) -> crate::Result<Self> {
        let evaluation = evaluator.evaluate(&layout)?;
        let score = evaluator.scalarize(&evaluation, profile);
        Ok(Self {
            layout,
            evaluation,
            score,
        })
    }

    pub fn is_feasible(&self) -> bool {
        self.evaluation.is_feasible()
    }

    /// Total order used to pick "the best" candidate: score, then total
    /// violation.
    pub fn compare(&self, other: &Candidate) -> std::cmp::Ordering {
        self.score
            .total_cmp(&other.score)
            .then(
                self.evaluation
                    .total_violation()
                    .total_cmp(&other.evaluation.total_violation()),
            )
    }
}
