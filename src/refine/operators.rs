//! Variation and parent selection operators.

use crate::layout::Layout;
use rand::Rng;
use std::cmp::Ordering;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Granularity of placement exchange between two parents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CrossoverKind {
    /// Buildings before a random cut come from the first parent, the rest
    /// from the second.
    SinglePoint,
    /// Each building comes from either parent with probability ½.
    #[default]
    Uniform,
}

/// Combines two parents into one child.
///
/// Parents come from the same site, so building `i` has the same type in
/// both and the child stays index-stable. Only position and orientation
/// are inherited; area and aspect ratio stay those of `a`.
pub fn crossover<R: Rng>(a: &Layout, b: &Layout, kind: CrossoverKind, rng: &mut R) -> Layout {
    let mut child = a.clone();
    let n = a.len().min(b.len());
    if n == 0 {
        return child;
    }
    match kind {
        CrossoverKind::SinglePoint => {
            if n < 2 {
                return child;
            }
            let cut = rng.random_range(1..n);
            for i in cut..n {
                child.inherit_placement(i, b);
            }
        }
        CrossoverKind::Uniform => {
            for i in 0..n {
                if rng.random_bool(0.5) {
                    child.inherit_placement(i, b);
                }
            }
        }
    }
    child.refresh_roads();
    child
}

/// What binary tournaments compare: total violation, then rank, then
/// perpendicular distance to the member's reference direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TournamentKey {
    pub violation: f64,
    pub rank: usize,
    pub distance: f64,
}

impl TournamentKey {
    pub fn compare(&self, other: &TournamentKey) -> Ordering {
        self.violation
            .total_cmp(&other.violation)
            .then(self.rank.cmp(&other.rank))
            .then(self.distance.total_cmp(&other.distance))
    }
}

/// Binary tournament; returns the index of the winner. Ties go to the
/// first contestant.
pub fn binary_tournament<R: Rng>(keys: &[TournamentKey], rng: &mut R) -> usize {
    let n = keys.len();
    let i = rng.random_range(0..n);
    let j = rng.random_range(0..n);
    if keys[j].compare(&keys[i]).is_lt() {
        j
    } else {
        i
    }
}
