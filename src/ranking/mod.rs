//! Pareto ranking and reference-point niching (NSGA-III selection).
//!
//! All objectives are **minimized**.
//!
//! # Algorithms
//!
//! - [`non_dominated_sort`]: Fast non-dominated sorting (Deb et al., 2002)
//! - [`constrained_non_dominated_sort`]: the same under Deb's feasibility rules
//! - [`ReferenceDirections`]: Das–Dennis lattice, optionally two-layer
//! - [`ParetoRanker::select`]: front-by-front filling with niche-preserving
//!   truncation of the last front (Deb & Jain, 2014)
//!
//! # References
//!
//! - Deb et al. (2002), "A Fast and Elitist Multiobjective Genetic Algorithm: NSGA-II"
//! - Deb (2000), "An efficient constraint handling method for genetic algorithms"
//! - Deb & Jain (2014), IEEE Transactions on Evolutionary Computation, 18(4), 577-601

mod niching;
mod reference;

pub use niching::{associate, niche_fill, normalize, Association, NicheTieBreak};
pub use reference::{perpendicular_distance, ReferenceDirections};

use rand::Rng;

/// Result of non-dominated sorting.
///
/// Each element of `ranks` corresponds to the Pareto rank of the solution
/// at the same index. Rank 0 is the Pareto front (non-dominated solutions).
#[derive(Debug, Clone, Default)]
pub struct NondominatedSortResult {
    /// Pareto rank for each solution (0 = front).
    pub ranks: Vec<usize>,

    /// Indices grouped by front: `fronts[0]` contains rank-0 indices, etc.
    pub fronts: Vec<Vec<usize>>,
}

/// Fast non-dominated sorting.
///
/// # Complexity
///
/// O(m * n²) where m = number of objectives, n = number of solutions
///
/// # Example
///
/// ```
/// use u_siteplan::ranking::non_dominated_sort;
///
/// let objectives = vec![
///     vec![1.0, 5.0],
///     vec![3.0, 3.0],
///     vec![5.0, 1.0],
///     vec![4.0, 4.0], // dominated by [3, 3]
/// ];
/// let result = non_dominated_sort(&objectives);
/// assert_eq!(result.ranks, vec![0, 0, 0, 1]);
/// ```
pub fn non_dominated_sort(objectives: &[Vec<f64>]) -> NondominatedSortResult {
    sort_by_dominance(objectives.len(), |i, j| {
        dominance_cmp(&objectives[i], &objectives[j])
    })
}

/// Non-dominated sorting under [`constrained_dominance_cmp`].
///
/// Every feasible solution (violation 0) ranks ahead of every infeasible
/// one, and infeasible solutions are layered by increasing violation.
///
/// ```
/// use u_siteplan::ranking::constrained_non_dominated_sort;
///
/// let objectives = vec![vec![5.0, 5.0], vec![1.0, 1.0], vec![2.0, 0.5]];
/// let violations = [0.0, 3.0, 1.0];
/// let result = constrained_non_dominated_sort(&objectives, &violations);
/// assert_eq!(result.ranks, vec![0, 2, 1]);
/// ```
pub fn constrained_non_dominated_sort(
    objectives: &[Vec<f64>],
    violations: &[f64],
) -> NondominatedSortResult {
    debug_assert_eq!(objectives.len(), violations.len());
    sort_by_dominance(objectives.len().min(violations.len()), |i, j| {
        constrained_dominance_cmp(&objectives[i], violations[i], &objectives[j], violations[j])
    })
}

fn sort_by_dominance<F>(n: usize, cmp: F) -> NondominatedSortResult
where
    F: Fn(usize, usize) -> Dominance,
{
    if n == 0 {
        return NondominatedSortResult::default();
    }

    let mut domination_count = vec![0usize; n];
    let mut dominated_by: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut ranks = vec![0usize; n];
    let mut front_0 = Vec::new();

    for i in 0..n {
        for j in (i + 1)..n {
            match cmp(i, j) {
                Dominance::Left => {
                    dominated_by[i].push(j);
                    domination_count[j] += 1;
                }
                Dominance::Right => {
                    dominated_by[j].push(i);
                    domination_count[i] += 1;
                }
                Dominance::Neither => {}
            }
        }
        if domination_count[i] == 0 {
            front_0.push(i);
        }
    }

    let mut fronts = vec![front_0];
    while let Some(current) = fronts.last() {
        let mut next_front = Vec::new();
        for &i in current {
            for &j in &dominated_by[i] {
                domination_count[j] -= 1;
                if domination_count[j] == 0 {
                    ranks[j] = fronts.len();
                    next_front.push(j);
                }
            }
        }
        if next_front.is_empty() {
            break;
        }
        next_front.sort_unstable();
        fronts.push(next_front);
    }

    NondominatedSortResult { ranks, fronts }
}

/// Pareto dominance between two objective vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dominance {
    /// Left dominates right.
    Left,
    /// Right dominates left.
    Right,
    /// Neither dominates the other.
    Neither,
}

/// Compares two solutions for Pareto dominance (minimization).
pub fn dominance_cmp(a: &[f64], b: &[f64]) -> Dominance {
    let mut a_better_in_some = false;
    let mut b_better_in_some = false;

    for (&va, &vb) in a.iter().zip(b.iter()) {
        if va < vb {
            a_better_in_some = true;
        } else if vb < va {
            b_better_in_some = true;
        }
    }

    match (a_better_in_some, b_better_in_some) {
        (true, false) => Dominance::Left,
        (false, true) => Dominance::Right,
        _ => Dominance::Neither,
    }
}

/// `true` iff `a` dominates `b`.
pub fn dominates(a: &[f64], b: &[f64]) -> bool {
    dominance_cmp(a, b) == Dominance::Left
}

/// Constrained dominance (Deb, 2000).
///
/// The smaller total violation wins outright, so a feasible solution
/// beats any infeasible one. Equal violations fall back to Pareto
/// dominance on the objectives.
pub fn constrained_dominance_cmp(
    a: &[f64],
    a_violation: f64,
    b: &[f64],
    b_violation: f64,
) -> Dominance {
    if a_violation < b_violation {
        Dominance::Left
    } else if b_violation < a_violation {
        Dominance::Right
    } else {
        dominance_cmp(a, b)
    }
}

/// `true` iff `a` constraint-dominates `b`.
pub fn constrained_dominates(a: &[f64], a_violation: f64, b: &[f64], b_violation: f64) -> bool {
    constrained_dominance_cmp(a, a_violation, b, b_violation) == Dominance::Left
}

/// Rank, association, and niche information for a population.
#[derive(Debug, Clone, Default)]
pub struct Ranking {
    /// Pareto rank per member.
    pub ranks: Vec<usize>,
    /// Member indices per front.
    pub fronts: Vec<Vec<usize>>,
    /// Nearest reference direction per member.
    pub associations: Vec<Association>,
    /// Members associated with each reference direction.
    pub niche_counts: Vec<usize>,
}

impl Ranking {
    /// Number of members sharing `member`'s reference direction.
    pub fn niche_count(&self, member: usize) -> usize {
        self.niche_counts[self.associations[member].reference]
    }
}

/// Output of [`ParetoRanker::select`].
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Chosen member indices: whole fronts in rank order, then the
    /// niching picks from the last partially admitted front.
    pub selected: Vec<usize>,
    /// Ranking of the full input population. `niche_counts` counts
    /// selected members only.
    pub ranking: Ranking,
}

/// Ranks populations and performs NSGA-III environmental selection.
#[derive(Debug, Clone)]
pub struct ParetoRanker {
    references: ReferenceDirections,
    tie_break: NicheTieBreak,
}

impl ParetoRanker {
    pub fn new(references: ReferenceDirections, tie_break: NicheTieBreak) -> Self {
        Self {
            references,
            tie_break,
        }
    }

    pub fn references(&self) -> &ReferenceDirections {
        &self.references
    }

    pub fn tie_break(&self) -> NicheTieBreak {
        self.tie_break
    }

    /// Non-dominated sort plus reference association of every member.
    pub fn rank(&self, objectives: &[Vec<f64>]) -> Ranking {
        let sorted = non_dominated_sort(objectives);
        let associations = associate(&normalize(objectives), &self.references);
        let mut niche_counts = vec![0usize; self.references.len()];
        for a in &associations {
            niche_counts[a.reference] += 1;
        }
        Ranking {
            ranks: sorted.ranks,
            fronts: sorted.fronts,
            associations,
            niche_counts,
        }
    }

    /// Selects `target` members.
    ///
    /// Whole fronts are admitted while they fit; the front that overflows
    /// is truncated by [`niche_fill`], favouring reference directions with
    /// the fewest members already admitted.
    pub fn select<R: Rng>(&self, objectives: &[Vec<f64>], target: usize, rng: &mut R) -> Selection {
        let mut ranking = self.rank(objectives);
        let mut niche_counts = vec![0usize; self.references.len()];
        let mut selected = Vec::with_capacity(target.min(objectives.len()));

        for front in &ranking.fronts {
            if selected.len() >= target {
                break;
            }
            if selected.len() + front.len() <= target {
                for &m in front {
                    niche_counts[ranking.associations[m].reference] += 1;
                }
                selected.extend_from_slice(front);
            } else {
                let picks = niche_fill(
                    front,
                    &ranking.associations,
                    &mut niche_counts,
                    target - selected.len(),
                    self.tie_break,
                    rng,
                );
                selected.extend(picks);
            }
        }

        ranking.niche_counts = niche_counts;
        Selection { selected, ranking }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::create_rng;
    use proptest::prelude::*;

    #[test]
    fn test_non_dominated_sort_fronts() {
        let objs = vec![
            vec![1.0, 5.0],
            vec![2.0, 6.0],
            vec![5.0, 1.0],
            vec![6.0, 6.0],
            vec![3.0, 3.0],
        ];
        let r = non_dominated_sort(&objs);
        assert_eq!(r.ranks, vec![0, 1, 0, 2, 0]);
        assert_eq!(r.fronts, vec![vec![0, 2, 4], vec![1], vec![3]]);
    }

    #[test]
    fn test_non_dominated_sort_empty_and_single() {
        assert!(non_dominated_sort(&[]).ranks.is_empty());
        let r = non_dominated_sort(&[vec![1.0, 2.0]]);
        assert_eq!(r.ranks, vec![0]);
        assert_eq!(r.fronts, vec![vec![0]]);
    }

    #[test]
    fn test_equal_vectors_do_not_dominate() {
        assert_eq!(dominance_cmp(&[1.0, 1.0], &[1.0, 1.0]), Dominance::Neither);
        assert!(dominates(&[1.0, 1.0], &[1.0, 2.0]));
        assert!(!dominates(&[1.0, 3.0], &[2.0, 2.0]));
    }

    #[test]
    fn test_select_whole_fronts_first() {
        let ranker = ParetoRanker::new(
            ReferenceDirections::das_dennis(2, 4),
            NicheTieBreak::LowestIndex,
        );
        let objs = vec![
            vec![1.0, 5.0],
            vec![5.0, 1.0],
            vec![6.0, 6.0],
            vec![7.0, 7.0],
        ];
        let sel = ranker.select(&objs, 3, &mut create_rng(0));
        assert_eq!(sel.selected, vec![0, 1, 2]);
    }

    #[test]
    fn test_select_spreads_last_front() {
        let ranker = ParetoRanker::new(
            ReferenceDirections::das_dennis(2, 2),
            NicheTieBreak::LowestIndex,
        );
        // One mutually non-dominated front clustered at the (0,1) end,
        // plus one extreme at the other end.
        let objs = vec![
            vec![0.0, 1.0],
            vec![0.01, 0.99],
            vec![0.02, 0.98],
            vec![1.0, 0.0],
        ];
        let sel = ranker.select(&objs, 2, &mut create_rng(0));
        assert_eq!(sel.selected.len(), 2);
        assert!(sel.selected.contains(&3), "{:?}", sel.selected);
        let total: usize = sel.ranking.niche_counts.iter().sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn test_select_target_larger_than_population() {
        let ranker = ParetoRanker::new(
            ReferenceDirections::das_dennis(2, 4),
            NicheTieBreak::Random,
        );
        let objs = vec![vec![1.0, 2.0], vec![2.0, 1.0]];
        let sel = ranker.select(&objs, 10, &mut create_rng(0));
        assert_eq!(sel.selected.len(), 2);
    }

    #[test]
    fn test_rank_niche_counts() {
        let ranker = ParetoRanker::new(
            ReferenceDirections::das_dennis(2, 1),
            NicheTieBreak::LowestIndex,
        );
        let objs = vec![vec![0.0, 1.0], vec![0.1, 0.9], vec![1.0, 0.0]];
        let ranking = ranker.rank(&objs);
        // directions (0,1) and (1,0)
        assert_eq!(ranking.niche_count(0), 2);
        assert_eq!(ranking.niche_count(2), 1);
    }

    proptest! {
        #[test]
        fn prop_ranks_respect_dominance(
            objs in proptest::collection::vec(
                proptest::collection::vec(-100.0f64..100.0, 3),
                1..40,
            )
        ) {
            let r = non_dominated_sort(&objs);
            for i in 0..objs.len() {
                for j in 0..objs.len() {
                    if dominates(&objs[i], &objs[j]) {
                        prop_assert!(r.ranks[i] < r.ranks[j]);
                    }
                }
            }
            let total: usize = r.fronts.iter().map(Vec::len).sum();
            prop_assert_eq!(total, objs.len());
        }

        #[test]
        fn prop_constrained_ranks_respect_constrained_dominance(
            rows in proptest::collection::vec(
                (proptest::collection::vec(0.0f64..10.0, 2), prop_oneof![Just(0.0f64), 0.0f64..3.0]),
                1..40,
            )
        ) {
            let objs: Vec<Vec<f64>> = rows.iter().map(|(o, _)| o.clone()).collect();
            let viol: Vec<f64> = rows.iter().map(|&(_, v)| v).collect();
            let r = constrained_non_dominated_sort(&objs, &viol);
            for i in 0..objs.len() {
                for j in 0..objs.len() {
                    if constrained_dominates(&objs[i], viol[i], &objs[j], viol[j]) {
                        prop_assert!(r.ranks[i] < r.ranks[j]);
                    }
                    if viol[i] == 0.0 && viol[j] > 0.0 {
                        prop_assert!(r.ranks[i] < r.ranks[j]);
                    }
                }
            }
        }

        #[test]
        fn prop_select_exact_size(
            objs in proptest::collection::vec(
                proptest::collection::vec(0.0f64..10.0, 2),
                1..30,
            ),
            target in 1usize..30,
            seed in 0u64..1000,
        ) {
            let ranker = ParetoRanker::new(
                ReferenceDirections::das_dennis(2, 4),
                NicheTieBreak::Random,
            );
            let sel = ranker.select(&objs, target, &mut create_rng(seed));
            prop_assert_eq!(sel.selected.len(), target.min(objs.len()));
            let mut uniq = sel.selected.clone();
            uniq.sort_unstable();
            uniq.dedup();
            prop_assert_eq!(uniq.len(), sel.selected.len());
        }
    }
}
