//! Perturbation operators.
//!
//! Produces a neighbouring layout from a current one. Used by annealing
//! chains at the chain temperature and by the evolutionary refiner as its
//! mutation at a fixed cold temperature.
//!
//! # Operators
//!
//! - [`PerturbationOperator::GaussianMove`]: displace one building by
//!   N(0, σ²) per axis with σ = T / 10
//! - [`PerturbationOperator::Swap`]: exchange the positions of two buildings
//! - [`PerturbationOperator::RandomReset`]: move one building to a uniform
//!   point of the boundary's bounding box
//!
//! Proposals outside the bounding box are redrawn up to `max_retries`
//! times; after that the call is a no-op and the layout is returned
//! unchanged, so the caller's iteration budget is unaffected.

use crate::error::{Error, Result};
use crate::geometry::{Aabb, Point};
use crate::layout::Layout;
use rand::Rng;
use rand_distr::{Distribution, Normal};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Neighbourhood operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PerturbationOperator {
    GaussianMove,
    Swap,
    RandomReset,
}

/// Selection weights of the three operators.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OperatorWeights {
    pub gaussian_move: f64,
    pub swap: f64,
    pub random_reset: f64,
}

impl Default for OperatorWeights {
    fn default() -> Self {
        Self {
            gaussian_move: 0.80,
            swap: 0.15,
            random_reset: 0.05,
        }
    }
}

impl OperatorWeights {
    fn total(&self) -> f64 {
        self.gaussian_move + self.swap + self.random_reset
    }
}

/// Result of one perturbation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub operator: PerturbationOperator,
    /// `false` when the operator gave up and left the layout unchanged.
    pub applied: bool,
}

/// The perturbation engine.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Perturbation {
    pub weights: OperatorWeights,
    /// Redraws allowed for an out-of-bounds proposal.
    pub max_retries: usize,
    /// Whether a swap also exchanges orientations.
    pub swap_orientation: bool,
    /// σ = temperature / step_divisor for Gaussian moves.
    pub step_divisor: f64,
}

impl Default for Perturbation {
    fn default() -> Self {
        Self {
            weights: OperatorWeights::default(),
            max_retries: 8,
            swap_orientation: true,
            step_divisor: 10.0,
        }
    }
}

impl Perturbation {
    pub fn with_weights(mut self, weights: OperatorWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_max_retries(mut self, retries: usize) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_swap_orientation(mut self, swap: bool) -> Self {
        self.swap_orientation = swap;
        self
    }

    /// Validates weights and step size.
    pub fn validate(&self) -> Result<()> {
        let w = &self.weights;
        if [w.gaussian_move, w.swap, w.random_reset]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            return Err(Error::Configuration("operator weights must be non-negative".into()));
        }
        if w.total() <= 0.0 {
            return Err(Error::Configuration("operator weights must sum to a positive total".into()));
        }
        if !(self.step_divisor.is_finite() && self.step_divisor > 0.0) {
            return Err(Error::Configuration("step_divisor must be positive".into()));
        }
        Ok(())
    }

    /// Draws an operator according to the weights.
    pub fn choose<R: Rng>(&self, rng: &mut R) -> PerturbationOperator {
        let w = &self.weights;
        let r = rng.random_range(0.0..1.0) * w.total();
        if r < w.gaussian_move {
            PerturbationOperator::GaussianMove
        } else if r < w.gaussian_move + w.swap {
            PerturbationOperator::Swap
        } else {
            PerturbationOperator::RandomReset
        }
    }

    /// Returns a perturbed copy of `layout`; the original is untouched.
    pub fn perturb<R: Rng>(
        &self,
        layout: &Layout,
        temperature: f64,
        bounds: &Aabb,
        rng: &mut R,
    ) -> (Layout, Move) {
        let operator = self.choose(rng);
        let mut candidate = layout.clone();
        let applied = self.apply(operator, &mut candidate, temperature, bounds, rng);
        (candidate, Move { operator, applied })
    }

    /// Applies `operator` in place. Returns whether the layout changed.
    pub fn apply<R: Rng>(
        &self,
        operator: PerturbationOperator,
        layout: &mut Layout,
        temperature: f64,
        bounds: &Aabb,
        rng: &mut R,
    ) -> bool {
        let n = layout.len();
        if n == 0 {
            return false;
        }

        match operator {
            PerturbationOperator::GaussianMove => {
                let idx = rng.random_range(0..n);
                let sigma = temperature / self.step_divisor;
                if !(sigma.is_finite() && sigma > 0.0) {
                    return false;
                }
                let Ok(normal) = Normal::new(0.0, sigma) else {
                    return false;
                };
                let origin = layout.buildings()[idx].position;
                for _ in 0..=self.max_retries {
                    let proposal = origin.add(Point::new(normal.sample(rng), normal.sample(rng)));
                    if bounds.contains(proposal) {
                        layout.set_position(idx, proposal);
                        return true;
                    }
                }
                false
            }

            PerturbationOperator::Swap => {
                if n < 2 {
                    return false;
                }
                let i = rng.random_range(0..n);
                let mut j = rng.random_range(0..n - 1);
                if j >= i {
                    j += 1;
                }
                layout.swap_positions(i, j, self.swap_orientation);
                true
            }

            PerturbationOperator::RandomReset => {
                let idx = rng.random_range(0..n);
                layout.set_position(idx, bounds.sample(rng));
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Boundary;
    use crate::layout::{BuildingSpec, Site};
    use crate::random::create_rng;

    fn layout_and_bounds() -> (Layout, Aabb) {
        let site = Site::new(
            Boundary::rectangle(100.0, 100.0).unwrap(),
            vec![BuildingSpec::new("a", 20.0, 40.0, 4)],
        )
        .unwrap();
        let layout = Layout::random(&site, 16, &mut create_rng(11)).layout;
        (layout, *site.boundary().aabb())
    }

    #[test]
    fn test_operator_frequencies() {
        let p = Perturbation::default();
        let mut rng = create_rng(42);
        let mut counts = [0usize; 3];
        let n = 20_000;
        for _ in 0..n {
            match p.choose(&mut rng) {
                PerturbationOperator::GaussianMove => counts[0] += 1,
                PerturbationOperator::Swap => counts[1] += 1,
                PerturbationOperator::RandomReset => counts[2] += 1,
            }
        }
        let freq = counts.map(|c| c as f64 / n as f64);
        assert!((freq[0] - 0.80).abs() < 0.02, "{freq:?}");
        assert!((freq[1] - 0.15).abs() < 0.02, "{freq:?}");
        assert!((freq[2] - 0.05).abs() < 0.02, "{freq:?}");
    }

    #[test]
    fn test_perturb_is_copy_on_write() {
        let (layout, bounds) = layout_and_bounds();
        let before = layout.clone();
        let p = Perturbation::default();
        let mut rng = create_rng(3);
        for _ in 0..50 {
            let _ = p.perturb(&layout, 50.0, &bounds, &mut rng);
        }
        assert_eq!(layout, before);
    }

    #[test]
    fn test_gaussian_move_changes_one_building() {
        let (layout, bounds) = layout_and_bounds();
        let p = Perturbation::default();
        let mut rng = create_rng(5);
        let mut moved = layout.clone();
        assert!(p.apply(PerturbationOperator::GaussianMove, &mut moved, 10.0, &bounds, &mut rng));
        let changed = layout
            .buildings()
            .iter()
            .zip(moved.buildings())
            .filter(|(a, b)| a.position != b.position)
            .count();
        assert_eq!(changed, 1);
        assert!(moved.buildings().iter().all(|b| bounds.contains(b.position)));
    }

    #[test]
    fn test_gaussian_step_scales_with_temperature() {
        let (layout, _) = layout_and_bounds();
        let huge = Aabb {
            min: Point::new(-1e9, -1e9),
            max: Point::new(1e9, 1e9),
        };
        let p = Perturbation::default();
        let mean_step = |t: f64| {
            let mut rng = create_rng(9);
            let mut total = 0.0;
            for _ in 0..500 {
                let mut c = layout.clone();
                p.apply(PerturbationOperator::GaussianMove, &mut c, t, &huge, &mut rng);
                total += layout.distance(&c) * layout.len() as f64;
            }
            total / 500.0
        };
        let hot = mean_step(100.0);
        let cold = mean_step(1.0);
        assert!(hot > 50.0 * cold, "hot={hot}, cold={cold}");
    }

    #[test]
    fn test_out_of_bounds_is_noop_after_retries() {
        let (layout, _) = layout_and_bounds();
        // A box far away from every building: no Gaussian step can land in it.
        let tiny = Aabb {
            min: Point::new(1e6, 1e6),
            max: Point::new(1e6 + 1.0, 1e6 + 1.0),
        };
        let p = Perturbation::default().with_max_retries(3);
        let mut rng = create_rng(1);
        let mut c = layout.clone();
        assert!(!p.apply(PerturbationOperator::GaussianMove, &mut c, 1.0, &tiny, &mut rng));
        assert_eq!(c, layout);
    }

    #[test]
    fn test_swap_preserves_types_and_position_multiset() {
        let (layout, bounds) = layout_and_bounds();
        let p = Perturbation::default();
        let mut rng = create_rng(2);
        let mut c = layout.clone();
        assert!(p.apply(PerturbationOperator::Swap, &mut c, 1.0, &bounds, &mut rng));
        let types = |l: &Layout| l.buildings().iter().map(|b| b.type_index).collect::<Vec<_>>();
        assert_eq!(types(&c), types(&layout));
        let mut a: Vec<(u64, u64)> = layout
            .positions()
            .iter()
            .map(|p| (p.x.to_bits(), p.y.to_bits()))
            .collect();
        let mut b: Vec<(u64, u64)> =
            c.positions().iter().map(|p| (p.x.to_bits(), p.y.to_bits())).collect();
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, b);
        assert_ne!(c, layout);
    }

    #[test]
    fn test_random_reset_within_bounds() {
        let (layout, bounds) = layout_and_bounds();
        let p = Perturbation::default();
        let mut rng = create_rng(4);
        for _ in 0..100 {
            let mut c = layout.clone();
            assert!(p.apply(PerturbationOperator::RandomReset, &mut c, 1.0, &bounds, &mut rng));
            assert!(c.buildings().iter().all(|b| bounds.contains(b.position)));
        }
    }

    #[test]
    fn test_validate_weights() {
        assert!(Perturbation::default().validate().is_ok());
        let zero = OperatorWeights {
            gaussian_move: 0.0,
            swap: 0.0,
            random_reset: 0.0,
        };
        assert!(Perturbation::default().with_weights(zero).validate().is_err());
    }
}
