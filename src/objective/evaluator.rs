//! Objective and constraint evaluation.

use super::profile::{ObjectiveKind, ObjectiveProfile};
use crate::error::{Error, Result};
use crate::geometry::{convex_hull, Point, Polygon};
use crate::layout::{Layout, Site};
use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Objective values in [`ObjectiveKind`] order, all minimized.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ObjectiveVector(pub [f64; ObjectiveKind::COUNT]);

impl ObjectiveVector {
    pub fn get(&self, kind: ObjectiveKind) -> f64 {
        self.0[kind.index()]
    }

    /// Values of the given objectives, in the given order.
    pub fn project(&self, kinds: &[ObjectiveKind]) -> Vec<f64> {
        kinds.iter().map(|&k| self.get(k)).collect()
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }
}

/// Constraint kinds, in [`ConstraintVector`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConstraintKind {
    /// Depth footprints protrude outside the boundary.
    BoundaryContainment,
    /// Overlap area between footprints or with obstacles.
    Overlap,
    /// Encroachment under the minimum clearance.
    Setback,
    /// Per-type count and area-range deficits.
    Quantity,
}

impl ConstraintKind {
    pub const ALL: [ConstraintKind; 4] = [
        ConstraintKind::BoundaryContainment,
        ConstraintKind::Overlap,
        ConstraintKind::Setback,
        ConstraintKind::Quantity,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Non-negative violation magnitudes; 0 everywhere means feasible.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstraintVector(pub [f64; ConstraintKind::COUNT]);

impl ConstraintVector {
    pub fn get(&self, kind: ConstraintKind) -> f64 {
        self.0[kind.index()]
    }

    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    pub fn is_feasible(&self) -> bool {
        self.0.iter().all(|&v| v <= 0.0)
    }

    fn add(&mut self, kind: ConstraintKind, amount: f64) {
        if amount > 0.0 {
            self.0[kind.index()] += amount;
        }
    }
}

/// Objectives and constraints of one layout.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Evaluation {
    pub objectives: ObjectiveVector,
    pub constraints: ConstraintVector,
}

impl Evaluation {
    pub fn is_feasible(&self) -> bool {
        self.constraints.is_feasible()
    }

    pub fn total_violation(&self) -> f64 {
        self.constraints.total()
    }
}

/// Pairwise type compatibility, symmetric, in `[-1, 1]`.
///
/// Pairs without a rule are neutral (0).
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AdjacencyRules {
    rules: HashMap<(String, String), f64>,
}

impl AdjacencyRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a symmetric rule; the score is clamped to `[-1, 1]`.
    pub fn with_rule(mut self, a: impl Into<String>, b: impl Into<String>, score: f64) -> Self {
        let (a, b) = (a.into(), b.into());
        let key = if a <= b { (a, b) } else { (b, a) };
        self.rules.insert(key, score.clamp(-1.0, 1.0));
        self
    }

    pub fn score(&self, a: &str, b: &str) -> f64 {
        let key = if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        };
        self.rules.get(&key).copied().unwrap_or(0.0)
    }
}

/// Tunable constants of the objective and penalty model.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EvaluatorParams {
    /// Walkable inter-building distance band `(min, max)`.
    pub target_separation: (f64, f64),
    /// Road construction cost per unit length.
    pub road_cost_per_unit: f64,
    /// Cost per unit area of the disturbed (convex hull) region.
    pub disturbance_cost_per_area: f64,
    /// Distance scale of the adjacency proximity decay.
    pub adjacency_radius: f64,
    /// Type compatibility table.
    pub adjacency: AdjacencyRules,
    /// Scalarization penalty per unit of total violation.
    pub penalty_weight: f64,
    /// Constant added to the scalarized score of any infeasible layout.
    pub infeasible_offset: f64,
}

impl Default for EvaluatorParams {
    fn default() -> Self {
        Self {
            target_separation: (50.0, 150.0),
            road_cost_per_unit: 1.0,
            disturbance_cost_per_area: 0.1,
            adjacency_radius: 100.0,
            adjacency: AdjacencyRules::default(),
            penalty_weight: 1_000.0,
            infeasible_offset: 1.0,
        }
    }
}

impl EvaluatorParams {
    pub fn with_target_separation(mut self, min: f64, max: f64) -> Self {
        self.target_separation = (min, max);
        self
    }

    pub fn with_adjacency(mut self, rules: AdjacencyRules) -> Self {
        self.adjacency = rules;
        self
    }

    pub fn with_adjacency_radius(mut self, radius: f64) -> Self {
        self.adjacency_radius = radius;
        self
    }

    pub fn with_penalty_weight(mut self, weight: f64) -> Self {
        self.penalty_weight = weight;
        self
    }

    /// Validates the parameters.
    pub fn validate(&self) -> Result<()> {
        let (lo, hi) = self.target_separation;
        if !(lo.is_finite() && hi.is_finite() && lo >= 0.0 && hi >= lo) {
            return Err(Error::Configuration(format!(
                "target_separation must satisfy 0 <= min <= max, got ({lo}, {hi})"
            )));
        }
        if !(self.adjacency_radius.is_finite() && self.adjacency_radius > 0.0) {
            return Err(Error::Configuration("adjacency_radius must be positive".into()));
        }
        for (name, v) in [
            ("road_cost_per_unit", self.road_cost_per_unit),
            ("disturbance_cost_per_area", self.disturbance_cost_per_area),
            ("penalty_weight", self.penalty_weight),
        ] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(Error::Configuration(format!("{name} must be non-negative")));
            }
        }
        if !(self.infeasible_offset.is_finite() && self.infeasible_offset > 0.0) {
            return Err(Error::Configuration("infeasible_offset must be positive".into()));
        }
        Ok(())
    }
}

/// Computes objective and constraint vectors for layouts of one site.
///
/// Stateless after construction: [`evaluate`](Self::evaluate) is a pure
/// function of the layout, so it is safe to call from any number of
/// threads. Pairwise terms make evaluation O(n²) in the building count.
#[derive(Debug, Clone)]
pub struct Evaluator {
    site: Site,
    params: EvaluatorParams,
    /// Compatibility by type index.
    compatibility: Vec<Vec<f64>>,
    /// Normalization divisor per objective for scalarization.
    scales: [f64; ObjectiveKind::COUNT],
}

impl Evaluator {
    /// Creates an evaluator, resolving adjacency rules to type indices.
    pub fn new(site: Site, params: EvaluatorParams) -> Result<Self> {
        site.validate()?;
        params.validate()?;

        let specs = site.specs();
        let compatibility = specs
            .iter()
            .map(|a| {
                specs
                    .iter()
                    .map(|b| params.adjacency.score(&a.type_id, &b.type_id))
                    .collect()
            })
            .collect();

        let boundary = site.boundary();
        let n = site.total_quantity() as f64;
        let building_cost: f64 = specs
            .iter()
            .map(|s| s.max_area * s.cost_per_area * s.quantity as f64)
            .sum();
        let road_cost = params.road_cost_per_unit * boundary.aabb().diagonal() * n;
        let disturbance = params.disturbance_cost_per_area * boundary.area();
        let type_count = specs.iter().filter(|s| s.quantity > 0).count() as f64;

        let scales = [
            (building_cost + road_cost + disturbance).max(f64::MIN_POSITIVE),
            boundary.aabb().diagonal().max(f64::MIN_POSITIVE),
            1.0,
            type_count.ln().max(1.0),
        ];

        Ok(Self {
            site,
            params,
            compatibility,
            scales,
        })
    }

    pub fn site(&self) -> &Site {
        &self.site
    }

    pub fn params(&self) -> &EvaluatorParams {
        &self.params
    }

    /// Evaluates a layout.
    ///
    /// # Errors
    ///
    /// [`Error::NumericInstability`] when any objective is not finite.
    pub fn evaluate(&self, layout: &Layout) -> Result<Evaluation> {
        let site = &self.site;
        let boundary = site.boundary();
        let specs = site.specs();
        let buildings = layout.buildings();
        let footprints = layout.footprints();
        let n = buildings.len();

        let mut constraints = ConstraintVector::default();
        let mut inside = vec![false; n];

        // Per-building terms
        let mut building_cost = 0.0;
        let mut counts = vec![0usize; specs.len()];
        for (i, (b, fp)) in buildings.iter().zip(&footprints).enumerate() {
            let Some(spec) = specs.get(b.type_index) else {
                constraints.add(ConstraintKind::Quantity, 1.0);
                continue;
            };
            counts[b.type_index] += 1;
            building_cost += b.area * spec.cost_per_area;
            constraints.add(ConstraintKind::Quantity, spec.min_area - b.area);
            constraints.add(ConstraintKind::Quantity, b.area - spec.max_area);

            let protrusion = boundary.protrusion(fp);
            if protrusion > 0.0 {
                constraints.add(ConstraintKind::BoundaryContainment, protrusion);
            } else {
                inside[i] = true;
                if site.boundary_setback > 0.0 {
                    constraints.add(
                        ConstraintKind::Setback,
                        site.boundary_setback - boundary.clearance(fp),
                    );
                }
            }

            for obstacle in site.obstacles() {
                self.add_clearance_terms(&mut constraints, fp, obstacle);
            }
        }
        for (spec, &count) in specs.iter().zip(&counts) {
            constraints.add(ConstraintKind::Quantity, spec.quantity.abs_diff(count) as f64);
        }

        // Pairwise terms
        let (sep_lo, sep_hi) = self.params.target_separation;
        let mut walk_total = 0.0;
        let mut adjacency_total = 0.0;
        let aabbs: Vec<_> = footprints.iter().map(|fp| fp.aabb()).collect();
        for i in 0..n {
            for j in (i + 1)..n {
                let d = buildings[i].position.distance(buildings[j].position);
                walk_total += if d < sep_lo {
                    sep_lo - d
                } else if d > sep_hi {
                    d - sep_hi
                } else {
                    0.0
                };

                let score = self
                    .compatibility
                    .get(buildings[i].type_index)
                    .and_then(|row| row.get(buildings[j].type_index))
                    .copied()
                    .unwrap_or(0.0);
                adjacency_total += score * (-d / self.params.adjacency_radius).exp();

                let near = match (aabbs[i], aabbs[j]) {
                    (Some(a), Some(b)) => a.expand(site.building_setback).intersects(&b),
                    _ => false,
                };
                if near {
                    self.add_clearance_terms(&mut constraints, &footprints[i], &footprints[j]);
                }
            }
        }
        let pairs = (n * n.saturating_sub(1) / 2).max(1) as f64;

        // Cost: buildings + roads + disturbed area
        let corners: Vec<Point> = footprints
            .iter()
            .flat_map(|fp| fp.vertices())
            .collect();
        let disturbed = convex_hull(&corners).area();
        let cost = building_cost
            + layout.roads().length * self.params.road_cost_per_unit
            + disturbed * self.params.disturbance_cost_per_area;

        // Diversity: entropy of types actually placed inside the site
        let mut placed_counts = vec![0usize; specs.len()];
        for (b, _) in buildings.iter().zip(&inside).filter(|(_, &ok)| ok) {
            if let Some(c) = placed_counts.get_mut(b.type_index) {
                *c += 1;
            }
        }
        let placed: usize = placed_counts.iter().sum();
        let entropy = if placed == 0 {
            0.0
        } else {
            placed_counts
                .iter()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / placed as f64;
                    -p * p.ln()
                })
                .sum()
        };

        let objectives = ObjectiveVector([
            cost,
            walk_total / pairs,
            -adjacency_total / pairs,
            -entropy,
        ]);

        if !objectives.is_finite() {
            return Err(Error::NumericInstability(format!(
                "non-finite objectives {:?}",
                objectives.0
            )));
        }
        if constraints.0.iter().any(|v| !v.is_finite()) {
            return Err(Error::NumericInstability(format!(
                "non-finite constraints {:?}",
                constraints.0
            )));
        }

        Ok(Evaluation {
            objectives,
            constraints,
        })
    }

    /// Overlap, or setback encroachment when not overlapping.
    fn add_clearance_terms(
        &self,
        constraints: &mut ConstraintVector,
        a: &Polygon,
        b: &Polygon,
    ) {
        let overlap = a.intersection_area(b);
        if overlap > 0.0 {
            constraints.add(ConstraintKind::Overlap, overlap);
        } else if self.site.building_setback > 0.0 {
            constraints.add(
                ConstraintKind::Setback,
                self.site.building_setback - a.distance(b),
            );
        }
    }

    /// Reduces an evaluation to one score for annealing. Lower is better.
    ///
    /// Weighted sum of scale-normalized objectives. Infeasible layouts add
    /// `infeasible_offset + penalty_weight * total_violation`, so they always
    /// score strictly worse than a feasible layout with the same objectives.
    pub fn scalarize(&self, evaluation: &Evaluation, profile: &ObjectiveProfile) -> f64 {
        let weights = profile.normalized_weights();
        let base: f64 = ObjectiveKind::ALL
            .iter()
            .map(|&k| weights[k.index()] * evaluation.objectives.get(k) / self.scales[k.index()])
            .sum();
        if evaluation.is_feasible() {
            base
        } else {
            base + self.params.infeasible_offset
                + self.params.penalty_weight * evaluation.total_violation()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Boundary, Polygon};
    use crate::layout::{BuildingInstance, BuildingSpec};

    fn site() -> Site {
        Site::new(
            Boundary::rectangle(200.0, 200.0).unwrap(),
            vec![
                BuildingSpec::new("housing", 100.0, 100.0, 2),
                BuildingSpec::new("retail", 100.0, 100.0, 1),
            ],
        )
        .unwrap()
    }

    fn building(type_index: usize, x: f64, y: f64) -> BuildingInstance {
        BuildingInstance {
            type_index,
            position: Point::new(x, y),
            orientation: 0.0,
            area: 100.0,
            aspect_ratio: 1.0,
        }
    }

    fn evaluator() -> Evaluator {
        Evaluator::new(site(), EvaluatorParams::default()).unwrap()
    }

    #[test]
    fn test_feasible_layout_has_zero_violations() {
        let layout = Layout::new(vec![
            building(0, 50.0, 50.0),
            building(0, 150.0, 50.0),
            building(1, 100.0, 150.0),
        ]);
        let eval = evaluator().evaluate(&layout).unwrap();
        assert!(eval.is_feasible(), "{:?}", eval.constraints);
        assert_eq!(eval.total_violation(), 0.0);
        // Entropy of {2/3, 1/3}
        let expected = -(2.0 / 3.0 * (2.0f64 / 3.0).ln() + 1.0 / 3.0 * (1.0f64 / 3.0).ln());
        assert!((eval.objectives.get(ObjectiveKind::Diversity) + expected).abs() < 1e-12);
    }

    #[test]
    fn test_overlap_reported() {
        let layout = Layout::new(vec![
            building(0, 50.0, 50.0),
            building(0, 55.0, 50.0),
            building(1, 150.0, 150.0),
        ]);
        let eval = evaluator().evaluate(&layout).unwrap();
        assert!((eval.constraints.get(ConstraintKind::Overlap) - 50.0).abs() < 1e-4);
        assert!(!eval.is_feasible());
    }

    #[test]
    fn test_boundary_protrusion_reported() {
        let layout = Layout::new(vec![
            building(0, 2.0, 100.0),
            building(0, 100.0, 100.0),
            building(1, 150.0, 150.0),
        ]);
        let eval = evaluator().evaluate(&layout).unwrap();
        assert!((eval.constraints.get(ConstraintKind::BoundaryContainment) - 3.0).abs() < 1e-4);
    }

    #[test]
    fn test_reflex_corner_crossing_is_penalized() {
        let l_shape = Boundary::new(vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 50.0),
            Point::new(50.0, 50.0),
            Point::new(50.0, 100.0),
            Point::new(0.0, 100.0),
        ])
        .unwrap();
        let s = Site::new(
            l_shape,
            vec![BuildingSpec::new("bar", 900.0, 900.0, 1).with_aspect_ratio(4.5)],
        )
        .unwrap();
        let ev = Evaluator::new(s, EvaluatorParams::default()).unwrap();
        let bar = |x: f64, y: f64, orientation: f64| BuildingInstance {
            type_index: 0,
            position: Point::new(x, y),
            orientation,
            area: 900.0,
            aspect_ratio: 4.5,
        };

        // Corners all sit in the arms; the middle spans the missing quadrant
        let straddling = Layout::new(vec![bar(62.5, 62.5, -std::f64::consts::FRAC_PI_4)]);
        let eval = ev.evaluate(&straddling).unwrap();
        let violation = eval.constraints.get(ConstraintKind::BoundaryContainment);
        assert!((violation - 12.5).abs() < 1e-3, "{violation}");
        assert_eq!(eval.objectives.get(ObjectiveKind::Diversity), 0.0);

        let inside = Layout::new(vec![bar(40.0, 25.0, 0.0)]);
        let inside_eval = ev.evaluate(&inside).unwrap();
        assert!(inside_eval.is_feasible(), "{:?}", inside_eval.constraints);

        let profile = ObjectiveProfile::balanced();
        let gap = ev.scalarize(&eval, &profile) - ev.scalarize(&inside_eval, &profile);
        assert!(gap > ev.params().penalty_weight * 12.0);
    }

    #[test]
    fn test_setbacks_reported() {
        let s = site().with_boundary_setback(10.0).with_building_setback(20.0);
        let ev = Evaluator::new(s, EvaluatorParams::default()).unwrap();
        let layout = Layout::new(vec![
            building(0, 10.0, 100.0), // 5 from the left edge
            building(0, 100.0, 100.0),
            building(1, 115.0, 100.0), // 5 apart from the previous one
        ]);
        let eval = ev.evaluate(&layout).unwrap();
        // 10 - 5 boundary + 20 - 5 between buildings
        assert!((eval.constraints.get(ConstraintKind::Setback) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_obstacle_overlap() {
        let s = site().with_obstacles(vec![Polygon::rectangle(
            Point::new(40.0, 40.0),
            Point::new(60.0, 60.0),
        )]);
        let ev = Evaluator::new(s, EvaluatorParams::default()).unwrap();
        let layout = Layout::new(vec![
            building(0, 50.0, 50.0),
            building(0, 150.0, 50.0),
            building(1, 100.0, 150.0),
        ]);
        let eval = ev.evaluate(&layout).unwrap();
        assert!((eval.constraints.get(ConstraintKind::Overlap) - 100.0).abs() < 1e-4);
    }

    #[test]
    fn test_quantity_violation() {
        let layout = Layout::new(vec![building(0, 50.0, 50.0), building(1, 150.0, 150.0)]);
        let eval = evaluator().evaluate(&layout).unwrap();
        assert_eq!(eval.constraints.get(ConstraintKind::Quantity), 1.0);
    }

    #[test]
    fn test_walking_band() {
        let ev = Evaluator::new(
            site(),
            EvaluatorParams::default().with_target_separation(50.0, 150.0),
        )
        .unwrap();
        let inside_band = Layout::new(vec![
            building(0, 50.0, 50.0),
            building(0, 150.0, 50.0),
            building(1, 100.0, 120.0),
        ]);
        let eval = ev.evaluate(&inside_band).unwrap();
        assert_eq!(eval.objectives.get(ObjectiveKind::WalkingDistance), 0.0);
    }

    #[test]
    fn test_adjacency_rewards_compatible_neighbours() {
        let rules = AdjacencyRules::new().with_rule("retail", "housing", 1.0);
        let ev = Evaluator::new(site(), EvaluatorParams::default().with_adjacency(rules)).unwrap();
        let near = Layout::new(vec![
            building(0, 50.0, 50.0),
            building(0, 150.0, 150.0),
            building(1, 70.0, 50.0),
        ]);
        let far = Layout::new(vec![
            building(0, 20.0, 20.0),
            building(0, 40.0, 20.0),
            building(1, 180.0, 180.0),
        ]);
        let a = ev.evaluate(&near).unwrap().objectives.get(ObjectiveKind::Adjacency);
        let b = ev.evaluate(&far).unwrap().objectives.get(ObjectiveKind::Adjacency);
        assert!(a < b, "closer compatible pair should score lower: {a} vs {b}");
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let layout = Layout::new(vec![
            building(0, 50.0, 50.0),
            building(0, 55.0, 50.0),
            building(1, 190.0, 100.0),
        ]);
        let ev = evaluator();
        assert_eq!(ev.evaluate(&layout).unwrap(), ev.evaluate(&layout).unwrap());
    }

    #[test]
    fn test_non_finite_is_numeric_instability() {
        let mut b = building(0, 50.0, 50.0);
        b.area = f64::NAN;
        let layout = Layout::new(vec![b, building(0, 150.0, 50.0), building(1, 100.0, 150.0)]);
        assert!(matches!(
            evaluator().evaluate(&layout),
            Err(Error::NumericInstability(_))
        ));
    }

    #[test]
    fn test_infeasible_scalarizes_worse_than_feasible_with_same_objectives() {
        let ev = evaluator();
        let profile = ObjectiveProfile::balanced();
        let objectives = ObjectiveVector([500.0, 10.0, -0.2, -0.5]);
        let feasible = Evaluation {
            objectives,
            constraints: ConstraintVector::default(),
        };
        let infeasible = Evaluation {
            objectives,
            constraints: ConstraintVector([0.0, 1e-12, 0.0, 0.0]),
        };
        assert!(ev.scalarize(&infeasible, &profile) > ev.scalarize(&feasible, &profile));
    }

    #[test]
    fn test_adjacency_rules_symmetric() {
        let rules = AdjacencyRules::new().with_rule("b", "a", 2.0);
        assert_eq!(rules.score("a", "b"), 1.0);
        assert_eq!(rules.score("b", "a"), 1.0);
        assert_eq!(rules.score("a", "c"), 0.0);
    }
}
