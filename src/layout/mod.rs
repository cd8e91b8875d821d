//! Layout representation.
//!
//! A [`Layout`] is the candidate solution shared by every phase of the
//! optimizer: an index-stable sequence of [`BuildingInstance`]s plus the
//! [`RoadNetwork`] derived from them. Perturbation and crossover address
//! buildings by index, so a layout's length and the type at each index
//! never change after initialization.
//!
//! Geometric validity (containment, overlap, setbacks) is *not* enforced
//! here; the evaluator reports violations instead of repairing them.

mod roads;
mod types;

pub use roads::RoadNetwork;
pub use types::{BuildingInstance, BuildingSpec, Site};

use crate::geometry::{Point, Polygon};
use rand::Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default number of random positions tried per building during initialization.
pub const DEFAULT_PLACEMENT_ATTEMPTS: usize = 64;

/// A candidate arrangement of buildings and roads.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Layout {
    buildings: Vec<BuildingInstance>,
    roads: RoadNetwork,
}

/// Outcome of random initialization.
#[derive(Debug, Clone)]
pub struct Initialization {
    pub layout: Layout,
    /// Buildings for which no clean position was found within the attempt budget.
    pub failed_placements: usize,
}

impl Layout {
    /// Creates a layout and derives its roads.
    pub fn new(buildings: Vec<BuildingInstance>) -> Self {
        let mut layout = Self {
            buildings,
            roads: RoadNetwork::default(),
        };
        layout.refresh_roads();
        layout
    }

    pub fn buildings(&self) -> &[BuildingInstance] {
        &self.buildings
    }

    pub fn roads(&self) -> &RoadNetwork {
        &self.roads
    }

    pub fn len(&self) -> usize {
        self.buildings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buildings.is_empty()
    }

    pub fn positions(&self) -> Vec<Point> {
        self.buildings.iter().map(|b| b.position).collect()
    }

    pub fn footprints(&self) -> Vec<Polygon> {
        self.buildings.iter().map(BuildingInstance::footprint).collect()
    }

    /// Moves building `index` and re-derives roads.
    pub fn set_position(&mut self, index: usize, position: Point) {
        self.buildings[index].position = position;
        self.refresh_roads();
    }

    /// Exchanges the positions (and optionally orientations) of two buildings.
    pub fn swap_positions(&mut self, i: usize, j: usize, with_orientation: bool) {
        let (pi, pj) = (self.buildings[i].position, self.buildings[j].position);
        self.buildings[i].position = pj;
        self.buildings[j].position = pi;
        if with_orientation {
            let (oi, oj) = (self.buildings[i].orientation, self.buildings[j].orientation);
            self.buildings[i].orientation = oj;
            self.buildings[j].orientation = oi;
        }
        self.refresh_roads();
    }

    /// Copies position and orientation of building `index` from `donor`.
    ///
    /// Both layouts must come from the same site, so index `index` holds the
    /// same building type in each.
    pub fn inherit_placement(&mut self, index: usize, donor: &Layout) {
        let src = &donor.buildings[index];
        let dst = &mut self.buildings[index];
        dst.position = src.position;
        dst.orientation = src.orientation;
    }

    pub fn refresh_roads(&mut self) {
        self.roads = RoadNetwork::connect(&self.positions());
    }

    /// Mean centre displacement between corresponding buildings.
    ///
    /// Infinite when the layouts have different lengths.
    pub fn distance(&self, other: &Layout) -> f64 {
        if self.len() != other.len() {
            return f64::INFINITY;
        }
        if self.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .buildings
            .iter()
            .zip(&other.buildings)
            .map(|(a, b)| a.position.distance(b.position))
            .sum();
        total / self.len() as f64
    }

    /// Places every requested building at random.
    ///
    /// Buildings are generated spec by spec, so indices are grouped by type.
    /// For each building up to `attempts` positions are sampled from the
    /// boundary's bounding box; the first one fully inside the site and
    /// clear of previously placed buildings, obstacles, and setbacks is
    /// kept. When none qualifies, the least-violating sample is kept and
    /// the building is counted in [`Initialization::failed_placements`].
    pub fn random<R: Rng>(site: &Site, attempts: usize, rng: &mut R) -> Initialization {
        let attempts = attempts.max(1);
        let bbox = *site.boundary().aabb();
        let mut buildings = Vec::with_capacity(site.total_quantity());
        let mut placed: Vec<Polygon> = Vec::with_capacity(site.total_quantity());
        let mut failed_placements = 0usize;

        for (type_index, spec) in site.specs().iter().enumerate() {
            for _ in 0..spec.quantity {
                let area = if spec.max_area > spec.min_area {
                    rng.random_range(spec.min_area..=spec.max_area)
                } else {
                    spec.min_area
                };

                let mut best: Option<(f64, BuildingInstance, Polygon)> = None;
                for _ in 0..attempts {
                    let candidate = BuildingInstance {
                        type_index,
                        position: bbox.sample(rng),
                        orientation: rng.random_range(0.0..std::f64::consts::PI),
                        area,
                        aspect_ratio: spec.aspect_ratio,
                    };
                    let footprint = candidate.footprint();
                    let violation = placement_violation(site, &footprint, &placed);
                    if best.as_ref().is_none_or(|(v, _, _)| violation < *v) {
                        let clean = violation <= 0.0;
                        best = Some((violation, candidate, footprint));
                        if clean {
                            break;
                        }
                    }
                }

                if let Some((violation, instance, footprint)) = best {
                    if violation > 0.0 {
                        failed_placements += 1;
                    }
                    placed.push(footprint);
                    buildings.push(instance);
                }
            }
        }

        Initialization {
            layout: Layout::new(buildings),
            failed_placements,
        }
    }
}

/// Violation score of one footprint against the site and already-placed footprints.
fn placement_violation(site: &Site, footprint: &Polygon, placed: &[Polygon]) -> f64 {
    let boundary = site.boundary();
    let protrusion = boundary.protrusion(footprint);
    let mut violation = 0.0;
    if protrusion > 0.0 {
        // Anything off-site ranks below any setback shortfall
        violation += protrusion + footprint.area().sqrt();
    } else if site.boundary_setback > 0.0 {
        violation += (site.boundary_setback - boundary.clearance(footprint)).max(0.0);
    }

    for other in placed.iter().chain(site.obstacles()) {
        let overlap = footprint.intersection_area(other);
        if overlap > 0.0 {
            violation += overlap;
        } else if site.building_setback > 0.0 {
            violation += (site.building_setback - footprint.distance(other)).max(0.0);
        }
    }
    violation
}
