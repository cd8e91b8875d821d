//! Building specifications, placed instances, and the site definition.

use crate::error::{Error, Result};
use crate::geometry::{Boundary, Point, Polygon};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A requested building type.
///
/// # Examples
///
/// ```
/// use u_siteplan::layout::BuildingSpec;
///
/// let spec = BuildingSpec::new("housing", 400.0, 900.0, 6)
///     .with_aspect_ratio(1.5)
///     .with_cost_per_area(2.0);
/// assert!(spec.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BuildingSpec {
    /// Building type identifier.
    pub type_id: String,
    /// Smallest allowed footprint area.
    pub min_area: f64,
    /// Largest allowed footprint area.
    pub max_area: f64,
    /// Number of buildings of this type to place.
    pub quantity: usize,
    /// Footprint width / depth.
    pub aspect_ratio: f64,
    /// Construction cost per unit of footprint area.
    pub cost_per_area: f64,
}

impl BuildingSpec {
    pub fn new(type_id: impl Into<String>, min_area: f64, max_area: f64, quantity: usize) -> Self {
        Self {
            type_id: type_id.into(),
            min_area,
            max_area,
            quantity,
            aspect_ratio: 1.0,
            cost_per_area: 1.0,
        }
    }

    pub fn with_aspect_ratio(mut self, ratio: f64) -> Self {
        self.aspect_ratio = ratio;
        self
    }

    pub fn with_cost_per_area(mut self, cost: f64) -> Self {
        self.cost_per_area = cost;
        self
    }

    /// Validates the specification.
    pub fn validate(&self) -> Result<()> {
        if self.type_id.is_empty() {
            return Err(Error::Configuration("building type_id must not be empty".into()));
        }
        if !(self.min_area.is_finite() && self.min_area > 0.0) {
            return Err(Error::Configuration(format!(
                "{}: min_area must be positive, got {}",
                self.type_id, self.min_area
            )));
        }
        if !self.max_area.is_finite() || self.max_area < self.min_area {
            return Err(Error::Configuration(format!(
                "{}: max_area must be >= min_area, got {} < {}",
                self.type_id, self.max_area, self.min_area
            )));
        }
        if !(self.aspect_ratio.is_finite() && self.aspect_ratio > 0.0) {
            return Err(Error::Configuration(format!(
                "{}: aspect_ratio must be positive",
                self.type_id
            )));
        }
        if !(self.cost_per_area.is_finite() && self.cost_per_area >= 0.0) {
            return Err(Error::Configuration(format!(
                "{}: cost_per_area must be non-negative",
                self.type_id
            )));
        }
        Ok(())
    }
}

/// One placed building.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BuildingInstance {
    /// Index into [`Site::specs`].
    pub type_index: usize,
    /// Footprint centre.
    pub position: Point,
    /// Rotation in radians.
    pub orientation: f64,
    /// Footprint area.
    pub area: f64,
    /// Footprint width / depth.
    pub aspect_ratio: f64,
}

impl BuildingInstance {
    /// Width and depth of the footprint rectangle.
    pub fn dimensions(&self) -> (f64, f64) {
        let width = (self.area * self.aspect_ratio).sqrt();
        let depth = if width > 0.0 { self.area / width } else { 0.0 };
        (width, depth)
    }

    /// The oriented footprint rectangle, counter-clockwise.
    pub fn footprint(&self) -> Polygon {
        let (w, d) = self.dimensions();
        let (hw, hd) = (w / 2.0, d / 2.0);
        let corners = [
            Point::new(-hw, -hd),
            Point::new(hw, -hd),
            Point::new(hw, hd),
            Point::new(-hw, hd),
        ];
        Polygon::new(
            corners
                .iter()
                .map(|c| c.rotate(self.orientation).add(self.position))
                .collect(),
        )
    }
}

/// Immutable inputs of one optimization run.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Site {
    boundary: Boundary,
    specs: Vec<BuildingSpec>,
    obstacles: Vec<Polygon>,
    /// Minimum clearance between a footprint and the site boundary.
    pub boundary_setback: f64,
    /// Minimum clearance between two footprints (or a footprint and an obstacle).
    pub building_setback: f64,
}

impl Site {
    /// Creates a site with no setbacks and no obstacles.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if `specs` is empty, a spec is invalid, or
    /// two specs share a type id.
    pub fn new(boundary: Boundary, specs: Vec<BuildingSpec>) -> Result<Self> {
        let site = Self {
            boundary,
            specs,
            obstacles: Vec::new(),
            boundary_setback: 0.0,
            building_setback: 0.0,
        };
        site.validate()?;
        Ok(site)
    }

    pub fn with_boundary_setback(mut self, setback: f64) -> Self {
        self.boundary_setback = setback;
        self
    }

    pub fn with_building_setback(mut self, setback: f64) -> Self {
        self.building_setback = setback;
        self
    }

    /// Adds existing structures that new buildings must keep clear of.
    pub fn with_obstacles(mut self, obstacles: Vec<Polygon>) -> Self {
        self.obstacles = obstacles.iter().map(Polygon::to_ccw).collect();
        self
    }

    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    pub fn specs(&self) -> &[BuildingSpec] {
        &self.specs
    }

    pub fn obstacles(&self) -> &[Polygon] {
        &self.obstacles
    }

    /// Total number of buildings requested across all specs.
    pub fn total_quantity(&self) -> usize {
        self.specs.iter().map(|s| s.quantity).sum()
    }

    /// Validates specs and setbacks.
    pub fn validate(&self) -> Result<()> {
        if self.specs.is_empty() {
            return Err(Error::Configuration("at least one building spec is required".into()));
        }
        for (i, spec) in self.specs.iter().enumerate() {
            spec.validate()?;
            if self.specs[..i].iter().any(|s| s.type_id == spec.type_id) {
                return Err(Error::Configuration(format!(
                    "duplicate building type '{}'",
                    spec.type_id
                )));
            }
        }
        if self.total_quantity() == 0 {
            return Err(Error::Configuration("no buildings requested".into()));
        }
        for (name, value) in [
            ("boundary_setback", self.boundary_setback),
            ("building_setback", self.building_setback),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(Error::Configuration(format!(
                    "{name} must be non-negative, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Area-based capacity check.
    ///
    /// Compares the total minimum footprint area, inflated by the building
    /// setback, against the usable site area (boundary minus obstacles and
    /// the boundary setback strip).
    ///
    /// # Errors
    ///
    /// [`Error::InfeasibleSpec`] when the request cannot fit.
    pub fn check_capacity(&self) -> Result<()> {
        let s = self.building_setback;
        let required: f64 = self
            .specs
            .iter()
            .map(|spec| {
                let w = (spec.min_area * spec.aspect_ratio).sqrt();
                let d = spec.min_area / w;
                (w + s) * (d + s) * spec.quantity as f64
            })
            .sum();

        let aabb = self.boundary.aabb();
        let perimeter = self.boundary.perimeter();
        let obstacle_area: f64 = self.obstacles.iter().map(Polygon::area).sum();
        let usable =
            self.boundary.area() - perimeter * self.boundary_setback - obstacle_area;

        if required > usable {
            return Err(Error::InfeasibleSpec(format!(
                "requested footprint {required:.2} exceeds usable site area {:.2}",
                usable.max(0.0)
            )));
        }

        let inner_w = aabb.width() - 2.0 * self.boundary_setback;
        let inner_h = aabb.height() - 2.0 * self.boundary_setback;
        for spec in &self.specs {
            if spec.quantity == 0 {
                continue;
            }
            let w = (spec.min_area * spec.aspect_ratio).sqrt();
            let d = spec.min_area / w;
            if w.min(d) > inner_w.min(inner_h) || w.max(d) > inner_w.max(inner_h) {
                return Err(Error::InfeasibleSpec(format!(
                    "a single '{}' footprint ({w:.2} x {d:.2}) does not fit the site",
                    spec.type_id
                )));
            }
        }
        Ok(())
    }
}
