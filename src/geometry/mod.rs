//! 2D geometry for site layouts, backed by [`geo`].
//!
//! Everything here operates on `f64` coordinates in site units. Area,
//! containment, boolean overlap, and distances are delegated to `geo`;
//! the types in this module are thin domain wrappers around it.
//!
//! # Key Types
//!
//! - [`Point`]: a 2D point / vector
//! - [`Aabb`]: axis-aligned bounding box
//! - [`Polygon`]: a `geo::Polygon<f64>` without holes
//! - [`Boundary`]: a validated, counter-clockwise, simple site polygon

mod polygon;

pub use polygon::{convex_hull, Boundary, Polygon};

use geo::{Coord, Rect};
use rand::Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tolerance used for degenerate-geometry checks.
pub const EPSILON: f64 = 1e-9;

/// A point (or vector) in the plane.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn add(self, other: Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }

    pub fn sub(self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    pub fn scale(self, k: f64) -> Point {
        Point::new(self.x * k, self.y * k)
    }

    pub fn dot(self, other: Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// z-component of the 3D cross product.
    pub fn cross(self, other: Point) -> f64 {
        self.x * other.y - self.y * other.x
    }

    pub fn norm(self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn distance(self, other: Point) -> f64 {
        self.sub(other).norm()
    }

    /// Rotates the vector counter-clockwise by `angle` radians.
    pub fn rotate(self, angle: f64) -> Point {
        let (s, c) = angle.sin_cos();
        Point::new(self.x * c - self.y * s, self.x * s + self.y * c)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<Point> for Coord<f64> {
    fn from(p: Point) -> Self {
        Coord { x: p.x, y: p.y }
    }
}

impl From<Coord<f64>> for Point {
    fn from(c: Coord<f64>) -> Self {
        Point::new(c.x, c.y)
    }
}

impl From<Point> for geo::Point<f64> {
    fn from(p: Point) -> Self {
        geo::Point::new(p.x, p.y)
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Aabb {
    pub min: Point,
    pub max: Point,
}

impl From<Rect<f64>> for Aabb {
    fn from(rect: Rect<f64>) -> Self {
        Self {
            min: rect.min().into(),
            max: rect.max().into(),
        }
    }
}

impl Aabb {
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn diagonal(&self) -> f64 {
        self.min.distance(self.max)
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }

    /// Grows the box by `margin` on every side.
    pub fn expand(&self, margin: f64) -> Aabb {
        Aabb {
            min: Point::new(self.min.x - margin, self.min.y - margin),
            max: Point::new(self.max.x + margin, self.max.y + margin),
        }
    }

    /// Uniformly samples a point inside the box.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Point {
        let x = if self.width() > 0.0 {
            rng.random_range(self.min.x..=self.max.x)
        } else {
            self.min.x
        };
        let y = if self.height() > 0.0 {
            rng.random_range(self.min.y..=self.max.y)
        } else {
            self.min.y
        };
        Point::new(x, y)
    }
}
