//! Polygons and the validated site boundary.

use super::{Aabb, Point, EPSILON};
use crate::error::{Error, Result};
use geo::orient::{Direction, Orient};
use geo::{
    Area, BooleanOps, BoundingRect, Contains, ConvexHull, Coord, Distance, Euclidean, Intersects,
    LineString, MultiLineString, MultiPoint,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A simple polygon without holes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Polygon {
    inner: geo::Polygon<f64>,
}

impl Polygon {
    /// Wraps a vertex ring without validation. The ring is closed implicitly.
    pub fn new(vertices: Vec<Point>) -> Self {
        let ring: Vec<Coord<f64>> = vertices.into_iter().map(Coord::from).collect();
        Self {
            inner: geo::Polygon::new(LineString::from(ring), Vec::new()),
        }
    }

    /// Axis-aligned rectangle polygon, counter-clockwise.
    pub fn rectangle(min: Point, max: Point) -> Self {
        Self::new(vec![
            min,
            Point::new(max.x, min.y),
            max,
            Point::new(min.x, max.y),
        ])
    }

    /// Wraps a `geo` polygon; interior rings are dropped.
    pub fn from_geo(polygon: geo::Polygon<f64>) -> Self {
        let (exterior, _) = polygon.into_inner();
        Self {
            inner: geo::Polygon::new(exterior, Vec::new()),
        }
    }

    pub fn as_geo(&self) -> &geo::Polygon<f64> {
        &self.inner
    }

    /// Vertices of the ring, without the closing duplicate.
    pub fn vertices(&self) -> impl Iterator<Item = Point> + '_ {
        let coords = &self.inner.exterior().0;
        coords[..coords.len().saturating_sub(1)]
            .iter()
            .map(|&c| Point::from(c))
    }

    pub fn len(&self) -> usize {
        self.inner.exterior().0.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Positive for counter-clockwise rings.
    pub fn signed_area(&self) -> f64 {
        self.inner.signed_area()
    }

    pub fn area(&self) -> f64 {
        self.inner.unsigned_area()
    }

    pub fn perimeter(&self) -> f64 {
        self.inner
            .exterior()
            .lines()
            .map(|l| Point::from(l.start).distance(l.end.into()))
            .sum()
    }

    pub fn aabb(&self) -> Option<Aabb> {
        self.inner.bounding_rect().map(Aabb::from)
    }

    /// Whether `p` lies strictly inside the polygon.
    pub fn contains(&self, p: Point) -> bool {
        self.inner.contains(&Coord::from(p))
    }

    /// Overlap area with `other`.
    pub fn intersection_area(&self, other: &Polygon) -> f64 {
        match (self.aabb(), other.aabb()) {
            (Some(a), Some(b)) if a.intersects(&b) && self.inner.intersects(&other.inner) => {
                self.inner.intersection(&other.inner).unsigned_area()
            }
            _ => 0.0,
        }
    }

    /// Minimum distance between the two polygons (0 if they touch or overlap).
    pub fn distance(&self, other: &Polygon) -> f64 {
        Euclidean.distance(&self.inner, &other.inner)
    }

    /// Returns a copy wound counter-clockwise.
    pub fn to_ccw(&self) -> Polygon {
        Polygon {
            inner: self.inner.orient(Direction::Default),
        }
    }

    /// Whether two non-adjacent edges intersect.
    pub fn is_self_intersecting(&self) -> bool {
        let lines: Vec<_> = self.inner.exterior().lines().collect();
        let n = lines.len();
        if n < 4 {
            return false;
        }
        for i in 0..n {
            for j in (i + 1)..n {
                // Adjacent edges always share a vertex
                if j == i + 1 || (i == 0 && j == n - 1) {
                    continue;
                }
                if lines[i].intersects(&lines[j]) {
                    return true;
                }
            }
        }
        false
    }
}

/// Convex hull of a point set, counter-clockwise. Non-finite points are ignored.
pub fn convex_hull(points: &[Point]) -> Polygon {
    let coords: Vec<Coord<f64>> = points
        .iter()
        .filter(|p| p.is_finite())
        .map(|&p| Coord::from(p))
        .collect();
    Polygon::from_geo(MultiPoint::from(coords).convex_hull())
}

/// The site polygon: simple, non-degenerate, counter-clockwise.
///
/// Immutable once constructed; all optimizer components borrow it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Boundary {
    polygon: Polygon,
    aabb: Aabb,
    area: f64,
    perimeter: f64,
}

impl Boundary {
    /// Validates and normalizes a site polygon.
    ///
    /// A trailing vertex equal to the first one is dropped.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidBoundary`] if the ring has fewer than 3 distinct
    /// vertices, non-finite coordinates, zero area, or crossing edges.
    pub fn new(mut points: Vec<Point>) -> Result<Self> {
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        if points.len() < 3 {
            return Err(Error::InvalidBoundary(format!(
                "need at least 3 vertices, got {}",
                points.len()
            )));
        }
        if let Some(p) = points.iter().find(|p| !p.is_finite()) {
            return Err(Error::InvalidBoundary(format!("non-finite vertex {p:?}")));
        }
        let polygon = Polygon::new(points);
        if polygon.area() < EPSILON {
            return Err(Error::InvalidBoundary("polygon has zero area".into()));
        }
        if polygon.is_self_intersecting() {
            return Err(Error::InvalidBoundary("polygon is self-intersecting".into()));
        }
        let polygon = polygon.to_ccw();
        let aabb = polygon
            .aabb()
            .ok_or_else(|| Error::InvalidBoundary("empty polygon".into()))?;
        Ok(Self {
            area: polygon.area(),
            perimeter: polygon.perimeter(),
            polygon,
            aabb,
        })
    }

    /// Axis-aligned rectangular site.
    pub fn rectangle(width: f64, height: f64) -> Result<Self> {
        Self::new(vec![
            Point::new(0.0, 0.0),
            Point::new(width, 0.0),
            Point::new(width, height),
            Point::new(0.0, height),
        ])
    }

    pub fn polygon(&self) -> &Polygon {
        &self.polygon
    }

    pub fn aabb(&self) -> &Aabb {
        &self.aabb
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn perimeter(&self) -> f64 {
        self.perimeter
    }

    pub fn contains(&self, p: Point) -> bool {
        self.aabb.contains(p) && self.polygon.contains(p)
    }

    /// Whether `shape` lies inside the site. Touching the boundary from
    /// the inside counts as contained.
    pub fn contains_polygon(&self, shape: &Polygon) -> bool {
        if !self
            .polygon
            .inner
            .exterior()
            .intersects(shape.inner.exterior())
        {
            // Rings apart: inside iff any vertex is
            return shape.vertices().next().is_some_and(|p| self.contains(p));
        }
        self.polygon.inner.contains(&shape.inner)
    }

    /// Area of `shape` lying outside the site.
    pub fn outside_area(&self, shape: &Polygon) -> f64 {
        shape.inner.difference(&self.polygon.inner).unsigned_area()
    }

    /// How deep `shape` sticks out of the site; 0 iff contained.
    ///
    /// The larger of the deepest outside vertex's distance to the boundary
    /// ring and the mean depth of the outside region, measured as its area
    /// over the length of boundary running through `shape`. The second
    /// term covers footprints that straddle a reflex corner with every
    /// vertex inside.
    pub fn protrusion(&self, shape: &Polygon) -> f64 {
        if self.contains_polygon(shape) {
            return 0.0;
        }
        let ring = self.polygon.inner.exterior();
        let vertex_depth = shape
            .vertices()
            .filter(|&p| !self.contains(p))
            .map(|p| Euclidean.distance(&geo::Point::from(p), ring))
            .fold(0.0, f64::max);

        let outside = self.outside_area(shape);
        let mean_depth = if outside > 0.0 {
            let crossing = shape
                .inner
                .clip(&MultiLineString::new(vec![ring.clone()]), false);
            let chord: f64 = crossing
                .iter()
                .flat_map(|ls| ls.lines())
                .map(|l| Point::from(l.start).distance(l.end.into()))
                .sum();
            if chord > EPSILON {
                outside / chord
            } else {
                outside.sqrt()
            }
        } else {
            0.0
        };

        vertex_depth.max(mean_depth).max(f64::MIN_POSITIVE)
    }

    /// Clearance between `shape` and the boundary ring.
    pub fn clearance(&self, shape: &Polygon) -> f64 {
        Euclidean.distance(self.polygon.inner.exterior(), shape.inner.exterior())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn unit_square() -> Polygon {
        Polygon::rectangle(Point::new(0.0, 0.0), Point::new(1.0, 1.0))
    }

    /// 100 x 100 square with the top-right quadrant removed.
    fn l_shape() -> Boundary {
        Boundary::new(vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 50.0),
            Point::new(50.0, 50.0),
            Point::new(50.0, 100.0),
            Point::new(0.0, 100.0),
        ])
        .unwrap()
    }

    fn oriented_rect(centre: Point, width: f64, depth: f64, angle: f64) -> Polygon {
        let (hw, hd) = (width / 2.0, depth / 2.0);
        Polygon::new(
            [(-hw, -hd), (hw, -hd), (hw, hd), (-hw, hd)]
                .iter()
                .map(|&(x, y)| Point::new(x, y).rotate(angle).add(centre))
                .collect(),
        )
    }

    #[test]
    fn test_area_and_orientation() {
        let sq = unit_square();
        assert_eq!(sq.len(), 4);
        assert!((sq.signed_area() - 1.0).abs() < 1e-12);
        let mut rev: Vec<Point> = sq.vertices().collect();
        rev.reverse();
        let cw = Polygon::new(rev);
        assert!(cw.signed_area() < 0.0);
        assert!(cw.to_ccw().signed_area() > 0.0);
        assert!((sq.perimeter() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_contains() {
        let sq = unit_square();
        assert!(sq.contains(Point::new(0.5, 0.5)));
        assert!(!sq.contains(Point::new(1.5, 0.5)));
        assert!(!sq.contains(Point::new(-0.1, 0.5)));
    }

    #[test]
    fn test_intersection_area() {
        let a = unit_square();
        let b = Polygon::rectangle(Point::new(0.5, 0.5), Point::new(1.5, 1.5));
        assert!((a.intersection_area(&b) - 0.25).abs() < 1e-6);

        let c = Polygon::rectangle(Point::new(2.0, 2.0), Point::new(3.0, 3.0));
        assert_eq!(a.intersection_area(&c), 0.0);
    }

    #[test]
    fn test_distance() {
        let a = unit_square();
        let b = Polygon::rectangle(Point::new(3.0, 0.0), Point::new(4.0, 1.0));
        assert!((a.distance(&b) - 2.0).abs() < 1e-12);

        let inner = Polygon::rectangle(Point::new(0.25, 0.25), Point::new(0.75, 0.75));
        assert_eq!(a.distance(&inner), 0.0);
    }

    #[test]
    fn test_convex_hull() {
        let pts = vec![
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(2.0, 2.0),
            Point::new(0.0, 2.0),
        ];
        let hull = convex_hull(&pts);
        assert_eq!(hull.len(), 4);
        assert!((hull.area() - 4.0).abs() < 1e-12);
        assert!(hull.signed_area() > 0.0);
    }

    #[test]
    fn test_boundary_rejects_degenerate() {
        assert!(matches!(
            Boundary::new(vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)]),
            Err(Error::InvalidBoundary(_))
        ));
        assert!(matches!(
            Boundary::new(vec![
                Point::new(0.0, 0.0),
                Point::new(1.0, 0.0),
                Point::new(2.0, 0.0),
            ]),
            Err(Error::InvalidBoundary(_))
        ));
    }

    #[test]
    fn test_boundary_rejects_bowtie() {
        let bowtie = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(1.0, 0.0),
            Point::new(0.0, 1.0),
        ];
        assert!(matches!(Boundary::new(bowtie), Err(Error::InvalidBoundary(_))));
    }

    #[test]
    fn test_boundary_normalizes_cw_and_closing_vertex() {
        let pts = vec![
            Point::new(0.0, 0.0),
            Point::new(0.0, 2.0),
            Point::new(2.0, 2.0),
            Point::new(2.0, 0.0),
            Point::new(0.0, 0.0),
        ];
        let b = Boundary::new(pts).unwrap();
        assert_eq!(b.polygon().len(), 4);
        assert!(b.polygon().signed_area() > 0.0);
        assert!((b.area() - 4.0).abs() < 1e-12);
        assert!((b.perimeter() - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_boundary_protrusion_and_clearance() {
        let site = Boundary::rectangle(10.0, 10.0).unwrap();
        let inside = Polygon::rectangle(Point::new(2.0, 2.0), Point::new(4.0, 4.0));
        assert!(site.contains_polygon(&inside));
        assert_eq!(site.protrusion(&inside), 0.0);
        assert!((site.clearance(&inside) - 2.0).abs() < 1e-12);

        let sticking_out = Polygon::rectangle(Point::new(8.0, 2.0), Point::new(11.5, 4.0));
        assert!(!site.contains_polygon(&sticking_out));
        assert!((site.protrusion(&sticking_out) - 1.5).abs() < 1e-4);
        assert!((site.outside_area(&sticking_out) - 3.0).abs() < 1e-4);
    }

    #[test]
    fn test_l_shape_reflex_corner_crossing() {
        let site = l_shape();
        assert!((site.area() - 7500.0).abs() < 1e-9);

        // 63.64 x 14.14 bar centred in the notch, every corner inside an arm
        let width = (900.0f64 * 4.5).sqrt();
        let bar = oriented_rect(
            Point::new(62.5, 62.5),
            width,
            900.0 / width,
            -std::f64::consts::FRAC_PI_4,
        );
        assert!(bar.vertices().all(|p| site.contains(p)));
        assert!(!site.contains_polygon(&bar));

        assert!((site.outside_area(&bar) - 500.0).abs() < 1e-3);
        // 500 outside over 40 of boundary crossing the bar
        assert!((site.protrusion(&bar) - 12.5).abs() < 1e-3);
    }

    #[test]
    fn test_l_shape_arm_is_contained() {
        let site = l_shape();
        let in_arm = Polygon::rectangle(Point::new(10.0, 60.0), Point::new(40.0, 90.0));
        assert!(site.contains_polygon(&in_arm));
        assert_eq!(site.protrusion(&in_arm), 0.0);
        assert!((site.clearance(&in_arm) - 10.0).abs() < 1e-12);

        let in_notch = Polygon::rectangle(Point::new(60.0, 60.0), Point::new(90.0, 90.0));
        assert!(!site.contains_polygon(&in_notch));
        assert!(site.protrusion(&in_notch) >= 10.0);
    }

    proptest! {
        #[test]
        fn prop_overlap_bounded_by_smaller_area(
            x in -2.0f64..2.0, y in -2.0f64..2.0, w in 0.1f64..3.0, h in 0.1f64..3.0
        ) {
            let a = unit_square();
            let b = Polygon::rectangle(Point::new(x, y), Point::new(x + w, y + h));
            let overlap = a.intersection_area(&b);
            prop_assert!(overlap >= -1e-9);
            prop_assert!(overlap <= a.area().min(b.area()) + 1e-6);
        }

        #[test]
        fn prop_protrusion_grows_with_offset(d1 in 0.5f64..5.0, extra in 0.5f64..5.0) {
            let site = Boundary::rectangle(20.0, 20.0).unwrap();
            let shifted = |d: f64| Polygon::rectangle(Point::new(15.0 + d, 5.0), Point::new(20.0 + d, 10.0));
            let near = site.protrusion(&shifted(d1));
            let far = site.protrusion(&shifted(d1 + extra));
            prop_assert!(far > near);
        }
    }
}
