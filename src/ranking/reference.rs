//! Structured reference directions on the unit simplex.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A set of reference directions, each a point on the unit simplex
/// (non-negative components summing to 1).
///
/// # References
///
/// - Das & Dennis (1998), "Normal-Boundary Intersection"
/// - Deb & Jain (2014), "An Evolutionary Many-Objective Optimization
///   Algorithm Using Reference-Point-Based Nondominated Sorting Approach"
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReferenceDirections {
    dims: usize,
    points: Vec<Vec<f64>>,
}

impl ReferenceDirections {
    /// Das–Dennis lattice with `partitions` divisions per axis.
    ///
    /// Yields `C(partitions + dims - 1, dims - 1)` directions. With zero
    /// partitions the single centroid direction is returned.
    pub fn das_dennis(dims: usize, partitions: usize) -> Self {
        let points = if dims == 0 {
            Vec::new()
        } else if partitions == 0 {
            vec![vec![1.0 / dims as f64; dims]]
        } else {
            let mut points = Vec::new();
            let mut current = Vec::with_capacity(dims);
            lattice(dims, partitions, partitions, &mut current, &mut points);
            points
        };
        Self { dims, points }
    }

    /// Two-layer lattice: a boundary layer with `outer` partitions plus an
    /// inner layer with `inner` partitions shrunk halfway toward the
    /// centroid, so interior directions exist even when `outer < dims`.
    pub fn two_layer(dims: usize, outer: usize, inner: usize) -> Self {
        let mut set = Self::das_dennis(dims, outer);
        if dims == 0 {
            return set;
        }
        let centroid = 1.0 / dims as f64;
        let inner_layer = Self::das_dennis(dims, inner);
        set.points.extend(
            inner_layer
                .points
                .into_iter()
                .map(|p| p.into_iter().map(|v| 0.5 * v + 0.5 * centroid).collect()),
        );
        set
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Vec<f64>] {
        &self.points
    }

    pub fn get(&self, index: usize) -> &[f64] {
        &self.points[index]
    }
}

/// Enumerates integer compositions of `total` into `dims` parts, scaled by
/// `1 / partitions`.
fn lattice(
    dims: usize,
    remaining: usize,
    partitions: usize,
    current: &mut Vec<f64>,
    out: &mut Vec<Vec<f64>>,
) {
    if current.len() == dims - 1 {
        let mut point = current.clone();
        point.push(remaining as f64 / partitions as f64);
        out.push(point);
        return;
    }
    for k in 0..=remaining {
        current.push(k as f64 / partitions as f64);
        lattice(dims, remaining - k, partitions, current, out);
        current.pop();
    }
}

/// Perpendicular distance from `point` to the line through the origin along
/// `direction`.
pub fn perpendicular_distance(point: &[f64], direction: &[f64]) -> f64 {
    let norm_sq: f64 = direction.iter().map(|d| d * d).sum();
    if norm_sq <= 0.0 {
        return point.iter().map(|p| p * p).sum::<f64>().sqrt();
    }
    let t = point.iter().zip(direction).map(|(p, d)| p * d).sum::<f64>() / norm_sq;
    point
        .iter()
        .zip(direction)
        .map(|(p, d)| {
            let r = p - t * d;
            r * r
        })
        .sum::<f64>()
        .sqrt()
}
