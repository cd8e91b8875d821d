//! Derived road geometry.

use crate::geometry::Point;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Roads connecting the placed buildings.
///
/// Derived from building positions as the Euclidean minimum spanning tree
/// over building centres; never edited directly.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoadNetwork {
    /// Edges as pairs of building indices.
    pub segments: Vec<(usize, usize)>,
    /// Total length of all segments.
    pub length: f64,
}

impl RoadNetwork {
    /// Builds the network with Prim's algorithm on the complete graph (O(n²)).
    pub fn connect(centres: &[Point]) -> Self {
        let n = centres.len();
        if n < 2 {
            return Self::default();
        }

        let mut in_tree = vec![false; n];
        let mut best_dist = vec![f64::INFINITY; n];
        let mut best_from = vec![0usize; n];
        let mut segments = Vec::with_capacity(n - 1);
        let mut length = 0.0;

        in_tree[0] = true;
        for j in 1..n {
            best_dist[j] = centres[0].distance(centres[j]);
        }

        for _ in 1..n {
            let mut next = None;
            let mut next_dist = f64::INFINITY;
            for j in 0..n {
                if !in_tree[j] && (next.is_none() || best_dist[j] < next_dist) {
                    next = Some(j);
                    next_dist = best_dist[j];
                }
            }
            let Some(v) = next else { break };

            in_tree[v] = true;
            segments.push((best_from[v], v));
            length += next_dist;

            for j in 0..n {
                if !in_tree[j] {
                    let d = centres[v].distance(centres[j]);
                    if d < best_dist[j] {
                        best_dist[j] = d;
                        best_from[j] = v;
                    }
                }
            }
        }

        Self { segments, length }
    }
}
