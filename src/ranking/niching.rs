//! Normalization, reference association, and niche-preserving selection.

use super::reference::{perpendicular_distance, ReferenceDirections};
use rand::Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How to choose among equally under-represented reference directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NicheTieBreak {
    /// Uniformly at random from the generation's niching stream.
    #[default]
    Random,
    /// The direction with the lowest index.
    LowestIndex,
}

/// Nearest reference direction of one member.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Association {
    /// Index into the reference set.
    pub reference: usize,
    /// Perpendicular distance to that direction in normalized space.
    pub distance: f64,
}

/// Translates by the ideal point and scales by the ideal–nadir range.
///
/// Axes with no spread map to 0.
pub fn normalize(objectives: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let Some(first) = objectives.first() else {
        return Vec::new();
    };
    let m = first.len();
    let mut ideal = vec![f64::INFINITY; m];
    let mut nadir = vec![f64::NEG_INFINITY; m];
    for obj in objectives {
        for (k, &v) in obj.iter().enumerate() {
            ideal[k] = ideal[k].min(v);
            nadir[k] = nadir[k].max(v);
        }
    }
    objectives
        .iter()
        .map(|obj| {
            obj.iter()
                .enumerate()
                .map(|(k, &v)| {
                    let range = nadir[k] - ideal[k];
                    if range > 1e-12 {
                        (v - ideal[k]) / range
                    } else {
                        0.0
                    }
                })
                .collect()
        })
        .collect()
}

/// Associates every normalized point with its nearest reference direction.
///
/// Ties go to the lower reference index.
pub fn associate(normalized: &[Vec<f64>], references: &ReferenceDirections) -> Vec<Association> {
    normalized
        .iter()
        .map(|point| {
            references
                .points()
                .iter()
                .enumerate()
                .map(|(j, dir)| Association {
                    reference: j,
                    distance: perpendicular_distance(point, dir),
                })
                .fold(None, |best: Option<Association>, a| match best {
                    Some(b) if b.distance <= a.distance => Some(b),
                    _ => Some(a),
                })
                .unwrap_or(Association {
                    reference: 0,
                    distance: 0.0,
                })
        })
        .collect()
}

/// Fills `slots` positions from `candidates` by reference-point niching.
///
/// `niche_counts` holds how many already-selected members each direction
/// has and is updated in place. Each round takes the least-represented
/// direction that still has candidates (ties resolved by `tie_break`) and
/// picks its candidate with the smallest perpendicular distance.
pub fn niche_fill<R: Rng>(
    candidates: &[usize],
    associations: &[Association],
    niche_counts: &mut [usize],
    slots: usize,
    tie_break: NicheTieBreak,
    rng: &mut R,
) -> Vec<usize> {
    let mut remaining: Vec<usize> = candidates.to_vec();
    let mut excluded = vec![false; niche_counts.len()];
    let mut chosen = Vec::with_capacity(slots);

    while chosen.len() < slots && !remaining.is_empty() {
        let Some(min_count) = niche_counts
            .iter()
            .zip(&excluded)
            .filter(|(_, &ex)| !ex)
            .map(|(&c, _)| c)
            .min()
        else {
            break;
        };
        let tied: Vec<usize> = (0..niche_counts.len())
            .filter(|&j| !excluded[j] && niche_counts[j] == min_count)
            .collect();
        let j = match tie_break {
            NicheTieBreak::Random => tied[rng.random_range(0..tied.len())],
            NicheTieBreak::LowestIndex => tied[0],
        };

        let pick = remaining
            .iter()
            .enumerate()
            .filter(|(_, &m)| associations[m].reference == j)
            .min_by(|(_, &a), (_, &b)| {
                associations[a]
                    .distance
                    .total_cmp(&associations[b].distance)
                    .then(a.cmp(&b))
            })
            .map(|(pos, _)| pos);

        match pick {
            Some(pos) => {
                chosen.push(remaining.swap_remove(pos));
                niche_counts[j] += 1;
            }
            None => excluded[j] = true,
        }
    }
    chosen
}
