//! Objective kinds and weighted objective profiles.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The supported objectives, in their fixed vector order.
///
/// All objectives are stored minimized. Adjacency and diversity are
/// naturally "higher is better" and are negated by the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ObjectiveKind {
    /// Construction cost: footprint, roads, and site disturbance.
    Cost,
    /// Deviation of inter-building distances from the walkable band.
    WalkingDistance,
    /// Negated proximity-weighted type compatibility.
    Adjacency,
    /// Negated entropy of the placed type distribution.
    Diversity,
}

impl ObjectiveKind {
    /// All kinds in vector order.
    pub const ALL: [ObjectiveKind; 4] = [
        ObjectiveKind::Cost,
        ObjectiveKind::WalkingDistance,
        ObjectiveKind::Adjacency,
        ObjectiveKind::Diversity,
    ];

    pub const COUNT: usize = Self::ALL.len();

    /// Position in an [`ObjectiveVector`](super::ObjectiveVector).
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            ObjectiveKind::Cost => "cost",
            ObjectiveKind::WalkingDistance => "walking_distance",
            ObjectiveKind::Adjacency => "adjacency",
            ObjectiveKind::Diversity => "diversity",
        }
    }
}

impl fmt::Display for ObjectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ObjectiveKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cost" => Ok(ObjectiveKind::Cost),
            "walking_distance" | "walking" | "walkability" => Ok(ObjectiveKind::WalkingDistance),
            "adjacency" => Ok(ObjectiveKind::Adjacency),
            "diversity" => Ok(ObjectiveKind::Diversity),
            other => Err(Error::Configuration(format!("unknown objective '{other}'"))),
        }
    }
}

/// Which objectives are active and how they are weighted.
///
/// Selected once per run and never mutated. Weights are non-negative,
/// finite, and sum to a positive total; an objective with weight 0 is
/// inactive and excluded from Pareto ranking.
///
/// # Examples
///
/// ```
/// use u_siteplan::objective::{ObjectiveKind, ObjectiveProfile};
///
/// let profile = ObjectiveProfile::from_names(&[("cost", 2.0), ("walkability", 1.0)]).unwrap();
/// assert_eq!(profile.active(), vec![ObjectiveKind::Cost, ObjectiveKind::WalkingDistance]);
///
/// assert!(ObjectiveProfile::from_names(&[("beauty", 1.0)]).is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ObjectiveProfile {
    weights: [f64; ObjectiveKind::COUNT],
}

impl ObjectiveProfile {
    /// Builds a profile from explicit `(kind, weight)` pairs.
    ///
    /// Kinds not listed get weight 0.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] on duplicate kinds, negative or non-finite
    /// weights, or a non-positive total.
    pub fn new(weights: impl IntoIterator<Item = (ObjectiveKind, f64)>) -> Result<Self> {
        let mut table = [0.0; ObjectiveKind::COUNT];
        let mut seen = [false; ObjectiveKind::COUNT];
        for (kind, w) in weights {
            if seen[kind.index()] {
                return Err(Error::Configuration(format!("objective '{kind}' listed twice")));
            }
            if !w.is_finite() || w < 0.0 {
                return Err(Error::Configuration(format!(
                    "weight for '{kind}' must be finite and non-negative, got {w}"
                )));
            }
            seen[kind.index()] = true;
            table[kind.index()] = w;
        }
        let total: f64 = table.iter().sum();
        if total <= 0.0 {
            return Err(Error::Configuration("objective weights must sum to a positive total".into()));
        }
        Ok(Self { weights: table })
    }

    /// Builds a profile from `(name, weight)` pairs, failing on unknown names.
    pub fn from_names(weights: &[(&str, f64)]) -> Result<Self> {
        let parsed = weights
            .iter()
            .map(|&(name, w)| name.parse::<ObjectiveKind>().map(|kind| (kind, w)))
            .collect::<Result<Vec<_>>>()?;
        Self::new(parsed)
    }

    /// All four objectives, equally weighted.
    pub fn balanced() -> Self {
        Self {
            weights: [1.0; ObjectiveKind::COUNT],
        }
    }

    /// Cost-dominated trade-off with walkability.
    pub fn cost_focused() -> Self {
        Self {
            weights: [3.0, 1.0, 0.0, 0.0],
        }
    }

    /// Walkability and adjacency first, cost second.
    pub fn walkability_focused() -> Self {
        Self {
            weights: [1.0, 3.0, 2.0, 0.0],
        }
    }

    pub fn weight(&self, kind: ObjectiveKind) -> f64 {
        self.weights[kind.index()]
    }

    /// Weights rescaled to sum to 1.
    pub fn normalized_weights(&self) -> [f64; ObjectiveKind::COUNT] {
        let total: f64 = self.weights.iter().sum();
        self.weights.map(|w| w / total)
    }

    /// Objectives with positive weight, in vector order.
    pub fn active(&self) -> Vec<ObjectiveKind> {
        ObjectiveKind::ALL
            .into_iter()
            .filter(|k| self.weight(*k) > 0.0)
            .collect()
    }
}

impl Default for ObjectiveProfile {
    fn default() -> Self {
        Self::balanced()
    }
}
