//! Refiner configuration.

use super::operators::CrossoverKind;
use crate::error::{Error, Result};
use crate::layout::DEFAULT_PLACEMENT_ATTEMPTS;
use crate::perturb::Perturbation;
use crate::ranking::{NicheTieBreak, ReferenceDirections};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration of the evolutionary refiner.
///
/// # Examples
///
/// ```
/// use u_siteplan::refine::{CrossoverKind, RefinerConfig};
///
/// let config = RefinerConfig::default()
///     .with_population_size(40)
///     .with_generations(25)
///     .with_partitions(6)
///     .with_crossover(CrossoverKind::SinglePoint);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RefinerConfig {
    /// Members kept after every generation.
    pub population_size: usize,

    /// Generations to run.
    pub n_generations: usize,

    /// Das–Dennis partitions per objective axis.
    pub n_partitions: usize,

    /// `(outer, inner)` partitions for a two-layer reference set.
    /// Overrides `n_partitions` when set.
    pub two_layer: Option<(usize, usize)>,

    /// How parent placements are exchanged.
    pub crossover: CrossoverKind,

    /// Probability of crossover per offspring; otherwise the first parent is copied.
    pub crossover_rate: f64,

    /// Probability that an offspring receives one perturbation.
    pub mutation_rate: f64,

    /// Temperature handed to the perturbation engine for mutations.
    pub mutation_temperature: f64,

    /// Choice among equally under-represented reference directions.
    pub niche_tie_break: NicheTieBreak,

    /// Operators used for mutation.
    pub perturbation: Perturbation,

    /// Samples per building when generating padding layouts.
    pub placement_attempts: usize,

    /// Evaluate offspring on the rayon pool. Results do not depend on this flag.
    pub parallel: bool,
}

impl Default for RefinerConfig {
    fn default() -> Self {
        Self {
            population_size: 40,
            n_generations: 30,
            n_partitions: 6,
            two_layer: None,
            crossover: CrossoverKind::default(),
            crossover_rate: 0.9,
            mutation_rate: 0.3,
            mutation_temperature: 10.0,
            niche_tie_break: NicheTieBreak::default(),
            perturbation: Perturbation::default(),
            placement_attempts: DEFAULT_PLACEMENT_ATTEMPTS,
            parallel: true,
        }
    }
}

impl RefinerConfig {
    pub fn with_population_size(mut self, n: usize) -> Self {
        self.population_size = n;
        self
    }

    pub fn with_generations(mut self, n: usize) -> Self {
        self.n_generations = n;
        self
    }

    pub fn with_partitions(mut self, n: usize) -> Self {
        self.n_partitions = n;
        self
    }

    pub fn with_two_layer(mut self, outer: usize, inner: usize) -> Self {
        self.two_layer = Some((outer, inner));
        self
    }

    pub fn with_crossover(mut self, kind: CrossoverKind) -> Self {
        self.crossover = kind;
        self
    }

    pub fn with_crossover_rate(mut self, rate: f64) -> Self {
        self.crossover_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_mutation_temperature(mut self, t: f64) -> Self {
        self.mutation_temperature = t;
        self
    }

    pub fn with_niche_tie_break(mut self, tie_break: NicheTieBreak) -> Self {
        self.niche_tie_break = tie_break;
        self
    }

    pub fn with_placement_attempts(mut self, n: usize) -> Self {
        self.placement_attempts = n;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Reference directions for `dims` active objectives.
    pub fn reference_directions(&self, dims: usize) -> ReferenceDirections {
        match self.two_layer {
            Some((outer, inner)) => ReferenceDirections::two_layer(dims, outer, inner),
            None => ReferenceDirections::das_dennis(dims, self.n_partitions),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.population_size < 2 {
            return Err(Error::Configuration(
                "population_size must be at least 2".into(),
            ));
        }
        match self.two_layer {
            Some((outer, inner)) if outer == 0 || inner == 0 => {
                return Err(Error::Configuration(
                    "two-layer partition counts must be positive".into(),
                ));
            }
            None if self.n_partitions == 0 => {
                return Err(Error::Configuration("n_partitions must be positive".into()));
            }
            _ => {}
        }
        if !(0.0..=1.0).contains(&self.crossover_rate) || !(0.0..=1.0).contains(&self.mutation_rate)
        {
            return Err(Error::Configuration(
                "crossover_rate and mutation_rate must be in [0, 1]".into(),
            ));
        }
        if !(self.mutation_temperature.is_finite() && self.mutation_temperature > 0.0) {
            return Err(Error::Configuration(
                "mutation_temperature must be positive".into(),
            ));
        }
        self.perturbation.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_valid() {
        assert!(RefinerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_population_too_small() {
        let config = RefinerConfig::default().with_population_size(1);
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_partitions() {
        assert!(RefinerConfig::default().with_partitions(0).validate().is_err());
        assert!(RefinerConfig::default()
            .with_partitions(0)
            .with_two_layer(3, 2)
            .validate()
            .is_ok());
        assert!(RefinerConfig::default().with_two_layer(3, 0).validate().is_err());
    }

    #[test]
    fn test_reference_directions_layers() {
        let single = RefinerConfig::default().with_partitions(4).reference_directions(3);
        assert_eq!(single.len(), 15);
        let layered = RefinerConfig::default().with_two_layer(2, 1).reference_directions(3);
        assert_eq!(layered.len(), 6 + 3);
    }

    #[test]
    fn test_bad_mutation_temperature() {
        let config = RefinerConfig::default().with_mutation_temperature(0.0);
        assert!(config.validate().is_err());
    }
}
