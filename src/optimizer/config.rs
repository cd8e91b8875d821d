//! Pipeline configuration.
//!
//! [`OptimizerConfig`] holds every option of a run and derives the
//! per-phase configurations from them.

use crate::coordinator::CoordinatorConfig;
use crate::error::{Error, Result};
use crate::layout::DEFAULT_PLACEMENT_ATTEMPTS;
use crate::perturb::Perturbation;
use crate::ranking::NicheTieBreak;
use crate::refine::{CrossoverKind, RefinerConfig};
use crate::sa::{CoolingSchedule, SaConfig};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration of a full annealing + refinement run.
///
/// # Defaults
///
/// ```
/// use u_siteplan::optimizer::OptimizerConfig;
///
/// let config = OptimizerConfig::default();
/// assert_eq!(config.num_chains, 4);
/// assert_eq!(config.max_iterations, 500);
/// assert!((config.cooling_rate - 0.95).abs() < 1e-12);
/// ```
///
/// # Builder Pattern
///
/// ```
/// use u_siteplan::optimizer::OptimizerConfig;
///
/// let config = OptimizerConfig::default()
///     .with_num_chains(8)
///     .with_population_size(60)
///     .with_generations(40)
///     .with_seed(7);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OptimizerConfig {
    /// Starting temperature of every chain.
    pub initial_temp: f64,

    /// Chains converge once the temperature drops to this value.
    pub final_temp: f64,

    /// Geometric cooling factor, in (0, 1).
    pub cooling_rate: f64,

    /// Cooling schedule of every chain.
    pub cooling: CoolingSchedule,

    /// Iteration budget per chain.
    pub max_iterations: usize,

    /// Number of independent annealing chains.
    pub num_chains: usize,

    /// Refiner population size.
    pub population_size: usize,

    /// Refiner generations.
    pub n_generations: usize,

    /// Reference-point resolution.
    pub n_partitions: usize,

    /// Optional `(outer, inner)` partitions for a two-layer reference set.
    pub two_layer: Option<(usize, usize)>,

    /// Master seed. `None` draws one at run start; the seed actually used
    /// is reported in the run metadata.
    pub seed: Option<u64>,

    /// Wall-clock limit in milliseconds. When it elapses, chains and the
    /// refiner stop at their next check and return their best so far.
    pub time_limit_ms: Option<u64>,

    /// Use the rayon pool for chains and offspring evaluation.
    pub parallel: bool,

    /// Layouts harvested per chain for the initial population.
    pub samples_per_chain: usize,

    /// Minimum mean displacement between harvested layouts of one chain.
    pub min_sample_distance: f64,

    /// Current layout sampled every this many iterations per chain.
    pub trajectory_interval: usize,

    /// Random positions tried per building in random initialization.
    pub placement_attempts: usize,

    /// Neighbourhood operators shared by annealing and mutation.
    pub perturbation: Perturbation,

    /// Crossover granularity.
    pub crossover: CrossoverKind,

    /// Probability of crossover per offspring.
    pub crossover_rate: f64,

    /// Probability of mutating an offspring.
    pub mutation_rate: f64,

    /// Temperature handed to the perturbation engine for mutation.
    pub mutation_temperature: f64,

    /// Tie-break among equally under-represented reference directions.
    pub niche_tie_break: NicheTieBreak,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            initial_temp: 1000.0,
            final_temp: 0.1,
            cooling_rate: 0.95,
            cooling: CoolingSchedule::Geometric,
            max_iterations: 500,
            num_chains: 4,
            population_size: 40,
            n_generations: 30,
            n_partitions: 6,
            two_layer: None,
            seed: None,
            time_limit_ms: None,
            parallel: true,
            samples_per_chain: 4,
            min_sample_distance: 1.0,
            trajectory_interval: 10,
            placement_attempts: DEFAULT_PLACEMENT_ATTEMPTS,
            perturbation: Perturbation::default(),
            crossover: CrossoverKind::default(),
            crossover_rate: 0.9,
            mutation_rate: 0.3,
            mutation_temperature: 10.0,
            niche_tie_break: NicheTieBreak::default(),
        }
    }
}

impl OptimizerConfig {
    pub fn with_initial_temp(mut self, t: f64) -> Self {
        self.initial_temp = t;
        self
    }

    pub fn with_final_temp(mut self, t: f64) -> Self {
        self.final_temp = t;
        self
    }

    pub fn with_cooling_rate(mut self, rate: f64) -> Self {
        self.cooling_rate = rate;
        self
    }

    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn with_num_chains(mut self, n: usize) -> Self {
        self.num_chains = n;
        self
    }

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

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_time_limit_ms(mut self, ms: u64) -> Self {
        self.time_limit_ms = Some(ms);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_placement_attempts(mut self, n: usize) -> Self {
        self.placement_attempts = n;
        self
    }

    pub fn with_samples_per_chain(mut self, n: usize) -> Self {
        self.samples_per_chain = n;
        self
    }

    pub fn with_crossover(mut self, kind: CrossoverKind) -> Self {
        self.crossover = kind;
        self
    }

    pub fn with_niche_tie_break(mut self, tie_break: NicheTieBreak) -> Self {
        self.niche_tie_break = tie_break;
        self
    }

    pub fn with_perturbation(mut self, perturbation: Perturbation) -> Self {
        self.perturbation = perturbation;
        self
    }

    /// Preset for quick previews.
    ///
    /// - Chains: 2, Iterations: 200, Population: 20, Generations: 10
    /// - Time limit: 10s
    pub fn fast() -> Self {
        Self {
            num_chains: 2,
            max_iterations: 200,
            population_size: 20,
            n_generations: 10,
            n_partitions: 4,
            time_limit_ms: Some(10_000),
            ..Self::default()
        }
    }

    /// Preset trading quality against run time.
    ///
    /// - Chains: 4, Iterations: 500, Population: 40, Generations: 30
    /// - Time limit: 30s
    pub fn balanced() -> Self {
        Self {
            time_limit_ms: Some(30_000),
            ..Self::default()
        }
    }

    /// Preset for final designs: slower cooling, larger population.
    ///
    /// - Chains: 8, Cooling: 0.98, Iterations: 2000, Population: 100,
    ///   Generations: 100, two-layer references (6, 3)
    /// - Time limit: 120s
    pub fn quality() -> Self {
        Self {
            num_chains: 8,
            cooling_rate: 0.98,
            max_iterations: 2_000,
            population_size: 100,
            n_generations: 100,
            two_layer: Some((6, 3)),
            samples_per_chain: 8,
            time_limit_ms: Some(120_000),
            ..Self::default()
        }
    }

    /// Per-chain annealing settings.
    pub fn sa_config(&self) -> SaConfig {
        SaConfig {
            initial_temp: self.initial_temp,
            final_temp: self.final_temp,
            cooling_rate: self.cooling_rate,
            cooling: self.cooling,
            max_iterations: self.max_iterations,
            trajectory_interval: self.trajectory_interval,
            placement_attempts: self.placement_attempts,
            perturbation: self.perturbation.clone(),
        }
    }

    /// Annealing-phase settings.
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            num_chains: self.num_chains,
            samples_per_chain: self.samples_per_chain,
            min_sample_distance: self.min_sample_distance,
            parallel: self.parallel,
            sa: self.sa_config(),
        }
    }

    /// Refinement-phase settings.
    pub fn refiner_config(&self) -> RefinerConfig {
        RefinerConfig {
            population_size: self.population_size,
            n_generations: self.n_generations,
            n_partitions: self.n_partitions,
            two_layer: self.two_layer,
            crossover: self.crossover,
            crossover_rate: self.crossover_rate,
            mutation_rate: self.mutation_rate,
            mutation_temperature: self.mutation_temperature,
            niche_tie_break: self.niche_tie_break,
            perturbation: self.perturbation.clone(),
            placement_attempts: self.placement_attempts,
            parallel: self.parallel,
        }
    }

    /// Validates every option before any computation starts.
    pub fn validate(&self) -> Result<()> {
        if self.num_chains == 0 {
            return Err(Error::Configuration("num_chains must be at least 1".into()));
        }
        if self.population_size < 2 {
            return Err(Error::Configuration(
                "population_size must be at least 2".into(),
            ));
        }
        if self.cooling_rate >= 1.0 {
            return Err(Error::Configuration(format!(
                "cooling_rate must be below 1.0, got {}",
                self.cooling_rate
            )));
        }
        self.coordinator_config().validate()?;
        self.refiner_config().validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_valid() {
        for config in [
            OptimizerConfig::default(),
            OptimizerConfig::fast(),
            OptimizerConfig::balanced(),
            OptimizerConfig::quality(),
        ] {
            assert!(config.validate().is_ok(), "{config:?}");
        }
    }

    #[test]
    fn test_zero_chains() {
        let err = OptimizerConfig::default().with_num_chains(0).validate();
        assert!(matches!(err, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_population_size() {
        assert!(OptimizerConfig::default().with_population_size(0).validate().is_err());
        assert!(OptimizerConfig::default().with_population_size(1).validate().is_err());
        assert!(OptimizerConfig::default().with_population_size(2).validate().is_ok());
    }

    #[test]
    fn test_cooling_rate_at_least_one() {
        assert!(OptimizerConfig::default().with_cooling_rate(1.0).validate().is_err());
        assert!(OptimizerConfig::default().with_cooling_rate(1.2).validate().is_err());
    }

    #[test]
    fn test_phase_configs_follow_options() {
        let config = OptimizerConfig::default()
            .with_num_chains(3)
            .with_max_iterations(77)
            .with_population_size(12)
            .with_two_layer(3, 1)
            .with_placement_attempts(5)
            .with_parallel(false);
        let coord = config.coordinator_config();
        assert_eq!(coord.num_chains, 3);
        assert_eq!(coord.sa.max_iterations, 77);
        assert!(!coord.parallel);
        let refiner = config.refiner_config();
        assert_eq!(refiner.population_size, 12);
        assert_eq!(refiner.two_layer, Some((3, 1)));
        assert_eq!(coord.sa.placement_attempts, 5);
        assert_eq!(refiner.placement_attempts, 5);
    }
}
