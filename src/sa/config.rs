//! Annealing configuration and cooling schedules.

use crate::error::{Error, Result};
use crate::layout::DEFAULT_PLACEMENT_ATTEMPTS;
use crate::perturb::Perturbation;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Cooling schedule for temperature reduction.
///
/// One temperature step is taken after every iteration.
///
/// # References
///
/// - Geometric: standard textbook approach
/// - Linear: fixed-duration cooling
/// - LundyMees: Lundy & Mees (1986), with convergence proof
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CoolingSchedule {
    /// `T_{k+1} = cooling_rate * T_k`.
    #[default]
    Geometric,

    /// `T_k = T_0 - k * (T_0 - T_final) / max_iterations`.
    ///
    /// Reaches `final_temp` exactly at `max_iterations`.
    Linear,

    /// `T_{k+1} = T_k / (1 + cooling_rate * T_k)`.
    ///
    /// Cools fast at high T, slow at low T.
    LundyMees,
}

/// Configuration of one annealing chain.
///
/// # Examples
///
/// ```
/// use u_siteplan::sa::{CoolingSchedule, SaConfig};
///
/// let config = SaConfig::default()
///     .with_initial_temp(500.0)
///     .with_final_temp(0.5)
///     .with_cooling_rate(0.97)
///     .with_max_iterations(2_000);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.cooling, CoolingSchedule::Geometric);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SaConfig {
    /// Starting temperature.
    pub initial_temp: f64,

    /// The chain converges once the temperature drops to this value.
    pub final_temp: f64,

    /// Alpha for `Geometric` (must be in (0, 1)), beta for `LundyMees`.
    /// Ignored by `Linear`.
    pub cooling_rate: f64,

    /// Cooling schedule.
    pub cooling: CoolingSchedule,

    /// Hard iteration budget; the chain is exhausted when it is reached.
    pub max_iterations: usize,

    /// Record the current layout every this many iterations (0 = never).
    pub trajectory_interval: usize,

    /// Random positions tried per building when building the initial layout.
    pub placement_attempts: usize,

    /// Neighbourhood operators.
    pub perturbation: Perturbation,
}

impl Default for SaConfig {
    fn default() -> Self {
        Self {
            initial_temp: 1000.0,
            final_temp: 0.1,
            cooling_rate: 0.95,
            cooling: CoolingSchedule::default(),
            max_iterations: 500,
            trajectory_interval: 10,
            placement_attempts: DEFAULT_PLACEMENT_ATTEMPTS,
            perturbation: Perturbation::default(),
        }
    }
}

impl SaConfig {
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

    pub fn with_cooling(mut self, cooling: CoolingSchedule) -> Self {
        self.cooling = cooling;
        self
    }

    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn with_trajectory_interval(mut self, n: usize) -> Self {
        self.trajectory_interval = n;
        self
    }

    pub fn with_placement_attempts(mut self, n: usize) -> Self {
        self.placement_attempts = n;
        self
    }

    pub fn with_perturbation(mut self, perturbation: Perturbation) -> Self {
        self.perturbation = perturbation;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if !(self.initial_temp.is_finite() && self.initial_temp > 0.0) {
            return Err(Error::Configuration("initial_temp must be positive".into()));
        }
        if !(self.final_temp.is_finite() && self.final_temp > 0.0) {
            return Err(Error::Configuration("final_temp must be positive".into()));
        }
        if self.final_temp >= self.initial_temp {
            return Err(Error::Configuration(
                "final_temp must be less than initial_temp".into(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(Error::Configuration("max_iterations must be at least 1".into()));
        }
        match self.cooling {
            CoolingSchedule::Geometric => {
                if !(self.cooling_rate > 0.0 && self.cooling_rate < 1.0) {
                    return Err(Error::Configuration(format!(
                        "geometric cooling_rate must be in (0, 1), got {}",
                        self.cooling_rate
                    )));
                }
            }
            CoolingSchedule::LundyMees => {
                if !(self.cooling_rate.is_finite() && self.cooling_rate > 0.0) {
                    return Err(Error::Configuration(format!(
                        "lundy-mees cooling_rate must be positive, got {}",
                        self.cooling_rate
                    )));
                }
            }
            CoolingSchedule::Linear => {}
        }
        self.perturbation.validate()
    }

    /// Temperature after `step + 1` cooling steps, given the current one.
    pub fn cool(&self, temperature: f64, step: usize) -> f64 {
        match self.cooling {
            CoolingSchedule::Geometric => temperature * self.cooling_rate,
            CoolingSchedule::Linear => {
                let t = self.initial_temp
                    - (step + 1) as f64 * (self.initial_temp - self.final_temp)
                        / self.max_iterations as f64;
                t.max(self.final_temp)
            }
            CoolingSchedule::LundyMees => temperature / (1.0 + self.cooling_rate * temperature),
        }
    }
}
