//! Parallel annealing chains and candidate harvest.
//!
//! The [`ChainCoordinator`] runs `num_chains` independent
//! [`AnnealingChain`]s, each seeded from the master seed and its chain
//! index, and blocks until all reach a terminal state. It then produces an
//! immutable [`Harvest`]: the single best layout across chains plus a
//! diversity-filtered sample of near-best layouts from every chain.
//!
//! Chains share nothing mutable except the progress counters and the
//! cancellation token, so the harvest is identical whether chains run on
//! one thread or many.

use crate::error::{Error, Result};
use crate::objective::{Candidate, Evaluator, ObjectiveProfile};
use crate::progress::{CancelToken, Progress};
use crate::random::{derive_seed, Stream};
use crate::sa::{AnnealingChain, ChainResult, ChainState, SaConfig};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for the annealing phase.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CoordinatorConfig {
    /// Number of independent chains.
    pub num_chains: usize,

    /// Harvested layouts per chain, including the chain's best.
    pub samples_per_chain: usize,

    /// Minimum [`Layout::distance`](crate::layout::Layout::distance) between
    /// two layouts harvested from the same chain.
    pub min_sample_distance: f64,

    /// Run chains on the rayon pool. Results do not depend on this flag.
    pub parallel: bool,

    /// Per-chain annealing settings.
    pub sa: SaConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            num_chains: 4,
            samples_per_chain: 4,
            min_sample_distance: 1.0,
            parallel: true,
            sa: SaConfig::default(),
        }
    }
}

impl CoordinatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_chains == 0 {
            return Err(Error::Configuration("num_chains must be at least 1".into()));
        }
        if !(self.min_sample_distance.is_finite() && self.min_sample_distance >= 0.0) {
            return Err(Error::Configuration(
                "min_sample_distance must be non-negative".into(),
            ));
        }
        self.sa.validate()
    }
}

/// Output of the annealing phase.
#[derive(Debug, Clone)]
pub struct Harvest {
    /// Best layout across all chains.
    pub best: Candidate,

    /// Index of the chain that produced `best`.
    pub best_chain: usize,

    /// Diverse near-best layouts, grouped by chain in chain order.
    pub samples: Vec<Candidate>,

    /// Seed of every chain, by chain index.
    pub chain_seeds: Vec<u64>,

    /// Results of the chains that completed, in chain order.
    pub chains: Vec<ChainResult>,

    /// Chains that could not produce any evaluable layout.
    pub failed_chains: usize,

    /// Layout evaluations discarded as non-finite across all chains.
    pub discarded: usize,

    /// Whether any chain stopped on cancellation.
    pub cancelled: bool,
}

/// Runs and harvests a set of annealing chains.
pub struct ChainCoordinator<'a> {
    evaluator: &'a Evaluator,
    profile: &'a ObjectiveProfile,
    config: &'a CoordinatorConfig,
}

impl<'a> ChainCoordinator<'a> {
    pub fn new(
        evaluator: &'a Evaluator,
        profile: &'a ObjectiveProfile,
        config: &'a CoordinatorConfig,
    ) -> Self {
        Self {
            evaluator,
            profile,
            config,
        }
    }

    /// Seeds of the chains run under `master_seed`.
    pub fn chain_seeds(&self, master_seed: u64) -> Vec<u64> {
        (0..self.config.num_chains as u64)
            .map(|i| derive_seed(master_seed, Stream::Chain, &[i]))
            .collect()
    }

    /// Runs every chain to a terminal state and harvests the results.
    ///
    /// # Errors
    ///
    /// Returns the last chain error when no chain produced a layout.
    pub fn run(
        &self,
        master_seed: u64,
        cancel: Option<&CancelToken>,
        progress: Option<&Progress>,
    ) -> Result<Harvest> {
        self.config.validate()?;
        let seeds = self.chain_seeds(master_seed);
        if let Some(p) = progress {
            p.set_chains_total(seeds.len());
        }

        let run_chain = |(index, &seed): (usize, &u64)| -> Result<ChainResult> {
            let result = AnnealingChain::new(index, seed, self.evaluator, self.profile, &self.config.sa)
                .run_with_cancel(cancel, progress);
            if let Some(p) = progress {
                p.chain_completed();
                if let Ok(r) = &result {
                    p.record_best(r.best.score, r.best.evaluation.objectives);
                }
            }
            result
        };

        #[cfg(feature = "parallel")]
        let outcomes: Vec<Result<ChainResult>> = if self.config.parallel {
            seeds.par_iter().enumerate().map(run_chain).collect()
        } else {
            seeds.iter().enumerate().map(run_chain).collect()
        };

        #[cfg(not(feature = "parallel"))]
        let outcomes: Vec<Result<ChainResult>> = seeds.iter().enumerate().map(run_chain).collect();

        let mut chains = Vec::with_capacity(outcomes.len());
        let mut failed_chains = 0usize;
        let mut last_err = None;
        for (index, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(result) => chains.push(result),
                Err(e) => {
                    log::warn!("chain {index} failed and is dropped from the harvest: {e}");
                    failed_chains += 1;
                    last_err = Some(e);
                }
            }
        }

        let Some(best_result) = chains
            .iter()
            .min_by(|a, b| a.best.compare(&b.best).then(a.chain_index.cmp(&b.chain_index)))
        else {
            return Err(last_err
                .unwrap_or_else(|| Error::NumericInstability("no chain produced a layout".into())));
        };
        let best = best_result.best.clone();
        let best_chain = best_result.chain_index;

        let samples: Vec<Candidate> = chains
            .iter()
            .flat_map(|c| {
                diverse_samples(
                    c,
                    self.config.samples_per_chain,
                    self.config.min_sample_distance,
                )
            })
            .collect();

        let discarded = chains.iter().map(|c| c.discarded).sum();
        let cancelled = chains.iter().any(|c| c.state == ChainState::Cancelled);

        log::info!(
            "annealing finished: {} chains, best score {:.6} from chain {}, {} samples harvested",
            chains.len(),
            best.score,
            best_chain,
            samples.len()
        );

        Ok(Harvest {
            best,
            best_chain,
            samples,
            chain_seeds: seeds,
            chains,
            failed_chains,
            discarded,
            cancelled,
        })
    }
}

/// Picks up to `limit` near-best layouts from one chain.
///
/// Candidates are the chain's best plus its trajectory samples, taken in
/// score order; a candidate is kept only if it is farther than
/// `min_distance` from every layout already kept.
pub fn diverse_samples(chain: &ChainResult, limit: usize, min_distance: f64) -> Vec<Candidate> {
    if limit == 0 {
        return Vec::new();
    }
    let mut pool: Vec<&Candidate> = std::iter::once(&chain.best)
        .chain(chain.trajectory.iter())
        .collect();
    pool.sort_by(|a, b| a.compare(b));

    let mut kept: Vec<Candidate> = Vec::with_capacity(limit);
    for candidate in pool {
        if kept.len() >= limit {
            break;
        }
        if kept
            .iter()
            .all(|k| k.layout.distance(&candidate.layout) > min_distance)
        {
            kept.push(candidate.clone());
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Boundary;
    use crate::layout::{BuildingSpec, Site};
    use crate::objective::EvaluatorParams;

    fn evaluator() -> Evaluator {
        let site = Site::new(
            Boundary::rectangle(200.0, 200.0).unwrap(),
            vec![
                BuildingSpec::new("housing", 300.0, 500.0, 3),
                BuildingSpec::new("shop", 200.0, 300.0, 2),
            ],
        )
        .unwrap()
        .with_building_setback(5.0);
        Evaluator::new(site, EvaluatorParams::default()).unwrap()
    }

    fn config() -> CoordinatorConfig {
        CoordinatorConfig {
            num_chains: 3,
            samples_per_chain: 3,
            sa: SaConfig::default().with_max_iterations(120),
            ..CoordinatorConfig::default()
        }
    }

    #[test]
    fn test_chain_seeds_distinct_and_stable() {
        let ev = evaluator();
        let profile = ObjectiveProfile::balanced();
        let cfg = config();
        let coord = ChainCoordinator::new(&ev, &profile, &cfg);
        let seeds = coord.chain_seeds(42);
        assert_eq!(seeds.len(), 3);
        assert_eq!(seeds, coord.chain_seeds(42));
        assert_ne!(seeds[0], seeds[1]);
        assert_ne!(seeds[1], seeds[2]);
    }

    #[test]
    fn test_best_is_minimum_over_chains() {
        let ev = evaluator();
        let profile = ObjectiveProfile::balanced();
        let cfg = config();
        let harvest = ChainCoordinator::new(&ev, &profile, &cfg)
            .run(7, None, None)
            .unwrap();
        assert_eq!(harvest.chains.len(), 3);
        for c in &harvest.chains {
            assert!(harvest.best.compare(&c.best).is_le());
        }
        let winner = harvest
            .chains
            .iter()
            .find(|c| c.chain_index == harvest.best_chain)
            .unwrap();
        assert_eq!(winner.best, harvest.best);
        assert!(!harvest.cancelled);
    }

    #[test]
    fn test_samples_respect_distance_and_limit() {
        let ev = evaluator();
        let profile = ObjectiveProfile::balanced();
        let cfg = CoordinatorConfig {
            min_sample_distance: 5.0,
            ..config()
        };
        let harvest = ChainCoordinator::new(&ev, &profile, &cfg)
            .run(11, None, None)
            .unwrap();
        assert!(!harvest.samples.is_empty());
        for chain in &harvest.chains {
            let picked = diverse_samples(chain, cfg.samples_per_chain, cfg.min_sample_distance);
            assert!(picked.len() <= cfg.samples_per_chain);
            assert_eq!(picked[0], chain.best);
            for (i, a) in picked.iter().enumerate() {
                for b in &picked[i + 1..] {
                    assert!(a.layout.distance(&b.layout) > cfg.min_sample_distance);
                }
            }
        }
    }

    #[test]
    fn test_sequential_matches_parallel() {
        let ev = evaluator();
        let profile = ObjectiveProfile::balanced();
        let par = config();
        let seq = CoordinatorConfig {
            parallel: false,
            ..config()
        };
        let a = ChainCoordinator::new(&ev, &profile, &par).run(3, None, None).unwrap();
        let b = ChainCoordinator::new(&ev, &profile, &seq).run(3, None, None).unwrap();
        assert_eq!(a.best, b.best);
        assert_eq!(a.samples, b.samples);
        assert_eq!(a.chain_seeds, b.chain_seeds);
    }

    #[test]
    fn test_cancelled_run_still_harvests() {
        let ev = evaluator();
        let profile = ObjectiveProfile::balanced();
        let cfg = config();
        let token = CancelToken::new();
        token.cancel();
        let progress = Progress::new();
        let harvest = ChainCoordinator::new(&ev, &profile, &cfg)
            .run(1, Some(&token), Some(&progress))
            .unwrap();
        assert!(harvest.cancelled);
        assert_eq!(harvest.chains.len(), 3);
        assert_eq!(progress.snapshot().chains_completed, 3);
        assert!(progress.snapshot().best_score.is_some());
    }

    #[test]
    fn test_zero_chains_rejected() {
        let cfg = CoordinatorConfig {
            num_chains: 0,
            ..CoordinatorConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Configuration(_))));
    }
}
