//! The two-phase pipeline: parallel annealing, then NSGA-III refinement.
//!
//! ```no_run
//! use u_siteplan::geometry::Boundary;
//! use u_siteplan::layout::{BuildingSpec, Site};
//! use u_siteplan::objective::{EvaluatorParams, ObjectiveProfile};
//! use u_siteplan::optimizer::{Optimizer, OptimizerConfig};
//!
//! let site = Site::new(
//!     Boundary::rectangle(200.0, 150.0)?,
//!     vec![BuildingSpec::new("housing", 300.0, 500.0, 6)],
//! )?;
//! let result = Optimizer::run(
//!     site,
//!     ObjectiveProfile::balanced(),
//!     OptimizerConfig::fast().with_seed(42),
//!     EvaluatorParams::default(),
//! )?;
//! println!("{} layouts on the front", result.front.len());
//! # Ok::<(), u_siteplan::Error>(())
//! ```

mod config;
mod handle;
mod result;

pub use config::OptimizerConfig;
pub use handle::RunHandle;
pub use result::{OptimizationResult, ParetoMember, RunMetadata};

use crate::coordinator::ChainCoordinator;
use crate::error::{Error, Result, Warning};
use crate::layout::Site;
use crate::objective::{Evaluator, EvaluatorParams, ObjectiveProfile};
use crate::progress::{CancelToken, Phase, Progress, RunStatus};
use crate::refine::Refiner;
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Entry points of the pipeline.
pub struct Optimizer;

impl Optimizer {
    /// Runs the full pipeline on the calling thread.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] or [`Error::InvalidBoundary`] before any
    /// computation; [`Error::NumericInstability`] only if no layout at all
    /// could be evaluated.
    pub fn run(
        site: Site,
        profile: ObjectiveProfile,
        config: OptimizerConfig,
        params: EvaluatorParams,
    ) -> Result<OptimizationResult> {
        Self::run_with(
            site,
            &profile,
            &config,
            params,
            &CancelToken::new(),
            &Progress::new(),
        )
    }

    /// Validates inputs, then runs the pipeline on a background thread.
    pub fn spawn(
        site: Site,
        profile: ObjectiveProfile,
        config: OptimizerConfig,
        params: EvaluatorParams,
    ) -> Result<RunHandle> {
        config.validate()?;
        site.validate()?;
        params.validate()?;

        let progress = Arc::new(Progress::new());
        let cancel = CancelToken::new();
        let thread = {
            let progress = Arc::clone(&progress);
            let cancel = cancel.clone();
            std::thread::spawn(move || {
                Self::run_with(site, &profile, &config, params, &cancel, &progress)
            })
        };
        Ok(RunHandle::new(progress, cancel, thread))
    }

    /// Runs the pipeline with an external cancellation token and progress sink.
    pub fn run_with(
        site: Site,
        profile: &ObjectiveProfile,
        config: &OptimizerConfig,
        params: EvaluatorParams,
        cancel: &CancelToken,
        progress: &Progress,
    ) -> Result<OptimizationResult> {
        let outcome = Self::pipeline(site, profile, config, params, cancel, progress);
        progress.set_phase(Phase::Finished);
        progress.set_status(match &outcome {
            Ok(r) if r.cancelled => RunStatus::Cancelled,
            Ok(_) => RunStatus::Completed,
            Err(_) => RunStatus::Failed,
        });
        outcome
    }

    fn pipeline(
        site: Site,
        profile: &ObjectiveProfile,
        config: &OptimizerConfig,
        params: EvaluatorParams,
        cancel: &CancelToken,
        progress: &Progress,
    ) -> Result<OptimizationResult> {
        let start = Instant::now();
        config.validate()?;

        let mut warnings = Vec::new();
        if let Err(e) = site.check_capacity() {
            match e {
                Error::InfeasibleSpec(msg) => {
                    log::warn!("{msg}; continuing with a best-effort layout");
                    warnings.push(Warning::InfeasibleSpec(msg));
                }
                other => return Err(other),
            }
        }

        let evaluator = Evaluator::new(site, params)?;
        let master_seed = config.seed.unwrap_or_else(|| rand::rng().random());
        let cancel = match config.time_limit_ms {
            Some(ms) => cancel.clone().with_time_limit(Duration::from_millis(ms)),
            None => cancel.clone(),
        };

        log::info!(
            "starting annealing: {} chains, master seed {master_seed}",
            config.num_chains
        );
        progress.set_phase(Phase::Annealing);
        let coordinator_config = config.coordinator_config();
        let harvest = ChainCoordinator::new(&evaluator, profile, &coordinator_config).run(
            master_seed,
            Some(&cancel),
            Some(progress),
        )?;

        progress.set_phase(Phase::Refining);
        let refiner_config = config.refiner_config();
        let refiner = Refiner::new(&evaluator, profile, &refiner_config)?;
        let refined =
            refiner.run_with_cancel(&harvest.samples, master_seed, Some(&cancel), Some(progress))?;

        let front: Vec<ParetoMember> = refined.front.into_iter().map(ParetoMember::from).collect();

        let feasible_found = harvest.best.is_feasible() || front.iter().any(ParetoMember::is_feasible);
        if !feasible_found && warnings.is_empty() {
            let msg = "no feasible layout was found".to_string();
            log::warn!("{msg}");
            warnings.push(Warning::InfeasibleSpec(msg));
        }
        let discarded = harvest.discarded + refined.discarded;
        if discarded > 0 {
            warnings.push(Warning::DiscardedEvaluations { count: discarded });
        }
        let cancelled = harvest.cancelled || refined.cancelled;
        if cancelled {
            warnings.push(Warning::Cancelled);
        }

        let metadata = RunMetadata {
            master_seed,
            chain_seeds: harvest.chain_seeds,
            n_partitions: config.n_partitions,
            two_layer: config.two_layer,
            reference_directions: refiner.ranker().references().len(),
            active_objectives: refiner.active_objectives().to_vec(),
            chain_states: harvest.chains.iter().map(|c| c.state).collect(),
            annealing_iterations: harvest.chains.iter().map(|c| c.iterations).sum(),
            generations: refined.generations,
        };

        let elapsed = start.elapsed();
        log::info!(
            "optimization finished in {:.3}s: front of {}, {} warnings",
            elapsed.as_secs_f64(),
            front.len(),
            warnings.len()
        );

        Ok(OptimizationResult {
            front,
            sa_best: harvest.best,
            elapsed,
            metadata,
            warnings,
            cancelled,
        })
    }
}
