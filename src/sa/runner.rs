//! Annealing chain execution loop.

use super::config::SaConfig;
use super::types::{AnnealingState, ChainResult, ChainState};
use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::objective::{Candidate, Evaluator, ObjectiveProfile};
use crate::progress::{CancelToken, Progress};
use crate::random::{create_rng, SiteRng};
use rand::Rng;

/// Fresh random layouts tried when the initial one cannot be evaluated.
const INIT_ATTEMPTS: usize = 8;

/// Metropolis acceptance criterion.
///
/// `improvement` is `current_score - candidate_score` (positive = better).
/// Improvements are always accepted; otherwise the move is accepted with
/// probability `exp(improvement / temperature)`.
pub fn metropolis_accept<R: Rng>(improvement: f64, temperature: f64, rng: &mut R) -> bool {
    if improvement > 0.0 {
        true
    } else if temperature > 0.0 {
        let probability = (improvement / temperature).exp();
        rng.random_range(0.0..1.0) < probability
    } else {
        false
    }
}

/// One independent Simulated Annealing run over site layouts.
///
/// Owns its [`AnnealingState`] and random stream; borrows the evaluator,
/// profile, and configuration immutably, so any number of chains can run
/// side by side.
pub struct AnnealingChain<'a> {
    index: usize,
    seed: u64,
    evaluator: &'a Evaluator,
    profile: &'a ObjectiveProfile,
    config: &'a SaConfig,
    rng: SiteRng,
    status: ChainState,
    state: Option<AnnealingState>,
    accepted_moves: usize,
    improving_moves: usize,
    noop_moves: usize,
    discarded: usize,
    failed_placements: usize,
    trajectory: Vec<Candidate>,
    cost_history: Vec<f64>,
    temperature_history: Vec<f64>,
}

impl<'a> AnnealingChain<'a> {
    pub fn new(
        index: usize,
        seed: u64,
        evaluator: &'a Evaluator,
        profile: &'a ObjectiveProfile,
        config: &'a SaConfig,
    ) -> Self {
        Self {
            index,
            seed,
            evaluator,
            profile,
            config,
            rng: create_rng(seed),
            status: ChainState::Initializing,
            state: None,
            accepted_moves: 0,
            improving_moves: 0,
            noop_moves: 0,
            discarded: 0,
            failed_placements: 0,
            trajectory: Vec::new(),
            cost_history: Vec::new(),
            temperature_history: Vec::new(),
        }
    }

    pub fn status(&self) -> ChainState {
        self.status
    }

    pub fn state(&self) -> Option<&AnnealingState> {
        self.state.as_ref()
    }

    /// Builds the initial layout and enters `Running`.
    ///
    /// # Errors
    ///
    /// [`Error::NumericInstability`] if no random layout could be evaluated.
    pub fn initialize(&mut self) -> Result<()> {
        let site = self.evaluator.site();
        let mut last_err = None;
        for _ in 0..INIT_ATTEMPTS {
            let init = Layout::random(site, self.config.placement_attempts, &mut self.rng);
            match Candidate::evaluate(init.layout, self.evaluator, self.profile) {
                Ok(candidate) => {
                    self.failed_placements = init.failed_placements;
                    self.cost_history.push(candidate.score);
                    self.temperature_history.push(self.config.initial_temp);
                    self.state = Some(AnnealingState {
                        best: candidate.clone(),
                        current: candidate,
                        temperature: self.config.initial_temp,
                        iteration: 0,
                    });
                    self.status = ChainState::Running;
                    return Ok(());
                }
                Err(e) => {
                    log::warn!("chain {}: discarding initial layout: {e}", self.index);
                    self.discarded += 1;
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            Error::NumericInstability("initial layout could not be evaluated".into())
        }))
    }

    /// Runs one perturb → evaluate → accept → cool iteration.
    ///
    /// Returns the state after the iteration. Calling `step` on a chain
    /// that is not `Running` does nothing.
    pub fn step(&mut self) -> ChainState {
        if self.status != ChainState::Running {
            return self.status;
        }
        let Some(state) = self.state.as_mut() else {
            return self.status;
        };
        let config = self.config;
        let bounds = self.evaluator.site().boundary().aabb();

        let (layout, mv) =
            config
                .perturbation
                .perturb(&state.current.layout, state.temperature, bounds, &mut self.rng);

        if !mv.applied {
            self.noop_moves += 1;
        } else {
            match Candidate::evaluate(layout, self.evaluator, self.profile) {
                Ok(candidate) => {
                    if candidate.compare(&state.best).is_lt() {
                        state.best = candidate.clone();
                    }
                    let improvement = state.current.score - candidate.score;
                    if metropolis_accept(improvement, state.temperature, &mut self.rng) {
                        if improvement > 0.0 {
                            self.improving_moves += 1;
                        }
                        self.accepted_moves += 1;
                        state.current = candidate;
                    }
                }
                Err(e) => {
                    log::warn!(
                        "chain {} iteration {}: discarding candidate: {e}",
                        self.index,
                        state.iteration
                    );
                    self.discarded += 1;
                }
            }
        }

        state.temperature = config.cool(state.temperature, state.iteration);
        state.iteration += 1;
        self.cost_history.push(state.best.score);
        self.temperature_history.push(state.temperature);

        if config.trajectory_interval > 0 && state.iteration % config.trajectory_interval == 0 {
            self.trajectory.push(state.current.clone());
        }

        if state.temperature <= config.final_temp {
            self.status = ChainState::Converged;
        } else if state.iteration >= config.max_iterations {
            self.status = ChainState::Exhausted;
        }

        if state.iteration % 100 == 0 {
            log::trace!(
                "chain {}: iteration {}, temp={:.4}, best={:.6}",
                self.index,
                state.iteration,
                state.temperature,
                state.best.score
            );
        }
        self.status
    }

    /// Runs the chain to a terminal state.
    pub fn run(self) -> Result<ChainResult> {
        self.run_with_cancel(None, None)
    }

    /// Runs with an optional cancellation token and progress sink.
    ///
    /// The token is checked between iterations only, so a cancelled chain
    /// always stops on a fully evaluated state and returns its best so far.
    pub fn run_with_cancel(
        mut self,
        cancel: Option<&CancelToken>,
        progress: Option<&Progress>,
    ) -> Result<ChainResult> {
        if self.status == ChainState::Initializing {
            self.initialize()?;
        }

        while self.status == ChainState::Running {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                self.status = ChainState::Cancelled;
                break;
            }
            self.step();
            if let Some(p) = progress {
                p.iteration_completed();
            }
        }

        self.finish()
    }

    fn finish(self) -> Result<ChainResult> {
        let state = self.state.ok_or_else(|| {
            Error::NumericInstability(format!("chain {} never initialized", self.index))
        })?;

        log::debug!(
            "chain {} finished: {:?} after {} iterations, temp={:.4}, best={:.6}, feasible={}",
            self.index,
            self.status,
            state.iteration,
            state.temperature,
            state.best.score,
            state.best.is_feasible()
        );

        Ok(ChainResult {
            chain_index: self.index,
            seed: self.seed,
            state: self.status,
            best: state.best,
            iterations: state.iteration,
            final_temperature: state.temperature,
            accepted_moves: self.accepted_moves,
            improving_moves: self.improving_moves,
            noop_moves: self.noop_moves,
            discarded: self.discarded,
            failed_placements: self.failed_placements,
            trajectory: self.trajectory,
            cost_history: self.cost_history,
            temperature_history: self.temperature_history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Boundary;
    use crate::layout::{BuildingSpec, Site};
    use crate::objective::EvaluatorParams;
    use crate::random::create_rng;

    fn evaluator() -> Evaluator {
        let site = Site::new(
            Boundary::rectangle(300.0, 300.0).unwrap(),
            vec![
                BuildingSpec::new("housing", 400.0, 800.0, 4),
                BuildingSpec::new("school", 900.0, 1200.0, 1).with_aspect_ratio(1.5),
            ],
        )
        .unwrap()
        .with_boundary_setback(5.0)
        .with_building_setback(8.0);
        Evaluator::new(site, EvaluatorParams::default()).unwrap()
    }

    #[test]
    fn test_metropolis_always_accepts_improvement() {
        let mut rng = create_rng(42);
        for _ in 0..10_000 {
            assert!(metropolis_accept(1e-12, 1e-9, &mut rng));
            assert!(metropolis_accept(5.0, 0.0, &mut rng));
        }
    }

    #[test]
    fn test_metropolis_empirical_rate() {
        let mut rng = create_rng(42);
        let (delta, t) = (-2.0, 4.0);
        let trials = 100_000;
        let accepted = (0..trials)
            .filter(|_| metropolis_accept(delta, t, &mut rng))
            .count();
        let rate = accepted as f64 / trials as f64;
        let expected = (delta / t).exp();
        assert!(
            (rate - expected).abs() < 0.01,
            "rate {rate} vs expected {expected}"
        );
    }

    #[test]
    fn test_metropolis_zero_temperature_rejects_worse() {
        let mut rng = create_rng(1);
        assert!(!metropolis_accept(-1.0, 0.0, &mut rng));
    }

    #[test]
    fn test_chain_converges_with_defaults() {
        let ev = evaluator();
        let profile = ObjectiveProfile::balanced();
        let config = SaConfig::default();
        let result = AnnealingChain::new(0, 42, &ev, &profile, &config).run().unwrap();

        // 1000 * 0.95^k <= 0.1 at k = 180 < 500
        assert_eq!(result.state, ChainState::Converged);
        assert_eq!(result.iterations, 180);
        assert!(result.final_temperature <= config.final_temp);
    }

    #[test]
    fn test_chain_exhausts_iteration_budget() {
        let ev = evaluator();
        let profile = ObjectiveProfile::balanced();
        let config = SaConfig::default().with_cooling_rate(0.999).with_max_iterations(50);
        let result = AnnealingChain::new(0, 42, &ev, &profile, &config).run().unwrap();
        assert_eq!(result.state, ChainState::Exhausted);
        assert_eq!(result.iterations, 50);
    }

    #[test]
    fn test_temperature_strictly_decreasing() {
        let ev = evaluator();
        let profile = ObjectiveProfile::balanced();
        let config = SaConfig::default();
        let result = AnnealingChain::new(0, 7, &ev, &profile, &config).run().unwrap();
        for w in result.temperature_history.windows(2) {
            assert!(w[1] < w[0], "temperature rose: {} -> {}", w[0], w[1]);
        }
    }

    #[test]
    fn test_best_history_non_increasing() {
        let ev = evaluator();
        let profile = ObjectiveProfile::balanced();
        let config = SaConfig::default();
        let result = AnnealingChain::new(0, 3, &ev, &profile, &config).run().unwrap();
        for w in result.cost_history.windows(2) {
            assert!(w[1] <= w[0]);
        }
        assert_eq!(result.cost_history.last().copied(), Some(result.best.score));
    }

    #[test]
    fn test_chain_deterministic_for_seed() {
        let ev = evaluator();
        let profile = ObjectiveProfile::balanced();
        let config = SaConfig::default();
        let a = AnnealingChain::new(0, 99, &ev, &profile, &config).run().unwrap();
        let b = AnnealingChain::new(0, 99, &ev, &profile, &config).run().unwrap();
        assert_eq!(a.best, b.best);
        assert_eq!(a.cost_history, b.cost_history);
    }

    #[test]
    fn test_chain_cancellation_returns_initial_best() {
        let ev = evaluator();
        let profile = ObjectiveProfile::balanced();
        let config = SaConfig::default();
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = AnnealingChain::new(0, 5, &ev, &profile, &config)
            .run_with_cancel(Some(&cancel), None)
            .unwrap();
        assert_eq!(result.state, ChainState::Cancelled);
        assert_eq!(result.iterations, 0);
        assert_eq!(result.best.layout.len(), 5);
    }

    #[test]
    fn test_state_machine_transitions() {
        let ev = evaluator();
        let profile = ObjectiveProfile::balanced();
        let config = SaConfig::default().with_max_iterations(3).with_cooling_rate(0.999);
        let mut chain = AnnealingChain::new(0, 1, &ev, &profile, &config);
        assert_eq!(chain.status(), ChainState::Initializing);
        assert_eq!(chain.step(), ChainState::Initializing);
        chain.initialize().unwrap();
        assert_eq!(chain.status(), ChainState::Running);
        assert_eq!(chain.step(), ChainState::Running);
        assert_eq!(chain.step(), ChainState::Running);
        assert_eq!(chain.step(), ChainState::Exhausted);
        assert_eq!(chain.step(), ChainState::Exhausted);
        assert_eq!(chain.state().unwrap().iteration, 3);
    }

    #[test]
    fn test_trajectory_sampling() {
        let ev = evaluator();
        let profile = ObjectiveProfile::balanced();
        let config = SaConfig::default()
            .with_cooling_rate(0.999)
            .with_max_iterations(100)
            .with_trajectory_interval(10);
        let result = AnnealingChain::new(0, 1, &ev, &profile, &config).run().unwrap();
        assert_eq!(result.trajectory.len(), 10);
    }

    #[test]
    fn test_progress_counts_iterations() {
        let ev = evaluator();
        let profile = ObjectiveProfile::balanced();
        let config = SaConfig::default().with_cooling_rate(0.999).with_max_iterations(25);
        let progress = Progress::new();
        AnnealingChain::new(0, 1, &ev, &profile, &config)
            .run_with_cancel(None, Some(&progress))
            .unwrap();
        assert_eq!(progress.snapshot().iterations, 25);
    }
}
