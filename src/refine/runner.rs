//! Generational loop of the evolutionary refiner.

use super::config::RefinerConfig;
use super::operators::{binary_tournament, crossover, TournamentKey};
use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::objective::{Candidate, Evaluator, ObjectiveKind, ObjectiveProfile};
use crate::progress::{CancelToken, Progress};
use crate::random::{stream_rng, Stream};
use crate::ranking::{constrained_non_dominated_sort, Association, ParetoRanker, Ranking};
use rand::Rng;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A population slot: an evaluated layout plus its ranking data.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub candidate: Candidate,
    /// Non-domination rank under constrained dominance: every feasible
    /// front precedes every infeasible member, and infeasible members are
    /// layered by increasing total violation.
    pub rank: usize,
    /// Nearest reference direction and perpendicular distance to it.
    pub association: Association,
    /// Members of the population sharing this member's reference direction.
    pub niche_count: usize,
}

impl Member {
    fn tournament_key(&self) -> TournamentKey {
        TournamentKey {
            violation: self.candidate.evaluation.total_violation(),
            rank: self.rank,
            distance: self.association.distance,
        }
    }
}

/// Output of a refiner run.
#[derive(Debug, Clone)]
pub struct RefinerResult {
    /// Rank-0 members of the final population, sorted by active objectives.
    pub front: Vec<Member>,

    /// The final population.
    pub population: Vec<Member>,

    /// Generations completed.
    pub generations: usize,

    /// Offspring and padding layouts dropped after non-finite evaluation.
    pub discarded: usize,

    /// Whether the run stopped on cancellation.
    pub cancelled: bool,

    /// Size of the first front after every generation (index 0 = initial).
    pub front_history: Vec<usize>,
}

/// NSGA-III style refiner seeded from annealing output.
pub struct Refiner<'a> {
    evaluator: &'a Evaluator,
    profile: &'a ObjectiveProfile,
    config: &'a RefinerConfig,
    active: Vec<ObjectiveKind>,
    ranker: ParetoRanker,
}

impl<'a> Refiner<'a> {
    /// # Errors
    ///
    /// [`Error::Configuration`] if the configuration is invalid.
    pub fn new(
        evaluator: &'a Evaluator,
        profile: &'a ObjectiveProfile,
        config: &'a RefinerConfig,
    ) -> Result<Self> {
        config.validate()?;
        let active = profile.active();
        let ranker = ParetoRanker::new(
            config.reference_directions(active.len()),
            config.niche_tie_break,
        );
        Ok(Self {
            evaluator,
            profile,
            config,
            active,
            ranker,
        })
    }

    pub fn ranker(&self) -> &ParetoRanker {
        &self.ranker
    }

    pub fn active_objectives(&self) -> &[ObjectiveKind] {
        &self.active
    }

    /// Runs the refiner from `seeds` for the configured number of generations.
    pub fn run(&self, seeds: &[Candidate], master_seed: u64) -> Result<RefinerResult> {
        self.run_with_cancel(seeds, master_seed, None, None)
    }

    /// Runs with an optional cancellation token and progress sink.
    ///
    /// Cancellation is checked before each generation; a cancelled run
    /// returns the front of the last completed generation.
    pub fn run_with_cancel(
        &self,
        seeds: &[Candidate],
        master_seed: u64,
        cancel: Option<&CancelToken>,
        progress: Option<&Progress>,
    ) -> Result<RefinerResult> {
        let size = self.config.population_size;
        let (initial, mut discarded) = self.initial_population(seeds, master_seed);
        if initial.is_empty() {
            return Err(Error::NumericInstability(
                "no layout of the initial population could be evaluated".into(),
            ));
        }

        let mut niche_rng = stream_rng(master_seed, Stream::Niching, &[0]);
        let mut population = self.survive(initial, size, &mut niche_rng);
        let mut front_history = vec![count_front(&population)];
        let mut generations = 0usize;
        let mut cancelled = false;

        for gen in 0..self.config.n_generations {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                cancelled = true;
                break;
            }

            let (offspring, dropped) = self.offspring(&population, master_seed, gen as u64);
            discarded += dropped;

            let mut merged: Vec<Candidate> =
                population.into_iter().map(|m| m.candidate).collect();
            merged.extend(offspring);

            let mut niche_rng = stream_rng(master_seed, Stream::Niching, &[gen as u64 + 1]);
            population = self.survive(merged, size, &mut niche_rng);
            generations = gen + 1;
            front_history.push(count_front(&population));

            if let Some(p) = progress {
                p.set_generation(generations);
                if let Some(best) = population.iter().map(|m| &m.candidate).min_by(|a, b| a.compare(b)) {
                    p.record_best(best.score, best.evaluation.objectives);
                }
            }

            log::debug!(
                "generation {}: front size {}, feasible {}/{}",
                generations,
                front_history[generations],
                population.iter().filter(|m| m.candidate.is_feasible()).count(),
                population.len()
            );
        }

        let mut front: Vec<Member> = population.iter().filter(|m| m.rank == 0).cloned().collect();
        front.sort_by(|a, b| {
            let (pa, pb) = (
                a.candidate.evaluation.objectives.project(&self.active),
                b.candidate.evaluation.objectives.project(&self.active),
            );
            pa.iter()
                .zip(&pb)
                .map(|(x, y)| x.total_cmp(y))
                .find(|o| o.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        log::info!(
            "refinement finished: {} generations, front of {} layouts",
            generations,
            front.len()
        );

        Ok(RefinerResult {
            front,
            population,
            generations,
            discarded,
            cancelled,
            front_history,
        })
    }

    /// Seeds padded with random layouts up to `population_size`.
    ///
    /// Padding layout `k` draws from its own stream, so padding is the same
    /// whether it is generated on one thread or many. Returns the population
    /// and the number of padding layouts dropped.
    pub fn initial_population(&self, seeds: &[Candidate], master_seed: u64) -> (Vec<Candidate>, usize) {
        let mut population: Vec<Candidate> = seeds.to_vec();
        let needed = self.config.population_size.saturating_sub(population.len());
        let site = self.evaluator.site();

        let pad = |k: u64| -> Result<Candidate> {
            let mut rng = stream_rng(master_seed, Stream::Padding, &[k]);
            let init = Layout::random(site, self.config.placement_attempts, &mut rng);
            Candidate::evaluate(init.layout, self.evaluator, self.profile)
        };
        let padded = self.map_indices(needed, pad);

        let mut discarded = 0usize;
        for outcome in padded {
            match outcome {
                Ok(c) => population.push(c),
                Err(e) => {
                    log::warn!("discarding padding layout: {e}");
                    discarded += 1;
                }
            }
        }
        (population, discarded)
    }

    /// Creates one generation of offspring.
    fn offspring(&self, population: &[Member], master_seed: u64, gen: u64) -> (Vec<Candidate>, usize) {
        let keys: Vec<TournamentKey> = population.iter().map(Member::tournament_key).collect();
        let mut rng = stream_rng(master_seed, Stream::Generation, &[gen]);
        let parents: Vec<(usize, usize)> = (0..self.config.population_size)
            .map(|_| {
                (
                    binary_tournament(&keys, &mut rng),
                    binary_tournament(&keys, &mut rng),
                )
            })
            .collect();

        let bounds = self.evaluator.site().boundary().aabb();
        let config = self.config;
        let breed = |k: u64| -> Result<Candidate> {
            let (i, j) = parents[k as usize];
            let mut rng = stream_rng(master_seed, Stream::Offspring, &[gen, k]);
            let (a, b) = (&population[i].candidate.layout, &population[j].candidate.layout);
            let mut child = if rng.random_range(0.0..1.0) < config.crossover_rate {
                crossover(a, b, config.crossover, &mut rng)
            } else {
                a.clone()
            };
            if rng.random_range(0.0..1.0) < config.mutation_rate {
                child = config
                    .perturbation
                    .perturb(&child, config.mutation_temperature, bounds, &mut rng)
                    .0;
            }
            Candidate::evaluate(child, self.evaluator, self.profile)
        };

        let mut children = Vec::with_capacity(parents.len());
        let mut dropped = 0usize;
        for outcome in self.map_indices(parents.len(), breed) {
            match outcome {
                Ok(c) => children.push(c),
                Err(e) => {
                    log::warn!("generation {gen}: discarding offspring: {e}");
                    dropped += 1;
                }
            }
        }
        (children, dropped)
    }

    /// Feasibility-first environmental selection.
    ///
    /// Feasible candidates are truncated by non-dominated sorting and
    /// reference-point niching. If they do not fill `target`, infeasible
    /// candidates follow in order of increasing total violation, and the
    /// survivors are re-ranked under constrained dominance.
    pub fn survive<R: Rng>(&self, candidates: Vec<Candidate>, target: usize, rng: &mut R) -> Vec<Member> {
        let (feasible, mut infeasible): (Vec<Candidate>, Vec<Candidate>) =
            candidates.into_iter().partition(Candidate::is_feasible);

        let objectives = |cs: &[Candidate]| -> Vec<Vec<f64>> {
            cs.iter()
                .map(|c| c.evaluation.objectives.project(&self.active))
                .collect()
        };

        let selection = self.ranker.select(&objectives(&feasible), target, rng);
        let mut members = to_members(&feasible, &selection.selected, &selection.ranking);

        let remaining = target.saturating_sub(members.len());
        if remaining > 0 && !infeasible.is_empty() {
            infeasible.sort_by(|a, b| {
                a.evaluation
                    .total_violation()
                    .total_cmp(&b.evaluation.total_violation())
                    .then(a.score.total_cmp(&b.score))
            });
            infeasible.truncate(remaining);
            let ranking = self.ranker.rank(&objectives(&infeasible));
            let all: Vec<usize> = (0..infeasible.len()).collect();
            members.extend(to_members(&infeasible, &all, &ranking));

            let candidates: Vec<Candidate> = members.iter().map(|m| m.candidate.clone()).collect();
            let violations: Vec<f64> = candidates
                .iter()
                .map(|c| c.evaluation.total_violation())
                .collect();
            let sorted = constrained_non_dominated_sort(&objectives(&candidates), &violations);
            for (member, rank) in members.iter_mut().zip(sorted.ranks) {
                member.rank = rank;
            }
        }
        members
    }

    /// Applies `f` to `0..n`, in parallel when configured, preserving order.
    fn map_indices<T, F>(&self, n: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(u64) -> T + Sync + Send,
    {
        #[cfg(feature = "parallel")]
        {
            if self.config.parallel {
                return (0..n as u64).into_par_iter().map(f).collect();
            }
        }
        (0..n as u64).map(f).collect()
    }
}

fn to_members(pool: &[Candidate], chosen: &[usize], ranking: &Ranking) -> Vec<Member> {
    chosen
        .iter()
        .map(|&i| {
            let association = ranking.associations[i];
            Member {
                candidate: pool[i].clone(),
                rank: ranking.ranks[i],
                association,
                niche_count: ranking.niche_counts[association.reference],
            }
        })
        .collect()
}

fn count_front(population: &[Member]) -> usize {
    population.iter().filter(|m| m.rank == 0).count()
}
