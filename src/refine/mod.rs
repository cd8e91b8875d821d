//! Evolutionary refinement of annealing output into a Pareto front.
//!
//! The initial population is the annealing harvest padded with random
//! layouts. Each generation selects parents by binary tournament, applies
//! crossover and a cold perturbation, evaluates the offspring, and keeps
//! `population_size` members of parents ∪ offspring by feasibility-first
//! NSGA-III survival. Generations are strictly sequential; offspring
//! within one generation are evaluated independently.

mod config;
mod operators;
mod runner;

pub use config::RefinerConfig;
pub use operators::{binary_tournament, crossover, CrossoverKind, TournamentKey};
pub use runner::{Member, Refiner, RefinerResult};
