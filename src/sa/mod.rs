//! Simulated Annealing over site layouts.
//!
//! Each [`AnnealingChain`] owns one current layout, a temperature, and its
//! own random stream. Per iteration it proposes a neighbour through the
//! perturbation engine, scores it with the shared evaluator, and applies
//! the Metropolis criterion. The best layout seen is tracked regardless of
//! acceptance.
//!
//! # References
//!
//! - Kirkpatrick, Gelatt & Vecchi (1983), "Optimization by Simulated Annealing"
//! - Lundy & Mees (1986), "Convergence of an Annealing Algorithm"

mod config;
mod runner;
mod types;

pub use config::{CoolingSchedule, SaConfig};
pub use runner::{metropolis_accept, AnnealingChain};
pub use types::{AnnealingState, ChainResult, ChainState};
