//! Hybrid Simulated Annealing + NSGA-III optimizer for site layouts.
//!
//! Places buildings and their connecting roads on a bounded site so that
//! construction cost, walking distance, functional adjacency, and type
//! diversity are traded off against each other, subject to containment,
//! overlap, setback, and quantity constraints.
//!
//! - **Geometry**: points, polygons, validated site boundaries.
//! - **Layout**: building specifications, placed instances, MST roads,
//!   random initialization.
//! - **Objective**: profiles, the pure layout evaluator, and penalized
//!   scalarization.
//! - **Perturbation**: Gaussian move, swap, and random reset operators.
//! - **Simulated Annealing (SA)**: one chain with Metropolis acceptance and
//!   pluggable cooling schedules.
//! - **Coordinator**: independent chains run in parallel and harvested for
//!   diverse near-best layouts.
//! - **Ranking**: fast non-dominated sorting and reference-point niching.
//! - **Refine**: the evolutionary loop that turns the harvest into a
//!   Pareto front.
//! - **Optimizer**: the full pipeline, presets, and a background run handle.
//!
//! # Conventions
//!
//! Every objective is minimized; adjacency and diversity are stored negated.
//! Every random draw comes from a stream derived from the master seed and
//! the coordinates of the unit of work, so a run is reproducible from its
//! seed whatever the number of worker threads.

pub mod coordinator;
pub mod error;
pub mod geometry;
pub mod layout;
pub mod objective;
pub mod optimizer;
pub mod perturb;
pub mod progress;
pub mod random;
pub mod ranking;
pub mod refine;
pub mod sa;

pub use error::{Error, Result, Warning};
