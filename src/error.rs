//! Error and warning types for site layout optimization.

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Result type alias for site layout operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while validating inputs or evaluating layouts.
///
/// `InvalidBoundary` and `Configuration` are fatal and raised before any
/// chain starts. `NumericInstability` is raised per evaluation and handled
/// by discarding the offending layout. `InfeasibleSpec` is returned by
/// explicit capacity checks; the optimizer itself reports it as a
/// [`Warning`] and still returns a best-effort layout.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Degenerate or self-intersecting site polygon.
    #[error("Invalid boundary: {0}")]
    InvalidBoundary(String),

    /// Requested buildings cannot physically fit on the site.
    #[error("Infeasible building specification: {0}")]
    InfeasibleSpec(String),

    /// Objective evaluation produced a non-finite value.
    #[error("Numeric instability: {0}")]
    NumericInstability(String),

    /// Invalid configuration, profile, or building specification.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Non-fatal conditions reported alongside a completed run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Warning {
    /// The requested buildings did not fit; the returned layouts are the
    /// best partial (possibly infeasible) arrangement found.
    InfeasibleSpec(String),

    /// Layouts dropped because their evaluation was not finite.
    DiscardedEvaluations {
        /// Number of layouts dropped across all chains and generations.
        count: usize,
    },

    /// The run stopped early on cancellation or time limit.
    Cancelled,
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::InfeasibleSpec(msg) => write!(f, "infeasible specification: {msg}"),
            Warning::DiscardedEvaluations { count } => {
                write!(f, "{count} layouts discarded after non-finite evaluation")
            }
            Warning::Cancelled => write!(f, "run cancelled before completion"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidBoundary("fewer than 3 vertices".into());
        assert_eq!(err.to_string(), "Invalid boundary: fewer than 3 vertices");

        let err = Error::Configuration("num_chains must be at least 1".into());
        assert!(err.to_string().starts_with("Configuration error"));
    }

    #[test]
    fn test_warning_display() {
        let w = Warning::DiscardedEvaluations { count: 3 };
        assert_eq!(w.to_string(), "3 layouts discarded after non-finite evaluation");
    }
}
