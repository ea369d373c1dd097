//! Error types shared across the crate.

use thiserror::Error;

/// Errors raised while constructing or solving a dynamic programming problem.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Reward and transition dimensions disagree.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A transition-matrix row is not a probability distribution.
    #[error("transition row {row} is not a probability distribution (sum = {sum})")]
    NotStochastic { row: usize, sum: f64 },

    /// Discount factor outside the range the problem class allows.
    #[error("invalid discount factor {discount}: {reason}")]
    InvalidDiscount { discount: f64, reason: &'static str },

    /// A finite-horizon solve was requested without a horizon available.
    #[error("finite-horizon solve requested but no horizon is set")]
    NoHorizon,

    /// A policy selects an action index outside `[0, m)`.
    #[error("policy selects action {action} in state {state}, but only {num_actions} actions exist")]
    InvalidAction {
        state: usize,
        action: usize,
        num_actions: usize,
    },

    /// The policy-evaluation linear system has no unique solution.
    #[error("singular linear system in policy iteration at iteration {iteration}")]
    SingularSystem { iteration: usize },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
