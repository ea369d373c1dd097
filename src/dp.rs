//! Discrete dynamic programming: problem definition and solvers.

pub mod backward;
pub mod model;
pub mod policy_iteration;
pub mod value_iteration;

pub use backward::FiniteHorizonSolution;
pub use model::DiscreteDp;
pub use policy_iteration::PolicyIterationOptions;
pub use value_iteration::{StoppingRule, ValueIterationOptions};

use ndarray::{Array1, Array2};

/// Result of an infinite-horizon solve, returned by both
/// [`DiscreteDp::value_iteration`] and [`DiscreteDp::policy_iteration`].
///
/// Non-convergence is not an error: when `converged` is false the best
/// iterate found is still returned, and the caller may retry with a larger
/// iteration cap or a different starting vector.
#[derive(Debug, Clone)]
pub struct InfiniteHorizonSolution {
    /// Whether the stopping rule was satisfied within the iteration cap.
    pub converged: bool,
    /// Number of iterations performed.
    pub iterations: usize,
    /// Residual at the final iteration.
    pub residual: f64,
    /// Value function, one entry per state.
    pub value: Array1<f64>,
    /// Optimal action index for each state.
    pub policy: Array1<usize>,
    /// State-to-state transition matrix induced by `policy`.
    pub transition: Array2<f64>,
}
