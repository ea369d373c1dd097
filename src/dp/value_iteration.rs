//! Value iteration: fixed-point iteration of the Bellman operator.

use log::debug;
use ndarray::Array1;

use crate::dp::model::DiscreteDp;
use crate::dp::InfiniteHorizonSolution;
use crate::error::{Error, Result};

/// Default convergence tolerance, the square root of machine epsilon.
pub(crate) const DEFAULT_TOL: f64 = 1.4901161193847656e-8;

/// How value iteration measures progress between successive iterates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoppingRule {
    /// McQueen-Porteus error bounds on the distance to the true fixed point.
    /// On convergence the midpoint of the bounds is added to the iterate,
    /// which lands closer to the fixed point than the raw iterate does.
    #[default]
    ErrorBounds,
    /// Euclidean norm of the change in the value vector; no correction.
    Norm,
}

/// Options for [`DiscreteDp::value_iteration`].
#[derive(Debug, Clone)]
pub struct ValueIterationOptions {
    /// Starting value vector; zeros when `None`.
    pub initial: Option<Array1<f64>>,
    /// Iteration cap.
    pub max_iter: usize,
    /// Convergence tolerance, compared against the stopping rule's residual.
    pub tol: f64,
    /// Residual definition, see [`StoppingRule`].
    pub stopping: StoppingRule,
}

impl Default for ValueIterationOptions {
    fn default() -> Self {
        Self {
            initial: None,
            max_iter: 100,
            tol: DEFAULT_TOL,
            stopping: StoppingRule::ErrorBounds,
        }
    }
}

impl DiscreteDp {
    /// Solves the infinite-horizon problem by repeated application of the
    /// Bellman operator.
    ///
    /// Runs up to `options.max_iter` iterations, stopping the first time the
    /// residual drops below `options.tol`. Exhausting the cap is not an
    /// error: the solution comes back with `converged` set to false and the
    /// best iterate found, and the induced transition matrix is recomputed
    /// from the final policy either way so the returned triple is always
    /// internally consistent.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidDiscount`] if the discount factor is not below 1.
    /// - [`Error::ShapeMismatch`] if `options.initial` is not length `n`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndarray::array;
    /// use ddpsolve::{DiscreteDp, ValueIterationOptions};
    ///
    /// let reward = array![[5.0, 10.0], [-1.0, 2.0]];
    /// let next_state = array![[0, 1], [0, 1]];
    /// let dp = DiscreteDp::from_deterministic(0.95, reward, &next_state).unwrap();
    /// let sol = dp.value_iteration(&ValueIterationOptions::default()).unwrap();
    /// assert!(sol.converged);
    /// assert!((sol.value[0] - 100.0).abs() < 1e-6);
    /// ```
    pub fn value_iteration(
        &self,
        options: &ValueIterationOptions,
    ) -> Result<InfiniteHorizonSolution> {
        if self.discount() >= 1.0 {
            return Err(Error::InvalidDiscount {
                discount: self.discount(),
                reason: "infinite-horizon solvers require discount < 1",
            });
        }
        let mut v = match &options.initial {
            Some(v0) => v0.clone(),
            None => Array1::zeros(self.num_states()),
        };
        // Contraction modulus of the error bounds.
        let delta = self.discount() / (1.0 - self.discount());

        let mut policy = Array1::zeros(self.num_states());
        let mut converged = false;
        let mut iterations = 0;
        let mut residual = f64::INFINITY;
        for it in 0..options.max_iter {
            iterations = it + 1;
            let v_old = v;
            let (v_new, x) = self.bellman(&v_old)?;
            v = v_new;
            policy = x;
            match options.stopping {
                StoppingRule::ErrorBounds => {
                    let diff = &v - &v_old;
                    let lbound = delta * diff.iter().copied().fold(f64::INFINITY, f64::min);
                    let ubound = delta * diff.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                    residual = ubound - lbound;
                    if residual < options.tol {
                        v += (ubound + lbound) / 2.0;
                        converged = true;
                    }
                }
                StoppingRule::Norm => {
                    residual = (&v - &v_old).mapv(|d| d * d).sum().sqrt();
                    if residual < options.tol {
                        converged = true;
                    }
                }
            }
            debug!("value iteration {it}: residual = {residual:e}");
            if converged {
                break;
            }
        }

        let (pstar, _, _) = self.policy_model(&policy)?;
        Ok(InfiniteHorizonSolution {
            converged,
            iterations,
            residual,
            value: v,
            policy,
            transition: pstar,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn two_state_problem() -> DiscreteDp {
        let reward = array![[5.0, 10.0], [-1.0, 2.0]];
        let next_state = array![[0, 1], [0, 1]];
        DiscreteDp::from_deterministic(0.95, reward, &next_state).unwrap()
    }

    #[test]
    fn converges_to_known_fixed_point() {
        let dp = two_state_problem();
        let sol = dp.value_iteration(&ValueIterationOptions::default()).unwrap();
        assert!(sol.converged);
        // Staying in state 0 forever: 5 / (1 - 0.95) = 100. From state 1 the
        // best move is back to state 0: -1 + 0.95 * 100 = 94.
        assert_eq!(sol.policy, array![0, 0]);
        assert_abs_diff_eq!(sol.value[0], 100.0, epsilon = 1e-6);
        assert_abs_diff_eq!(sol.value[1], 94.0, epsilon = 1e-6);
        assert_eq!(sol.transition, array![[1.0, 0.0], [1.0, 0.0]]);
    }

    #[test]
    fn norm_mode_reaches_the_same_policy() {
        let dp = two_state_problem();
        let options = ValueIterationOptions {
            stopping: StoppingRule::Norm,
            max_iter: 2000,
            tol: 1e-10,
            ..ValueIterationOptions::default()
        };
        let sol = dp.value_iteration(&options).unwrap();
        assert!(sol.converged);
        assert_eq!(sol.policy, array![0, 0]);
        assert_abs_diff_eq!(sol.value[0], 100.0, epsilon = 1e-6);
    }

    #[test]
    fn fixed_point_is_independent_of_the_start() {
        let dp = two_state_problem();
        let from_zeros = dp.value_iteration(&ValueIterationOptions::default()).unwrap();
        let options = ValueIterationOptions {
            initial: Some(array![500.0, -250.0]),
            ..ValueIterationOptions::default()
        };
        let from_far_away = dp.value_iteration(&options).unwrap();
        assert!(from_zeros.converged && from_far_away.converged);
        for s in 0..dp.num_states() {
            assert_abs_diff_eq!(from_zeros.value[s], from_far_away.value[s], epsilon = 1e-6);
        }
        assert_eq!(from_zeros.policy, from_far_away.policy);
    }

    #[test]
    fn deterministic_factory_solves_like_explicit_one_hot_matrix() {
        let reward = array![[5.0, 10.0], [-1.0, 2.0]];
        let next_state = array![[0, 1], [0, 1]];
        let from_function = DiscreteDp::from_deterministic(0.95, reward.clone(), &next_state).unwrap();
        let one_hot = array![[1.0, 0.0], [1.0, 0.0], [0.0, 1.0], [0.0, 1.0]];
        let from_matrix = DiscreteDp::new(0.95, reward, one_hot).unwrap();

        let a = from_function.value_iteration(&ValueIterationOptions::default()).unwrap();
        let b = from_matrix.value_iteration(&ValueIterationOptions::default()).unwrap();
        assert_eq!(a.policy, b.policy);
        assert_eq!(a.value, b.value);
        assert_eq!(a.transition, b.transition);
    }

    #[test]
    fn iteration_cap_is_a_soft_failure() {
        let dp = two_state_problem();
        let options = ValueIterationOptions {
            max_iter: 1,
            ..ValueIterationOptions::default()
        };
        let sol = dp.value_iteration(&options).unwrap();
        assert!(!sol.converged);
        assert_eq!(sol.iterations, 1);
        // The best iterate is still usable and internally consistent.
        assert_eq!(sol.value.len(), 2);
        assert_eq!(sol.policy.len(), 2);
        assert_eq!(sol.transition.dim(), (2, 2));
    }

    #[test]
    fn rejects_unit_discount() {
        let reward = array![[5.0, 10.0], [-1.0, 2.0]];
        let next_state = array![[0, 1], [0, 1]];
        let dp = DiscreteDp::from_deterministic(1.0, reward, &next_state).unwrap();
        let err = dp.value_iteration(&ValueIterationOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidDiscount { .. }));
    }
}
