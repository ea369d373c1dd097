//! Policy iteration (Howard improvement / Newton's method).
//!
//! Each iteration evaluates the current policy exactly by solving the linear
//! system `(I - discount * pstar) v = fstar`, then improves the policy with
//! one Bellman application. Convergence is decided by policy stability, not
//! by the value residual, so the method typically needs only a handful of
//! iterations.

use log::debug;
use ndarray::{Array1, Array2};

use crate::dp::model::DiscreteDp;
use crate::dp::value_iteration::DEFAULT_TOL;
use crate::dp::InfiniteHorizonSolution;
use crate::error::{Error, Result};

/// Options for [`DiscreteDp::policy_iteration`].
#[derive(Debug, Clone)]
pub struct PolicyIterationOptions {
    /// Starting value vector; zeros when `None`.
    pub initial: Option<Array1<f64>>,
    /// Iteration cap.
    pub max_iter: usize,
    /// Reported alongside the residual; the stopping decision itself is
    /// exact policy equality and ignores this tolerance.
    pub tol: f64,
}

impl Default for PolicyIterationOptions {
    fn default() -> Self {
        Self {
            initial: None,
            max_iter: 100,
            tol: DEFAULT_TOL,
        }
    }
}

impl DiscreteDp {
    /// Solves the infinite-horizon problem by policy iteration.
    ///
    /// Runs up to `options.max_iter` iterations. Each one improves the policy
    /// via the Bellman operator and jumps straight to the value function that
    /// policy induces by solving its evaluation equations exactly. Stops with
    /// `converged` set the first time two consecutive policies are identical;
    /// the value residual between iterations is reported but never decides
    /// convergence. Exhausting the cap returns the best pair found with
    /// `converged` false.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidDiscount`] if the discount factor is not below 1.
    /// - [`Error::ShapeMismatch`] if `options.initial` is not length `n`.
    /// - [`Error::SingularSystem`] if a policy's evaluation system has no
    ///   unique solution, which indicates a modeling error rather than a
    ///   numerical hiccup.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndarray::array;
    /// use ddpsolve::{DiscreteDp, PolicyIterationOptions};
    ///
    /// let reward = array![[5.0, 10.0], [-1.0, 2.0]];
    /// let next_state = array![[0, 1], [0, 1]];
    /// let dp = DiscreteDp::from_deterministic(0.95, reward, &next_state).unwrap();
    /// let sol = dp.policy_iteration(&PolicyIterationOptions::default()).unwrap();
    /// assert!(sol.converged);
    /// assert_eq!(sol.policy.as_slice().unwrap(), &[0, 0]);
    /// ```
    pub fn policy_iteration(
        &self,
        options: &PolicyIterationOptions,
    ) -> Result<InfiniteHorizonSolution> {
        if self.discount() >= 1.0 {
            return Err(Error::InvalidDiscount {
                discount: self.discount(),
                reason: "infinite-horizon solvers require discount < 1",
            });
        }
        let n = self.num_states();
        let mut v = match &options.initial {
            Some(v0) => v0.clone(),
            None => Array1::zeros(n),
        };
        // Sentinel policy: `m` is outside the valid action range, so the
        // stability check cannot succeed before one real improvement step.
        let mut policy = Array1::from_elem(n, self.num_actions());

        let mut converged = false;
        let mut iterations = 0;
        let mut residual = f64::INFINITY;
        let mut pstar = Array2::zeros((n, n));
        for it in 0..options.max_iter {
            iterations = it + 1;
            let v_old = v.clone();
            let (_, x) = self.bellman(&v)?;
            let (px, fstar, _) = self.policy_model(&x)?;
            // Newton step: v solves (I - discount * pstar) v = fstar.
            let mut system = px.clone();
            system *= -self.discount();
            for s in 0..n {
                system[[s, s]] += 1.0;
            }
            v = solve_dense(system, fstar)
                .ok_or(Error::SingularSystem { iteration: it })?;
            residual = (&v - &v_old).mapv(|d| d * d).sum().sqrt();
            debug!("policy iteration {it}: residual = {residual:e}");
            let stable = x == policy;
            policy = x;
            pstar = px;
            if stable {
                converged = true;
                break;
            }
        }

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

/// Solves `a * x = b` by Gaussian elimination with partial pivoting.
/// Returns `None` when a pivot is too small to distinguish from zero.
fn solve_dense(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    for i in 0..n {
        let mut pivot_row = i;
        let mut pivot_mag = a[[i, i]].abs();
        for j in (i + 1)..n {
            let mag = a[[j, i]].abs();
            if mag > pivot_mag {
                pivot_row = j;
                pivot_mag = mag;
            }
        }
        if pivot_mag < 1e-12 {
            return None;
        }
        if pivot_row != i {
            for k in 0..n {
                a.swap([i, k], [pivot_row, k]);
            }
            b.swap(i, pivot_row);
        }
        let pivot = a[[i, i]];
        for j in (i + 1)..n {
            let factor = a[[j, i]] / pivot;
            if factor == 0.0 {
                continue;
            }
            for k in i..n {
                a[[j, k]] -= factor * a[[i, k]];
            }
            b[j] -= factor * b[i];
        }
    }
    // Back substitution.
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = b[i];
        for j in (i + 1)..n {
            sum -= a[[i, j]] * x[j];
        }
        x[i] = sum / a[[i, i]];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dp::value_iteration::ValueIterationOptions;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn two_state_problem() -> DiscreteDp {
        let reward = array![[5.0, 10.0], [-1.0, 2.0]];
        let next_state = array![[0, 1], [0, 1]];
        DiscreteDp::from_deterministic(0.95, reward, &next_state).unwrap()
    }

    #[test]
    fn solve_dense_recovers_known_solution() {
        let a = array![[2.0, 1.0], [1.0, 3.0]];
        let b = array![5.0, 10.0];
        let x = solve_dense(a, b).unwrap();
        assert_abs_diff_eq!(x[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(x[1], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn solve_dense_detects_singularity() {
        let a = array![[1.0, 2.0], [2.0, 4.0]];
        let b = array![1.0, 2.0];
        assert!(solve_dense(a, b).is_none());
    }

    #[test]
    fn converges_in_few_iterations() {
        let dp = two_state_problem();
        let sol = dp.policy_iteration(&PolicyIterationOptions::default()).unwrap();
        assert!(sol.converged);
        assert!(sol.iterations <= 5);
        assert_eq!(sol.policy, array![0, 0]);
        // The linear solve lands on the exact policy values.
        assert_abs_diff_eq!(sol.value[0], 100.0, epsilon = 1e-9);
        assert_abs_diff_eq!(sol.value[1], 94.0, epsilon = 1e-9);
        assert_eq!(sol.transition, array![[1.0, 0.0], [1.0, 0.0]]);
    }

    #[test]
    fn agrees_with_value_iteration() {
        let reward = array![[1.0, 0.5, 0.0], [0.0, 2.0, -0.5], [0.3, 0.0, 1.5]];
        let prob = array![
            [[0.5, 0.3, 0.2], [0.1, 0.8, 0.1], [0.2, 0.2, 0.6]],
            [[0.9, 0.05, 0.05], [0.3, 0.4, 0.3], [0.25, 0.25, 0.5]],
            [[0.1, 0.1, 0.8], [0.0, 0.5, 0.5], [0.6, 0.2, 0.2]],
        ];
        let dp = DiscreteDp::from_tensor(0.9, reward, &prob).unwrap();

        let vi_options = ValueIterationOptions {
            max_iter: 5000,
            tol: 1e-9,
            ..ValueIterationOptions::default()
        };
        let vi = dp.value_iteration(&vi_options).unwrap();
        let pi = dp.policy_iteration(&PolicyIterationOptions::default()).unwrap();
        assert!(vi.converged && pi.converged);
        assert_eq!(vi.policy, pi.policy);
        for s in 0..dp.num_states() {
            assert_abs_diff_eq!(vi.value[s], pi.value[s], epsilon = 1e-8);
        }
    }

    #[test]
    fn iteration_cap_is_a_soft_failure() {
        let dp = two_state_problem();
        let options = PolicyIterationOptions {
            max_iter: 1,
            ..PolicyIterationOptions::default()
        };
        let sol = dp.policy_iteration(&options).unwrap();
        // One improvement step cannot verify stability against the sentinel.
        assert!(!sol.converged);
        assert_eq!(sol.iterations, 1);
        assert_eq!(sol.value.len(), 2);
        assert_eq!(sol.policy.len(), 2);
    }

    #[test]
    fn first_iteration_never_matches_the_sentinel() {
        // A problem whose optimal policy is found in one step: policy
        // iteration still needs a second iteration to certify stability.
        let reward = array![[1.0], [2.0]];
        let transition = array![[1.0, 0.0], [0.0, 1.0]];
        let dp = DiscreteDp::new(0.5, reward, transition).unwrap();
        let sol = dp.policy_iteration(&PolicyIterationOptions::default()).unwrap();
        assert!(sol.converged);
        assert_eq!(sol.iterations, 2);
        assert_eq!(sol.policy, array![0, 0]);
        assert_abs_diff_eq!(sol.value[0], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(sol.value[1], 4.0, epsilon = 1e-12);
    }
}
