//! Backward induction for finite-horizon problems.

use ndarray::{s, Array1, Array2, Array3};

use crate::dp::model::DiscreteDp;
use crate::error::{Error, Result};

/// Solution of a finite-horizon problem with `T` periods.
#[derive(Debug, Clone)]
pub struct FiniteHorizonSolution {
    /// Optimal action per state and period, shape `(n, T)`.
    pub policy: Array2<usize>,
    /// Value function per state and period, shape `(n, T + 1)`; the last
    /// column is the terminal value.
    pub value: Array2<f64>,
    /// Policy-induced transition matrix per period, shape `(n, n, T)`.
    pub transitions: Array3<f64>,
}

impl DiscreteDp {
    /// Solves a finite-horizon problem by backward recursion.
    ///
    /// The horizon comes from `horizon` if given, otherwise from the problem;
    /// likewise the terminal value, which defaults to the zero vector. The
    /// value at period `T` is the terminal value; for each period `t` from
    /// `T - 1` down to `0` one Bellman application yields the period-`t`
    /// value and policy, and policy evaluation records the induced transition
    /// matrix. Exactly `T` Bellman applications, fully deterministic.
    ///
    /// # Errors
    ///
    /// - [`Error::NoHorizon`] if neither the problem nor the call supplies a
    ///   positive horizon.
    /// - [`Error::ShapeMismatch`] if a supplied terminal value is not length
    ///   `n`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndarray::array;
    /// use ddpsolve::DiscreteDp;
    ///
    /// let reward = array![[5.0, 10.0], [-1.0, 2.0]];
    /// let next_state = array![[0, 1], [0, 1]];
    /// let dp = DiscreteDp::from_deterministic(1.0, reward, &next_state)
    ///     .unwrap()
    ///     .with_horizon(3);
    /// let sol = dp.backward_induction(None, None).unwrap();
    /// assert_eq!(sol.policy.dim(), (2, 3));
    /// assert_eq!(sol.value.dim(), (2, 4));
    /// ```
    pub fn backward_induction(
        &self,
        horizon: Option<usize>,
        terminal_value: Option<&Array1<f64>>,
    ) -> Result<FiniteHorizonSolution> {
        let n = self.num_states();
        let periods = match horizon.or(self.horizon()) {
            Some(t) if t > 0 => t,
            _ => return Err(Error::NoHorizon),
        };
        let terminal = match terminal_value.or(self.terminal_value()) {
            Some(v) if v.len() != n => {
                return Err(Error::ShapeMismatch(format!(
                    "terminal value has length {}, expected {n}",
                    v.len()
                )))
            }
            Some(v) => v.clone(),
            None => Array1::zeros(n),
        };

        let mut policy = Array2::zeros((n, periods));
        let mut value = Array2::zeros((n, periods + 1));
        let mut transitions = Array3::zeros((n, n, periods));
        value.column_mut(periods).assign(&terminal);

        for t in (0..periods).rev() {
            let (vt, xt) = self.bellman(&value.column(t + 1).to_owned())?;
            let (pstar, _, _) = self.policy_model(&xt)?;
            value.column_mut(t).assign(&vt);
            policy.column_mut(t).assign(&xt);
            transitions.slice_mut(s![.., .., t]).assign(&pstar);
        }

        Ok(FiniteHorizonSolution {
            policy,
            value,
            transitions,
        })
    }
}
