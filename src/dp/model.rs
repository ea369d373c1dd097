//! Problem definition, the Bellman operator, and policy evaluation.
//!
//! The transition matrix is stored flattened: the distribution over next
//! states from state `s` under action `a` lives in row `a * n + s` (the state
//! index varies fastest within an action block). Every operation in the crate
//! goes through [`DiscreteDp::flat_row`] so the convention is defined exactly
//! once.

use ndarray::{Array1, Array2, Array3};

use crate::error::{Error, Result};

/// Tolerance for checking that transition rows are probability distributions.
const PROB_TOL: f64 = 1e-8;

/// The one flattening convention: the transition row for `(action, state)` in
/// an `n`-state problem. The state index varies fastest within an action.
#[inline]
fn flat_row(n: usize, action: usize, state: usize) -> usize {
    action * n + state
}

/// A discrete-time, discrete-choice dynamic programming problem.
///
/// Holds the discount factor, an `(n, m)` reward matrix over `n` states and
/// `m` actions, and an `(m * n, n)` stochastic transition matrix, plus an
/// optional horizon and terminal value for finite-horizon problems. The
/// problem is immutable during a solve; the only mutation the type allows is
/// [`DiscreteDp::set_reward`], which swaps the reward matrix while keeping
/// the (often much larger) transition matrix in place.
///
/// # Examples
///
/// ```
/// use ndarray::array;
/// use ddpsolve::DiscreteDp;
///
/// let reward = array![[1.0, 0.0], [0.0, 2.0]];
/// // Rows are (action, state) pairs, state fastest: (a0,s0), (a0,s1), (a1,s0), (a1,s1).
/// let transition = array![
///     [1.0, 0.0],
///     [1.0, 0.0],
///     [0.0, 1.0],
///     [0.0, 1.0],
/// ];
/// let dp = DiscreteDp::new(0.9, reward, transition).unwrap();
/// assert_eq!((dp.num_states(), dp.num_actions()), (2, 2));
/// ```
#[derive(Debug, Clone)]
pub struct DiscreteDp {
    discount: f64,
    reward: Array2<f64>,
    transition: Array2<f64>,
    horizon: Option<usize>,
    terminal_value: Option<Array1<f64>>,
    n: usize,
    m: usize,
}

impl DiscreteDp {
    /// Builds a problem from a fully-formed `(m * n, n)` transition matrix.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidDiscount`] unless `0 < discount <= 1`.
    /// - [`Error::ShapeMismatch`] if the transition shape disagrees with the
    ///   `(n, m)` reward shape.
    /// - [`Error::NotStochastic`] if any transition row has entries outside
    ///   `[0, 1]` or does not sum to 1 within tolerance.
    pub fn new(discount: f64, reward: Array2<f64>, transition: Array2<f64>) -> Result<Self> {
        if !(discount > 0.0 && discount <= 1.0) {
            return Err(Error::InvalidDiscount {
                discount,
                reason: "must be in (0, 1]",
            });
        }
        let (n, m) = reward.dim();
        if n == 0 || m == 0 {
            return Err(Error::ShapeMismatch(
                "reward matrix must have at least one state and one action".to_string(),
            ));
        }
        if transition.dim() != (m * n, n) {
            return Err(Error::ShapeMismatch(format!(
                "reward is ({n}, {m}) so transition must be ({}, {n}), got {:?}",
                m * n,
                transition.dim()
            )));
        }
        for (row, dist) in transition.rows().into_iter().enumerate() {
            if dist.iter().any(|&p| !(-PROB_TOL..=1.0 + PROB_TOL).contains(&p)) {
                return Err(Error::NotStochastic {
                    row,
                    sum: dist.sum(),
                });
            }
            let sum = dist.sum();
            if (sum - 1.0).abs() > PROB_TOL {
                return Err(Error::NotStochastic { row, sum });
            }
        }
        Ok(Self {
            discount,
            reward,
            transition,
            horizon: None,
            terminal_value: None,
            n,
            m,
        })
    }

    /// Builds a problem from a deterministic transition function.
    ///
    /// `next_state` has shape `(n, m)`; `next_state[[s, a]]` is the single,
    /// certain state reached from state `s` under action `a`. It is expanded
    /// into the `(m * n, n)` one-hot transition matrix row by row.
    pub fn from_deterministic(
        discount: f64,
        reward: Array2<f64>,
        next_state: &Array2<usize>,
    ) -> Result<Self> {
        let (n, m) = reward.dim();
        if next_state.dim() != (n, m) {
            return Err(Error::ShapeMismatch(format!(
                "next-state matrix must match the ({n}, {m}) reward shape, got {:?}",
                next_state.dim()
            )));
        }
        let mut transition = Array2::zeros((m * n, n));
        for s in 0..n {
            for a in 0..m {
                let next = next_state[[s, a]];
                if next >= n {
                    return Err(Error::ShapeMismatch(format!(
                        "next state {next} from state {s} under action {a} is out of range (n = {n})"
                    )));
                }
                transition[[flat_row(n, a, s), next]] = 1.0;
            }
        }
        Self::new(discount, reward, transition)
    }

    /// Builds a problem from an `(m, n, n)` transition-probability tensor,
    /// with axes action, initial state, next state.
    pub fn from_tensor(discount: f64, reward: Array2<f64>, prob: &Array3<f64>) -> Result<Self> {
        let (n, m) = reward.dim();
        if prob.dim() != (m, n, n) {
            return Err(Error::ShapeMismatch(format!(
                "transition tensor must be ({m}, {n}, {n}), got {:?}",
                prob.dim()
            )));
        }
        let mut transition = Array2::zeros((m * n, n));
        for a in 0..m {
            for s in 0..n {
                for next in 0..n {
                    transition[[flat_row(n, a, s), next]] = prob[[a, s, next]];
                }
            }
        }
        Self::new(discount, reward, transition)
    }

    /// Sets the number of periods, turning this into a finite-horizon problem.
    pub fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = Some(horizon);
        self
    }

    /// Sets the value function at the period immediately after the horizon.
    /// Finite-horizon solves default this to the zero vector.
    pub fn with_terminal_value(mut self, terminal: Array1<f64>) -> Result<Self> {
        if terminal.len() != self.n {
            return Err(Error::ShapeMismatch(format!(
                "terminal value has length {}, expected {}",
                terminal.len(),
                self.n
            )));
        }
        self.terminal_value = Some(terminal);
        Ok(self)
    }

    /// Replaces the reward matrix, keeping the discount factor and transition
    /// matrix. Useful when re-solving variants of the same transition
    /// structure, which is usually the dominant memory cost.
    ///
    /// # Errors
    ///
    /// [`Error::ShapeMismatch`] if the new shape is inconsistent with the
    /// retained transition matrix.
    pub fn set_reward(&mut self, reward: Array2<f64>) -> Result<()> {
        let (n, m) = reward.dim();
        if self.transition.dim() != (m * n, n) {
            return Err(Error::ShapeMismatch(format!(
                "new reward is ({n}, {m}) but the retained transition matrix is {:?}",
                self.transition.dim()
            )));
        }
        self.reward = reward;
        self.n = n;
        self.m = m;
        Ok(())
    }

    /// Number of states.
    pub fn num_states(&self) -> usize {
        self.n
    }

    /// Number of actions.
    pub fn num_actions(&self) -> usize {
        self.m
    }

    /// Discount factor.
    pub fn discount(&self) -> f64 {
        self.discount
    }

    /// Horizon, if this is a finite-horizon problem.
    pub fn horizon(&self) -> Option<usize> {
        self.horizon
    }

    /// Reward matrix, shape `(n, m)`.
    pub fn reward(&self) -> &Array2<f64> {
        &self.reward
    }

    /// Flattened transition matrix, shape `(m * n, n)`.
    pub fn transition(&self) -> &Array2<f64> {
        &self.transition
    }

    /// Terminal value, if one was set.
    pub fn terminal_value(&self) -> Option<&Array1<f64>> {
        self.terminal_value.as_ref()
    }

    /// Row of the flattened transition matrix holding the distribution for
    /// `(action, state)`. The state index varies fastest.
    #[inline]
    pub fn flat_row(&self, action: usize, state: usize) -> usize {
        flat_row(self.n, action, state)
    }

    /// Applies the one-step Bellman operator to a value function.
    ///
    /// Computes `U(s, a) = reward(s, a) + discount * sum_s' P(s' | s, a) v(s')`
    /// for every state-action pair via a single matrix-vector product over the
    /// flattened transition matrix, then maximizes over actions per state.
    /// Ties in the argmax go to the lowest action index.
    ///
    /// Returns the updated value function and the maximizing policy.
    ///
    /// # Errors
    ///
    /// [`Error::ShapeMismatch`] if `v` does not have one entry per state.
    pub fn bellman(&self, v: &Array1<f64>) -> Result<(Array1<f64>, Array1<usize>)> {
        if v.len() != self.n {
            return Err(Error::ShapeMismatch(format!(
                "value vector has length {}, expected {}",
                v.len(),
                self.n
            )));
        }
        let expected = self.transition.dot(v);
        let mut value = Array1::zeros(self.n);
        let mut policy = Array1::zeros(self.n);
        for s in 0..self.n {
            let mut best = f64::NEG_INFINITY;
            let mut best_action = 0;
            for a in 0..self.m {
                let u = self.reward[[s, a]] + self.discount * expected[self.flat_row(a, s)];
                if u > best {
                    best = u;
                    best_action = a;
                }
            }
            value[s] = best;
            policy[s] = best_action;
        }
        Ok((value, policy))
    }

    /// Extracts the Markov chain and reward stream a policy induces.
    ///
    /// Returns `(pstar, fstar, ind)`: the `(n, n)` state-to-state transition
    /// matrix under the policy, the length-`n` reward vector
    /// `fstar(s) = reward(s, x(s))`, and the flattened row indices
    /// `ind(s) = flat_row(x(s), s)` used to gather `pstar`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidAction`] if the policy selects an action outside
    /// `[0, m)`, [`Error::ShapeMismatch`] if it is not length `n`.
    pub fn policy_model(
        &self,
        policy: &Array1<usize>,
    ) -> Result<(Array2<f64>, Array1<f64>, Array1<usize>)> {
        if policy.len() != self.n {
            return Err(Error::ShapeMismatch(format!(
                "policy has length {}, expected {}",
                policy.len(),
                self.n
            )));
        }
        let mut pstar = Array2::zeros((self.n, self.n));
        let mut fstar = Array1::zeros(self.n);
        let mut ind = Array1::zeros(self.n);
        for s in 0..self.n {
            let action = policy[s];
            if action >= self.m {
                return Err(Error::InvalidAction {
                    state: s,
                    action,
                    num_actions: self.m,
                });
            }
            let row = self.flat_row(action, s);
            pstar.row_mut(s).assign(&self.transition.row(row));
            fstar[s] = self.reward[[s, action]];
            ind[s] = row;
        }
        Ok((pstar, fstar, ind))
    }
}
