//! Solvers for discrete-state, discrete-action dynamic programming problems.
//!
//! The central type is [`DiscreteDp`], an immutable problem definition holding
//! a discount factor, an `(n, m)` reward matrix over `n` states and `m`
//! actions, and an `(m * n, n)` stochastic transition matrix. On top of it the
//! crate provides the one-step Bellman operator, backward induction for
//! finite-horizon problems, and two infinite-horizon fixed-point solvers:
//! value iteration and policy iteration (Newton's method).
//!
//! # Example
//!
//! ```
//! use ndarray::array;
//! use ddpsolve::{DiscreteDp, ValueIterationOptions};
//!
//! // Two states. Action 0 stays in state 0, action 1 jumps to state 1.
//! let reward = array![[5.0, 10.0], [-1.0, 2.0]];
//! let next_state = array![[0, 1], [0, 1]];
//! let dp = DiscreteDp::from_deterministic(0.95, reward, &next_state).unwrap();
//!
//! let sol = dp.value_iteration(&ValueIterationOptions::default()).unwrap();
//! assert!(sol.converged);
//! assert_eq!(sol.policy.as_slice().unwrap(), &[0, 0]);
//! ```

pub mod dp;
pub mod error;

pub use dp::{
    DiscreteDp, FiniteHorizonSolution, InfiniteHorizonSolution, PolicyIterationOptions,
    StoppingRule, ValueIterationOptions,
};
pub use error::{Error, Result};
