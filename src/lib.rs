#![doc = include_str!("../README.md")]

pub use crate::error::Error;
pub use crate::linalg::{DenseSvdSolver, LinearSolver};
pub use crate::refine::{ArmijoBacktracking, ConstantStepFactor, StepRefiner};
pub use crate::solver::{
    Control, Criterion, IterationStats, Report, SolveCfg, Termination, solve, solve_cb, solve_with,
};
pub use crate::step::{GaussNewton, LevenbergMarquardt, StepMethod};
pub use crate::system::LinearEquationSystem;
pub use crate::term::{ErrorTerm, FnTerm};

/// Error type shared across the crate.
mod error;
/// Linear solvers for the per-iteration subproblem.
mod linalg;
/// Step-length refinement strategies (line searches).
mod refine;
/// The outer iteration loop and its configuration.
mod solver;
/// Step computation strategies (Gauss-Newton, Levenberg-Marquardt).
mod step;
/// Assembly of the linearized equation system.
mod system;
/// The error-term interface callers implement.
mod term;

use num_traits::Float;

pub(crate) fn dot<T: Float>(a: &[T], b: &[T]) -> T {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| x * y)
        .fold(T::zero(), |acc, v| acc + v)
}

pub(crate) fn norm2<T: Float>(v: &[T]) -> T {
    dot(v, v).sqrt()
}
