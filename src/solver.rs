use faer_traits::ComplexField;
use num_traits::Float;
use serde::{Deserialize, Serialize};

use crate::{
    Error, norm2,
    linalg::DenseSvdSolver,
    refine::{ArmijoBacktracking, StepRefiner},
    step::{GaussNewton, StepMethod},
    system::LinearEquationSystem,
    term::ErrorTerm,
};

/// Configuration for the outer iteration loop.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SolveCfg<T> {
    /// Convergence tolerance on the gradient norm `‖Jᵀf‖`.
    pub tol_grad: T,
    /// Convergence tolerance on the refined step norm.
    pub tol_step: T,
    /// Convergence tolerance on the objective change between iterations.
    pub tol_cost: T,
    /// Maximum number of outer iterations.
    pub max_iter: usize,
}

impl<T: Float> Default for SolveCfg<T> {
    fn default() -> Self {
        Self {
            tol_grad: T::from(1e-8).expect("Type must support 1e-8 for default gradient tolerance"),
            tol_step: T::from(1e-8).unwrap(),
            tol_cost: T::from(1e-8).unwrap(),
            max_iter: 100,
        }
    }
}

impl<T: Float> SolveCfg<T> {
    /// Set the gradient-norm tolerance.
    pub fn with_tol_grad(mut self, tol_grad: T) -> Self {
        self.tol_grad = tol_grad;
        self
    }

    /// Set the step-norm tolerance.
    pub fn with_tol_step(mut self, tol_step: T) -> Self {
        self.tol_step = tol_step;
        self
    }

    /// Set the objective-change tolerance.
    pub fn with_tol_cost(mut self, tol_cost: T) -> Self {
        self.tol_cost = tol_cost;
        self
    }

    /// Set the maximum number of outer iterations.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }
}

/// Per-iteration diagnostics handed to the callback.
#[derive(Clone, Debug)]
pub struct IterationStats<T> {
    /// Number of steps applied so far.
    pub iter: usize,
    /// Objective value `½‖f‖²` at the current state.
    pub cost: T,
    /// Residual norm `‖f‖` at the current state.
    pub residual_norm: T,
    /// Gradient norm `‖Jᵀf‖` at the current state.
    pub gradient_norm: T,
}

/// Returned by the iteration callback to keep going or stop early.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    /// Keep iterating.
    Continue,
    /// Abort the solve; it returns [`Error::Cancelled`].
    Cancel,
}

/// Which convergence tolerance was met.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Criterion {
    /// The gradient norm fell below [`SolveCfg::tol_grad`].
    Gradient,
    /// The refined step norm fell below [`SolveCfg::tol_step`].
    Step,
    /// The objective change fell below [`SolveCfg::tol_cost`].
    Cost,
}

/// How the solve ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// A convergence tolerance was met; checked in the order gradient,
    /// step, objective change, first match wins.
    Converged(Criterion),
    /// The iteration budget ran out. Not a hard failure: the report carries
    /// the best state found.
    MaxIterationsReached,
    /// A non-finite value appeared in the state, residual, gradient or
    /// step. The report carries the last state with a finite evaluation.
    Failed,
}

impl Termination {
    /// True iff a convergence tolerance was met.
    pub fn converged(self) -> bool {
        matches!(self, Self::Converged(_))
    }
}

/// Final state and diagnostics of a solve.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Report<T> {
    /// The final state vector.
    pub x: Vec<T>,
    /// How the solve ended.
    pub termination: Termination,
    /// Number of steps applied.
    pub iterations: usize,
    /// Objective value `½‖f‖²` at the final state.
    pub cost: T,
    /// Residual norm at the final state.
    pub residual_norm: T,
    /// Gradient norm at the final state.
    pub gradient_norm: T,
}

/// Minimize `½‖f(x)‖²` with Gauss-Newton steps and Armijo backtracking.
pub fn solve<T>(
    terms: &[&dyn ErrorTerm<T>],
    x0: Vec<T>,
    cfg: SolveCfg<T>,
) -> Result<Report<T>, Error>
where
    T: ComplexField<Real = T> + Float,
{
    solve_cb(terms, x0, cfg, |_| Control::Continue)
}

/// Like [`solve`], with a per-iteration callback.
pub fn solve_cb<T, Cb>(
    terms: &[&dyn ErrorTerm<T>],
    x0: Vec<T>,
    cfg: SolveCfg<T>,
    on_iter: Cb,
) -> Result<Report<T>, Error>
where
    T: ComplexField<Real = T> + Float,
    Cb: FnMut(&IterationStats<T>) -> Control,
{
    let mut method = GaussNewton::new(DenseSvdSolver);
    let refiner = ArmijoBacktracking::default();
    solve_with(terms, x0, &mut method, &refiner, cfg, on_iter)
}

/// Like [`solve`], with caller-supplied step and refinement strategies.
pub fn solve_with<T, M, R, Cb>(
    terms: &[&dyn ErrorTerm<T>],
    x0: Vec<T>,
    method: &mut M,
    refiner: &R,
    cfg: SolveCfg<T>,
    mut on_iter: Cb,
) -> Result<Report<T>, Error>
where
    T: ComplexField<Real = T> + Float,
    M: StepMethod<T> + ?Sized,
    R: StepRefiner<T> + ?Sized,
    Cb: FnMut(&IterationStats<T>) -> Control,
{
    let mut x = x0;
    let mut applied = 0usize;
    let mut prev_cost: Option<T> = None;
    let mut last_step_norm: Option<T> = None;

    // Last iterate whose evaluation was fully finite, and the cheapest
    // iterate seen so far. Both carry (state, cost, residual norm,
    // gradient norm).
    let mut valid: Option<(Vec<T>, T, T, T)> = None;
    let mut best: Option<(Vec<T>, T, T, T)> = None;

    loop {
        let system = LinearEquationSystem::construct(&x, terms)?;
        let cost = system.cost();
        let residual_norm = system.residual_norm();
        let gradient = system.gradient();
        let gradient_norm = norm2(&gradient);

        // The linear algebra never raises on NaN/Inf, so corruption must be
        // caught here before it spreads to the next iterate.
        let finite =
            cost.is_finite() && gradient_norm.is_finite() && x.iter().all(|v| v.is_finite());
        if !finite {
            let (fx, fc, fr, fg) = match valid {
                Some(v) => v,
                None => (x, cost, residual_norm, gradient_norm),
            };
            return Ok(Report {
                x: fx,
                termination: Termination::Failed,
                iterations: applied,
                cost: fc,
                residual_norm: fr,
                gradient_norm: fg,
            });
        }

        let stats = IterationStats {
            iter: applied,
            cost,
            residual_norm,
            gradient_norm,
        };
        if on_iter(&stats) == Control::Cancel {
            return Err(Error::Cancelled);
        }

        if let Some(pc) = prev_cost {
            method.feedback(cost < pc);
        }

        valid = Some((x.clone(), cost, residual_norm, gradient_norm));
        let improved = best.as_ref().is_none_or(|(_, bc, _, _)| cost < *bc);
        if improved {
            best = Some((x.clone(), cost, residual_norm, gradient_norm));
        }

        // Convergence, first match wins.
        if gradient_norm <= cfg.tol_grad {
            return Ok(Report {
                x,
                termination: Termination::Converged(Criterion::Gradient),
                iterations: applied,
                cost,
                residual_norm,
                gradient_norm,
            });
        }
        if last_step_norm.is_some_and(|sn| sn <= cfg.tol_step) {
            return Ok(Report {
                x,
                termination: Termination::Converged(Criterion::Step),
                iterations: applied,
                cost,
                residual_norm,
                gradient_norm,
            });
        }
        if prev_cost.is_some_and(|pc| (pc - cost).abs() <= cfg.tol_cost) {
            return Ok(Report {
                x,
                termination: Termination::Converged(Criterion::Cost),
                iterations: applied,
                cost,
                residual_norm,
                gradient_norm,
            });
        }
        if applied >= cfg.max_iter {
            // Never discard the best iterate, even if later steps went
            // uphill.
            let (bx, bc, br, bg) = best.unwrap_or((x, cost, residual_norm, gradient_norm));
            return Ok(Report {
                x: bx,
                termination: Termination::MaxIterationsReached,
                iterations: applied,
                cost: bc,
                residual_norm: br,
                gradient_norm: bg,
            });
        }

        let mut step = method.compute_step(&system)?;
        let residual = system.residual();
        refiner.refine(
            terms,
            &x,
            &residual,
            system.coefficients(),
            &gradient,
            &mut step,
        );

        if step.iter().any(|v| !v.is_finite()) {
            return Ok(Report {
                x,
                termination: Termination::Failed,
                iterations: applied,
                cost,
                residual_norm,
                gradient_norm,
            });
        }

        last_step_norm = Some(norm2(&step));
        prev_cost = Some(cost);
        for (xi, si) in x.iter_mut().zip(step.iter()) {
            *xi = *xi - *si;
        }
        applied += 1;
    }
}
