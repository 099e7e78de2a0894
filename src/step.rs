use faer::ColRef;
use faer_traits::ComplexField;
use num_traits::Float;

use crate::{
    Error,
    linalg::{DenseSvdSolver, LinearSolver},
    system::LinearEquationSystem,
};

/// Strategy producing a candidate step from the assembled linear system.
///
/// Steps follow the crate-wide descent convention: the driver applies them
/// as `x ← x − step`, so a step pointing along the gradient moves the state
/// downhill. A step is only a candidate; whether it actually decreases the
/// objective is the refiner's business.
pub trait StepMethod<T> {
    /// Compute a candidate step with `system.unknowns()` entries.
    fn compute_step(&mut self, system: &LinearEquationSystem<T>) -> Result<Vec<T>, Error>;

    /// Told by the driver whether the last applied step decreased the
    /// objective. Adaptive methods tune their damping here; the default
    /// does nothing.
    fn feedback(&mut self, _cost_decreased: bool) {}
}

/// Undamped Gauss-Newton: solve `A·d = b` in the least-squares sense and
/// return `-d`.
pub struct GaussNewton<S = DenseSvdSolver> {
    solver: S,
}

impl<S> GaussNewton<S> {
    /// A Gauss-Newton method backed by the given linear solver.
    pub fn new(solver: S) -> Self {
        Self { solver }
    }
}

impl Default for GaussNewton<DenseSvdSolver> {
    fn default() -> Self {
        Self::new(DenseSvdSolver)
    }
}

impl<T, S> StepMethod<T> for GaussNewton<S>
where
    T: ComplexField<Real = T> + Float,
    S: LinearSolver<T>,
{
    fn compute_step(&mut self, system: &LinearEquationSystem<T>) -> Result<Vec<T>, Error> {
        let mut step = self
            .solver
            .solve(system.coefficients(), system.constants())?;
        for v in &mut step {
            *v = -*v;
        }
        Ok(step)
    }
}

/// Levenberg-Marquardt: solve the damped normal equations
/// `(AᵀA + λI)·d = Aᵀb` and return `-d`.
///
/// The damping parameter interpolates between Gauss-Newton (small λ) and
/// scaled gradient descent (large λ). [`StepMethod::feedback`] shrinks λ
/// after a successful step and grows it after a failed one.
pub struct LevenbergMarquardt<T, S = DenseSvdSolver> {
    solver: S,
    lambda: T,
    increase: T,
    decrease: T,
}

impl<T: Float, S> LevenbergMarquardt<T, S> {
    /// A Levenberg-Marquardt method with default damping (λ = 1e-3,
    /// grown ×10 on failure, shrunk ×0.1 on success).
    pub fn new(solver: S) -> Self {
        Self {
            solver,
            lambda: T::from(1e-3).expect("Type must support 1e-3 for default damping"),
            increase: T::from(10.0).unwrap(),
            decrease: T::from(0.1).unwrap(),
        }
    }

    /// Set the initial damping parameter.
    pub fn with_lambda(mut self, lambda: T) -> Self {
        self.lambda = lambda;
        self
    }

    /// Set the factor applied to λ when a step fails to decrease the
    /// objective.
    pub fn with_increase(mut self, increase: T) -> Self {
        self.increase = increase;
        self
    }

    /// Set the factor applied to λ when a step decreases the objective.
    pub fn with_decrease(mut self, decrease: T) -> Self {
        self.decrease = decrease;
        self
    }

    /// Current damping parameter.
    pub fn lambda(&self) -> T {
        self.lambda
    }
}

impl<T: Float> Default for LevenbergMarquardt<T, DenseSvdSolver> {
    fn default() -> Self {
        Self::new(DenseSvdSolver)
    }
}

impl<T, S> StepMethod<T> for LevenbergMarquardt<T, S>
where
    T: ComplexField<Real = T> + Float,
    S: LinearSolver<T>,
{
    fn compute_step(&mut self, system: &LinearEquationSystem<T>) -> Result<Vec<T>, Error> {
        let a = system.coefficients();
        let n = a.ncols();

        let mut damped = a.transpose() * a;
        for i in 0..n {
            damped[(i, i)] = damped[(i, i)] + self.lambda;
        }
        let rhs_col = a.transpose() * ColRef::from_slice(system.constants());
        let rhs: Vec<T> = rhs_col.iter().copied().collect();

        let mut step = self.solver.solve(damped.as_ref(), &rhs)?;
        for v in &mut step {
            *v = -*v;
        }
        Ok(step)
    }

    fn feedback(&mut self, cost_decreased: bool) {
        if cost_decreased {
            self.lambda = self.lambda * self.decrease;
        } else {
            self.lambda = self.lambda * self.increase;
        }
    }
}
