use faer::MatRef;
use faer_traits::ComplexField;
use num_traits::Float;

use crate::{dot, term::ErrorTerm};

/// Step-length refinement strategy (line search).
///
/// Given the candidate step for the current iteration, a refiner rescales it
/// in place. The driver applies the refined step as `x ← x − step`, so
/// refiners probe trial states by moving against the step.
pub trait StepRefiner<T> {
    /// Rescale `step` in place.
    ///
    /// `residual`, `jacobian` and `gradient` were all evaluated at `state`;
    /// `terms` lets the refiner re-evaluate the objective at trial states.
    fn refine(
        &self,
        terms: &[&dyn ErrorTerm<T>],
        state: &[T],
        residual: &[T],
        jacobian: MatRef<'_, T>,
        gradient: &[T],
        step: &mut [T],
    );
}

/// Backtracking line search with an Armijo sufficient-decrease condition.
///
/// Starting from the maximum step bound, the trial length is multiplied by
/// the backtracking decrease factor until
/// `φ(α) ≤ φ(0) + c·α·(gradientᵀ·step)` holds, where `φ(α)` is the
/// objective at `state − α·step`. The accepted length is multiplied into
/// the step.
pub struct ArmijoBacktracking<T> {
    backtracking_decrease: T,
    armijo_constant: T,
    minimum_step_bound: T,
    maximum_step_bound: T,
    maximum_iterations: usize,
}

impl<T: Float> Default for ArmijoBacktracking<T> {
    fn default() -> Self {
        Self {
            backtracking_decrease: T::from(0.8)
                .expect("Type must support 0.8 for the default decrease factor"),
            armijo_constant: T::from(1e-4).unwrap(),
            minimum_step_bound: T::from(1e-10).unwrap(),
            maximum_step_bound: T::one(),
            maximum_iterations: 0,
        }
    }
}

impl<T: Float> ArmijoBacktracking<T> {
    /// A fully parametrized backtracking search.
    pub fn new(
        backtracking_decrease: T,
        armijo_constant: T,
        minimum_step_bound: T,
        maximum_step_bound: T,
        maximum_iterations: usize,
    ) -> Self {
        Self {
            backtracking_decrease,
            armijo_constant,
            minimum_step_bound,
            maximum_step_bound,
            maximum_iterations,
        }
    }

    /// Set the shrink factor applied after each rejected trial, in (0, 1).
    pub fn with_backtracking_decrease(mut self, backtracking_decrease: T) -> Self {
        self.backtracking_decrease = backtracking_decrease;
        self
    }

    /// Set the sufficient-decrease constant of the Armijo condition.
    pub fn with_armijo_constant(mut self, armijo_constant: T) -> Self {
        self.armijo_constant = armijo_constant;
        self
    }

    /// Set the lower and upper bounds on the trial step length.
    pub fn with_step_bounds(mut self, minimum: T, maximum: T) -> Self {
        self.minimum_step_bound = minimum;
        self.maximum_step_bound = maximum;
        self
    }

    /// Set the maximum number of trial evaluations; zero means no cap.
    ///
    /// Even without a cap the search terminates: the trial length shrinks
    /// geometrically and the search stops when it reaches the minimum step
    /// bound, which acts as the effective cap when the Armijo condition
    /// cannot be met.
    pub fn with_maximum_iterations(mut self, maximum_iterations: usize) -> Self {
        self.maximum_iterations = maximum_iterations;
        self
    }

    /// Shrink factor applied after each rejected trial.
    pub fn backtracking_decrease(&self) -> T {
        self.backtracking_decrease
    }

    /// Sufficient-decrease constant of the Armijo condition.
    pub fn armijo_constant(&self) -> T {
        self.armijo_constant
    }

    /// Lower bound on the trial step length.
    pub fn minimum_step_bound(&self) -> T {
        self.minimum_step_bound
    }

    /// Upper bound on the trial step length; also the initial trial length.
    pub fn maximum_step_bound(&self) -> T {
        self.maximum_step_bound
    }

    /// Maximum number of trial evaluations; zero means no cap.
    pub fn maximum_iterations(&self) -> usize {
        self.maximum_iterations
    }
}

impl<T> StepRefiner<T> for ArmijoBacktracking<T>
where
    T: ComplexField<Real = T> + Float,
{
    fn refine(
        &self,
        terms: &[&dyn ErrorTerm<T>],
        state: &[T],
        residual: &[T],
        _jacobian: MatRef<'_, T>,
        gradient: &[T],
        step: &mut [T],
    ) {
        let half = T::one() / (T::one() + T::one());
        let directional = dot(gradient, step);
        let baseline = half * dot(residual, residual);

        let mut trial = vec![T::zero(); state.len()];
        let mut trial_residual = vec![T::zero(); residual.len()];

        let mut alpha = self.maximum_step_bound;
        let mut attempts = 0usize;
        loop {
            for (t, (&xi, &si)) in trial.iter_mut().zip(state.iter().zip(step.iter())) {
                *t = xi - alpha * si;
            }
            let mut row = 0;
            for term in terms {
                let dim = term.residual_dim();
                term.residual(&trial, &mut trial_residual[row..row + dim]);
                row += dim;
            }
            let value = half * dot(&trial_residual, &trial_residual);

            // Non-finite trial objectives count as rejections.
            if value.is_finite()
                && value <= baseline + self.armijo_constant * alpha * directional
            {
                break;
            }
            attempts += 1;
            if self.maximum_iterations != 0 && attempts >= self.maximum_iterations {
                break;
            }
            let shrunk = alpha * self.backtracking_decrease;
            if shrunk < self.minimum_step_bound {
                alpha = self.minimum_step_bound;
                break;
            }
            alpha = shrunk;
        }

        for v in step.iter_mut() {
            *v = *v * alpha;
        }
    }
}

/// Trivial refinement: scale the step by a fixed factor.
pub struct ConstantStepFactor<T> {
    factor: T,
}

impl<T: Float> Default for ConstantStepFactor<T> {
    fn default() -> Self {
        Self { factor: T::one() }
    }
}

impl<T: Float> ConstantStepFactor<T> {
    /// Set the scaling factor.
    pub fn with_factor(mut self, factor: T) -> Self {
        self.factor = factor;
        self
    }

    /// The scaling factor.
    pub fn factor(&self) -> T {
        self.factor
    }
}

impl<T> StepRefiner<T> for ConstantStepFactor<T>
where
    T: ComplexField<Real = T> + Float,
{
    fn refine(
        &self,
        _terms: &[&dyn ErrorTerm<T>],
        _state: &[T],
        _residual: &[T],
        _jacobian: MatRef<'_, T>,
        _gradient: &[T],
        step: &mut [T],
    ) {
        for v in step.iter_mut() {
            *v = *v * self.factor;
        }
    }
}
