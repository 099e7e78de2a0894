use faer::MatMut;

/// One error term of a least-squares objective.
///
/// A term maps the full state vector to a residual block and the matching
/// rows of the Jacobian. The overall objective is `½‖f(x)‖²` where `f`
/// stacks every term's residual. Terms are borrowed by the solver, never
/// copied, and must be deterministic and side-effect-free: the line search
/// re-evaluates them at several trial states per outer iteration.
pub trait ErrorTerm<T> {
    /// Number of residual rows this term contributes.
    fn residual_dim(&self) -> usize;

    /// Write the residual at `state` into `out`.
    ///
    /// `out` has exactly [`Self::residual_dim`] entries.
    fn residual(&self, state: &[T], out: &mut [T]);

    /// Write the Jacobian at `state` into `out`.
    ///
    /// `out` has [`Self::residual_dim`] rows and `state.len()` columns and
    /// arrives zeroed, so sparse terms only need to set their nonzero
    /// entries.
    fn jacobian(&self, state: &[T], out: MatMut<'_, T>);
}

/// An [`ErrorTerm`] built from a pair of closures.
///
/// Handy for small problems and tests where defining a type per term is
/// overkill. See the crate-level example.
pub struct FnTerm<F, J> {
    dim: usize,
    residual_fn: F,
    jacobian_fn: J,
}

impl<F, J> FnTerm<F, J> {
    /// A term contributing `dim` residual rows, evaluated by `residual_fn`
    /// and differentiated by `jacobian_fn`.
    pub fn new(dim: usize, residual_fn: F, jacobian_fn: J) -> Self {
        Self {
            dim,
            residual_fn,
            jacobian_fn,
        }
    }
}

impl<T, F, J> ErrorTerm<T> for FnTerm<F, J>
where
    F: Fn(&[T], &mut [T]),
    J: Fn(&[T], MatMut<'_, T>),
{
    fn residual_dim(&self) -> usize {
        self.dim
    }

    fn residual(&self, state: &[T], out: &mut [T]) {
        (self.residual_fn)(state, out);
    }

    fn jacobian(&self, state: &[T], out: MatMut<'_, T>) {
        (self.jacobian_fn)(state, out);
    }
}
