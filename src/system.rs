use faer::{Mat, MatRef};
use faer_traits::ComplexField;
use num_traits::Float;

use crate::{Error, dot, norm2, term::ErrorTerm};

/// The linearized equation system `A·Δx = b` for one outer iteration.
///
/// `A` stacks every error term's Jacobian row-wise and `b` holds the negated
/// stacked residual, so `A.nrows()` is the total equation count and
/// `A.ncols()` the number of unknowns. A system can only be obtained through
/// [`LinearEquationSystem::construct`], which makes the accessors valid for
/// every value of this type; there is no "not yet constructed" state to
/// misuse. The system is rebuilt from scratch each iteration.
#[derive(Clone, Debug)]
pub struct LinearEquationSystem<T> {
    a: Mat<T>,
    b: Vec<T>,
}

impl<T> LinearEquationSystem<T>
where
    T: ComplexField<Real = T> + Float,
{
    /// Evaluate every term at `state` and assemble the stacked system.
    ///
    /// Construction is deterministic: identical inputs produce bit-identical
    /// `A` and `b`.
    pub fn construct(state: &[T], terms: &[&dyn ErrorTerm<T>]) -> Result<Self, Error> {
        if state.is_empty() || terms.is_empty() {
            return Err(Error::EmptySystemNotAllowed);
        }
        let rows: usize = terms.iter().map(|t| t.residual_dim()).sum();
        if rows == 0 {
            return Err(Error::EmptySystemNotAllowed);
        }
        let cols = state.len();

        let mut a = Mat::zeros(rows, cols);
        let mut b = vec![T::zero(); rows];
        let mut row = 0;
        for term in terms {
            let dim = term.residual_dim();
            term.residual(state, &mut b[row..row + dim]);
            term.jacobian(state, a.as_mut().submatrix_mut(row, 0, dim, cols));
            row += dim;
        }

        // b = -f
        for v in &mut b {
            *v = -*v;
        }
        Ok(Self { a, b })
    }

    /// Total number of equations (stacked residual rows).
    pub fn equations(&self) -> usize {
        self.a.nrows()
    }

    /// Number of unknowns (state dimension).
    pub fn unknowns(&self) -> usize {
        self.a.ncols()
    }

    /// True iff the system has fewer equations than unknowns.
    pub fn underdetermined(&self) -> bool {
        self.equations() < self.unknowns()
    }

    /// The coefficient matrix `A` (the stacked Jacobian).
    pub fn coefficients(&self) -> MatRef<'_, T> {
        self.a.as_ref()
    }

    /// The constant vector `b = -f`.
    pub fn constants(&self) -> &[T] {
        &self.b
    }

    /// The stacked residual `f` the system was built from.
    pub fn residual(&self) -> Vec<T> {
        self.b.iter().map(|&v| -v).collect()
    }

    /// Objective value `½‖f‖²` at the construction state.
    pub fn cost(&self) -> T {
        let half = T::one() / (T::one() + T::one());
        half * dot(&self.b, &self.b)
    }

    /// `‖f‖` at the construction state.
    pub fn residual_norm(&self) -> T {
        norm2(&self.b)
    }

    /// Gradient `Jᵀf` of the objective at the construction state.
    pub fn gradient(&self) -> Vec<T> {
        let mut g = vec![T::zero(); self.unknowns()];
        for (c, gc) in g.iter_mut().enumerate() {
            let mut acc = T::zero();
            for (r, &br) in self.b.iter().enumerate() {
                acc = acc + self.a[(r, c)] * br;
            }
            // b = -f, so Jᵀf = -Aᵀb.
            *gc = -acc;
        }
        g
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::Parabola;

    #[test]
    fn counts_match_terms_and_state() {
        let parabola = Parabola;
        let terms: [&dyn ErrorTerm<f64>; 1] = [&parabola];
        let state = [1.0, 2.0, 1.0, 2.0];
        let system = LinearEquationSystem::construct(&state, &terms).unwrap();
        assert_eq!(system.equations(), 2);
        assert_eq!(system.unknowns(), 4);
        assert!(system.underdetermined());
    }

    #[test]
    fn square_system_is_not_underdetermined() {
        let parabola = Parabola;
        let terms: [&dyn ErrorTerm<f64>; 2] = [&parabola, &parabola];
        let state = [1.0, 2.0, 1.0, 2.0];
        let system = LinearEquationSystem::construct(&state, &terms).unwrap();
        assert_eq!(system.equations(), 4);
        assert!(!system.underdetermined());
    }

    #[test]
    fn assembles_negated_residual_and_gradient() {
        let parabola = Parabola;
        let terms: [&dyn ErrorTerm<f64>; 1] = [&parabola];
        let state = [1.0, 2.0, 1.0, 2.0];
        let system = LinearEquationSystem::construct(&state, &terms).unwrap();

        // f = (5, 5), so b = -f and the residual accessor restores f.
        assert_eq!(system.constants(), &[-5.0, -5.0]);
        assert_eq!(system.residual(), vec![5.0, 5.0]);
        assert_eq!(system.cost(), 25.0);

        // g = Jᵀf with J = [2x0 2x1 0 0; 0 0 2x2 2x3].
        assert_eq!(system.gradient(), vec![10.0, 20.0, 10.0, 20.0]);
    }

    #[test]
    fn construction_is_deterministic() {
        let parabola = Parabola;
        let terms: [&dyn ErrorTerm<f64>; 1] = [&parabola];
        let state = [0.3, -1.7, 2.5, 0.9];
        let first = LinearEquationSystem::construct(&state, &terms).unwrap();
        let second = LinearEquationSystem::construct(&state, &terms).unwrap();

        for r in 0..first.equations() {
            for c in 0..first.unknowns() {
                assert_eq!(
                    first.coefficients()[(r, c)].to_bits(),
                    second.coefficients()[(r, c)].to_bits()
                );
            }
        }
        for (x, y) in first.constants().iter().zip(second.constants().iter()) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }

    #[test]
    fn empty_inputs_fail_loudly() {
        let parabola = Parabola;
        let terms: [&dyn ErrorTerm<f64>; 1] = [&parabola];
        let none: [&dyn ErrorTerm<f64>; 0] = [];
        let state = [1.0, 2.0, 1.0, 2.0];

        assert!(matches!(
            LinearEquationSystem::construct(&state, &none),
            Err(Error::EmptySystemNotAllowed)
        ));
        let empty_state: [f64; 0] = [];
        assert!(matches!(
            LinearEquationSystem::construct(&empty_state, &terms),
            Err(Error::EmptySystemNotAllowed)
        ));
    }
}
