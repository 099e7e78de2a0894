use faer::MatRef;
use faer_traits::ComplexField;
use num_traits::Float;

use crate::Error;

/// Solves the linear subproblem `A·x = b` produced each iteration.
///
/// Implementations must accept non-square and rank-deficient `A` and return
/// a best-effort least-squares answer rather than erroring.
pub trait LinearSolver<T> {
    /// Solve `A·x = b`, returning `x` with `A.ncols()` entries.
    fn solve(&self, a: MatRef<'_, T>, b: &[T]) -> Result<Vec<T>, Error>;
}

/// Dense SVD-backed solver returning the minimum-norm least-squares solution.
///
/// Decomposes `A = U Σ Vᵀ` and forms `x = V Σ⁺ Uᵀ b`, inverting only the
/// singular values above a cutoff derived from the largest one. Singular,
/// underdetermined and overdetermined systems all get a well-defined finite
/// answer: among all vectors minimizing `‖A·x − b‖`, the one of smallest
/// norm.
#[derive(Clone, Copy, Debug, Default)]
pub struct DenseSvdSolver;

impl<T> LinearSolver<T> for DenseSvdSolver
where
    T: ComplexField<Real = T> + Float,
{
    fn solve(&self, a: MatRef<'_, T>, b: &[T]) -> Result<Vec<T>, Error> {
        debug_assert_eq!(
            a.nrows(),
            b.len(),
            "coefficient matrix has {} rows but the constant vector has {} entries",
            a.nrows(),
            b.len()
        );
        let (m, n) = (a.nrows(), a.ncols());
        let svd = a.svd().map_err(Error::Svd)?;
        let u = svd.U();
        let v = svd.V();
        let sigma = svd.S().column_vector();

        // Singular values at or below this cutoff count as zero. The cutoff
        // scales with the largest singular value and the working precision's
        // epsilon, so f32 and f64 get different effective tolerances.
        let largest = sigma.iter().copied().fold(T::zero(), |acc, s| acc.max(s));
        let dim = T::from(m.max(n)).expect("matrix dimension must be representable in the scalar");
        let cutoff = T::epsilon() * dim * largest;

        let mut x = vec![T::zero(); n];
        for (i, &s) in sigma.iter().enumerate() {
            if s > cutoff {
                let mut proj = T::zero();
                for (r, &br) in b.iter().enumerate() {
                    proj = proj + u[(r, i)] * br;
                }
                let coef = proj / s;
                for (row, xr) in x.iter_mut().enumerate() {
                    *xr = *xr + coef * v[(row, i)];
                }
            }
        }
        Ok(x)
    }
}

#[cfg(test)]
mod tests {
    use faer::Mat;

    use super::*;

    fn solve_known_square<T: ComplexField<Real = T> + Float>() -> Vec<T> {
        const A: [[f64; 4]; 4] = [
            [2.0, 3.0, 11.0, 5.0],
            [1.0, 1.0, 5.0, 2.0],
            [2.0, 1.0, -3.0, 2.0],
            [1.0, 1.0, -3.0, 4.0],
        ];
        const B: [f64; 4] = [2.0, 1.0, -3.0, -3.0];

        let a = Mat::from_fn(4, 4, |i, j| T::from(A[i][j]).unwrap());
        let b: Vec<T> = B.iter().map(|&v| T::from(v).unwrap()).collect();
        DenseSvdSolver.solve(a.as_ref(), &b).unwrap()
    }

    #[test]
    fn solves_square_system_f64() {
        let expected = [-0.5, -0.1875, 0.4375, -0.25];
        let x = solve_known_square::<f64>();
        for (xi, ei) in x.iter().zip(expected.iter()) {
            assert!((xi - ei).abs() < 1e-6, "got {xi}, expected {ei}");
        }
    }

    #[test]
    fn solves_square_system_f32() {
        let expected = [-0.5f32, -0.1875, 0.4375, -0.25];
        let x = solve_known_square::<f32>();
        for (xi, ei) in x.iter().zip(expected.iter()) {
            assert!((xi - ei).abs() < 1e-6, "got {xi}, expected {ei}");
        }
    }

    #[test]
    fn singular_system_returns_minimum_norm_solution() {
        // Both columns are identical, so the null space is spanned by
        // (1, -1). The least-squares optimum has x0 + x1 = 1, and the
        // minimum-norm representative splits it evenly.
        let a = Mat::from_fn(2, 2, |_, _| 1.0f64);
        let b = [2.0, 0.0];
        let x = DenseSvdSolver.solve(a.as_ref(), &b).unwrap();
        assert!(x.iter().all(|v| v.is_finite()));
        assert!((x[0] - 0.5).abs() < 1e-12);
        assert!((x[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn underdetermined_system_returns_minimum_norm_solution() {
        // A = [1 0 0; 0 1 0], b = [1, 2]. Any x = (1, 2, t) solves it;
        // minimum norm picks t = 0.
        let a = Mat::from_fn(2, 3, |i, j| if i == j { 1.0f64 } else { 0.0 });
        let b = [1.0, 2.0];
        let x = DenseSvdSolver.solve(a.as_ref(), &b).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 2.0).abs() < 1e-12);
        assert!(x[2].abs() < 1e-12);
    }

    #[test]
    fn overdetermined_consistent_system() {
        // x + y = 3, x - y = 1, 2x + y = 5 all agree on (2, 1).
        let rows = [[1.0, 1.0], [1.0, -1.0], [2.0, 1.0]];
        let a = Mat::from_fn(3, 2, |i, j| rows[i][j]);
        let b = [3.0, 1.0, 5.0];
        let x = DenseSvdSolver.solve(a.as_ref(), &b).unwrap();
        assert!((x[0] - 2.0).abs() < 1e-10);
        assert!((x[1] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn zero_matrix_yields_zero_solution() {
        let a = Mat::<f64>::zeros(3, 2);
        let b = [1.0, 2.0, 3.0];
        let x = DenseSvdSolver.solve(a.as_ref(), &b).unwrap();
        assert_eq!(x.len(), 2);
        assert!(x.iter().all(|v| *v == 0.0));
    }
}
