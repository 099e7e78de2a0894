use faer::linalg::svd::SvdError;

/// Errors from assembling or solving a least-squares problem.
///
/// Numerical degeneracy (rank deficiency, zero gradients) is not an error:
/// the SVD-backed linear solve absorbs it. Non-convergence is reported
/// through [`crate::Termination`], not through this type.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// You provided no error terms, or a state with no unknowns.
    #[error("Cannot solve an empty system")]
    EmptySystemNotAllowed,
    /// Faer: could not decompose the coefficient matrix.
    #[error("Something went wrong doing SVD in faer")]
    Svd(SvdError),
    /// The iteration callback asked for the solve to stop.
    #[error("Solve cancelled by callback")]
    Cancelled,
}
