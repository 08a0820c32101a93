//! VAR(1) prewhitening of the estimating-equation series.
//!
//! Kernel HAC estimators behave poorly when the moment series is strongly
//! persistent. Prewhitening fits a first-order vector autoregression to the
//! series, hands the (much whiter) innovations to the kernel estimator, and
//! afterwards re-colors the long-run covariance through the fitted
//! coefficients. The fit is a deterministic joint least-squares regression of
//! each row on the previous row, so repeated calls on the same input produce
//! identical output.

use nalgebra::DMatrix;

use crate::error::{NumericalWarning, Result, SandwichError};

/// Condition number of `I - D'` beyond which recoloring refuses to proceed.
const SINGULAR_CONDITION: f64 = 1e12;

/// Condition number above which recoloring still proceeds but flags the
/// estimate as ill-conditioned.
const ILL_CONDITION: f64 = 1e8;

/// Output of the prewhitening fit.
#[derive(Clone, Debug)]
pub struct Prewhitened {
    /// VAR(1) innovations, one row shorter than the input series.
    pub filtered: DMatrix<f64>,
    /// Fitted coefficient matrix `D` in the row convention
    /// `omega_t ~ omega_{t-1} D`.
    pub coefficients: DMatrix<f64>,
}

/// Fits the VAR(1) `omega_t = omega_{t-1} D + e_t` by least squares.
///
/// Returns the innovation series (length `n - 1`) and the coefficient matrix
/// used later by [`recolor`].
///
/// # Errors
/// [`SandwichError::TooFewObservations`] when the series is too short to
/// identify the regression, and [`SandwichError::SingularMatrix`] when the
/// lagged cross-product cannot be factorized.
pub fn prewhiten(moments: &DMatrix<f64>) -> Result<Prewhitened> {
    let n = moments.nrows();
    let p = moments.ncols();
    if n < p + 2 {
        return Err(SandwichError::TooFewObservations {
            observations: n,
            parameters: p,
        });
    }

    let lagged = moments.rows(0, n - 1);
    let current = moments.rows(1, n - 1);

    let gram = lagged.transpose() * lagged;
    let cholesky = nalgebra::linalg::Cholesky::new(gram)
        .ok_or_else(|| SandwichError::singular("prewhitening cross-product"))?;
    let coefficients = cholesky.solve(&(lagged.transpose() * current));

    let fitted = lagged * &coefficients;
    let filtered = current - fitted;

    Ok(Prewhitened {
        filtered,
        coefficients,
    })
}

/// Re-colors a long-run covariance computed on the filtered series:
/// `sigma <- (I - D')^-1 sigma (I - D')^-T`.
///
/// An ill-conditioned but still invertible `I - D'` pushes an
/// [`NumericalWarning::IllConditionedRecoloring`] onto `warnings`; a
/// condition number past recovery fails with
/// [`SandwichError::SingularRecoloring`].
pub fn recolor(
    long_run: DMatrix<f64>,
    coefficients: &DMatrix<f64>,
    warnings: &mut Vec<NumericalWarning>,
) -> Result<DMatrix<f64>> {
    let p = coefficients.nrows();
    let recoloring = DMatrix::identity(p, p) - coefficients.transpose();

    let singular_values = recoloring.singular_values();
    let largest = singular_values.max();
    let smallest = singular_values.min();
    let condition = if smallest > 0.0 {
        largest / smallest
    } else {
        f64::INFINITY
    };
    if !condition.is_finite() || condition > SINGULAR_CONDITION {
        return Err(SandwichError::SingularRecoloring { condition });
    }
    if condition > ILL_CONDITION {
        log::warn!("recoloring matrix is ill-conditioned (condition {condition:e})");
        warnings.push(NumericalWarning::IllConditionedRecoloring { condition });
    }

    let inverse = recoloring
        .try_inverse()
        .ok_or(SandwichError::SingularRecoloring { condition })?;
    Ok(&inverse * long_run * inverse.transpose())
}
