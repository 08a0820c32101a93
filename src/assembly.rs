//! Shared pieces of the sandwich assembly: the bread `(X'X)^-1`, the final
//! symmetrization, positive semi-definiteness diagnostics, and the result
//! type carried back to callers.

use nalgebra::{DMatrix, DVector};

use crate::error::{NumericalWarning, Result, SandwichError};

/// Relative tolerance for flagging a negative eigenvalue as genuine rather
/// than floating-point noise.
const PSD_TOLERANCE: f64 = 1e-10;

/// A coefficient covariance matrix together with any numerical diagnostics
/// raised while assembling it.
///
/// The matrix is symmetric by construction. Warnings flag estimates that are
/// complete but numerically delicate, such as a kernel HAC result with a
/// small negative eigenvalue; callers decide whether such an estimate is
/// acceptable for their inference.
#[derive(Clone, Debug)]
pub struct CovarianceEstimate {
    matrix: DMatrix<f64>,
    warnings: Vec<NumericalWarning>,
}

impl CovarianceEstimate {
    pub(crate) fn new(matrix: DMatrix<f64>, warnings: Vec<NumericalWarning>) -> Self {
        Self { matrix, warnings }
    }

    /// The `p x p` coefficient covariance matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Consumes the estimate, returning the covariance matrix.
    pub fn into_matrix(self) -> DMatrix<f64> {
        self.matrix
    }

    /// Robust standard errors: the square roots of the diagonal.
    ///
    /// A negative diagonal entry (possible only when the estimate carries a
    /// [`NumericalWarning::NotPositiveSemiDefinite`] flag) produces NaN
    /// rather than being silently truncated.
    pub fn std_errors(&self) -> DVector<f64> {
        DVector::from_fn(self.matrix.nrows(), |i, _| self.matrix[(i, i)].sqrt())
    }

    /// Numerical diagnostics attached during assembly.
    pub fn warnings(&self) -> &[NumericalWarning] {
        &self.warnings
    }

    /// True when no numerical diagnostics were raised.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Computes the bread `(X'X)^-1` once per estimation call.
pub(crate) fn bread(design: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let gram = design.transpose() * design;
    let cholesky =
        nalgebra::linalg::Cholesky::new(gram).ok_or_else(|| SandwichError::singular("X'X"))?;
    Ok(cholesky.inverse())
}

/// Wraps the meat between two slices of bread and symmetrizes the result.
pub(crate) fn assemble(bread: &DMatrix<f64>, meat: &DMatrix<f64>, scale: f64) -> DMatrix<f64> {
    let mut covariance = bread * meat * bread * scale;
    symmetrize(&mut covariance);
    covariance
}

/// Averages a matrix with its transpose to absorb floating-point asymmetry
/// accumulated by summation order.
pub(crate) fn symmetrize(matrix: &mut DMatrix<f64>) {
    let n = matrix.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            let mean = 0.5 * (matrix[(i, j)] + matrix[(j, i)]);
            matrix[(i, j)] = mean;
            matrix[(j, i)] = mean;
        }
    }
}

/// Checks a symmetrized covariance matrix for a genuinely negative
/// eigenvalue and returns the corresponding warning if one is found.
pub(crate) fn positive_semi_definite_warning(matrix: &DMatrix<f64>) -> Option<NumericalWarning> {
    let eigenvalues = matrix.symmetric_eigenvalues();
    let largest = eigenvalues.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
    let smallest = eigenvalues.min();
    if smallest < -PSD_TOLERANCE * largest.max(1.0) {
        Some(NumericalWarning::NotPositiveSemiDefinite {
            min_eigenvalue: smallest,
        })
    } else {
        None
    }
}
