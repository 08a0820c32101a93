//! Validated containers for the outputs of an external regression fit.
//!
//! The estimators in this crate never fit a model themselves; they consume a
//! design matrix, residuals, and (depending on the estimator) leverage values
//! or cluster labels produced elsewhere. [`FittedModel`] owns validated
//! copies of those pieces for use with the [`vcov`](crate::vcov::vcov)
//! facade, while the low-level assembler functions borrow matrices directly.

use nalgebra::{DMatrix, DVector};

use crate::error::{Result, SandwichError};

/// Outputs of an externally fitted regression, validated at construction.
#[derive(Clone, Debug)]
pub struct FittedModel {
    design: DMatrix<f64>,
    residuals: DVector<f64>,
    leverage: Option<DVector<f64>>,
    clusters: Option<Vec<String>>,
}

impl FittedModel {
    /// Number of observations.
    pub fn observation_count(&self) -> usize {
        self.design.nrows()
    }

    /// Number of coefficients.
    pub fn parameter_count(&self) -> usize {
        self.design.ncols()
    }

    /// Returns a read-only view of the design matrix (`X`).
    pub fn design(&self) -> &DMatrix<f64> {
        &self.design
    }

    /// Returns a read-only view of the residual vector (`u`).
    pub fn residuals(&self) -> &DVector<f64> {
        &self.residuals
    }

    /// Hat-matrix diagonal, when supplied.
    pub fn leverage(&self) -> Option<&DVector<f64>> {
        self.leverage.as_ref()
    }

    /// Cluster labels, when supplied.
    pub fn clusters(&self) -> Option<&[String]> {
        self.clusters.as_deref()
    }
}

/// Builder that validates dimensions before constructing a [`FittedModel`].
#[derive(Debug)]
pub struct FittedModelBuilder {
    design: DMatrix<f64>,
    residuals: DVector<f64>,
    leverage: Option<DVector<f64>>,
    clusters: Option<Vec<String>>,
}

impl FittedModelBuilder {
    /// Starts building from the design matrix and residual vector.
    pub fn new(design: DMatrix<f64>, residuals: DVector<f64>) -> Self {
        Self {
            design,
            residuals,
            leverage: None,
            clusters: None,
        }
    }

    /// Attaches the hat-matrix diagonal required by the HC estimators.
    pub fn leverage(mut self, leverage: DVector<f64>) -> Self {
        self.leverage = Some(leverage);
        self
    }

    /// Attaches cluster labels required by the cluster-robust estimators.
    pub fn clusters(mut self, clusters: Vec<String>) -> Self {
        self.clusters = Some(clusters);
        self
    }

    /// Finalizes construction after validating shapes and value ranges.
    pub fn build(self) -> Result<FittedModel> {
        validate_inputs(&self.design, &self.residuals)?;
        let n = self.design.nrows();

        if let Some(leverage) = &self.leverage {
            if leverage.len() != n {
                return Err(SandwichError::dimension_mismatch(
                    "leverage length",
                    n,
                    leverage.len(),
                ));
            }
            validate_leverage(leverage)?;
        }
        if let Some(clusters) = &self.clusters {
            if clusters.len() != n {
                return Err(SandwichError::dimension_mismatch(
                    "cluster label length",
                    n,
                    clusters.len(),
                ));
            }
        }

        Ok(FittedModel {
            design: self.design,
            residuals: self.residuals,
            leverage: self.leverage,
            clusters: self.clusters,
        })
    }
}

/// Builds the estimating-equation matrix whose rows are `u_i * X_i`.
///
/// This `n x p` matrix is the object whose long-run covariance the HAC and
/// cluster estimators approximate.
pub fn moment_matrix(design: &DMatrix<f64>, residuals: &DVector<f64>) -> DMatrix<f64> {
    let mut moments = design.clone();
    for i in 0..moments.nrows() {
        let mut row = moments.row_mut(i);
        row *= residuals[i];
    }
    moments
}

/// Checks the design/residual pair shared by every estimator entry point.
pub(crate) fn validate_inputs(design: &DMatrix<f64>, residuals: &DVector<f64>) -> Result<()> {
    let n = design.nrows();
    let p = design.ncols();
    if residuals.len() != n {
        return Err(SandwichError::dimension_mismatch(
            "residual length",
            n,
            residuals.len(),
        ));
    }
    if n <= p || p == 0 {
        return Err(SandwichError::TooFewObservations {
            observations: n,
            parameters: p,
        });
    }
    if design.iter().any(|v| !v.is_finite()) {
        return Err(SandwichError::NumericalError {
            context: "design matrix validation",
        });
    }
    if residuals.iter().any(|v| !v.is_finite()) {
        return Err(SandwichError::NumericalError {
            context: "residual validation",
        });
    }
    Ok(())
}

/// Rejects hat values outside `[0, 1)` before any multiplier is formed.
pub(crate) fn validate_leverage(leverage: &DVector<f64>) -> Result<()> {
    for (index, value) in leverage.iter().enumerate() {
        if !value.is_finite() || *value < 0.0 || *value >= 1.0 {
            return Err(SandwichError::LeverageOutOfRange {
                index,
                value: *value,
            });
        }
    }
    Ok(())
}
