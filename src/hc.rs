//! Heteroskedasticity-consistent (HC) covariance assembly.
//!
//! Each variant reweights the squared residuals with a leverage-driven
//! multiplier before the sandwich step:
//!
//! ```text
//! Sigma_hat = (X'X)^-1 (sum_i m_i u_i^2 x_i x_i') (X'X)^-1.
//! ```
//!
//! The HC4m and HC5 constants follow Cribari-Neto, Souza & Vasconcellos
//! (2007); HC4 follows Cribari-Neto (2004). There is no kernel or bandwidth
//! here: these estimators assume independent observations.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::assembly::{assemble, bread, CovarianceEstimate};
use crate::error::{Result, SandwichError};
use crate::model::{validate_inputs, validate_leverage};

/// HC4m blend constants.
const HC4M_GAMMA: (f64, f64) = (1.0, 1.5);

/// HC5 tuning constant `k`.
const HC5_K: f64 = 0.7;

/// Closed family of leverage-based residual reweighting rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HcVariant {
    /// White's estimator: no adjustment.
    Hc0,
    /// Degrees-of-freedom scaling `n / (n - p)`.
    Hc1,
    /// `1 / (1 - h_i)`.
    Hc2,
    /// `1 / (1 - h_i)^2`, the jackknife approximation.
    Hc3,
    /// `1 / (1 - h_i)^d_i` with `d_i = min(4, n h_i / p)`.
    Hc4,
    /// HC4 with a two-term blend exponent, smaller bias at high leverage.
    Hc4m,
    /// Exponent driven by the maximal leverage in the sample.
    Hc5,
}

/// Estimates the HC coefficient covariance matrix.
///
/// `leverage` holds the hat-matrix diagonal of the fitted model; every entry
/// must lie in `[0, 1)` or the call fails with
/// [`SandwichError::LeverageOutOfRange`] before any multiplier is formed.
pub fn hc_covariance(
    design: &DMatrix<f64>,
    residuals: &DVector<f64>,
    leverage: &DVector<f64>,
    variant: HcVariant,
) -> Result<CovarianceEstimate> {
    validate_inputs(design, residuals)?;
    let n = design.nrows();
    let p = design.ncols();
    if leverage.len() != n {
        return Err(SandwichError::dimension_mismatch(
            "leverage length",
            n,
            leverage.len(),
        ));
    }
    validate_leverage(leverage)?;

    let max_leverage = leverage.max();
    let mut weighted = design.clone();
    for i in 0..n {
        let multiplier = residual_multiplier(variant, leverage[i], max_leverage, n, p);
        let mut row = weighted.row_mut(i);
        row *= residuals[i] * multiplier.sqrt();
    }
    let meat = weighted.transpose() * &weighted;

    let bread = bread(design)?;
    // The meat is a sum of PSD rank-one terms; definiteness cannot fail here.
    let covariance = assemble(&bread, &meat, 1.0);
    Ok(CovarianceEstimate::new(covariance, Vec::new()))
}

/// Squared-residual multiplier for the given variant.
///
/// `max_leverage` is only consulted by HC5.
pub(crate) fn residual_multiplier(
    variant: HcVariant,
    leverage: f64,
    max_leverage: f64,
    n: usize,
    p: usize,
) -> f64 {
    let n = n as f64;
    let p = p as f64;
    match variant {
        HcVariant::Hc0 => 1.0,
        HcVariant::Hc1 => n / (n - p),
        HcVariant::Hc2 => 1.0 / (1.0 - leverage),
        HcVariant::Hc3 => 1.0 / ((1.0 - leverage) * (1.0 - leverage)),
        HcVariant::Hc4 => {
            let exponent = (n * leverage / p).min(4.0);
            (1.0 - leverage).powf(-exponent)
        }
        HcVariant::Hc4m => {
            let ratio = n * leverage / p;
            let exponent = ratio.min(HC4M_GAMMA.0) + ratio.min(HC4M_GAMMA.1);
            (1.0 - leverage).powf(-exponent)
        }
        HcVariant::Hc5 => {
            let ratio = n * leverage / p;
            let cap = (HC5_K * n * max_leverage / p).max(4.0);
            let exponent = ratio.min(cap);
            (1.0 - leverage).powf(-exponent).sqrt()
        }
    }
}
