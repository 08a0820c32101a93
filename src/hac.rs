//! Heteroskedasticity- and autocorrelation-consistent (HAC) covariance
//! assembly.
//!
//! The estimator kernel-weights lagged cross-products of the
//! estimating-equation series and sandwiches the resulting long-run
//! covariance between `(X'X)^-1` factors:
//!
//! ```text
//! Sigma_Omega = Gamma_0 + sum_{k=1}^{L} w(k / bw) (Gamma_k + Gamma_k'),
//! Gamma_k     = (1/m) Omega[k..]' Omega[..m-k],
//! Sigma_hat   = m (X'X)^-1 Sigma_Omega (X'X)^-1,
//! ```
//!
//! where `m` is the length of the (possibly prewhitened) series. Compact
//! kernels truncate the sum at the bandwidth; the quadratic spectral kernel
//! runs over every available lag. The result is symmetric by construction
//! but not guaranteed positive semi-definite for every kernel and bandwidth;
//! an indefinite estimate is flagged, never corrected.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::assembly::{assemble, bread, positive_semi_definite_warning, CovarianceEstimate};
use crate::bandwidth::{select_bandwidth, BandwidthMethod};
use crate::error::Result;
use crate::kernel::Kernel;
use crate::model::{moment_matrix, validate_inputs};
use crate::prewhiten::{prewhiten, recolor};

/// Configuration for a HAC covariance estimate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HacConfig {
    /// Kernel family weighting the lagged cross-products.
    pub kernel: Kernel,
    /// Bandwidth source: fixed or one of the plug-in rules.
    pub bandwidth: BandwidthMethod,
    /// Fit a VAR(1) to the moment series before kernel estimation and
    /// re-color the result afterwards.
    pub prewhiten: bool,
}

impl Default for HacConfig {
    fn default() -> Self {
        Self {
            kernel: Kernel::QuadraticSpectral,
            bandwidth: BandwidthMethod::Andrews,
            prewhiten: false,
        }
    }
}

impl HacConfig {
    /// Overrides the kernel while keeping other defaults.
    pub fn with_kernel(mut self, kernel: Kernel) -> Self {
        self.kernel = kernel;
        self
    }

    /// Overrides the bandwidth source.
    pub fn with_bandwidth(mut self, bandwidth: BandwidthMethod) -> Self {
        self.bandwidth = bandwidth;
        self
    }

    /// Enables or disables prewhitening.
    pub fn with_prewhitening(mut self, prewhiten: bool) -> Self {
        self.prewhiten = prewhiten;
        self
    }
}

/// Estimates the HAC coefficient covariance matrix.
///
/// `design` is the `n x p` model matrix and `residuals` the length-`n`
/// residual vector from the external fit.
pub fn hac_covariance(
    design: &DMatrix<f64>,
    residuals: &DVector<f64>,
    config: &HacConfig,
) -> Result<CovarianceEstimate> {
    validate_inputs(design, residuals)?;

    let moments = moment_matrix(design, residuals);
    let mut warnings = Vec::new();

    let (series, recoloring) = if config.prewhiten {
        let fit = prewhiten(&moments)?;
        (fit.filtered, Some(fit.coefficients))
    } else {
        (moments, None)
    };

    let bandwidth = select_bandwidth(config.kernel, &series, &config.bandwidth)?;
    log::debug!(
        "HAC: kernel {:?}, bandwidth {:.4}, prewhitened: {}",
        config.kernel,
        bandwidth,
        recoloring.is_some()
    );

    let mut long_run = long_run_covariance(config.kernel, &series, bandwidth);
    if let Some(coefficients) = &recoloring {
        long_run = recolor(long_run, coefficients, &mut warnings)?;
    }

    let bread = bread(design)?;
    let covariance = assemble(&bread, &long_run, series.nrows() as f64);

    if let Some(warning) = positive_semi_definite_warning(&covariance) {
        log::warn!("{warning}");
        warnings.push(warning);
    }
    Ok(CovarianceEstimate::new(covariance, warnings))
}

/// Kernel-weighted long-run covariance of the moment series.
///
/// Only non-negative lags are computed; each `Gamma_k` enters together with
/// its transpose so the accumulator stays symmetric up to summation order.
fn long_run_covariance(kernel: Kernel, series: &DMatrix<f64>, bandwidth: f64) -> DMatrix<f64> {
    let m = series.nrows();

    let mut accumulator = series.transpose() * series / m as f64;

    let max_lag = if kernel.has_compact_support() {
        (bandwidth.floor() as usize).min(m - 1)
    } else {
        m - 1
    };
    for lag in 1..=max_lag {
        let weight = kernel.weight(lag as f64 / bandwidth);
        if weight == 0.0 {
            continue;
        }
        let trailing = series.rows(lag, m - lag);
        let leading = series.rows(0, m - lag);
        let gamma = trailing.transpose() * leading / m as f64;
        accumulator += (&gamma + gamma.transpose()) * weight;
    }
    accumulator
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hc::{hc_covariance, HcVariant};
    use approx::assert_relative_eq;

    fn fixture() -> (DMatrix<f64>, DVector<f64>) {
        let design = DMatrix::from_row_slice(
            6,
            2,
            &[
                1.0, -0.8, 1.0, 0.4, 1.0, 1.6, 1.0, -0.2, 1.0, 0.9, 1.0, -1.1,
            ],
        );
        let residuals = DVector::from_vec(vec![0.6, -0.3, 0.2, 0.5, -0.7, 0.1]);
        (design, residuals)
    }

    fn leverage(design: &DMatrix<f64>) -> DVector<f64> {
        let inverse = (design.transpose() * design).try_inverse().unwrap();
        DVector::from_fn(design.nrows(), |i, _| {
            let row = design.row(i);
            (row * &inverse * row.transpose())[(0, 0)]
        })
    }

    #[test]
    fn result_is_symmetric() {
        let (design, residuals) = fixture();
        let config = HacConfig::default().with_bandwidth(BandwidthMethod::Fixed(2.0));
        let estimate = hac_covariance(&design, &residuals, &config).unwrap();
        let matrix = estimate.matrix();
        assert_relative_eq!(matrix, &matrix.transpose(), epsilon = 1e-12);
    }

    #[test]
    fn truncated_kernel_below_unit_bandwidth_reduces_to_whites_estimator() {
        // With bandwidth < 1 every positive lag falls outside the truncated
        // kernel's support, leaving the lag-zero outer product: White's HC0.
        let (design, residuals) = fixture();
        let config = HacConfig {
            kernel: Kernel::Truncated,
            bandwidth: BandwidthMethod::Fixed(0.5),
            prewhiten: false,
        };
        let hac = hac_covariance(&design, &residuals, &config).unwrap();
        let hc0 = hc_covariance(&design, &residuals, &leverage(&design), HcVariant::Hc0).unwrap();
        assert_relative_eq!(hac.matrix(), hc0.matrix(), epsilon = 1e-12);
    }

    #[test]
    fn bartlett_estimate_matches_a_manual_univariate_computation() {
        // Intercept-only design: the moment series is just the residuals.
        let design = DMatrix::from_element(4, 1, 1.0);
        let residuals = DVector::from_vec(vec![1.0, 0.5, -0.25, 2.0]);
        let config = HacConfig {
            kernel: Kernel::Bartlett,
            bandwidth: BandwidthMethod::Fixed(3.0),
            prewhiten: false,
        };
        let estimate = hac_covariance(&design, &residuals, &config).unwrap();

        let n = 4.0;
        let mut meat = residuals.iter().map(|u| u * u).sum::<f64>() / n;
        for lag in 1..=3usize {
            let weight = 1.0 - lag as f64 / 3.0;
            let mut gamma = 0.0;
            for t in lag..4 {
                gamma += residuals[t] * residuals[t - lag];
            }
            meat += 2.0 * weight * gamma / n;
        }
        // Bread is 1/n, sandwich scale is n: expected = meat / n.
        assert_relative_eq!(estimate.matrix()[(0, 0)], meat / n, epsilon = 1e-12);
    }

    #[test]
    fn prewhitening_runs_and_recolors() {
        let (design, residuals) = fixture();
        let config = HacConfig {
            kernel: Kernel::Bartlett,
            bandwidth: BandwidthMethod::Fixed(2.0),
            prewhiten: true,
        };
        let estimate = hac_covariance(&design, &residuals, &config).unwrap();
        let matrix = estimate.matrix();
        assert_eq!(matrix.nrows(), 2);
        assert_relative_eq!(matrix, &matrix.transpose(), epsilon = 1e-12);
    }

    #[test]
    fn invalid_fixed_bandwidth_is_rejected_before_assembly() {
        let (design, residuals) = fixture();
        let config = HacConfig::default().with_bandwidth(BandwidthMethod::Fixed(-1.0));
        assert!(matches!(
            hac_covariance(&design, &residuals, &config),
            Err(crate::error::SandwichError::InvalidBandwidth { .. })
        ));
    }

    #[test]
    fn config_round_trips_through_serde() {
        let config = HacConfig {
            kernel: Kernel::Parzen,
            bandwidth: BandwidthMethod::Fixed(4.0),
            prewhiten: true,
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: HacConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
