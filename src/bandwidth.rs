//! Data-driven bandwidth selection for the HAC estimator.
//!
//! Two plug-in rules are provided alongside user-fixed bandwidths:
//!
//! - Andrews (1991): fits an AR(1) by least squares to each column of the
//!   estimating-equation matrix, combines the fits into the scalar `alpha(q)`,
//!   and scales `(alpha * n)^(1/(2q+1))` by a kernel-specific constant.
//! - Newey-West (1994): forms weighted sample autocovariances of the
//!   column-summed series up to a lag truncation grown from `n`, then applies
//!   the same kernel-specific scale constants.
//!
//! Both rules degrade gracefully: when the sample is too short or the plug-in
//! denominator is numerically tiny they return the smallest admissible
//! bandwidth instead of failing.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SandwichError};
use crate::kernel::Kernel;

/// Smallest bandwidth the plug-in rules will return.
const MIN_BANDWIDTH: f64 = 1.0;

/// AR(1) coefficients are clamped inside the stationary region before the
/// Andrews formulas are applied; near-unit roots would otherwise blow up the
/// `(1 - rho)` powers.
const MAX_AR_COEFFICIENT: f64 = 0.97;

/// Threshold below which a plug-in denominator is treated as degenerate.
const DEGENERATE_TOLERANCE: f64 = 1e-12;

/// How the HAC bandwidth is obtained.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum BandwidthMethod {
    /// Use the supplied value unchanged. Must be finite and positive.
    Fixed(f64),
    /// Andrews (1991) AR(1) plug-in rule.
    Andrews,
    /// Newey-West (1994) plug-in rule.
    NeweyWest,
}

/// Kernel-specific plug-in constants shared by both automatic rules.
///
/// `scale` and the characteristic exponent `q` follow Andrews (1991, Table I);
/// `lag_growth` is the Newey-West truncation growth rate.
struct PlugInConstants {
    scale: f64,
    q: u32,
    lag_growth: f64,
}

const fn plug_in_constants(kernel: Kernel) -> PlugInConstants {
    match kernel {
        Kernel::Truncated => PlugInConstants {
            scale: 0.6611,
            q: 2,
            lag_growth: 4.0 / 25.0,
        },
        Kernel::Bartlett => PlugInConstants {
            scale: 1.1447,
            q: 1,
            lag_growth: 2.0 / 9.0,
        },
        Kernel::Parzen => PlugInConstants {
            scale: 2.6614,
            q: 2,
            lag_growth: 4.0 / 25.0,
        },
        Kernel::TukeyHanning => PlugInConstants {
            scale: 1.7462,
            q: 2,
            lag_growth: 4.0 / 25.0,
        },
        Kernel::QuadraticSpectral => PlugInConstants {
            scale: 1.3221,
            q: 2,
            lag_growth: 2.0 / 25.0,
        },
    }
}

/// Selects the bandwidth for `kernel` on the estimating-equation series.
///
/// `moments` is the `n x p` matrix whose long-run covariance the HAC
/// assembler will estimate; when prewhitening is active the caller passes the
/// filtered series so that selection and aggregation see the same data.
///
/// # Errors
/// Returns [`SandwichError::InvalidBandwidth`] when a fixed bandwidth is not
/// a finite positive number. The automatic rules never fail.
pub fn select_bandwidth(
    kernel: Kernel,
    moments: &DMatrix<f64>,
    method: &BandwidthMethod,
) -> Result<f64> {
    match method {
        BandwidthMethod::Fixed(value) => {
            if !value.is_finite() || *value <= 0.0 {
                return Err(SandwichError::InvalidBandwidth { value: *value });
            }
            Ok(*value)
        }
        BandwidthMethod::Andrews => Ok(clip_to_sample(
            kernel,
            andrews_bandwidth(kernel, moments),
            moments.nrows(),
        )),
        BandwidthMethod::NeweyWest => Ok(clip_to_sample(
            kernel,
            newey_west_bandwidth(kernel, moments),
            moments.nrows(),
        )),
    }
}

/// Keeps automatic bandwidths inside the admissible range: strictly positive
/// and, for compact-support kernels, at most `n - 1`.
fn clip_to_sample(kernel: Kernel, bandwidth: f64, n: usize) -> f64 {
    let mut bandwidth = bandwidth;
    if kernel.has_compact_support() && n > 1 {
        bandwidth = bandwidth.min((n - 1) as f64);
    }
    bandwidth.max(f64::MIN_POSITIVE)
}

/// Andrews (1991) plug-in: per-column AR(1) fits combined into `alpha(q)`.
fn andrews_bandwidth(kernel: Kernel, moments: &DMatrix<f64>) -> f64 {
    let n = moments.nrows();
    if n < 4 {
        return MIN_BANDWIDTH;
    }

    let constants = plug_in_constants(kernel);
    let mut numerator = 0.0;
    let mut denominator = 0.0;

    for j in 0..moments.ncols() {
        let column = moments.column(j);
        let mut cross = 0.0;
        let mut level = 0.0;
        for t in 1..n {
            cross += column[t] * column[t - 1];
            level += column[t - 1] * column[t - 1];
        }
        if level <= DEGENERATE_TOLERANCE {
            // Constant-zero column carries no information about persistence.
            continue;
        }
        let rho = (cross / level).clamp(-MAX_AR_COEFFICIENT, MAX_AR_COEFFICIENT);

        let mut rss = 0.0;
        for t in 1..n {
            let innovation = column[t] - rho * column[t - 1];
            rss += innovation * innovation;
        }
        let sigma2 = rss / (n as f64 - 1.0);
        let sigma4 = sigma2 * sigma2;

        denominator += sigma4 / (1.0 - rho).powi(4);
        numerator += match constants.q {
            1 => 4.0 * rho * rho * sigma4 / ((1.0 - rho).powi(6) * (1.0 + rho).powi(2)),
            _ => 4.0 * rho * rho * sigma4 / (1.0 - rho).powi(8),
        };
    }

    if denominator <= DEGENERATE_TOLERANCE {
        return MIN_BANDWIDTH;
    }
    let alpha = numerator / denominator;
    let exponent = 1.0 / (2.0 * constants.q as f64 + 1.0);
    let bandwidth = constants.scale * (alpha * n as f64).powf(exponent);
    if bandwidth.is_finite() {
        bandwidth.max(MIN_BANDWIDTH)
    } else {
        MIN_BANDWIDTH
    }
}

/// Newey-West (1994) plug-in on the column-summed moment series.
fn newey_west_bandwidth(kernel: Kernel, moments: &DMatrix<f64>) -> f64 {
    let n = moments.nrows();
    let constants = plug_in_constants(kernel);

    let truncation = (4.0 * (n as f64 / 100.0).powf(constants.lag_growth)).floor() as usize;
    if n < 2 || truncation + 1 >= n {
        return MIN_BANDWIDTH;
    }

    // Aggregate the moment columns with unit weights.
    let aggregate: Vec<f64> = (0..n).map(|t| moments.row(t).sum()).collect();

    // Unnormalized autocovariances; the 1/n factors cancel in the ratios.
    let mut autocovariances = vec![0.0; truncation + 1];
    for (j, slot) in autocovariances.iter_mut().enumerate() {
        let mut sum = 0.0;
        for t in j..n {
            sum += aggregate[t] * aggregate[t - j];
        }
        *slot = sum;
    }

    let mut s0 = autocovariances[0];
    let mut sq = 0.0;
    for (j, gamma) in autocovariances.iter().enumerate().skip(1) {
        s0 += 2.0 * gamma;
        sq += 2.0 * (j as f64).powi(constants.q as i32) * gamma;
    }
    if s0.abs() <= DEGENERATE_TOLERANCE {
        return MIN_BANDWIDTH;
    }

    let exponent = 1.0 / (2.0 * constants.q as f64 + 1.0);
    let bandwidth =
        constants.scale * ((sq / s0) * (sq / s0)).powf(exponent) * (n as f64).powf(exponent);
    if bandwidth.is_finite() {
        bandwidth.max(MIN_BANDWIDTH)
    } else {
        MIN_BANDWIDTH
    }
}
