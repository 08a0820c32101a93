//! Kernel weight functions used by the HAC estimator.
//!
//! Each kernel maps a normalized lag `x = lag / bandwidth` to a weight in
//! `[0, 1]`. The compact-support kernels vanish for `|x| > 1`; the quadratic
//! spectral kernel never reaches zero exactly and is therefore evaluated at
//! every available lag. All functions are pure and stateless.

use serde::{Deserialize, Serialize};

/// Closed family of HAC kernels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Kernel {
    /// Indicator on `|x| <= 1`.
    Truncated,
    /// Triangular (Newey-West) kernel.
    Bartlett,
    /// Piecewise cubic kernel with heavier down-weighting at high lags.
    Parzen,
    /// Cosine taper `(1 + cos(pi x)) / 2`.
    TukeyHanning,
    /// Smooth infinite-support kernel with high large-sample efficiency.
    QuadraticSpectral,
}

impl Kernel {
    /// Evaluates the kernel weight at the normalized lag `x`.
    ///
    /// The weight is symmetric in `x`; callers pass `lag / bandwidth` for
    /// non-negative lags.
    pub fn weight(self, x: f64) -> f64 {
        let z = x.abs();
        match self {
            Kernel::Truncated => {
                if z <= 1.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Kernel::Bartlett => {
                if z <= 1.0 {
                    1.0 - z
                } else {
                    0.0
                }
            }
            Kernel::Parzen => {
                if z <= 0.5 {
                    1.0 - 6.0 * z * z + 6.0 * z * z * z
                } else if z <= 1.0 {
                    2.0 * (1.0 - z).powi(3)
                } else {
                    0.0
                }
            }
            Kernel::TukeyHanning => {
                if z <= 1.0 {
                    0.5 * (1.0 + (std::f64::consts::PI * z).cos())
                } else {
                    0.0
                }
            }
            Kernel::QuadraticSpectral => {
                if z == 0.0 {
                    1.0
                } else {
                    let q = 6.0 * std::f64::consts::PI * z / 5.0;
                    25.0 / (12.0 * std::f64::consts::PI.powi(2) * z * z)
                        * (q.sin() / q - q.cos())
                }
            }
        }
    }

    /// Whether the kernel vanishes outside `|x| <= 1`, allowing the HAC sum
    /// to be truncated at the bandwidth.
    pub fn has_compact_support(self) -> bool {
        !matches!(self, Kernel::QuadraticSpectral)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const ALL: [Kernel; 5] = [
        Kernel::Truncated,
        Kernel::Bartlett,
        Kernel::Parzen,
        Kernel::TukeyHanning,
        Kernel::QuadraticSpectral,
    ];

    #[test]
    fn every_kernel_is_one_at_zero() {
        for kernel in ALL {
            assert_relative_eq!(kernel.weight(0.0), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn compact_kernels_vanish_outside_support() {
        for kernel in ALL.into_iter().filter(|k| k.has_compact_support()) {
            assert_eq!(kernel.weight(1.0 + 1e-9), 0.0);
            assert_eq!(kernel.weight(-3.0), 0.0);
        }
    }

    #[test]
    fn weights_are_symmetric_in_the_lag() {
        for kernel in ALL {
            for x in [0.1, 0.45, 0.9, 1.7] {
                assert_relative_eq!(kernel.weight(x), kernel.weight(-x), epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn bartlett_and_tukey_match_closed_forms() {
        assert_relative_eq!(Kernel::Bartlett.weight(0.25), 0.75, epsilon = 1e-14);
        assert_relative_eq!(Kernel::TukeyHanning.weight(0.5), 0.5, epsilon = 1e-14);
        assert_relative_eq!(Kernel::TukeyHanning.weight(1.0), 0.0, epsilon = 1e-14);
    }

    #[test]
    fn parzen_is_continuous_at_its_break_points() {
        let below = Kernel::Parzen.weight(0.5 - 1e-9);
        let above = Kernel::Parzen.weight(0.5 + 1e-9);
        assert_relative_eq!(below, above, epsilon = 1e-7);
        assert_relative_eq!(Kernel::Parzen.weight(1.0), 0.0, epsilon = 1e-14);
    }

    #[test]
    fn quadratic_spectral_is_continuous_at_zero_and_never_truncated() {
        assert_relative_eq!(Kernel::QuadraticSpectral.weight(1e-8), 1.0, epsilon = 1e-6);
        assert!(!Kernel::QuadraticSpectral.has_compact_support());
        // Small but nonzero weight well beyond the compact kernels' support.
        assert!(Kernel::QuadraticSpectral.weight(3.0).abs() > 0.0);
    }
}
