//! Robust ("sandwich") covariance estimators for fitted regression models.
//!
//! This crate estimates the long-run covariance matrix of regression
//! coefficients under heteroskedasticity, autocorrelation, or cluster
//! dependence in the error term. A model is fitted elsewhere; its design
//! matrix, residuals, and leverage or cluster information feed one of three
//! estimator families:
//!
//! - HC (`hc` module): leverage-adjusted squared residuals, no serial
//!   correlation correction (White's estimator and its HC1-HC5 refinements),
//! - HAC (`hac` module): kernel-weighted lagged cross-products with
//!   data-driven bandwidth selection and optional VAR(1) prewhitening,
//! - cluster-robust (`cluster` module): within-cluster score aggregation
//!   with finite-cluster corrections.
//!
//! Every estimator returns a [`CovarianceEstimate`]: a symmetric `p x p`
//! matrix plus any numerical warnings raised during assembly. Robust
//! standard errors are the square roots of the diagonal.
//!
//! # Quick start
//!
//! ```no_run
//! use nalgebra::{DMatrix, DVector};
//! use sandwich::{hc_covariance, HcVariant};
//!
//! // Design matrix, residuals, and hat values come from an external fit.
//! let x = DMatrix::from_row_slice(4, 2, &[1.0, 0.5, 1.0, 1.5, 1.0, 2.5, 1.0, 4.0]);
//! let u = DVector::from_vec(vec![0.3, -0.1, 0.2, -0.4]);
//! let h = DVector::from_vec(vec![0.6, 0.3, 0.3, 0.7]);
//!
//! let estimate = hc_covariance(&x, &u, &h, HcVariant::Hc3).expect("valid inputs");
//! println!("robust standard errors: {}", estimate.std_errors());
//! ```
//!
//! All operations are synchronous, pure functions of their inputs; nothing
//! persists between calls, so independent estimations may run in parallel
//! without coordination.

pub mod assembly;
pub mod bandwidth;
pub mod cluster;
pub mod error;
pub mod hac;
pub mod hc;
pub mod kernel;
pub mod model;
pub mod prewhiten;
pub mod vcov;

pub use assembly::CovarianceEstimate;
pub use bandwidth::{select_bandwidth, BandwidthMethod};
pub use cluster::{crhc_covariance, ClusterVariant};
pub use error::{NumericalWarning, Result, SandwichError};
pub use hac::{hac_covariance, HacConfig};
pub use hc::{hc_covariance, HcVariant};
pub use kernel::Kernel;
pub use model::{FittedModel, FittedModelBuilder};
pub use vcov::{vcov, CovarianceSpec};
