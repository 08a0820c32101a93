//! Thin facade routing an estimator configuration to the right assembler.

use serde::{Deserialize, Serialize};

use crate::assembly::CovarianceEstimate;
use crate::cluster::{crhc_covariance, ClusterVariant};
use crate::error::{Result, SandwichError};
use crate::hac::{hac_covariance, HacConfig};
use crate::hc::{hc_covariance, HcVariant};
use crate::model::FittedModel;

/// Which robust covariance estimator to run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CovarianceSpec {
    /// Kernel HAC estimation with the given configuration.
    Hac(HacConfig),
    /// Leverage-based heteroskedasticity-consistent estimation.
    Hc(HcVariant),
    /// Cluster-robust estimation over the model's cluster labels.
    ClusterRobust(ClusterVariant),
}

/// Dispatches `spec` against the fitted model.
///
/// HC requires the model to carry leverage values and cluster-robust
/// estimation requires cluster labels; a missing component fails with
/// [`SandwichError::MissingComponent`] before any computation.
pub fn vcov(model: &FittedModel, spec: &CovarianceSpec) -> Result<CovarianceEstimate> {
    match spec {
        CovarianceSpec::Hac(config) => {
            hac_covariance(model.design(), model.residuals(), config)
        }
        CovarianceSpec::Hc(variant) => {
            let leverage = model
                .leverage()
                .ok_or_else(|| SandwichError::missing_component("leverage"))?;
            hc_covariance(model.design(), model.residuals(), leverage, *variant)
        }
        CovarianceSpec::ClusterRobust(variant) => {
            let clusters = model
                .clusters()
                .ok_or_else(|| SandwichError::missing_component("cluster labels"))?;
            crhc_covariance(model.design(), model.residuals(), clusters, *variant)
        }
    }
}
