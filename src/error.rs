use thiserror::Error;

/// Unified error type for `sandwich` operations.
#[derive(Debug, Error)]
pub enum SandwichError {
    /// Raised when provided arrays or matrices have incompatible dimensions.
    #[error("dimension mismatch in {context}: expected {expected} but found {found}")]
    DimensionMismatch {
        /// Human-readable context describing the operation.
        context: &'static str,
        /// The required dimension, often the model-implied value.
        expected: usize,
        /// The dimension that was actually supplied.
        found: usize,
    },

    /// Raised when a fixed bandwidth is non-positive or non-finite.
    #[error("bandwidth must be a finite positive number, found {value}")]
    InvalidBandwidth { value: f64 },

    /// Raised when the sample is too small to identify the sandwich form.
    #[error("need more observations than parameters: n = {observations}, p = {parameters}")]
    TooFewObservations {
        observations: usize,
        parameters: usize,
    },

    /// Raised when a hat value lies outside `[0, 1)`, where the leverage
    /// adjustments are undefined.
    #[error("leverage at index {index} must lie in [0, 1), found {value}")]
    LeverageOutOfRange { index: usize, value: f64 },

    /// Raised when the cluster labels induce fewer than two clusters.
    #[error("cluster-robust estimation needs at least two clusters, found {found}")]
    TooFewClusters { found: usize },

    /// Raised when a cluster's leverage block `I - H_gg` is not positive
    /// definite, so the CRHC2/CRHC3 adjustments are undefined.
    #[error("cluster {cluster} has a saturated leverage block")]
    SaturatedCluster { cluster: usize },

    /// Raised when linear algebra operations encounter a singular system.
    #[error("matrix in {context} is singular")]
    SingularMatrix { context: &'static str },

    /// Raised when the prewhitening recoloring matrix `I - D'` is numerically
    /// singular (condition number beyond recovery).
    #[error("prewhitening recoloring matrix is singular (condition number {condition:e})")]
    SingularRecoloring { condition: f64 },

    /// Raised when inputs contain NaN or infinities.
    #[error("encountered a non-finite value during {context}")]
    NumericalError { context: &'static str },

    /// Raised when the facade is asked for an estimator whose inputs were
    /// never supplied to the model container.
    #[error("{component} must be provided before requesting this estimator")]
    MissingComponent { component: &'static str },
}

impl SandwichError {
    /// Helper to format a [`DimensionMismatch`](SandwichError::DimensionMismatch) error.
    pub fn dimension_mismatch(context: &'static str, expected: usize, found: usize) -> Self {
        Self::DimensionMismatch {
            context,
            expected,
            found,
        }
    }

    /// Helper to raise when a matrix factorization fails due to singularity.
    pub fn singular(context: &'static str) -> Self {
        Self::SingularMatrix { context }
    }

    /// Helper for bubbling up missing component errors from the facade.
    pub fn missing_component(component: &'static str) -> Self {
        Self::MissingComponent { component }
    }
}

/// Non-fatal numerical diagnostics attached to an otherwise valid estimate.
///
/// Discarding a computed covariance matrix is worse than flagging it, so these
/// travel alongside the result instead of aborting the call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NumericalWarning {
    /// The assembled covariance matrix has a negative eigenvalue. Known
    /// limitation of kernel HAC estimators in small samples.
    #[error("covariance estimate is not positive semi-definite (smallest eigenvalue {min_eigenvalue:e})")]
    NotPositiveSemiDefinite { min_eigenvalue: f64 },

    /// The recoloring matrix `I - D'` is close to singular; the recolored
    /// estimate may be unreliable.
    #[error("prewhitening recoloring matrix is ill-conditioned (condition number {condition:e})")]
    IllConditionedRecoloring { condition: f64 },
}

/// Type alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, SandwichError>;
