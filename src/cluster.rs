//! Cluster-robust (CRHC) covariance assembly.
//!
//! Observations are partitioned by label equality; within-cluster score
//! vectors `s_g = X_g' u_g` are summed into the meat `M = sum_g s_g s_g'`
//! before sandwiching. CRHC1 applies the finite-cluster correction
//! `G/(G-1) * (n-1)/(n-p)`; CRHC2 and CRHC3 instead adjust the residuals
//! through the cluster's own leverage block `H_gg = X_g (X'X)^-1 X_g'`,
//! mirroring HC2 and HC3. The result depends only on the partition the
//! labels induce, not on the label values or their order.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::assembly::{assemble, bread, CovarianceEstimate};
use crate::error::{Result, SandwichError};
use crate::model::validate_inputs;

/// Eigenvalues of `I - H_gg` at or below this are treated as saturated.
const SATURATION_TOLERANCE: f64 = 1e-10;

/// Closed family of cluster-level corrections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterVariant {
    /// Finite-cluster degrees-of-freedom scaling of the plain score meat.
    Crhc1,
    /// Per-cluster `(I - H_gg)^(-1/2)` residual adjustment, analogous to HC2.
    Crhc2,
    /// Per-cluster `(I - H_gg)^(-1)` residual adjustment, analogous to HC3.
    Crhc3,
}

/// Estimates the cluster-robust coefficient covariance matrix.
///
/// Two observations share a cluster iff their labels compare equal; labels
/// may be any `Eq + Hash` type and need not be contiguous or sorted. Fails
/// with [`SandwichError::TooFewClusters`] when fewer than two clusters are
/// present.
pub fn crhc_covariance<L: Eq + Hash>(
    design: &DMatrix<f64>,
    residuals: &DVector<f64>,
    labels: &[L],
    variant: ClusterVariant,
) -> Result<CovarianceEstimate> {
    validate_inputs(design, residuals)?;
    let n = design.nrows();
    let p = design.ncols();
    if labels.len() != n {
        return Err(SandwichError::dimension_mismatch(
            "cluster label length",
            n,
            labels.len(),
        ));
    }

    let clusters = partition_by_label(labels);
    let cluster_count = clusters.len();
    if cluster_count < 2 {
        return Err(SandwichError::TooFewClusters {
            found: cluster_count,
        });
    }

    let bread = bread(design)?;
    let mut meat = DMatrix::<f64>::zeros(p, p);
    for (cluster_index, members) in clusters.iter().enumerate() {
        let size = members.len();
        let cluster_design =
            DMatrix::from_fn(size, p, |r, c| design[(members[r], c)]);
        let cluster_residuals = DVector::from_fn(size, |r, _| residuals[members[r]]);

        let adjusted = match variant {
            ClusterVariant::Crhc1 => cluster_residuals,
            ClusterVariant::Crhc2 => adjusted_residuals(
                &cluster_design,
                &cluster_residuals,
                &bread,
                -0.5,
                cluster_index,
            )?,
            ClusterVariant::Crhc3 => adjusted_residuals(
                &cluster_design,
                &cluster_residuals,
                &bread,
                -1.0,
                cluster_index,
            )?,
        };

        let score = cluster_design.transpose() * adjusted;
        meat += &score * score.transpose();
    }

    if variant == ClusterVariant::Crhc1 {
        meat *= finite_cluster_correction(cluster_count, n, p);
    }

    let covariance = assemble(&bread, &meat, 1.0);
    Ok(CovarianceEstimate::new(covariance, Vec::new()))
}

/// The CRHC1 degrees-of-freedom factor `G/(G-1) * (n-1)/(n-p)`.
pub(crate) fn finite_cluster_correction(clusters: usize, n: usize, p: usize) -> f64 {
    let g = clusters as f64;
    let n = n as f64;
    let p = p as f64;
    g / (g - 1.0) * (n - 1.0) / (n - p)
}

/// Groups observation indices by label equality, in first-appearance order.
fn partition_by_label<L: Eq + Hash>(labels: &[L]) -> Vec<Vec<usize>> {
    let mut index_of: HashMap<&L, usize> = HashMap::new();
    let mut clusters: Vec<Vec<usize>> = Vec::new();
    for (observation, label) in labels.iter().enumerate() {
        match index_of.entry(label) {
            Entry::Occupied(entry) => clusters[*entry.get()].push(observation),
            Entry::Vacant(slot) => {
                slot.insert(clusters.len());
                clusters.push(vec![observation]);
            }
        }
    }
    clusters
}

/// Applies `(I - H_gg)^power` to the cluster's residual vector through a
/// symmetric eigendecomposition.
fn adjusted_residuals(
    cluster_design: &DMatrix<f64>,
    cluster_residuals: &DVector<f64>,
    bread: &DMatrix<f64>,
    power: f64,
    cluster_index: usize,
) -> Result<DVector<f64>> {
    let size = cluster_design.nrows();
    let block = DMatrix::identity(size, size)
        - cluster_design * bread * cluster_design.transpose();

    let eigen = block.symmetric_eigen();
    if eigen.eigenvalues.iter().any(|v| *v <= SATURATION_TOLERANCE) {
        return Err(SandwichError::SaturatedCluster {
            cluster: cluster_index,
        });
    }

    let mut scaled = eigen.eigenvectors.clone();
    for (j, mut column) in scaled.column_iter_mut().enumerate() {
        column *= eigen.eigenvalues[j].powf(power);
    }
    let adjustment = scaled * eigen.eigenvectors.transpose();
    Ok(adjustment * cluster_residuals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hc::{hc_covariance, HcVariant};
    use approx::assert_relative_eq;

    fn fixture() -> (DMatrix<f64>, DVector<f64>) {
        let design = DMatrix::from_row_slice(
            8,
            2,
            &[
                1.0, 0.3, 1.0, -0.6, 1.0, 1.2, 1.0, 0.1, 1.0, -0.9, 1.0, 0.7, 1.0, -0.3, 1.0, 1.5,
            ],
        );
        let residuals = DVector::from_vec(vec![0.4, -0.5, 0.2, 0.6, -0.1, -0.4, 0.3, -0.2]);
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
        let labels = vec![0, 0, 0, 1, 1, 2, 2, 2];
        for variant in [
            ClusterVariant::Crhc1,
            ClusterVariant::Crhc2,
            ClusterVariant::Crhc3,
        ] {
            let estimate = crhc_covariance(&design, &residuals, &labels, variant).unwrap();
            let matrix = estimate.matrix();
            assert_relative_eq!(matrix, &matrix.transpose(), epsilon = 1e-12);
        }
    }

    #[test]
    fn relabeling_the_same_partition_changes_nothing() {
        let (design, residuals) = fixture();
        let numeric = vec![0, 0, 0, 1, 1, 2, 2, 2];
        let strings: Vec<String> = ["z", "z", "z", "q", "q", "a", "a", "a"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let first = crhc_covariance(&design, &residuals, &numeric, ClusterVariant::Crhc1).unwrap();
        let second =
            crhc_covariance(&design, &residuals, &strings, ClusterVariant::Crhc1).unwrap();
        assert_relative_eq!(first.matrix(), second.matrix(), epsilon = 1e-12);
    }

    #[test]
    fn singleton_clusters_reduce_crhc1_to_hc1() {
        // With every cluster a single observation, G = n and the correction
        // G/(G-1) * (n-1)/(n-p) collapses to n/(n-p): exactly HC1.
        let (design, residuals) = fixture();
        let labels: Vec<usize> = (0..8).collect();
        let crhc =
            crhc_covariance(&design, &residuals, &labels, ClusterVariant::Crhc1).unwrap();
        let hc1 =
            hc_covariance(&design, &residuals, &leverage(&design), HcVariant::Hc1).unwrap();
        assert_relative_eq!(crhc.matrix(), hc1.matrix(), epsilon = 1e-10);
    }

    #[test]
    fn singleton_clusters_reduce_crhc2_to_hc2() {
        let (design, residuals) = fixture();
        let labels: Vec<usize> = (0..8).collect();
        let crhc =
            crhc_covariance(&design, &residuals, &labels, ClusterVariant::Crhc2).unwrap();
        let hc2 =
            hc_covariance(&design, &residuals, &leverage(&design), HcVariant::Hc2).unwrap();
        assert_relative_eq!(crhc.matrix(), hc2.matrix(), epsilon = 1e-10);
    }

    #[test]
    fn finite_cluster_correction_matches_the_closed_form() {
        // G = 10 equal clusters, n = 100, p = 3.
        let factor = finite_cluster_correction(10, 100, 3);
        assert_relative_eq!(factor, 10.0 / 9.0 * 99.0 / 97.0, epsilon = 1e-14);
    }

    #[test]
    fn crhc1_matches_a_manual_computation() {
        let (design, residuals) = fixture();
        let labels = vec!["a", "a", "a", "a", "b", "b", "b", "b"];
        let estimate =
            crhc_covariance(&design, &residuals, &labels, ClusterVariant::Crhc1).unwrap();

        let inverse = (design.transpose() * &design).try_inverse().unwrap();
        let mut meat = DMatrix::<f64>::zeros(2, 2);
        for members in [[0usize, 1, 2, 3], [4, 5, 6, 7]] {
            let mut score = DVector::<f64>::zeros(2);
            for i in members {
                score += design.row(i).transpose() * residuals[i];
            }
            meat += &score * score.transpose();
        }
        meat *= 2.0 / 1.0 * 7.0 / 6.0;
        let expected = &inverse * meat * &inverse;
        assert_relative_eq!(estimate.matrix(), &expected, epsilon = 1e-12);
    }

    #[test]
    fn a_single_cluster_is_rejected() {
        let (design, residuals) = fixture();
        let labels = vec![7; 8];
        assert!(matches!(
            crhc_covariance(&design, &residuals, &labels, ClusterVariant::Crhc1),
            Err(SandwichError::TooFewClusters { found: 1 })
        ));
    }

    #[test]
    fn mismatched_label_length_is_rejected() {
        let (design, residuals) = fixture();
        let labels = vec![0, 1];
        assert!(matches!(
            crhc_covariance(&design, &residuals, &labels, ClusterVariant::Crhc2),
            Err(SandwichError::DimensionMismatch { .. })
        ));
    }
}
