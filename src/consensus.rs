//! Consensus (co-association) clustering over rank covariance matrices.
//!
//! A single k-means run is sensitive to initialization and to the
//! arbitrary rotation of the covariance basis. Running many seeded
//! restarts and counting, per pair, how often two items land in the same
//! cluster yields a co-association matrix that is invariant to cluster
//! label permutation across restarts; reclustering that matrix gives
//! labels that are stable under any individual run's randomness. This is
//! a bootstrap-style ensemble vote, not a new clustering algorithm.

use log::{debug, info};
use rayon::prelude::*;
use smartcore::cluster::kmeans::{KMeans, KMeansParameters};
use smartcore::linalg::basic::arrays::Array2;
use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::error::{Error, Result};

/// Default number of k-means restarts feeding the co-association matrix.
/// Empirically chosen, tunable.
pub const DEFAULT_RESTARTS: usize = 33;

/// Iteration cap handed to every k-means fit.
pub const KMEANS_MAX_ITER: usize = 100;

/// Seeded k-means over row vectors, 0-indexed labels.
///
/// Failures from the underlying fit (empty input, `k` larger than the
/// item count) are propagated unchanged, never retried.
pub fn kmeans(rows: &[Vec<f64>], k: usize, max_iter: usize, seed: u64) -> Result<Vec<usize>> {
    if rows.is_empty() {
        return Err(Error::KMeans("empty input".into()));
    }
    let (n, f) = (rows.len(), rows[0].len());

    let data: DenseMatrix<f64> =
        DenseMatrix::from_iterator(rows.iter().flatten().copied(), n, f, 0);
    let params = KMeansParameters { k, max_iter, seed: Some(seed) };

    let model: KMeans<f64, usize, DenseMatrix<f64>, Vec<usize>> =
        KMeans::fit(&data, params).map_err(|e| Error::KMeans(e.to_string()))?;
    model.predict(&data).map_err(|e| Error::KMeans(e.to_string()))
}

/// Pairwise same-cluster counts across label assignments.
///
/// Symmetric, diagonal equal to the number of assignments, every entry in
/// `[0, labelings.len()]`. Relabeling any single assignment leaves the
/// result unchanged.
pub fn co_association(labelings: &[Vec<usize>]) -> Vec<Vec<f64>> {
    let n = labelings.first().map(|labels| labels.len()).unwrap_or(0);
    let mut meta = vec![vec![0.0f64; n]; n];
    for labels in labelings {
        for i in 0..n {
            let target = labels[i];
            for (j, &label) in labels.iter().enumerate() {
                if label == target {
                    meta[i][j] += 1.0;
                }
            }
        }
    }
    meta
}

/// Stable cluster labels from a covariance matrix.
///
/// Runs `restarts` k-means fits with seeds `1..=restarts`, folds their
/// label assignments into the co-association matrix, and reclusters that
/// matrix once with seed 1. Restarts are independent and run in parallel;
/// each produces its own label vector, and the co-association fold is
/// sequential.
pub fn consensus_cluster(cov: &[Vec<f64>], k: usize, restarts: usize) -> Result<Vec<usize>> {
    if restarts == 0 {
        return Err(Error::InvalidConfig("restarts must be >= 1".into()));
    }
    info!(
        "Consensus clustering {} items: k={}, {} restarts",
        cov.len(),
        k,
        restarts
    );

    let labelings: Vec<Vec<usize>> = (1..=restarts)
        .into_par_iter()
        .map(|restart| kmeans(cov, k, KMEANS_MAX_ITER, restart as u64))
        .collect::<Result<_>>()?;

    let meta = co_association(&labelings);
    debug!(
        "Co-association matrix folded from {} restarts, reclustering",
        labelings.len()
    );
    kmeans(&meta, k, KMEANS_MAX_ITER, 1)
}
