//! Projection-rank embedding engine.
//!
//! Every iteration projects the sign-split item vectors through two fresh
//! random Gaussian subspaces, builds a directed cosine-similarity graph
//! over the items, and ranks it with a pluggable [`Ranker`] backend. The
//! per-iteration rank vectors are aggregated into per-item mean and
//! standard deviation plus the full empirical covariance matrix, which is
//! the embedding itself: a single random projection is a high-variance
//! similarity view, but the second-order statistic over many independent
//! subspaces behaves like a learned kernel without any training step.

use log::{debug, info, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::matrix::Matrix;
use crate::pagerank::{PowerIterationRanker, Ranker};

/// Embedding run parameters, immutable for one call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Number of independent projection iterations.
    pub iterations: usize,
    /// Expected item vector length.
    pub size: usize,
    /// Projection row divisor: `0` selects a logarithmic row count,
    /// otherwise `(2 * size) / divider` rows.
    pub divider: usize,
}

impl Config {
    /// Number of rows in each random projection matrix.
    pub fn projection_rows(&self) -> usize {
        let width = 2 * self.size;
        if self.divider == 0 {
            (width as f64).log2().ceil() as usize
        } else {
            width / self.divider
        }
    }

    fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(Error::InvalidConfig("iterations must be >= 1".into()));
        }
        if self.size == 0 {
            return Err(Error::InvalidConfig("size must be >= 1".into()));
        }
        if self.projection_rows() == 0 {
            return Err(Error::InvalidConfig(format!(
                "divider {} leaves no projection rows for size {}",
                self.divider, self.size
            )));
        }
        Ok(())
    }
}

/// A feature vector with caller-owned identity.
///
/// The engine reads `vector` and writes `mean_rank`/`rank_stddev` exactly
/// once, after all iterations complete. The stddev doubles as an
/// unsupervised distinctiveness score: items whose rank is stable across
/// random subspaces sit in well-defined neighborhoods.
#[derive(Clone, Debug)]
pub struct RankItem<M> {
    pub meta: M,
    pub vector: Vec<f32>,
    pub mean_rank: f64,
    pub rank_stddev: f64,
}

impl<M> RankItem<M> {
    pub fn new(meta: M, vector: Vec<f32>) -> Self {
        Self { meta, vector, mean_rank: 0.0, rank_stddev: 0.0 }
    }
}

/// Projection-matrix normalization variant.
///
/// `Softmax` turns each Gaussian row into a convex combination, keeping
/// projected components non-negative. `Orthonormal` (Gram-Schmidt)
/// preserves more separation between items but can produce negative
/// projected components; pair it with [`EdgeWeights::Absolute`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Projection {
    Softmax,
    Orthonormal,
}

/// Similarity sign handling for graph edge weights.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeWeights {
    Signed,
    Absolute,
}

/// Mutates the similarity graph before ranking (zeroing pairs, pinning
/// walk paths). Applied once per iteration when configured.
pub type GraphHook = Box<dyn Fn(&mut Matrix<f32>) + Send + Sync>;

/// Projection-rank embedding engine.
///
/// Configure with the builder-style `with_*` methods, then call
/// [`Embedder::embed`].
pub struct Embedder {
    config: Config,
    projection: Projection,
    edge_weights: EdgeWeights,
    ranker: Box<dyn Ranker>,
    graph_hook: Option<GraphHook>,
}

impl Embedder {
    /// Engine with the main-line defaults: softmax projections, signed
    /// edge weights, exact undamped ranking.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            projection: Projection::Softmax,
            edge_weights: EdgeWeights::Signed,
            ranker: Box::new(PowerIterationRanker {
                damping: 1.0,
                tolerance: 1e-6,
                max_iterations: 100,
            }),
            graph_hook: None,
        }
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        info!("Configuring projection normalization: {:?}", projection);
        self.projection = projection;
        self
    }

    pub fn with_edge_weights(mut self, edge_weights: EdgeWeights) -> Self {
        info!("Configuring edge weights: {:?}", edge_weights);
        self.edge_weights = edge_weights;
        self
    }

    /// Swap the ranking backend (Monte-Carlo or exact).
    pub fn with_ranker(mut self, ranker: Box<dyn Ranker>) -> Self {
        self.ranker = ranker;
        self
    }

    /// Install a similarity-graph mutation hook.
    pub fn with_graph_hook(
        mut self,
        hook: impl Fn(&mut Matrix<f32>) + Send + Sync + 'static,
    ) -> Self {
        self.graph_hook = Some(Box::new(hook));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the full embedding: `config.iterations` independent
    /// projection-rank rounds, then mean/stddev write-back and the N×N
    /// rank covariance matrix.
    ///
    /// Iteration seeds are pre-drawn from a single ChaCha stream rooted at
    /// `seed`, so iterations batch freely across workers while the seed
    /// stream stays deterministic. Fails with
    /// [`Error::DimensionMismatch`] if any item's vector length differs
    /// from `config.size`; no partial covariance is returned on failure.
    pub fn embed<M>(&self, seed: u64, items: &mut [RankItem<M>]) -> Result<Vec<Vec<f64>>> {
        self.config.validate()?;
        let n = items.len();
        if n == 0 {
            return Ok(Vec::new());
        }
        let split = sign_split(items, self.config.size)?;
        info!(
            "Embedding {} items: {} iterations, {} projection rows over width {}",
            n,
            self.config.iterations,
            self.config.projection_rows(),
            2 * self.config.size
        );

        let mut root = ChaCha8Rng::seed_from_u64(seed);
        let iteration_seeds: Vec<(u64, u32)> = (0..self.config.iterations)
            .map(|_| (root.random::<u64>(), root.random::<u32>()))
            .collect();

        let results: Vec<Vec<f64>> = iteration_seeds
            .par_iter()
            .map(|&(matrix_seed, rank_seed)| self.run_iteration(&split, matrix_seed, rank_seed))
            .collect::<Result<_>>()?;

        let iterations = results.len() as f64;
        let mut means = vec![0.0f64; n];
        for result in &results {
            for (mean, value) in means.iter_mut().zip(result) {
                *mean += value;
            }
        }
        for mean in &mut means {
            *mean /= iterations;
        }

        let mut stddevs = vec![0.0f64; n];
        for result in &results {
            for (acc, (value, mean)) in stddevs.iter_mut().zip(result.iter().zip(&means)) {
                let diff = value - mean;
                *acc += diff * diff;
            }
        }
        for acc in &mut stddevs {
            *acc = (*acc / iterations).sqrt();
        }

        for (item, (mean, stddev)) in items.iter_mut().zip(means.iter().zip(&stddevs)) {
            item.mean_rank = *mean;
            item.rank_stddev = *stddev;
        }

        let covariance: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| {
                let mut row = vec![0.0f64; n];
                for result in &results {
                    let diff_i = means[i] - result[i];
                    for (cell, (value, mean)) in row.iter_mut().zip(result.iter().zip(&means)) {
                        *cell += diff_i * (mean - value);
                    }
                }
                for cell in &mut row {
                    *cell /= iterations;
                }
                row
            })
            .collect();

        debug!(
            "Embedding complete: mean rank range [{:.6}, {:.6}]",
            means.iter().fold(f64::INFINITY, |a, &b| a.min(b)),
            means.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b))
        );
        Ok(covariance)
    }

    fn run_iteration(
        &self,
        split: &Matrix<f32>,
        matrix_seed: u64,
        rank_seed: u32,
    ) -> Result<Vec<f64>> {
        let rows = self.config.projection_rows();
        let width = 2 * self.config.size;
        let mut rng = ChaCha8Rng::seed_from_u64(matrix_seed);

        let a = Matrix::from_fn(rows, width, |_, _| {
            let sample: f32 = StandardNormal.sample(&mut rng);
            sample
        });
        let b = Matrix::from_fn(rows, width, |_, _| {
            let sample: f32 = StandardNormal.sample(&mut rng);
            sample
        });
        let (a, b) = match self.projection {
            Projection::Softmax => (a.softmax_rows(1.0), b.softmax_rows(1.0)),
            Projection::Orthonormal => (a.gram_schmidt_rows(), b.gram_schmidt_rows()),
        };

        let x = split.mul_transpose(&a)?.unit_normalize_rows();
        let y = split.mul_transpose(&b)?.unit_normalize_rows();
        let mut sim = y.mul_transpose(&x)?;
        if self.edge_weights == EdgeWeights::Absolute {
            sim.apply(f32::abs);
        }
        if let Some(hook) = &self.graph_hook {
            hook(&mut sim);
        }

        let mut ranks = self.ranker.rank(sim.cast::<f64>(), rank_seed)?;
        let mut coerced = 0usize;
        for value in &mut ranks {
            if !value.is_finite() {
                *value = 0.0;
                coerced += 1;
            }
        }
        if coerced > 0 {
            warn!("coerced {} non-finite rank entries to zero", coerced);
        }
        Ok(ranks)
    }
}

/// Split signed vectors into non-negative halves: positive components in
/// the first `size` slots, magnitudes of negative components at the same
/// offset in the second half. The softmax projection path needs
/// non-negative, proportionally meaningful inputs.
fn sign_split<M>(items: &[RankItem<M>], size: usize) -> Result<Matrix<f32>> {
    let width = 2 * size;
    let mut split = Matrix::zeros(items.len(), width);
    for (index, item) in items.iter().enumerate() {
        if item.vector.len() != size {
            return Err(Error::DimensionMismatch {
                index,
                expected: size,
                found: item.vector.len(),
            });
        }
        let row = split.row_mut(index);
        for (offset, &value) in item.vector.iter().enumerate() {
            if value < 0.0 {
                row[size + offset] = -value;
            } else {
                row[offset] = value;
            }
        }
    }
    Ok(split)
}
