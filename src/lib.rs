//! Stochastic projection-rank embeddings for fixed-length feature vectors.
//!
//! `rankspace` computes a similarity/importance embedding for an arbitrary
//! collection of numeric vectors without any trained model, plus a
//! stabilized cluster assignment over that embedding:
//!
//! - [`matrix`]: dense row-major matrix kernel (f32/f64) with row softmax,
//!   Gram-Schmidt orthonormalization, unit normalization, transpose
//!   multiply, mean row-wise cosine similarity, and headerless
//!   little-endian binary persistence.
//! - [`pagerank`]: stationary-distribution estimators behind the
//!   [`Ranker`](pagerank::Ranker) trait: a concurrent Monte-Carlo
//!   random-walk estimator and an exact power-iteration backend.
//! - [`embedding`]: the projection-rank engine. Each iteration projects
//!   sign-split item vectors through random Gaussian subspaces, ranks the
//!   resulting cosine-similarity graph, and the covariance of the rank
//!   vectors across iterations is the embedding.
//! - [`consensus`]: co-association clustering. Many seeded k-means
//!   restarts over the covariance vote pairwise, and the vote matrix is
//!   reclustered into stable labels.
//!
//! # Example
//!
//! ```
//! use rankspace::{consensus_cluster, Config, Embedder, RankItem, DEFAULT_RESTARTS};
//!
//! let mut items: Vec<RankItem<usize>> = vec![
//!     RankItem::new(0, vec![1.0, 0.0, 0.0, 0.0]),
//!     RankItem::new(1, vec![0.9, 0.1, 0.0, 0.0]),
//!     RankItem::new(2, vec![0.0, 0.0, 1.0, 0.2]),
//!     RankItem::new(3, vec![0.0, 0.0, 0.9, 0.3]),
//! ];
//! let config = Config { iterations: 8, size: 4, divider: 1 };
//! let cov = Embedder::new(config).embed(1, &mut items).unwrap();
//! let labels = consensus_cluster(&cov, 2, DEFAULT_RESTARTS).unwrap();
//! assert_eq!(labels.len(), items.len());
//! ```

pub mod consensus;
pub mod embedding;
pub mod error;
pub mod matrix;
pub mod pagerank;

pub use consensus::{co_association, consensus_cluster, kmeans, DEFAULT_RESTARTS};
pub use embedding::{Config, EdgeWeights, Embedder, GraphHook, Projection, RankItem};
pub use error::{Error, Result};
pub use matrix::{Element, Matrix};
pub use pagerank::{Lfsr, MonteCarloRanker, PowerIterationRanker, Ranker};

#[cfg(test)]
mod tests;
