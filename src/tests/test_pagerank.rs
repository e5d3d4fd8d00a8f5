//! Rank estimator tests: normalization, determinism, Monte-Carlo vs
//! exact agreement, degenerate inputs.

use crate::error::Error;
use crate::matrix::Matrix;
use crate::pagerank::{Lfsr, MonteCarloRanker, PowerIterationRanker, Ranker};

/// Dense strictly-positive adjacency, deterministic entries.
fn dense_graph(n: usize) -> Matrix<f64> {
    let mut rng = Lfsr::new(7);
    Matrix::from_fn(n, n, |_, _| 0.5 + rng.next_f32() as f64)
}

// -------------------- Exact backend --------------------

#[test]
fn test_power_iteration_sums_to_one() {
    let ranker = PowerIterationRanker::default();
    let ranks = ranker.rank(dense_graph(8), 1).unwrap();
    let sum: f64 = ranks.iter().sum();
    assert!((sum - 1.0).abs() < 1e-6, "rank mass {} not ~1", sum);
    assert!(ranks.iter().all(|&r| r >= 0.0));
}

#[test]
fn test_power_iteration_two_node_stationary() {
    // P = [[0.5, 0.5], [1, 0]] has stationary distribution (2/3, 1/3).
    let adj = Matrix::from_vec(2, 2, vec![1.0, 1.0, 1.0, 0.0]);
    let ranker = PowerIterationRanker { damping: 1.0, tolerance: 1e-9, max_iterations: 1000 };
    let ranks = ranker.rank(adj, 1).unwrap();
    println!("two-node stationary: {:?}", ranks);
    assert!((ranks[0] - 2.0 / 3.0).abs() < 1e-3);
    assert!((ranks[1] - 1.0 / 3.0).abs() < 1e-3);
}

#[test]
fn test_power_iteration_deterministic() {
    let ranker = PowerIterationRanker::default();
    let a = ranker.rank(dense_graph(6), 1).unwrap();
    let b = ranker.rank(dense_graph(6), 99).unwrap();
    assert_eq!(a, b, "exact backend must ignore the seed");
}

#[test]
fn test_power_iteration_degenerate_node() {
    let adj = Matrix::from_vec(2, 2, vec![1.0, 1.0, 0.0, 0.0]);
    let err = PowerIterationRanker::default().rank(adj, 1).unwrap_err();
    assert!(matches!(err, Error::DegenerateNode { node: 1 }));
}

// -------------------- Monte-Carlo backend --------------------

#[test]
fn test_monte_carlo_sums_to_one() {
    let ranker = MonteCarloRanker { damping: 0.85, walkers: 16 };
    let ranks = ranker.rank(dense_graph(8), 1).unwrap();
    let sum: f64 = ranks.iter().sum();
    assert!((sum - 1.0).abs() < 1e-3, "rank mass {} not ~1", sum);
}

#[test]
fn test_monte_carlo_matches_power_iteration() {
    let damping = 0.85;
    let exact = PowerIterationRanker { damping: damping as f64, tolerance: 1e-9, max_iterations: 1000 };
    let mc = MonteCarloRanker { damping, walkers: 64 };

    let reference = exact.rank(dense_graph(8), 1).unwrap();
    let estimate = mc.rank(dense_graph(8), 1).unwrap();

    let l1: f64 = reference
        .iter()
        .zip(&estimate)
        .map(|(a, b)| (a - b).abs())
        .sum();
    println!("L1 distance exact vs Monte-Carlo: {:.4}", l1);
    assert!(l1 < 0.05, "L1 distance {} exceeds 0.05", l1);
}

#[test]
fn test_monte_carlo_degenerate_node() {
    let adj = Matrix::from_vec(3, 3, vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
    let err = MonteCarloRanker::default().rank(adj, 1).unwrap_err();
    assert!(matches!(err, Error::DegenerateNode { node: 1 }));
}

#[test]
fn test_monte_carlo_rejects_zero_walkers() {
    let ranker = MonteCarloRanker { damping: 0.85, walkers: 0 };
    let err = ranker.rank(dense_graph(4), 1).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn test_monte_carlo_rejects_bad_damping() {
    let ranker = MonteCarloRanker { damping: 0.0, walkers: 8 };
    let err = ranker.rank(dense_graph(4), 1).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn test_rank_rejects_non_square() {
    let adj = Matrix::from_vec(2, 3, vec![1.0; 6]);
    let err = PowerIterationRanker::default().rank(adj, 1).unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }));
}
