//! Embedding engine tests: covariance symmetry, determinism, scenario
//! checks from the indistinguishable-items and variant-switch cases.

use crate::embedding::{Config, EdgeWeights, Embedder, Projection, RankItem};
use crate::error::Error;
use crate::pagerank::MonteCarloRanker;

use super::{disjoint_pairs, items_from_rows, SEED};

fn mixed_sign_items() -> Vec<RankItem<usize>> {
    items_from_rows(&[
        vec![1.0, -0.5, 0.3, 0.0],
        vec![0.8, 0.2, -0.1, 0.4],
        vec![-0.3, 0.9, 0.5, -0.2],
        vec![0.1, 0.1, -0.8, 0.6],
        vec![-0.7, -0.2, 0.2, 0.9],
        vec![0.4, 0.6, 0.1, -0.5],
    ])
}

#[test]
fn test_covariance_is_symmetric() {
    let mut items = mixed_sign_items();
    let config = Config { iterations: 16, size: 4, divider: 1 };
    let cov = Embedder::new(config).embed(SEED, &mut items).unwrap();

    assert_eq!(cov.len(), items.len());
    for i in 0..cov.len() {
        assert_eq!(cov[i].len(), items.len());
        for j in 0..cov.len() {
            assert!(
                (cov[i][j] - cov[j][i]).abs() < 1e-12,
                "cov[{}][{}]={} != cov[{}][{}]={}",
                i,
                j,
                cov[i][j],
                j,
                i,
                cov[j][i]
            );
        }
    }
}

#[test]
fn test_identical_items_are_indistinguishable() {
    let vector = vec![0.5f32, -0.25, 1.0];
    let mut items = vec![
        RankItem::new(0usize, vector.clone()),
        RankItem::new(1usize, vector),
    ];
    let config = Config { iterations: 8, size: 3, divider: 1 };
    let cov = Embedder::new(config).embed(SEED, &mut items).unwrap();

    println!("identical-item covariance: {:?}", cov);
    assert!((cov[0][1] - cov[0][0]).abs() < 1e-9);
    assert!((cov[0][1] - cov[1][1]).abs() < 1e-9);
    // Two indistinguishable items split the rank mass every iteration.
    assert!((items[0].mean_rank - 0.5).abs() < 1e-6);
    assert!((items[1].mean_rank - 0.5).abs() < 1e-6);
}

#[test]
fn test_exact_backend_is_deterministic() {
    let config = Config { iterations: 8, size: 4, divider: 1 };
    let mut items_a = mixed_sign_items();
    let mut items_b = mixed_sign_items();

    let cov_a = Embedder::new(config).embed(SEED, &mut items_a).unwrap();
    let cov_b = Embedder::new(config).embed(SEED, &mut items_b).unwrap();

    assert_eq!(cov_a, cov_b);
    for (a, b) in items_a.iter().zip(&items_b) {
        assert_eq!(a.mean_rank, b.mean_rank);
        assert_eq!(a.rank_stddev, b.rank_stddev);
    }
}

#[test]
fn test_mean_ranks_sum_to_one() {
    let mut items = mixed_sign_items();
    let config = Config { iterations: 8, size: 4, divider: 1 };
    Embedder::new(config).embed(SEED, &mut items).unwrap();

    let total: f64 = items.iter().map(|item| item.mean_rank).sum();
    println!("mean rank total: {:.6}", total);
    assert!((total - 1.0).abs() < 1e-6);
}

#[test]
fn test_orthonormal_absolute_variant() {
    let mut items = mixed_sign_items();
    let config = Config { iterations: 8, size: 4, divider: 1 };
    let cov = Embedder::new(config)
        .with_projection(Projection::Orthonormal)
        .with_edge_weights(EdgeWeights::Absolute)
        .embed(SEED, &mut items)
        .unwrap();

    for i in 0..cov.len() {
        for j in 0..cov.len() {
            assert!(cov[i][j].is_finite());
            assert!((cov[i][j] - cov[j][i]).abs() < 1e-12);
        }
    }
}

#[test]
fn test_monte_carlo_backend() {
    let mut items = disjoint_pairs();
    let config = Config { iterations: 4, size: 8, divider: 1 };
    let cov = Embedder::new(config)
        .with_ranker(Box::new(MonteCarloRanker { damping: 0.85, walkers: 32 }))
        .embed(SEED, &mut items)
        .unwrap();

    let total: f64 = items.iter().map(|item| item.mean_rank).sum();
    assert!((total - 1.0).abs() < 1e-3, "mean rank total {}", total);
    for i in 0..cov.len() {
        for j in 0..cov.len() {
            assert!((cov[i][j] - cov[j][i]).abs() < 1e-12);
        }
    }
}

#[test]
fn test_graph_hook_pins_every_iteration() {
    // A hook that overwrites the similarity graph makes every iteration
    // rank the same graph, so the per-item rank spread collapses.
    let mut items = items_from_rows(&[vec![1.0, 0.0], vec![0.0, 1.0]]);
    let config = Config { iterations: 8, size: 2, divider: 1 };
    Embedder::new(config)
        .with_graph_hook(|sim| {
            sim.set(0, 0, 1.0);
            sim.set(0, 1, 0.5);
            sim.set(1, 0, 0.5);
            sim.set(1, 1, 1.0);
        })
        .embed(SEED, &mut items)
        .unwrap();

    for item in &items {
        assert!(
            item.rank_stddev < 1e-9,
            "pinned graph should yield constant ranks, stddev {}",
            item.rank_stddev
        );
    }
}

#[test]
fn test_dimension_mismatch_is_fatal() {
    let mut items = vec![
        RankItem::new(0usize, vec![1.0f32, 2.0]),
        RankItem::new(1usize, vec![1.0f32, 2.0, 3.0]),
    ];
    let config = Config { iterations: 4, size: 2, divider: 1 };
    let err = Embedder::new(config).embed(SEED, &mut items).unwrap_err();
    assert!(matches!(
        err,
        Error::DimensionMismatch { index: 1, expected: 2, found: 3 }
    ));
}

#[test]
fn test_zero_iterations_rejected() {
    let mut items = mixed_sign_items();
    let config = Config { iterations: 0, size: 4, divider: 1 };
    let err = Embedder::new(config).embed(SEED, &mut items).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn test_oversized_divider_rejected() {
    let mut items = mixed_sign_items();
    let config = Config { iterations: 4, size: 4, divider: 16 };
    let err = Embedder::new(config).embed(SEED, &mut items).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn test_empty_items_yield_empty_covariance() {
    let mut items: Vec<RankItem<usize>> = Vec::new();
    let config = Config { iterations: 4, size: 4, divider: 1 };
    let cov = Embedder::new(config).embed(SEED, &mut items).unwrap();
    assert!(cov.is_empty());
}
