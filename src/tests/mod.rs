mod test_embedding;
mod test_pagerank;

use crate::embedding::RankItem;

pub const SEED: u64 = 1;

pub fn items_from_rows(rows: &[Vec<f32>]) -> Vec<RankItem<usize>> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| RankItem::new(i, row.clone()))
        .collect()
}

/// Two tight pairs of 8-dimensional vectors with zero cross-pair overlap.
pub fn disjoint_pairs() -> Vec<RankItem<usize>> {
    items_from_rows(&[
        vec![1.0, 1.0, 0.1, 0.0, 0.0, 0.0, 0.0, 0.0],
        vec![0.9, 1.1, 0.0, 0.1, 0.0, 0.0, 0.0, 0.0],
        vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.1, 0.0],
        vec![0.0, 0.0, 0.0, 0.0, 1.1, 0.9, 0.0, 0.1],
    ])
}
