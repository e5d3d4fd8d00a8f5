use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("dimension mismatch: item {index} has {found} components, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("shape mismatch: {left_rows}x{left_cols} against {right_rows}x{right_cols}")]
    ShapeMismatch {
        left_rows: usize,
        left_cols: usize,
        right_rows: usize,
        right_cols: usize,
    },

    #[error("degenerate node {node}: adjacency row sums to zero")]
    DegenerateNode { node: usize },

    #[error("empty comparison: no rows with non-zero norm on both sides")]
    EmptyComparison,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("k-means failed: {0}")]
    KMeans(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
