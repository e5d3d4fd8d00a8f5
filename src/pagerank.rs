//! Stationary-distribution estimators for dense similarity graphs.
//!
//! Two interchangeable backends behind the [`Ranker`] trait:
//!
//! - [`MonteCarloRanker`]: many independent random walks with
//!   teleportation, visit counts shared through an atomic array. Cheap for
//!   the dense N×N graphs the embedding engine rebuilds every iteration,
//!   and trivially parallel because walkers share no state.
//! - [`PowerIterationRanker`]: exact damped power iteration, deterministic
//!   for a given adjacency.
//!
//! Walkers draw from a crate-local LFSR stream, not from the seeded
//! ChaCha generator used for projection sampling: the LFSR is lock-free
//! and allocation-free, one independent stream per walker, and the two
//! sources must not be conflated.

use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, trace, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::matrix::Matrix;

/// LFSR feedback mask with a maximum period.
pub const LFSR_MASK: u32 = 0x8000_0057;

/// 32-bit linear-feedback shift register.
///
/// A zero seed is remapped to a fixed non-zero state; an all-zero LFSR
/// never leaves zero.
#[derive(Clone, Copy, Debug)]
pub struct Lfsr {
    state: u32,
}

impl Lfsr {
    pub fn new(seed: u32) -> Self {
        Self { state: if seed == 0 { LFSR_MASK } else { seed } }
    }

    /// Advance and return the next state.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        let mut lfsr = self.state;
        lfsr = (lfsr >> 1) ^ ((lfsr & 1).wrapping_neg() & LFSR_MASK);
        self.state = lfsr;
        lfsr
    }

    /// Uniform `f32` in `[0, 1]`.
    #[inline]
    pub fn next_f32(&mut self) -> f32 {
        self.next_u32() as f32 / u32::MAX as f32
    }

    /// Uniform integer below `n`, rejection-sampled to avoid modulo bias.
    #[inline]
    pub fn next_below(&mut self, n: usize) -> usize {
        let max = u32::MAX - ((1u64 << 32) % n as u64) as u32;
        let mut v = self.next_u32();
        while v > max {
            v = self.next_u32();
        }
        (v % n as u32) as usize
    }
}

/// Interchangeable graph-ranking backend.
///
/// Takes a non-negative square adjacency matrix, row-normalizes it into a
/// transition matrix, and returns the estimated stationary distribution:
/// a length-N vector of non-negative scores summing to one within the
/// backend's tolerance. A zero-sum adjacency row is a
/// [`Error::DegenerateNode`].
pub trait Ranker: Sync {
    fn rank(&self, adjacency: Matrix<f64>, seed: u32) -> Result<Vec<f64>>;
}

/// Row-normalize a square adjacency into a transition matrix, in place.
fn row_normalize(adj: &mut Matrix<f64>) -> Result<()> {
    let (rows, cols) = adj.shape();
    if rows != cols {
        return Err(Error::ShapeMismatch {
            left_rows: rows,
            left_cols: cols,
            right_rows: cols,
            right_cols: cols,
        });
    }
    for i in 0..rows {
        let sum: f64 = adj.row(i).iter().sum();
        if sum <= 0.0 {
            return Err(Error::DegenerateNode { node: i });
        }
        for v in adj.row_mut(i).iter_mut() {
            *v /= sum;
        }
    }
    Ok(())
}

/// Monte-Carlo stationary-distribution estimator.
///
/// Runs `walkers` independent simulated random walks of `rows * cols`
/// steps each. At every step a walker teleports to a uniform node with
/// probability `1 - damping`, otherwise samples the next node from the
/// current transition row by inverse CDF against a single uniform draw.
/// A cumulative sum that falls short of the draw (floating-point edge
/// case) teleports instead of erroring.
///
/// Results are statistically reproducible per seed; bit-identical output
/// across differing parallelism levels is not promised.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct MonteCarloRanker {
    /// Probability of following an edge rather than teleporting.
    pub damping: f32,
    /// Number of independent walkers.
    pub walkers: usize,
}

impl Default for MonteCarloRanker {
    fn default() -> Self {
        Self { damping: 0.85, walkers: 64 }
    }
}

impl PartialEq for MonteCarloRanker {
    fn eq(&self, other: &Self) -> bool {
        self.walkers == other.walkers && approx::relative_eq!(self.damping, other.damping)
    }
}

impl Ranker for MonteCarloRanker {
    fn rank(&self, mut adjacency: Matrix<f64>, seed: u32) -> Result<Vec<f64>> {
        if self.walkers == 0 {
            return Err(Error::InvalidConfig("walkers must be >= 1".into()));
        }
        if !(self.damping > 0.0 && self.damping <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "damping must be in (0, 1], got {}",
                self.damping
            )));
        }
        row_normalize(&mut adjacency)?;

        let (rows, cols) = adjacency.shape();
        let n = cols;
        if n == 0 {
            return Ok(Vec::new());
        }
        let steps = rows * cols;
        debug!(
            "Monte-Carlo rank: {} nodes, {} walkers x {} steps",
            n, self.walkers, steps
        );

        let mut master = Lfsr::new(seed);
        let walker_seeds: Vec<u32> = (0..self.walkers).map(|_| master.next_u32()).collect();
        let counts: Vec<AtomicU64> = (0..n).map(|_| AtomicU64::new(0)).collect();

        walker_seeds.par_iter().for_each(|&walker_seed| {
            let mut rng = Lfsr::new(walker_seed);
            let mut node = rng.next_below(n);
            for _ in 0..steps {
                if rng.next_f32() > self.damping {
                    node = rng.next_below(n);
                }
                let draw = rng.next_f32() as f64;
                let mut total = 0.0;
                let mut found = false;
                for (j, &weight) in adjacency.row(node).iter().enumerate() {
                    total += weight;
                    if draw < total {
                        node = j;
                        found = true;
                        break;
                    }
                }
                if !found {
                    node = rng.next_below(n);
                }
                counts[node].fetch_add(1, Ordering::Relaxed);
            }
        });

        let denom = (self.walkers * steps) as f64;
        let ranks: Vec<f64> = counts
            .iter()
            .map(|c| c.load(Ordering::Relaxed) as f64 / denom)
            .collect();
        debug!(
            "Monte-Carlo rank complete, mass = {:.6}",
            ranks.iter().sum::<f64>()
        );
        Ok(ranks)
    }
}

/// Exact damped power iteration: `p' = (1-a)/n + a * Pᵀp` until the L1
/// delta drops below `tolerance` or `max_iterations` is reached. The seed
/// is ignored; output is deterministic for a given adjacency.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PowerIterationRanker {
    pub damping: f64,
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for PowerIterationRanker {
    fn default() -> Self {
        Self { damping: 0.85, tolerance: 1e-6, max_iterations: 100 }
    }
}

impl PartialEq for PowerIterationRanker {
    fn eq(&self, other: &Self) -> bool {
        self.max_iterations == other.max_iterations
            && approx::relative_eq!(self.damping, other.damping)
            && approx::relative_eq!(self.tolerance, other.tolerance)
    }
}

impl Ranker for PowerIterationRanker {
    fn rank(&self, mut adjacency: Matrix<f64>, _seed: u32) -> Result<Vec<f64>> {
        if !(self.damping > 0.0 && self.damping <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "damping must be in (0, 1], got {}",
                self.damping
            )));
        }
        row_normalize(&mut adjacency)?;

        let n = adjacency.rows();
        if n == 0 {
            return Ok(Vec::new());
        }
        let teleport = (1.0 - self.damping) / n as f64;
        let mut p = vec![1.0 / n as f64; n];
        for iteration in 0..self.max_iterations {
            let mut next = vec![teleport; n];
            for j in 0..n {
                let pj = p[j];
                if pj == 0.0 {
                    continue;
                }
                for (i, &weight) in adjacency.row(j).iter().enumerate() {
                    next[i] += self.damping * pj * weight;
                }
            }
            let delta: f64 = p.iter().zip(&next).map(|(a, b)| (a - b).abs()).sum();
            p = next;
            trace!("power iteration {}: L1 delta = {:.3e}", iteration, delta);
            if delta < self.tolerance {
                debug!("power iteration converged after {} rounds", iteration + 1);
                return Ok(p);
            }
        }
        warn!(
            "power iteration hit max_iterations = {} before tolerance {:.1e}",
            self.max_iterations, self.tolerance
        );
        Ok(p)
    }
}
