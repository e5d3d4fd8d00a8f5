//! Dense row-major matrix kernel.
//!
//! Every higher layer works on `Matrix<T>`: Gaussian projection operators,
//! projected item blocks, and the per-iteration similarity graphs. `T` is
//! `f32` or `f64` through the [`Element`] trait, which also fixes the
//! element width for the headerless little-endian persistence format
//! (shape travels out of band; a reader must know `rows`, `cols` and the
//! element width up front).

use std::io::{Read, Write};
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};

use rayon::prelude::*;

use crate::error::{Error, Result};

/// Scaling applied to the row maximum before exponentiation, so the
/// stabilizer stays strictly below the maximum itself.
const SOFTMAX_SCALE: f64 = 1.0 - 1e-300;

/// Norms below this are treated as zero during orthonormalization.
const NORM_EPS: f64 = 1e-12;

/// Matrix element: `f32` or `f64`.
pub trait Element:
    Copy
    + PartialOrd
    + Send
    + Sync
    + std::fmt::Debug
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + AddAssign
{
    /// Serialized width in bytes.
    const WIDTH: usize;
    const ZERO: Self;
    const ONE: Self;

    fn from_f64(v: f64) -> Self;
    fn to_f64(self) -> f64;
    fn exp(self) -> Self;
    fn sqrt(self) -> Self;
    fn abs(self) -> Self;
    fn is_finite(self) -> bool;

    /// Write exactly `WIDTH` little-endian bytes into `out`.
    fn write_le(self, out: &mut [u8]);
    /// Read exactly `WIDTH` little-endian bytes from `buf`.
    fn read_le(buf: &[u8]) -> Self;
}

impl Element for f32 {
    const WIDTH: usize = 4;
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;

    #[inline]
    fn from_f64(v: f64) -> Self {
        v as f32
    }
    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }
    #[inline]
    fn exp(self) -> Self {
        self.exp()
    }
    #[inline]
    fn sqrt(self) -> Self {
        self.sqrt()
    }
    #[inline]
    fn abs(self) -> Self {
        self.abs()
    }
    #[inline]
    fn is_finite(self) -> bool {
        self.is_finite()
    }
    #[inline]
    fn write_le(self, out: &mut [u8]) {
        out.copy_from_slice(&self.to_le_bytes());
    }
    #[inline]
    fn read_le(buf: &[u8]) -> Self {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(buf);
        f32::from_le_bytes(bytes)
    }
}

impl Element for f64 {
    const WIDTH: usize = 8;
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;

    #[inline]
    fn from_f64(v: f64) -> Self {
        v
    }
    #[inline]
    fn to_f64(self) -> f64 {
        self
    }
    #[inline]
    fn exp(self) -> Self {
        self.exp()
    }
    #[inline]
    fn sqrt(self) -> Self {
        self.sqrt()
    }
    #[inline]
    fn abs(self) -> Self {
        self.abs()
    }
    #[inline]
    fn is_finite(self) -> bool {
        self.is_finite()
    }
    #[inline]
    fn write_le(self, out: &mut [u8]) {
        out.copy_from_slice(&self.to_le_bytes());
    }
    #[inline]
    fn read_le(buf: &[u8]) -> Self {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(buf);
        f64::from_le_bytes(bytes)
    }
}

#[inline]
fn dot<T: Element>(a: &[T], b: &[T]) -> T {
    a.iter().zip(b).fold(T::ZERO, |acc, (&x, &y)| acc + x * y)
}

/// Dense row-major matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix<T: Element> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T: Element> Matrix<T> {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self { rows, cols, data: vec![T::ZERO; rows * cols] }
    }

    /// Wrap an existing row-major buffer.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<T>) -> Self {
        assert_eq!(
            data.len(),
            rows * cols,
            "buffer length {} does not match {}x{}",
            data.len(),
            rows,
            cols
        );
        Self { rows, cols, data }
    }

    /// Fill row-major from a generator over `(row, col)`.
    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            for j in 0..cols {
                data.push(f(i, j));
            }
        }
        Self { rows, cols, data }
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn row(&self, i: usize) -> &[T] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    #[inline]
    pub fn row_mut(&mut self, i: usize) -> &mut [T] {
        &mut self.data[i * self.cols..(i + 1) * self.cols]
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> T {
        assert!(
            i < self.rows && j < self.cols,
            "index out of bounds: ({}, {}) for {}x{} matrix",
            i,
            j,
            self.rows,
            self.cols
        );
        self.data[i * self.cols + j]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: T) {
        assert!(
            i < self.rows && j < self.cols,
            "index out of bounds: ({}, {}) for {}x{} matrix",
            i,
            j,
            self.rows,
            self.cols
        );
        self.data[i * self.cols + j] = value;
    }

    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Apply `f` to every element in place.
    pub fn apply(&mut self, f: impl Fn(T) -> T + Sync) {
        self.data.iter_mut().for_each(|v| *v = f(*v));
    }

    /// Element-wise conversion into another element width.
    pub fn cast<U: Element>(&self) -> Matrix<U> {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&v| U::from_f64(v.to_f64())).collect(),
        }
    }

    /// Row-wise numerically-stabilized softmax.
    ///
    /// The stabilizer is the matrix-wide maximum of `value / temperature`
    /// (floored at zero) scaled just below itself, subtracted before
    /// exponentiation. Output rows are strictly positive and sum to one.
    pub fn softmax_rows(&self, temperature: T) -> Matrix<T> {
        let mut max = T::ZERO;
        for &v in &self.data {
            let v = v / temperature;
            if v > max {
                max = v;
            }
        }
        let shift = max * T::from_f64(SOFTMAX_SCALE);

        let mut out = Self::zeros(self.rows, self.cols);
        for i in 0..self.rows {
            let src = self.row(i);
            let dst = out.row_mut(i);
            let mut sum = T::ZERO;
            for (d, &s) in dst.iter_mut().zip(src) {
                *d = (s / temperature - shift).exp();
                sum += *d;
            }
            for d in dst.iter_mut() {
                *d = *d / sum;
            }
        }
        out
    }

    /// Orthonormal row basis via modified Gram-Schmidt.
    ///
    /// Rows that collapse below the zero-norm threshold during
    /// orthogonalization come back as zero rows.
    pub fn gram_schmidt_rows(&self) -> Matrix<T> {
        let eps = T::from_f64(NORM_EPS);
        let mut out = self.clone();
        for i in 0..self.rows {
            for j in 0..i {
                let proj = dot(out.row(i), out.row(j));
                let (head, tail) = out.data.split_at_mut(i * self.cols);
                let basis = &head[j * self.cols..(j + 1) * self.cols];
                let row = &mut tail[..self.cols];
                for (r, &b) in row.iter_mut().zip(basis) {
                    *r = *r - proj * b;
                }
            }
            let norm = dot(out.row(i), out.row(i)).sqrt();
            let row = out.row_mut(i);
            if norm > eps {
                for r in row.iter_mut() {
                    *r = *r / norm;
                }
            } else {
                for r in row.iter_mut() {
                    *r = T::ZERO;
                }
            }
        }
        out
    }

    /// Divide each row by its L2 norm. All-zero rows stay zero.
    pub fn unit_normalize_rows(&self) -> Matrix<T> {
        let mut out = self.clone();
        for i in 0..out.rows {
            let norm = dot(out.row(i), out.row(i)).sqrt();
            if norm > T::ZERO {
                for v in out.row_mut(i).iter_mut() {
                    *v = *v / norm;
                }
            }
        }
        out
    }

    /// `C[i][j] = dot(self_row_i, other_row_j)`.
    ///
    /// Both operands must have the same column count.
    pub fn mul_transpose(&self, other: &Matrix<T>) -> Result<Matrix<T>> {
        if self.cols != other.cols {
            return Err(Error::ShapeMismatch {
                left_rows: self.rows,
                left_cols: self.cols,
                right_rows: other.rows,
                right_cols: other.cols,
            });
        }
        let mut out = Self::zeros(self.rows, other.rows);
        if self.rows == 0 || other.rows == 0 {
            return Ok(out);
        }
        out.data
            .par_chunks_mut(other.rows)
            .enumerate()
            .for_each(|(i, out_row)| {
                let a = self.row(i);
                for (j, o) in out_row.iter_mut().enumerate() {
                    *o = dot(a, other.row(j));
                }
            });
        Ok(out)
    }

    /// Mean cosine similarity over aligned rows.
    ///
    /// Rows where either side has zero norm are excluded from the mean;
    /// if every row is excluded the comparison is empty.
    pub fn cosine_similarity(&self, other: &Matrix<T>) -> Result<T> {
        if self.shape() != other.shape() {
            return Err(Error::ShapeMismatch {
                left_rows: self.rows,
                left_cols: self.cols,
                right_rows: other.rows,
                right_cols: other.cols,
            });
        }
        let mut sum = T::ZERO;
        let mut count = T::ZERO;
        for i in 0..self.rows {
            let a = self.row(i);
            let b = other.row(i);
            let ab = dot(a, b);
            let aa = dot(a, a);
            let bb = dot(b, b);
            if aa <= T::ZERO || bb <= T::ZERO {
                continue;
            }
            sum += ab / (aa.sqrt() * bb.sqrt());
            count += T::ONE;
        }
        if count <= T::ZERO {
            return Err(Error::EmptyComparison);
        }
        Ok(sum / count)
    }

    /// Serialize as `rows*cols` consecutive little-endian values, no header.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        let mut buf = [0u8; 8];
        for &v in &self.data {
            let bytes = &mut buf[..T::WIDTH];
            v.write_le(bytes);
            writer.write_all(bytes)?;
        }
        Ok(())
    }

    /// Read a matrix of known shape from the headerless format.
    pub fn read_from<R: Read>(mut reader: R, rows: usize, cols: usize) -> Result<Matrix<T>> {
        let mut buf = [0u8; 8];
        let mut data = Vec::with_capacity(rows * cols);
        for _ in 0..rows * cols {
            let bytes = &mut buf[..T::WIDTH];
            reader.read_exact(bytes)?;
            data.push(T::read_le(bytes));
        }
        Ok(Matrix { rows, cols, data })
    }
}
