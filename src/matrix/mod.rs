//! Dense row-major `f32` matrices.
//!
//! ## Overview
//!
//! - **Matrix**: owning, contiguous (`stride == cols`)
//! - **MatrixView / MatrixViewMut**: zero-copy row or column slices that
//!   borrow a parent's buffer with their own stride
//! - **Row I/O**: rows of little-endian `f32` followed by a delimiter byte
//!
//! Network rows are `1 x width` matrices; weights are `in x out`.

mod io;
mod view;

pub use io::ROW_DELIMITER;
pub use view::{MatrixView, MatrixViewMut};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::NetRng;
use crate::error::{NetError, Result};

/// Owning dense matrix.
///
/// Element (i, j) lives at `data[i * cols + j]`. Equality compares shape and
/// every element. Deserialization rejects data whose length is not
/// `rows * cols`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMatrix")]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

/// Wire form of a [`Matrix`] before its length is checked.
#[derive(Deserialize)]
struct RawMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl TryFrom<RawMatrix> for Matrix {
    type Error = NetError;

    fn try_from(raw: RawMatrix) -> Result<Self> {
        Self::from_vec(raw.rows, raw.cols, raw.data)
    }
}

impl Matrix {
    /// Allocate a zeroed `rows x cols` matrix.
    #[must_use]
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Build a matrix from row-major data.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(NetError::shape((rows, cols), (1, data.len())));
        }
        Ok(Self { rows, cols, data })
    }

    /// Build a `1 x n` row matrix.
    #[must_use]
    pub fn from_row(row: Vec<f32>) -> Self {
        Self {
            rows: 1,
            cols: row.len(),
            data: row,
        }
    }

    pub(crate) fn from_parts(rows: usize, cols: usize, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), rows * cols);
        Self { rows, cols, data }
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Always equal to `cols` for an owning matrix.
    #[must_use]
    pub fn stride(&self) -> usize {
        self.cols
    }

    /// (rows, cols)
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Row-major element buffer.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Element at (i, j), or `None` when out of bounds.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> Option<f32> {
        self.view().get(i, j)
    }

    /// Element at (i, j).
    ///
    /// # Panics
    ///
    /// Panics if (i, j) is out of bounds.
    #[must_use]
    pub fn at(&self, i: usize, j: usize) -> f32 {
        self.view().at(i, j)
    }

    /// Mutable reference to element (i, j).
    ///
    /// # Panics
    ///
    /// Panics if (i, j) is out of bounds.
    pub fn at_mut(&mut self, i: usize, j: usize) -> &mut f32 {
        assert!(i < self.rows && j < self.cols, "index ({}, {}) out of bounds", i, j);
        &mut self.data[i * self.cols + j]
    }

    /// View of the whole matrix.
    #[must_use]
    pub fn view(&self) -> MatrixView<'_> {
        MatrixView::new_unchecked(&self.data, self.rows, self.cols, self.cols)
    }

    /// Mutable view of the whole matrix.
    pub fn view_mut(&mut self) -> MatrixViewMut<'_> {
        let (rows, cols) = self.shape();
        MatrixViewMut::new_unchecked(&mut self.data, rows, cols, cols)
    }

    /// `1 x cols` view of row `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= rows`.
    #[must_use]
    pub fn row(&self, i: usize) -> MatrixView<'_> {
        assert!(i < self.rows, "row {} out of bounds", i);
        let start = i * self.cols;
        MatrixView::new_unchecked(&self.data[start..start + self.cols], 1, self.cols, self.cols)
    }

    /// `rows x 1` view of column `j`, striding over the parent rows.
    ///
    /// # Panics
    ///
    /// Panics if `j >= cols`.
    #[must_use]
    pub fn col(&self, j: usize) -> MatrixView<'_> {
        assert!(j < self.cols, "column {} out of bounds", j);
        MatrixView::new_unchecked(&self.data[j..], self.rows, 1, self.cols)
    }

    /// Mutable view of row `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= rows`.
    pub fn row_mut(&mut self, i: usize) -> MatrixViewMut<'_> {
        assert!(i < self.rows, "row {} out of bounds", i);
        let cols = self.cols;
        let start = i * cols;
        MatrixViewMut::new_unchecked(&mut self.data[start..start + cols], 1, cols, cols)
    }

    /// Mutable view of column `j`.
    ///
    /// # Panics
    ///
    /// Panics if `j >= cols`.
    pub fn col_mut(&mut self, j: usize) -> MatrixViewMut<'_> {
        assert!(j < self.cols, "column {} out of bounds", j);
        let (rows, cols) = self.shape();
        MatrixViewMut::new_unchecked(&mut self.data[j..], rows, 1, cols)
    }

    /// `self = a · b`.
    ///
    /// Fails without touching `self` unless `a.cols == b.rows` and `self` is
    /// `a.rows x b.cols`.
    pub fn dot<'a, 'b>(
        &mut self,
        a: impl Into<MatrixView<'a>>,
        b: impl Into<MatrixView<'b>>,
    ) -> Result<()> {
        let (a, b) = (a.into(), b.into());
        if a.cols() != b.rows() {
            return Err(NetError::shape((a.cols(), b.cols()), b.shape()));
        }
        if self.shape() != (a.rows(), b.cols()) {
            return Err(NetError::shape((a.rows(), b.cols()), self.shape()));
        }

        self.clear();
        let cols = self.cols;
        for i in 0..a.rows() {
            let out = &mut self.data[i * cols..(i + 1) * cols];
            for (k, &lhs) in a.row_slice(i).iter().enumerate() {
                for (o, &rhs) in out.iter_mut().zip(b.row_slice(k)) {
                    *o += lhs * rhs;
                }
            }
        }
        Ok(())
    }

    /// Elementwise `self += src`.
    pub fn sum<'a>(&mut self, src: impl Into<MatrixView<'a>>) -> Result<()> {
        let src = src.into();
        if src.shape() != self.shape() {
            return Err(NetError::shape(self.shape(), src.shape()));
        }
        let cols = self.cols;
        for (i, row) in src.row_slices().enumerate() {
            for (d, s) in self.data[i * cols..(i + 1) * cols].iter_mut().zip(row) {
                *d += s;
            }
        }
        Ok(())
    }

    /// Apply a pointwise function in place.
    pub fn apply(&mut self, f: impl Fn(f32) -> f32) {
        for x in &mut self.data {
            *x = f(*x);
        }
    }

    /// Multiply every element by `factor`.
    pub fn scale(&mut self, factor: f32) {
        self.apply(|x| x * factor);
    }

    /// Fill with uniform values in `[low, high]`.
    pub fn randomize(&mut self, rng: &mut NetRng, low: f32, high: f32) {
        for x in &mut self.data {
            *x = rng.gen_f32(low, high);
        }
    }

    /// Xavier/Glorot limit `sqrt(6 / (rows + cols))`.
    #[must_use]
    pub fn xavier_limit(&self) -> f32 {
        let fan = (self.rows + self.cols) as f32;
        if fan == 0.0 {
            0.0
        } else {
            (6.0 / fan).sqrt()
        }
    }

    /// Xavier/Glorot uniform fill in `[-limit, limit]`.
    pub fn xavier(&mut self, rng: &mut NetRng) {
        let limit = self.xavier_limit();
        self.randomize(rng, -limit, limit);
    }

    /// Shape-checked full copy.
    pub fn copy_from<'a>(&mut self, src: impl Into<MatrixView<'a>>) -> Result<()> {
        self.view_mut().copy_from(src)
    }

    /// Zero every element.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    /// Uniformly permute the rows in place (Fisher-Yates).
    pub fn shuffle_rows(&mut self, rng: &mut NetRng) {
        let cols = self.cols;
        for i in 0..self.rows {
            let j = rng.gen_range_usize(i..self.rows);
            if i == j {
                continue;
            }
            let (head, tail) = self.data.split_at_mut(j * cols);
            head[i * cols..(i + 1) * cols].swap_with_slice(&mut tail[..cols]);
        }
    }

    /// True if both matrices have the same (rows, cols).
    #[must_use]
    pub fn same_shape(&self, other: &Matrix) -> bool {
        self.shape() == other.shape()
    }

    /// Index of the largest element, first wins on ties.
    #[must_use]
    pub fn argmax(&self) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (i, &x) in self.data.iter().enumerate() {
            match best {
                Some((_, b)) if x <= b => {}
                _ => best = Some((i, x)),
            }
        }
        best.map(|(i, _)| i)
    }

    /// Largest element, `None` when empty.
    #[must_use]
    pub fn max(&self) -> Option<f32> {
        self.argmax().map(|i| self.data[i])
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[")?;
        for row in self.view().row_slices() {
            write!(f, "    ")?;
            for x in row {
                write!(f, "{:.6}  ", x)?;
            }
            writeln!(f)?;
        }
        write!(f, "]")
    }
}
