//! Borrowed row/column views into a matrix buffer.
//!
//! A view carries its own shape and stride over a slice that starts at the
//! first element it covers. Element (i, j) lives at `data[i * stride + j]`.
//! Views borrow from their parent, so they can never outlive it and are never
//! released on their own.

use crate::error::{NetError, Result};

use super::Matrix;

/// Number of buffer elements a `rows x cols` view with `stride` spans.
pub(crate) fn span(rows: usize, cols: usize, stride: usize) -> usize {
    if rows == 0 || cols == 0 {
        0
    } else {
        (rows - 1) * stride + cols
    }
}

fn validate(len: usize, rows: usize, cols: usize, stride: usize) -> Result<()> {
    if stride < cols {
        return Err(NetError::shape((rows, cols), (rows, stride)));
    }
    let needed = span(rows, cols, stride);
    if len < needed {
        return Err(NetError::shape((needed, 1), (len, 1)));
    }
    Ok(())
}

/// Read-only strided view.
#[derive(Clone, Copy, Debug)]
pub struct MatrixView<'a> {
    rows: usize,
    cols: usize,
    stride: usize,
    data: &'a [f32],
}

impl<'a> MatrixView<'a> {
    /// Create a view over `data`.
    ///
    /// Fails with `ShapeMismatch` if `stride < cols` or the slice is too short.
    pub fn new(data: &'a [f32], rows: usize, cols: usize, stride: usize) -> Result<Self> {
        validate(data.len(), rows, cols, stride)?;
        Ok(Self { rows, cols, stride, data })
    }

    /// View a plain slice as a single row.
    #[must_use]
    pub fn from_row(row: &'a [f32]) -> Self {
        Self {
            rows: 1,
            cols: row.len(),
            stride: row.len(),
            data: row,
        }
    }

    pub(crate) fn new_unchecked(data: &'a [f32], rows: usize, cols: usize, stride: usize) -> Self {
        debug_assert!(validate(data.len(), rows, cols, stride).is_ok());
        Self { rows, cols, stride, data }
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[must_use]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// (rows, cols)
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Element at (i, j).
    ///
    /// # Panics
    ///
    /// Panics if (i, j) is outside the view.
    #[must_use]
    pub fn at(&self, i: usize, j: usize) -> f32 {
        assert!(i < self.rows && j < self.cols, "index ({}, {}) out of bounds", i, j);
        self.data[i * self.stride + j]
    }

    /// Element at (i, j), or `None` when out of bounds.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> Option<f32> {
        if i < self.rows && j < self.cols {
            Some(self.data[i * self.stride + j])
        } else {
            None
        }
    }

    /// Contiguous elements of row `i`.
    #[must_use]
    pub fn row_slice(&self, i: usize) -> &'a [f32] {
        let start = i * self.stride;
        &self.data[start..start + self.cols]
    }

    /// Iterate over rows as contiguous slices.
    ///
    /// Each slice has `cols` elements, so a column view yields 1-element rows.
    pub fn row_slices(&self) -> impl Iterator<Item = &'a [f32]> + 'a {
        let (rows, cols, stride, data) = (self.rows, self.cols, self.stride, self.data);
        (0..rows).map(move |i| &data[i * stride..i * stride + cols])
    }

    /// Copy into a fresh owning matrix.
    #[must_use]
    pub fn to_matrix(&self) -> Matrix {
        let mut data = Vec::with_capacity(self.rows * self.cols);
        for row in self.row_slices() {
            data.extend_from_slice(row);
        }
        Matrix::from_parts(self.rows, self.cols, data)
    }

    /// Element equality with another view of the same shape.
    #[must_use]
    pub fn elements_eq(&self, other: &MatrixView<'_>) -> bool {
        self.shape() == other.shape()
            && self.row_slices().zip(other.row_slices()).all(|(a, b)| a == b)
    }
}

impl<'a> From<&'a Matrix> for MatrixView<'a> {
    fn from(m: &'a Matrix) -> Self {
        m.view()
    }
}

impl<'a> From<&'a [f32]> for MatrixView<'a> {
    fn from(row: &'a [f32]) -> Self {
        MatrixView::from_row(row)
    }
}

/// Mutable strided view.
#[derive(Debug)]
pub struct MatrixViewMut<'a> {
    rows: usize,
    cols: usize,
    stride: usize,
    data: &'a mut [f32],
}

impl<'a> MatrixViewMut<'a> {
    /// Create a mutable view over `data`.
    pub fn new(data: &'a mut [f32], rows: usize, cols: usize, stride: usize) -> Result<Self> {
        validate(data.len(), rows, cols, stride)?;
        Ok(Self { rows, cols, stride, data })
    }

    pub(crate) fn new_unchecked(
        data: &'a mut [f32],
        rows: usize,
        cols: usize,
        stride: usize,
    ) -> Self {
        debug_assert!(validate(data.len(), rows, cols, stride).is_ok());
        Self { rows, cols, stride, data }
    }

    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Reborrow as a read-only view.
    #[must_use]
    pub fn as_view(&self) -> MatrixView<'_> {
        MatrixView::new_unchecked(&*self.data, self.rows, self.cols, self.stride)
    }

    /// Element at (i, j).
    ///
    /// # Panics
    ///
    /// Panics if (i, j) is outside the view.
    #[must_use]
    pub fn at(&self, i: usize, j: usize) -> f32 {
        self.as_view().at(i, j)
    }

    /// Set element (i, j).
    ///
    /// # Panics
    ///
    /// Panics if (i, j) is outside the view.
    pub fn set(&mut self, i: usize, j: usize, value: f32) {
        assert!(i < self.rows && j < self.cols, "index ({}, {}) out of bounds", i, j);
        self.data[i * self.stride + j] = value;
    }

    /// Apply `f` to every element covered by the view.
    pub fn apply(&mut self, f: impl Fn(f32) -> f32) {
        for i in 0..self.rows {
            let start = i * self.stride;
            for x in &mut self.data[start..start + self.cols] {
                *x = f(*x);
            }
        }
    }

    /// Set every covered element to `value`.
    pub fn fill(&mut self, value: f32) {
        self.apply(|_| value);
    }

    /// Shape-checked copy of `src` into the viewed elements.
    pub fn copy_from<'b>(&mut self, src: impl Into<MatrixView<'b>>) -> Result<()> {
        let src = src.into();
        if src.shape() != self.shape() {
            return Err(NetError::shape(self.shape(), src.shape()));
        }
        for (i, row) in src.row_slices().enumerate() {
            let start = i * self.stride;
            self.data[start..start + self.cols].copy_from_slice(row);
        }
        Ok(())
    }
}
