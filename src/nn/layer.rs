//! A single dense connection: weights, bias, activation and output row.

use serde::{Deserialize, Serialize};

use crate::core::NetRng;
use crate::error::{NetError, Result};
use crate::matrix::{Matrix, MatrixView};

use super::activation::Activation;

/// One weight/bias connection between two activation rows.
///
/// Owning the output row here keeps weights, bias, activation and the
/// values they produce in lockstep.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// `in_width x out_width`
    pub weights: Matrix,
    /// `1 x out_width`
    pub bias: Matrix,
    /// `None` means identity-linear.
    pub activation: Option<Activation>,
    /// `1 x out_width`, written by the forward pass.
    pub output: Matrix,
}

impl Layer {
    /// Zero-initialized layer mapping `in_width` inputs to `out_width` outputs.
    #[must_use]
    pub fn new(in_width: usize, out_width: usize, activation: Option<Activation>) -> Self {
        Self {
            weights: Matrix::new(in_width, out_width),
            bias: Matrix::new(1, out_width),
            activation,
            output: Matrix::new(1, out_width),
        }
    }

    #[must_use]
    pub fn in_width(&self) -> usize {
        self.weights.rows()
    }

    #[must_use]
    pub fn out_width(&self) -> usize {
        self.weights.cols()
    }

    /// Number of trainable scalars.
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.weights.len() + self.bias.len()
    }

    /// `output = activation(input · weights + bias)`.
    pub fn forward<'a>(&mut self, input: impl Into<MatrixView<'a>>) -> Result<()> {
        self.output.dot(input, &self.weights)?;
        self.output.sum(&self.bias)?;
        if let Some(activation) = self.activation {
            activation.apply_row(self.output.as_mut_slice());
        }
        Ok(())
    }

    /// Same shapes for weights, bias and output.
    #[must_use]
    pub fn same_shape(&self, other: &Layer) -> bool {
        self.weights.same_shape(&other.weights)
            && self.bias.same_shape(&other.bias)
            && self.output.same_shape(&other.output)
    }

    pub(crate) fn ensure_same_shape(&self, other: &Layer) -> Result<()> {
        if !self.weights.same_shape(&other.weights) {
            return Err(NetError::shape(self.weights.shape(), other.weights.shape()));
        }
        if !self.bias.same_shape(&other.bias) {
            return Err(NetError::shape(self.bias.shape(), other.bias.shape()));
        }
        if !self.output.same_shape(&other.output) {
            return Err(NetError::shape(self.output.shape(), other.output.shape()));
        }
        Ok(())
    }

    /// Uniform fill of weights and bias.
    pub fn randomize(&mut self, rng: &mut NetRng, low: f32, high: f32) {
        self.weights.randomize(rng, low, high);
        self.bias.randomize(rng, low, high);
    }

    /// Xavier fill of weights and bias, each with its own fan.
    pub fn xavier_init(&mut self, rng: &mut NetRng) {
        self.weights.xavier(rng);
        self.bias.xavier(rng);
    }

    /// Zero parameters and output.
    pub fn clear(&mut self) {
        self.weights.clear();
        self.bias.clear();
        self.output.clear();
    }

    /// Visit every parameter cell mutably, weights first.
    pub(crate) fn parameters_mut(&mut self) -> impl Iterator<Item = &mut f32> {
        self.weights
            .as_mut_slice()
            .iter_mut()
            .chain(self.bias.as_mut_slice().iter_mut())
    }

    /// Every parameter cell, weights first.
    pub(crate) fn parameters(&self) -> impl Iterator<Item = &f32> {
        self.weights.as_slice().iter().chain(self.bias.as_slice())
    }
}
