//! Feed-forward network: an input row followed by dense layers.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::core::NetRng;
use crate::error::{NetError, Result};
use crate::matrix::{Matrix, MatrixView};

use super::activation::Activation;
use super::layer::Layer;

/// Layer widths `width_0 ..= width_L`.
///
/// Most networks driving a game agent have a handful of layers, so the
/// widths live inline.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Architecture {
    widths: SmallVec<[usize; 8]>,
}

impl Architecture {
    /// Validate a width sequence: at least two entries, none zero.
    pub fn new(widths: &[usize]) -> Result<Self> {
        if widths.len() < 2 {
            return Err(NetError::InvalidArchitecture(format!(
                "need at least 2 widths, got {}",
                widths.len()
            )));
        }
        if let Some(pos) = widths.iter().position(|&w| w == 0) {
            return Err(NetError::InvalidArchitecture(format!(
                "width {} is zero",
                pos
            )));
        }
        Ok(Self {
            widths: SmallVec::from_slice(widths),
        })
    }

    #[must_use]
    pub fn widths(&self) -> &[usize] {
        &self.widths
    }

    /// Number of weight/bias layers (`L`).
    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.widths.len() - 1
    }

    #[must_use]
    pub fn input_width(&self) -> usize {
        self.widths[0]
    }

    #[must_use]
    pub fn output_width(&self) -> usize {
        self.widths[self.widths.len() - 1]
    }

    /// Trainable scalars across all layers.
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.widths.windows(2).map(|w| w[0] * w[1] + w[1]).sum()
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, w) in self.widths.iter().enumerate() {
            if i > 0 {
                write!(f, "-")?;
            }
            write!(f, "{}", w)?;
        }
        Ok(())
    }
}

/// Dense feed-forward network.
///
/// Holds `L + 1` activation rows: the input row and one output row per
/// layer. A gradient network is just another `Network` of the same shape
/// whose parameters hold gradients and whose rows hold per-unit derivatives.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Network {
    input: Matrix,
    layers: Vec<Layer>,
}

impl Network {
    /// Build a zero-initialized network.
    ///
    /// `activations` is either empty (every layer linear) or has exactly one
    /// entry per layer. Randomize with `xavier_init` before training.
    pub fn new(widths: &[usize], activations: &[Activation]) -> Result<Self> {
        let architecture = Architecture::new(widths)?;
        let kinds: Vec<Option<Activation>> = if activations.is_empty() {
            vec![None; architecture.layer_count()]
        } else {
            activations.iter().copied().map(Some).collect()
        };
        Self::with_activations(&architecture, &kinds)
    }

    /// Build a network with an optional activation per layer.
    pub fn with_activations(
        architecture: &Architecture,
        activations: &[Option<Activation>],
    ) -> Result<Self> {
        if activations.len() != architecture.layer_count() {
            return Err(NetError::InvalidArchitecture(format!(
                "{} layers but {} activations",
                architecture.layer_count(),
                activations.len()
            )));
        }
        let layers = architecture
            .widths()
            .windows(2)
            .zip(activations)
            .map(|(w, &act)| Layer::new(w[0], w[1], act))
            .collect();
        Ok(Self {
            input: Matrix::new(1, architecture.input_width()),
            layers,
        })
    }

    /// Zeroed network of identical shape, for gradient accumulation.
    #[must_use]
    pub fn gradient_network(&self) -> Network {
        let mut g = self.clone();
        g.clear();
        g
    }

    /// Number of weight/bias layers (`L`).
    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    #[must_use]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }

    /// Input row (`1 x width_0`).
    #[must_use]
    pub fn input(&self) -> &Matrix {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut Matrix {
        &mut self.input
    }

    /// Last activation row (`1 x width_L`).
    #[must_use]
    pub fn output(&self) -> &Matrix {
        self.layers.last().map_or(&self.input, |l| &l.output)
    }

    pub(crate) fn output_mut(&mut self) -> &mut Matrix {
        match self.layers.last_mut() {
            Some(layer) => &mut layer.output,
            None => &mut self.input,
        }
    }

    /// Layer `l` together with the activation row feeding it.
    pub(crate) fn layer_with_input_mut(&mut self, l: usize) -> (&mut Matrix, &mut Layer) {
        let (done, rest) = self.layers.split_at_mut(l);
        let input = match done.last_mut() {
            Some(prev) => &mut prev.output,
            None => &mut self.input,
        };
        (input, &mut rest[0])
    }

    /// Activation row `i`, where 0 is the input and `L` the output.
    #[must_use]
    pub fn row(&self, i: usize) -> Option<&Matrix> {
        match i {
            0 => Some(&self.input),
            _ => self.layers.get(i - 1).map(|l| &l.output),
        }
    }

    #[must_use]
    pub fn input_width(&self) -> usize {
        self.input.cols()
    }

    #[must_use]
    pub fn output_width(&self) -> usize {
        self.output().cols()
    }

    /// Widths of every activation row.
    #[must_use]
    pub fn architecture(&self) -> Architecture {
        let widths: SmallVec<[usize; 8]> = std::iter::once(self.input.cols())
            .chain(self.layers.iter().map(Layer::out_width))
            .collect();
        Architecture { widths }
    }

    /// Per-layer activations.
    #[must_use]
    pub fn activations(&self) -> Vec<Option<Activation>> {
        self.layers.iter().map(|l| l.activation).collect()
    }

    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(Layer::parameter_count).sum()
    }

    /// Copy a row into the input row.
    pub fn set_input<'a>(&mut self, row: impl Into<MatrixView<'a>>) -> Result<()> {
        self.input.copy_from(row)
    }

    /// Run every layer in order on the current input row.
    pub fn forward(&mut self) -> Result<()> {
        for i in 0..self.layers.len() {
            let (done, rest) = self.layers.split_at_mut(i);
            let prev = done.last().map_or(&self.input, |l| &l.output);
            rest[0].forward(prev)?;
        }
        Ok(())
    }

    /// Set the input, run forward and return the output row.
    pub fn predict(&mut self, input: &[f32]) -> Result<&[f32]> {
        self.set_input(input)?;
        self.forward()?;
        Ok(self.output().as_slice())
    }

    /// Index of the largest output unit.
    #[must_use]
    pub fn argmax_output(&self) -> Option<usize> {
        self.output().argmax()
    }

    /// Mean squared error over a batch.
    ///
    /// Squared errors are summed over output units and averaged over the
    /// rows of `inputs`. Both matrices need one row per sample and widths
    /// matching the network.
    pub fn cost(&mut self, inputs: &Matrix, targets: &Matrix) -> Result<f32> {
        self.check_batch(inputs, targets)?;
        if inputs.rows() == 0 {
            return Err(NetError::EmptyBatch);
        }

        let mut total = 0.0;
        for i in 0..inputs.rows() {
            self.set_input(inputs.row(i))?;
            self.forward()?;
            total += self
                .output()
                .as_slice()
                .iter()
                .zip(targets.row(i).row_slice(0))
                .map(|(p, t)| (p - t) * (p - t))
                .sum::<f32>();
        }
        Ok(total / inputs.rows() as f32)
    }

    pub(crate) fn check_batch(&self, inputs: &Matrix, targets: &Matrix) -> Result<()> {
        if inputs.cols() != self.input_width() {
            return Err(NetError::shape(
                (inputs.rows(), self.input_width()),
                inputs.shape(),
            ));
        }
        if targets.shape() != (inputs.rows(), self.output_width()) {
            return Err(NetError::shape(
                (inputs.rows(), self.output_width()),
                targets.shape(),
            ));
        }
        Ok(())
    }

    /// Same layer count and pairwise identical matrix shapes.
    #[must_use]
    pub fn same_shape(&self, other: &Network) -> bool {
        self.ensure_same_shape(other).is_ok()
    }

    /// Like `same_shape`, but reports the first mismatch.
    pub fn ensure_same_shape(&self, other: &Network) -> Result<()> {
        if self.layers.len() != other.layers.len() {
            return Err(NetError::InvalidArchitecture(format!(
                "{} layers vs {} layers",
                self.layers.len(),
                other.layers.len()
            )));
        }
        if !self.input.same_shape(&other.input) {
            return Err(NetError::shape(self.input.shape(), other.input.shape()));
        }
        self.layers
            .iter()
            .zip(&other.layers)
            .try_for_each(|(a, b)| a.ensure_same_shape(b))
    }

    /// Copy weights and biases from a shape-compatible network.
    ///
    /// Used to sync a frozen target network. Fails without modifying `self`.
    pub fn copy_parameters_from(&mut self, src: &Network) -> Result<()> {
        self.ensure_same_shape(src)?;
        for (dest, src) in self.layers.iter_mut().zip(&src.layers) {
            dest.weights.copy_from(&src.weights)?;
            dest.bias.copy_from(&src.bias)?;
        }
        Ok(())
    }

    /// Zero every parameter and activation row.
    pub fn clear(&mut self) {
        self.input.clear();
        self.layers.iter_mut().for_each(Layer::clear);
    }

    /// Zero only the activation rows.
    pub(crate) fn clear_rows(&mut self) {
        self.input.clear();
        for layer in &mut self.layers {
            layer.output.clear();
        }
    }

    /// Uniform fill of every weight and bias in `[low, high]`.
    pub fn randomize(&mut self, rng: &mut NetRng, low: f32, high: f32) {
        for layer in &mut self.layers {
            layer.randomize(rng, low, high);
        }
    }

    /// Xavier/Glorot fill of every weight and bias.
    pub fn xavier_init(&mut self, rng: &mut NetRng) {
        for layer in &mut self.layers {
            layer.xavier_init(rng);
        }
    }

    /// Every weight and bias cell, layer by layer.
    pub fn parameters(&self) -> impl Iterator<Item = &f32> {
        self.layers.iter().flat_map(Layer::parameters)
    }

    pub(crate) fn parameters_mut(&mut self) -> impl Iterator<Item = &mut f32> {
        self.layers.iter_mut().flat_map(Layer::parameters_mut)
    }

    /// True if any parameter is NaN or infinite.
    #[must_use]
    pub fn has_non_finite(&self) -> bool {
        self.parameters().any(|p| !p.is_finite())
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Network {} = [", self.architecture())?;
        for (i, layer) in self.layers.iter().enumerate() {
            writeln!(f, "  weights[{}] = {}", i, layer.weights)?;
            writeln!(f, "  biases[{}] = {}", i, layer.bias)?;
            match layer.activation {
                Some(act) => writeln!(f, "  activations[{}] = {}", i, act)?,
                None => writeln!(f, "  activations[{}] = Linear", i)?,
            }
        }
        write!(f, "]")
    }
}
