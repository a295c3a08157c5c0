//! Activation functions.
//!
//! Pointwise kinds are dispatched through a fixed table of
//! (evaluate, derivative) pairs. Derivatives take the function's *output*,
//! e.g. `sigmoid'(y) = y * (1 - y)`. Softmax is row-wise and has no table
//! entry; the forward and backward passes handle it explicitly.
//!
//! A layer without an activation is identity-linear.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Slope of the leaky ReLU for negative inputs.
pub const LEAKY_RELU_SLOPE: f32 = 0.01;

/// Activation kind attached to a layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Activation {
    Sigmoid,
    Relu,
    LeakyRelu,
    Tanh,
    /// Row-wise exponentiate-and-normalize.
    Softmax,
}

/// Table entry for a pointwise activation.
#[derive(Clone, Copy, Debug)]
pub struct Pointwise {
    pub evaluate: fn(f32) -> f32,
    /// Derivative as a function of the activation's output.
    pub derivative: fn(f32) -> f32,
}

const fn entry(evaluate: fn(f32) -> f32, derivative: fn(f32) -> f32) -> Option<Pointwise> {
    Some(Pointwise { evaluate, derivative })
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn sigmoid_derivative(y: f32) -> f32 {
    y * (1.0 - y)
}

fn relu(x: f32) -> f32 {
    if x > 0.0 {
        x
    } else {
        0.0
    }
}

fn relu_derivative(y: f32) -> f32 {
    if y > 0.0 {
        1.0
    } else {
        0.0
    }
}

fn leaky_relu(x: f32) -> f32 {
    if x > 0.0 {
        x
    } else {
        LEAKY_RELU_SLOPE * x
    }
}

fn leaky_relu_derivative(y: f32) -> f32 {
    if y > 0.0 {
        1.0
    } else {
        LEAKY_RELU_SLOPE
    }
}

fn tanh(x: f32) -> f32 {
    x.tanh()
}

fn tanh_derivative(y: f32) -> f32 {
    1.0 - y * y
}

/// Indexed by `Activation as usize`; softmax has no pointwise entry.
const POINTWISE: [Option<Pointwise>; 5] = [
    entry(sigmoid, sigmoid_derivative),
    entry(relu, relu_derivative),
    entry(leaky_relu, leaky_relu_derivative),
    entry(tanh, tanh_derivative),
    None,
];

impl Activation {
    /// Every activation kind.
    pub const ALL: [Activation; 5] = [
        Activation::Sigmoid,
        Activation::Relu,
        Activation::LeakyRelu,
        Activation::Tanh,
        Activation::Softmax,
    ];

    /// Table entry for this kind, `None` for softmax.
    #[must_use]
    pub fn pointwise(self) -> Option<Pointwise> {
        POINTWISE[self as usize]
    }

    /// Evaluate a pointwise activation; softmax needs the whole row.
    #[must_use]
    pub fn evaluate(self, x: f32) -> Option<f32> {
        self.pointwise().map(|p| (p.evaluate)(x))
    }

    /// Derivative expressed in terms of the activation's output.
    #[must_use]
    pub fn derivative(self, y: f32) -> Option<f32> {
        self.pointwise().map(|p| (p.derivative)(y))
    }

    /// Activate a row in place.
    pub fn apply_row(self, row: &mut [f32]) {
        match self.pointwise() {
            Some(p) => row.iter_mut().for_each(|x| *x = (p.evaluate)(*x)),
            None => softmax(row),
        }
    }

    /// Turn a derivative w.r.t. this layer's output row into one w.r.t. its
    /// pre-activation input, in place.
    pub fn backward_row(self, output: &[f32], seed: &mut [f32]) {
        debug_assert_eq!(output.len(), seed.len());
        match self.pointwise() {
            Some(p) => {
                for (g, &y) in seed.iter_mut().zip(output) {
                    *g *= (p.derivative)(y);
                }
            }
            None => {
                // Softmax Jacobian-vector product: y_j * (g_j - sum_k g_k y_k)
                let dot: f32 = seed.iter().zip(output).map(|(g, y)| g * y).sum();
                for (g, &y) in seed.iter_mut().zip(output) {
                    *g = y * (*g - dot);
                }
            }
        }
    }

    /// Human-readable name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Activation::Sigmoid => "Sigmoid",
            Activation::Relu => "ReLU",
            Activation::LeakyRelu => "LeakyReLU",
            Activation::Tanh => "Tanh",
            Activation::Softmax => "Softmax",
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Exponentiate-and-normalize a row in place.
///
/// The row maximum is subtracted first so large inputs don't overflow.
pub fn softmax(row: &mut [f32]) {
    let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return;
    }
    let mut sum = 0.0;
    for x in row.iter_mut() {
        *x = (*x - max).exp();
        sum += *x;
    }
    for x in row.iter_mut() {
        *x /= sum;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_order_matches_enum() {
        assert_eq!(Activation::Sigmoid.evaluate(0.0), Some(0.5));
        assert_eq!(Activation::Relu.evaluate(-3.0), Some(0.0));
        assert_eq!(Activation::LeakyRelu.evaluate(-2.0), Some(-0.02));
        assert_eq!(Activation::Tanh.evaluate(0.0), Some(0.0));
        assert!(Activation::Softmax.pointwise().is_none());
    }

    #[test]
    fn test_derivatives_use_output() {
        assert_eq!(Activation::Sigmoid.derivative(0.5), Some(0.25));
        assert_eq!(Activation::Relu.derivative(2.0), Some(1.0));
        assert_eq!(Activation::Relu.derivative(0.0), Some(0.0));
        assert_eq!(Activation::LeakyRelu.derivative(-0.02), Some(LEAKY_RELU_SLOPE));
        assert_eq!(Activation::Tanh.derivative(0.5), Some(0.75));
        assert_eq!(Activation::Softmax.derivative(0.5), None);
    }

    #[test]
    fn test_derivatives_match_numeric_slope() {
        let h = 1e-3;
        for act in [Activation::Sigmoid, Activation::Tanh] {
            for &x in &[-1.5f32, -0.2, 0.4, 2.0] {
                let y = act.evaluate(x).unwrap();
                let numeric = (act.evaluate(x + h).unwrap() - act.evaluate(x - h).unwrap()) / (2.0 * h);
                let analytic = act.derivative(y).unwrap();
                assert!((numeric - analytic).abs() < 1e-3, "{} at {}", act, x);
            }
        }
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let mut row = [1.0, 2.0, 3.0];
        softmax(&mut row);
        assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!(row[2] > row[1] && row[1] > row[0]);
    }

    #[test]
    fn test_softmax_large_inputs_stay_finite() {
        let mut row = [1000.0, 1000.0];
        softmax(&mut row);
        assert!((row[0] - 0.5).abs() < 1e-6);
        assert!((row[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_softmax_backward_matches_jacobian() {
        let mut output = [0.3, -0.1, 0.8];
        softmax(&mut output);
        let upstream = [1.0, -2.0, 0.5];

        let mut seed = upstream;
        Activation::Softmax.backward_row(&output, &mut seed);

        for j in 0..3 {
            let expected: f32 = (0..3)
                .map(|k| {
                    let jac = if j == k {
                        output[j] * (1.0 - output[j])
                    } else {
                        -output[j] * output[k]
                    };
                    upstream[k] * jac
                })
                .sum();
            assert!((seed[j] - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_names() {
        assert_eq!(Activation::Relu.to_string(), "ReLU");
        assert_eq!(Activation::ALL.len(), 5);
    }
}
