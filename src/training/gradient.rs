//! Gradient engines.
//!
//! Every engine writes into a gradient network of the same shape as the
//! trained one. The gradient network is zeroed first; its weights and biases
//! receive the gradient, and its activation rows hold per-unit derivatives
//! while a sample is being propagated.
//!
//! The three analytic engines share one reverse pass and differ only in how
//! they seed the output row:
//!
//! | engine            | output seed                            |
//! |-------------------|----------------------------------------|
//! | `backprop`        | `2 (prediction - target)`              |
//! | `q_backprop`      | `2 (Q(s, a) - target)` at `a` only     |
//! | `policy_backprop` | `(P_j - [j == a]) * reward`, pre-softmax |
//!
//! Accumulated cells are divided by the sample count at the end.
//! [`finite_difference`] estimates the same quantities numerically and is
//! meant as a correctness oracle.

use crate::error::{NetError, Result};
use crate::matrix::Matrix;
use crate::nn::{Activation, Layer, Network};

use super::cost::{live_policy_cost, live_q_cost};
use super::step::{check_targets, sampled_steps, Step};

/// Where the output seed enters the last layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Seed {
    /// Derivative w.r.t. the activated output; the last activation's
    /// derivative is applied.
    PostActivation,
    /// Derivative w.r.t. the last layer's pre-activation sum.
    PreActivation,
}

/// Propagate the seed held in `grad`'s output row back through `net`,
/// accumulating into `grad`'s weights and biases.
///
/// `net` must hold the forward pass for the current sample and `grad`'s
/// activation rows must be zero apart from the output seed.
fn accumulate_sample(net: &Network, grad: &mut Network, seed: Seed) {
    let last = net.layer_count() - 1;
    for l in (0..net.layer_count()).rev() {
        let layer = &net.layers()[l];
        let prev = if l == 0 {
            net.input()
        } else {
            &net.layers()[l - 1].output
        };

        let (grad_prev, grad_layer) = grad.layer_with_input_mut(l);
        let Layer {
            weights: grad_weights,
            bias: grad_bias,
            output: delta,
            ..
        } = grad_layer;

        if let Some(activation) = layer.activation {
            if !(l == last && seed == Seed::PreActivation) {
                activation.backward_row(layer.output.as_slice(), delta.as_mut_slice());
            }
        }

        let delta = delta.as_slice();
        for (b, d) in grad_bias.as_mut_slice().iter_mut().zip(delta) {
            *b += d;
        }

        let out = layer.out_width();
        let weights = layer.weights.as_slice().chunks_exact(out);
        let grad_rows = grad_weights.as_mut_slice().chunks_exact_mut(out);
        let prev_cells = grad_prev.as_mut_slice().iter_mut();
        for (((w_row, g_row), &x), p) in weights.zip(grad_rows).zip(prev.as_slice()).zip(prev_cells) {
            for j in 0..out {
                g_row[j] += delta[j] * x;
                *p += delta[j] * w_row[j];
            }
        }
    }
}

/// Divide every accumulated gradient cell by the sample count.
fn average(grad: &mut Network, samples: usize) {
    let n = samples as f32;
    grad.parameters_mut().for_each(|g| *g /= n);
}

/// Start a sample: zero the derivative rows and hand back the output seed row.
fn reset_seed(grad: &mut Network) -> &mut [f32] {
    grad.clear_rows();
    grad.output_mut().as_mut_slice()
}

/// Supervised backpropagation of the mean squared error.
///
/// `inputs` and `targets` hold one row per sample. On error `grad` is left
/// untouched.
pub fn backprop(net: &mut Network, grad: &mut Network, inputs: &Matrix, targets: &Matrix) -> Result<()> {
    net.check_batch(inputs, targets)?;
    if inputs.rows() == 0 {
        return Err(NetError::EmptyBatch);
    }
    net.ensure_same_shape(grad)?;
    grad.clear();

    for i in 0..inputs.rows() {
        net.set_input(inputs.row(i))?;
        net.forward()?;

        let seed = reset_seed(grad);
        let prediction = net.output().as_slice();
        for ((s, p), t) in seed.iter_mut().zip(prediction).zip(targets.row(i).row_slice(0)) {
            *s = 2.0 * (p - t);
        }
        accumulate_sample(net, grad, Seed::PostActivation);
    }

    average(grad, inputs.rows());
    Ok(())
}

/// Q-learning backpropagation over a sampled mini-batch.
///
/// Only the unit of each step's recorded action is seeded. The forward pass
/// is recomputed per sample, so the gradient is that of
/// [`live_q_cost`](super::cost::live_q_cost).
pub fn q_backprop(
    net: &mut Network,
    grad: &mut Network,
    steps: &[Step],
    indices: &[usize],
    targets: &[f32],
) -> Result<()> {
    check_targets(indices, targets)?;
    if indices.is_empty() {
        return Err(NetError::EmptyBatch);
    }
    net.ensure_same_shape(grad)?;
    let batch = sampled_steps(net, steps, indices)?;
    grad.clear();

    for (step, &target) in batch.into_iter().zip(targets) {
        net.set_input(step.state_slice())?;
        net.forward()?;

        let q = net.output().as_slice()[step.action];
        reset_seed(grad)[step.action] = 2.0 * (q - target);
        accumulate_sample(net, grad, Seed::PostActivation);
    }

    average(grad, indices.len());
    Ok(())
}

/// REINFORCE gradient of the reward-weighted negative log-likelihood.
///
/// The seed is the derivative w.r.t. the output layer's pre-activation,
/// which is exact only for a softmax output. Any other output layer is
/// rejected with `InvalidArchitecture`.
pub fn policy_backprop(net: &mut Network, grad: &mut Network, steps: &[Step]) -> Result<()> {
    if steps.is_empty() {
        return Err(NetError::EmptyBatch);
    }
    match net.layers().last().and_then(|l| l.activation) {
        Some(Activation::Softmax) => {}
        other => {
            return Err(NetError::InvalidArchitecture(format!(
                "policy gradient needs a Softmax output, found {}",
                other.map_or("Linear", Activation::name)
            )))
        }
    }
    net.ensure_same_shape(grad)?;
    for step in steps {
        step.check_against(net)?;
    }
    grad.clear();

    for step in steps {
        net.set_input(step.state_slice())?;
        net.forward()?;

        let probs = net.output().as_slice();
        let seed = reset_seed(grad);
        for (j, (s, &p)) in seed.iter_mut().zip(probs).enumerate() {
            let taken = if j == step.action { 1.0 } else { 0.0 };
            *s = (p - taken) * step.reward;
        }
        accumulate_sample(net, grad, Seed::PreActivation);
    }

    average(grad, steps.len());
    Ok(())
}

/// Largest absolute difference between the parameters of two gradient
/// networks, e.g. an analytic gradient and its finite-difference estimate.
pub fn max_gradient_difference(a: &Network, b: &Network) -> Result<f32> {
    a.ensure_same_shape(b)?;
    Ok(a.parameters()
        .zip(b.parameters())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f32::max))
}

/// Which parameter matrix of a layer.
#[derive(Clone, Copy)]
enum Param {
    Weights,
    Bias,
}

fn param_cells(net: &mut Network, l: usize, which: Param) -> &mut [f32] {
    let layer = &mut net.layers_mut()[l];
    match which {
        Param::Weights => layer.weights.as_mut_slice(),
        Param::Bias => layer.bias.as_mut_slice(),
    }
}

/// Forward-difference estimate of `d objective / d parameter` for every
/// weight and bias of `net`.
///
/// Each parameter is nudged by `eps`, the objective re-evaluated and the
/// parameter restored, so `net` ends with the parameters it started with.
pub fn finite_difference<F>(net: &mut Network, grad: &mut Network, eps: f32, mut objective: F) -> Result<()>
where
    F: FnMut(&mut Network) -> Result<f32>,
{
    net.ensure_same_shape(grad)?;
    let base = objective(net)?;
    grad.clear();

    for l in 0..net.layer_count() {
        for which in [Param::Weights, Param::Bias] {
            for k in 0..param_cells(net, l, which).len() {
                let original = param_cells(net, l, which)[k];
                param_cells(net, l, which)[k] = original + eps;
                let perturbed = objective(net);
                param_cells(net, l, which)[k] = original;

                param_cells(grad, l, which)[k] = (perturbed? - base) / eps;
            }
        }
    }
    Ok(())
}

/// Finite-difference gradient of the supervised cost.
pub fn finite_difference_cost(
    net: &mut Network,
    grad: &mut Network,
    eps: f32,
    inputs: &Matrix,
    targets: &Matrix,
) -> Result<()> {
    finite_difference(net, grad, eps, |n| n.cost(inputs, targets))
}

/// Finite-difference gradient of the live Q cost.
pub fn finite_difference_q(
    net: &mut Network,
    grad: &mut Network,
    eps: f32,
    steps: &[Step],
    indices: &[usize],
    targets: &[f32],
) -> Result<()> {
    finite_difference(net, grad, eps, |n| live_q_cost(n, steps, indices, targets))
}

/// Finite-difference gradient of the live policy cost.
pub fn finite_difference_policy(net: &mut Network, grad: &mut Network, eps: f32, steps: &[Step]) -> Result<()> {
    finite_difference(net, grad, eps, |n| live_policy_cost(n, steps))
}
