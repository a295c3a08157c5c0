//! Scalar objectives over recorded steps.
//!
//! The `live_*` variants rerun the forward pass and read the network as it
//! is now; the others trust the `output` recorded on each step.

use crate::error::{NetError, Result};
use crate::nn::Network;

use super::step::{check_targets, sampled_steps, Step};

/// Mean squared TD error between each sampled step's recorded output and
/// its target. An empty batch costs 0.
pub fn q_cost(steps: &[Step], indices: &[usize], targets: &[f32]) -> Result<f32> {
    check_targets(indices, targets)?;
    if indices.is_empty() {
        return Ok(0.0);
    }

    let mut total = 0.0;
    for (&index, &target) in indices.iter().zip(targets) {
        let step = steps.get(index).ok_or(NetError::InvalidStepIndex {
            index,
            len: steps.len(),
        })?;
        let err = step.output - target;
        total += err * err;
    }
    Ok(total / indices.len() as f32)
}

/// Mean squared TD error of the network's current Q-value for each sampled
/// step's action.
pub fn live_q_cost(net: &mut Network, steps: &[Step], indices: &[usize], targets: &[f32]) -> Result<f32> {
    check_targets(indices, targets)?;
    if indices.is_empty() {
        return Err(NetError::EmptyBatch);
    }
    let batch = sampled_steps(net, steps, indices)?;

    let mut total = 0.0;
    for (step, &target) in batch.into_iter().zip(targets) {
        let q = net.predict(step.state_slice())?[step.action];
        total += (q - target) * (q - target);
    }
    Ok(total / indices.len() as f32)
}

/// Reward-weighted negative log-likelihood of the recorded outputs:
/// `sum reward * -ln(output)` over steps with nonzero reward and positive
/// output.
pub fn policy_cost(steps: &[Step]) -> f32 {
    steps
        .iter()
        .filter(|s| s.reward != 0.0 && s.output > 0.0)
        .map(|s| s.reward * -s.output.ln())
        .sum()
}

/// Like [`policy_cost`] but with the network's current probability of each
/// recorded action, averaged over all steps.
pub fn live_policy_cost(net: &mut Network, steps: &[Step]) -> Result<f32> {
    if steps.is_empty() {
        return Err(NetError::EmptyBatch);
    }

    let mut total = 0.0;
    for step in steps {
        step.check_against(net)?;
        let p = net.predict(step.state_slice())?[step.action];
        if step.reward != 0.0 && p > 0.0 {
            total += step.reward * -p.ln();
        }
    }
    Ok(total / steps.len() as f32)
}
