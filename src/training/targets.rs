//! Bellman targets for Q-learning.

use crate::error::{NetError, Result};
use crate::nn::Network;

use super::step::Step;

/// One Bellman target per sampled index.
///
/// A terminal step's target is its reward. Otherwise the target is
/// `reward + gamma * max_a Q_target(steps[i + 1].state, a)`, evaluated with
/// the frozen `target` network.
pub fn bellman_targets(target: &mut Network, steps: &[Step], indices: &[usize], gamma: f32) -> Result<Vec<f32>> {
    let mut targets = Vec::with_capacity(indices.len());
    for &index in indices {
        let step = steps.get(index).ok_or(NetError::InvalidStepIndex {
            index,
            len: steps.len(),
        })?;
        if step.terminal {
            targets.push(step.reward);
            continue;
        }

        let next = steps.get(index + 1).ok_or(NetError::InvalidStepIndex {
            index: index + 1,
            len: steps.len(),
        })?;
        target.predict(next.state_slice())?;
        let best = target.output().max().unwrap_or(0.0);
        targets.push(step.reward + gamma * best);
    }
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Linear 1 -> 2 network with Q(s) = [s, 2s].
    fn target_net() -> Network {
        let mut net = Network::new(&[1, 2], &[]).unwrap();
        net.layers_mut()[0].weights.as_mut_slice().copy_from_slice(&[1.0, 2.0]);
        net
    }

    #[test]
    fn test_terminal_uses_reward() {
        let steps = vec![Step::new(vec![3.0], 0, 5.0, 0.0, true)];
        let targets = bellman_targets(&mut target_net(), &steps, &[0], 0.99).unwrap();
        assert_eq!(targets, vec![5.0]);
    }

    #[test]
    fn test_non_terminal_bootstraps_from_successor() {
        let steps = vec![
            Step::new(vec![0.0], 0, 1.0, 0.0, false),
            Step::new(vec![1.0], 1, 0.0, 0.0, true),
        ];
        // max Q(next) = 2
        let targets = bellman_targets(&mut target_net(), &steps, &[0, 1], 0.99).unwrap();
        assert!((targets[0] - 2.98).abs() < 1e-6);
        assert_eq!(targets[1], 0.0);
    }

    #[test]
    fn test_missing_successor() {
        let steps = vec![Step::new(vec![0.0], 0, 1.0, 0.0, false)];
        assert!(matches!(
            bellman_targets(&mut target_net(), &steps, &[0], 0.99),
            Err(NetError::InvalidStepIndex { index: 1, len: 1 })
        ));
        assert!(matches!(
            bellman_targets(&mut target_net(), &steps, &[7], 0.99),
            Err(NetError::InvalidStepIndex { index: 7, len: 1 })
        ));
    }
}
