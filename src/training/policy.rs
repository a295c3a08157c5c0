//! REINFORCE policy-gradient driver.

use log::{debug, warn};

use crate::core::{NetRng, NetRngState, TrainingConfig};
use crate::error::{NetError, Result};
use crate::nn::{Activation, Network, NetworkStore};

use super::cost::policy_cost;
use super::gradient::{finite_difference_policy, max_gradient_difference, policy_backprop};
use super::optimizer::gradient_descent;
use super::step::Step;

/// Trains a softmax policy network from whole episodes.
#[derive(Clone, Debug)]
pub struct PolicyTrainer {
    policy: Network,
    gradient: Network,
    config: TrainingConfig,
    rng: NetRng,
    episodes: u64,
}

impl PolicyTrainer {
    /// Build a trainer around a fresh Xavier-initialized network.
    ///
    /// The last activation must be softmax so outputs are action
    /// probabilities.
    pub fn new(widths: &[usize], activations: &[Activation], config: TrainingConfig) -> Result<Self> {
        let mut policy = Network::new(widths, activations)?;
        policy.xavier_init(&mut NetRng::new(config.seed).for_context("init"));
        Self::from_network(policy, config)
    }

    /// Build a trainer around an existing softmax-output network.
    pub fn from_network(policy: Network, config: TrainingConfig) -> Result<Self> {
        match policy.layers().last().and_then(|l| l.activation) {
            Some(Activation::Softmax) => {}
            other => {
                return Err(NetError::InvalidArchitecture(format!(
                    "policy output must be Softmax, found {}",
                    other.map_or("Linear", Activation::name)
                )))
            }
        }
        Ok(Self {
            gradient: policy.gradient_network(),
            policy,
            rng: NetRng::new(config.seed).for_context("sample"),
            config,
            episodes: 0,
        })
    }

    pub fn policy(&self) -> &Network {
        &self.policy
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Position of the action-sampling stream.
    pub fn rng_state(&self) -> NetRngState {
        self.rng.state()
    }

    /// Resume action sampling from a checkpoint.
    pub fn restore_rng_state(&mut self, state: &NetRngState) {
        self.rng = NetRng::from_state(state);
    }

    /// Episodes trained so far.
    pub fn episodes(&self) -> u64 {
        self.episodes
    }

    /// Action probabilities for `state`.
    pub fn probabilities(&mut self, state: &[f32]) -> Result<&[f32]> {
        self.policy.predict(state)
    }

    /// Sample an action from the policy; returns it with its probability,
    /// to be recorded as the step's `output`.
    pub fn sample_action(&mut self, state: &[f32]) -> Result<(usize, f32)> {
        let probs = self.policy.predict(state)?;
        let action = match self.rng.choose_weighted(probs) {
            Some(action) => action,
            None => {
                warn!("policy produced no positive probability, acting greedily");
                self.policy.argmax_output().unwrap_or(0)
            }
        };
        Ok((action, self.policy.output().as_slice()[action]))
    }

    /// Most probable action and its probability.
    pub fn greedy_action(&mut self, state: &[f32]) -> Result<(usize, f32)> {
        self.policy.predict(state)?;
        let action = self.policy.argmax_output().unwrap_or(0);
        Ok((action, self.policy.output().as_slice()[action]))
    }

    /// One REINFORCE update from a finished episode.
    ///
    /// Rewards on the steps act as the per-step return. Returns the recorded
    /// policy cost of the episode.
    pub fn train_episode(&mut self, steps: &[Step]) -> Result<f32> {
        policy_backprop(&mut self.policy, &mut self.gradient, steps)?;
        gradient_descent(&mut self.policy, &self.gradient, self.config.learning_rate)?;
        self.episodes += 1;

        let loss = policy_cost(steps);
        if !loss.is_finite() {
            warn!("non-finite policy loss {} at episode {}", loss, self.episodes);
        }
        debug!(
            "policy episode {}: {} steps loss {:.6}",
            self.episodes,
            steps.len(),
            loss
        );
        Ok(loss)
    }

    /// Largest absolute difference between the REINFORCE gradient of
    /// `steps` and its finite-difference estimate, using
    /// `config.finite_difference_epsilon`. The policy is left unchanged.
    pub fn gradient_check(&mut self, steps: &[Step]) -> Result<f32> {
        let mut analytic = self.policy.gradient_network();
        policy_backprop(&mut self.policy, &mut analytic, steps)?;
        let mut numeric = self.policy.gradient_network();
        let eps = self.config.finite_difference_epsilon;
        finite_difference_policy(&mut self.policy, &mut numeric, eps, steps)?;

        let difference = max_gradient_difference(&analytic, &numeric)?;
        debug!("policy gradient check: {} steps max difference {:.6}", steps.len(), difference);
        Ok(difference)
    }

    /// Save the policy network under `name`.
    pub fn save(&self, store: &NetworkStore, name: &str) -> Result<()> {
        store.save(name, &self.policy)?;
        Ok(())
    }

    /// Load the policy network from `name`.
    pub fn load(&mut self, store: &NetworkStore, name: &str) -> Result<()> {
        store.load(name, &mut self.policy)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trainer() -> PolicyTrainer {
        PolicyTrainer::new(
            &[2, 6, 3],
            &[Activation::Tanh, Activation::Softmax],
            TrainingConfig::default().with_learning_rate(0.5),
        )
        .unwrap()
    }

    #[test]
    fn test_requires_softmax_output() {
        let err = PolicyTrainer::new(&[2, 3], &[Activation::Sigmoid], TrainingConfig::default()).unwrap_err();
        assert!(matches!(err, NetError::InvalidArchitecture(_)));
        assert!(PolicyTrainer::new(&[2, 3], &[], TrainingConfig::default()).is_err());
    }

    #[test]
    fn test_sample_action_reports_probability() {
        let mut t = trainer();
        let probs = t.probabilities(&[0.2, 0.4]).unwrap().to_vec();
        for _ in 0..20 {
            let (action, p) = t.sample_action(&[0.2, 0.4]).unwrap();
            assert!(action < 3);
            assert_eq!(p, probs[action]);
        }
    }

    #[test]
    fn test_rewarded_action_becomes_more_likely() {
        let mut t = trainer();
        let state = [1.0, -1.0];
        let before = t.probabilities(&state).unwrap()[2];

        for _ in 0..20 {
            let p = t.probabilities(&state).unwrap()[2];
            let steps = vec![Step::new(state.to_vec(), 2, 1.0, p, true)];
            t.train_episode(&steps).unwrap();
        }

        let after = t.probabilities(&state).unwrap()[2];
        assert!(after > before, "{} -> {}", before, after);
        assert_eq!(t.episodes(), 20);
    }

    #[test]
    fn test_rng_state_replays_sampling() {
        let mut t = trainer();
        let snapshot = t.rng_state();
        let first: Vec<usize> = (0..30).map(|_| t.sample_action(&[0.3, 0.1]).unwrap().0).collect();

        t.restore_rng_state(&snapshot);
        let second: Vec<usize> = (0..30).map(|_| t.sample_action(&[0.3, 0.1]).unwrap().0).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_gradient_check_agrees() {
        let mut t = trainer();
        let steps = vec![
            Step::new(vec![0.5, -0.5], 0, 1.0, 0.0, false),
            Step::new(vec![-0.2, 0.8], 2, -0.5, 0.0, true),
        ];
        let before = t.policy().clone();
        let difference = t.gradient_check(&steps).unwrap();
        assert!(difference < 1e-2, "{}", difference);
        assert!(t.policy().parameters().eq(before.parameters()));
        assert!(matches!(t.gradient_check(&[]), Err(NetError::EmptyBatch)));
    }

    #[test]
    fn test_train_episode_rejects_empty() {
        let mut t = trainer();
        assert!(matches!(t.train_episode(&[]), Err(NetError::EmptyBatch)));
    }
}
