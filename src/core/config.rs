//! Training configuration.

use serde::{Deserialize, Serialize};

/// Hyperparameters shared by the trainers.
///
/// Use `Default` and the `with_*` builders; every field is public so a
/// config can also be loaded from JSON or any other serde format.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Discount factor for Bellman targets (default: 0.99).
    pub gamma: f32,

    /// Step size for gradient descent/ascent.
    pub learning_rate: f32,

    /// Initial exploration probability for epsilon-greedy acting.
    pub epsilon_start: f32,

    /// Floor for the exploration probability.
    pub epsilon_min: f32,

    /// Multiplicative decay applied by `decay_epsilon`.
    pub epsilon_decay: f32,

    /// Transitions sampled per Q-learning update.
    pub batch_size: usize,

    /// Updates between copies of the online network into the target network.
    /// 0 disables automatic syncing.
    pub target_sync_interval: u64,

    /// Maximum steps retained in the replay buffer.
    pub replay_capacity: usize,

    /// Perturbation used by finite-difference gradient estimates.
    pub finite_difference_epsilon: f32,

    /// Seed for initialization, replay sampling and exploration.
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            gamma: 0.99,
            learning_rate: 0.01,
            epsilon_start: 1.0,
            epsilon_min: 0.05,
            epsilon_decay: 0.995,
            batch_size: 32,
            target_sync_interval: 100,
            replay_capacity: 10_000,
            finite_difference_epsilon: 1e-3,
            seed: 42,
        }
    }
}

impl TrainingConfig {
    /// Create a config with default hyperparameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the discount factor.
    #[must_use]
    pub fn with_gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }

    /// Set the learning rate.
    #[must_use]
    pub fn with_learning_rate(mut self, rate: f32) -> Self {
        self.learning_rate = rate;
        self
    }

    /// Set the exploration schedule.
    #[must_use]
    pub fn with_epsilon(mut self, start: f32, min: f32, decay: f32) -> Self {
        self.epsilon_start = start;
        self.epsilon_min = min;
        self.epsilon_decay = decay;
        self
    }

    /// Set the replay batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the number of updates between target syncs.
    #[must_use]
    pub fn with_target_sync_interval(mut self, interval: u64) -> Self {
        self.target_sync_interval = interval;
        self
    }

    /// Set the replay buffer capacity.
    #[must_use]
    pub fn with_replay_capacity(mut self, capacity: usize) -> Self {
        self.replay_capacity = capacity;
        self
    }

    /// Set the perturbation used by finite-difference gradient checks.
    #[must_use]
    pub fn with_finite_difference_epsilon(mut self, eps: f32) -> Self {
        self.finite_difference_epsilon = eps;
        self
    }

    /// Set the RNG seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}
