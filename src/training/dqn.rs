//! Deep Q-learning driver.
//!
//! Owns the online network, a periodically synced target network and the
//! gradient network, and runs one replay update per `train_step` call.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::core::{NetRng, NetRngState, TrainingConfig};
use crate::error::Result;
use crate::nn::{Activation, Network, NetworkStore};

use super::cost::live_q_cost;
use super::gradient::{finite_difference_q, max_gradient_difference, q_backprop};
use super::optimizer::gradient_descent;
use super::step::StepBuffer;
use super::targets::bellman_targets;

/// Epsilon-greedy DQN trainer with a frozen target network.
#[derive(Clone, Debug)]
pub struct DqnTrainer {
    /// Network being trained and used for acting.
    online: Network,

    /// Frozen copy used for Bellman targets.
    target: Network,

    /// Gradient accumulator, same shape as `online`.
    gradient: Network,

    config: TrainingConfig,

    /// Current exploration probability.
    epsilon: f32,

    replay_rng: NetRng,
    explore_rng: NetRng,

    /// Completed updates, drives target syncing.
    updates: u64,
}

impl DqnTrainer {
    /// Build a trainer around a fresh Xavier-initialized network.
    pub fn new(widths: &[usize], activations: &[Activation], config: TrainingConfig) -> Result<Self> {
        let mut online = Network::new(widths, activations)?;
        let rng = NetRng::new(config.seed);
        online.xavier_init(&mut rng.for_context("init"));
        Ok(Self::from_network(online, config))
    }

    /// Build a trainer around an existing network.
    pub fn from_network(online: Network, config: TrainingConfig) -> Self {
        let rng = NetRng::new(config.seed);
        Self {
            target: online.clone(),
            gradient: online.gradient_network(),
            online,
            epsilon: config.epsilon_start,
            replay_rng: rng.for_context("replay"),
            explore_rng: rng.for_context("explore"),
            config,
            updates: 0,
        }
    }

    pub fn online(&self) -> &Network {
        &self.online
    }

    pub fn target(&self) -> &Network {
        &self.target
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    /// Empty replay buffer sized by `config.replay_capacity`.
    pub fn new_buffer(&self) -> StepBuffer {
        StepBuffer::new(self.config.replay_capacity)
    }

    /// Positions of the replay and exploration streams, for checkpointing
    /// alongside the saved network.
    pub fn rng_state(&self) -> DqnRngState {
        DqnRngState {
            replay: self.replay_rng.state(),
            explore: self.explore_rng.state(),
        }
    }

    /// Resume the replay and exploration streams from a checkpoint.
    pub fn restore_rng_state(&mut self, state: &DqnRngState) {
        self.replay_rng = NetRng::from_state(&state.replay);
        self.explore_rng = NetRng::from_state(&state.explore);
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Q-values of the online network for `state`.
    pub fn q_values(&mut self, state: &[f32]) -> Result<&[f32]> {
        self.online.predict(state)
    }

    /// Highest-valued action and its Q-value.
    pub fn greedy_action(&mut self, state: &[f32]) -> Result<(usize, f32)> {
        self.online.predict(state)?;
        let output = self.online.output();
        let action = output.argmax().unwrap_or(0);
        Ok((action, output.as_slice()[action]))
    }

    /// Epsilon-greedy action and the online Q-value of that action, ready
    /// to be recorded as the step's `output`.
    pub fn select_action(&mut self, state: &[f32]) -> Result<(usize, f32)> {
        let (greedy, _) = self.greedy_action(state)?;
        let action = if self.explore_rng.gen_bool(f64::from(self.epsilon)) {
            self.explore_rng.gen_range_usize(0..self.online.output_width())
        } else {
            greedy
        };
        Ok((action, self.online.output().as_slice()[action]))
    }

    /// Multiply epsilon by the configured decay, down to the floor.
    pub fn decay_epsilon(&mut self) {
        self.epsilon = (self.epsilon * self.config.epsilon_decay).max(self.config.epsilon_min);
    }

    /// One replay update.
    ///
    /// Returns `None` while the buffer holds fewer than `batch_size` steps
    /// or nothing can be sampled yet. Otherwise returns the live Q loss of
    /// the batch measured before the update.
    pub fn train_step(&mut self, buffer: &mut StepBuffer) -> Result<Option<f32>> {
        if buffer.len() < self.config.batch_size.max(1) {
            return Ok(None);
        }
        let indices = buffer.sample_indices(self.config.batch_size, &mut self.replay_rng);
        if indices.is_empty() {
            return Ok(None);
        }

        let steps = buffer.steps();
        let targets = bellman_targets(&mut self.target, steps, &indices, self.config.gamma)?;
        let loss = live_q_cost(&mut self.online, steps, &indices, &targets)?;
        q_backprop(&mut self.online, &mut self.gradient, steps, &indices, &targets)?;
        gradient_descent(&mut self.online, &self.gradient, self.config.learning_rate)?;
        self.updates += 1;

        if !loss.is_finite() {
            warn!("non-finite Q loss {} at update {}", loss, self.updates);
        }
        debug!(
            "dqn update {}: batch {} loss {:.6} epsilon {:.3}",
            self.updates,
            indices.len(),
            loss,
            self.epsilon
        );

        let interval = self.config.target_sync_interval;
        if interval > 0 && self.updates % interval == 0 {
            self.sync_target()?;
        }
        Ok(Some(loss))
    }

    /// Compare the Q gradient of one replay batch with its finite-difference
    /// estimate, using `config.finite_difference_epsilon`.
    ///
    /// The batch is drawn from a fork of the replay stream, so training
    /// draws are unaffected. Returns the largest absolute difference over
    /// all parameters, or `None` if nothing can be sampled yet. The online
    /// parameters are left as they were.
    pub fn gradient_check(&mut self, buffer: &mut StepBuffer) -> Result<Option<f32>> {
        let mut rng = self.replay_rng.fork();
        let indices = buffer.sample_indices(self.config.batch_size.max(1), &mut rng);
        if indices.is_empty() {
            return Ok(None);
        }

        let steps = buffer.steps();
        let targets = bellman_targets(&mut self.target, steps, &indices, self.config.gamma)?;
        let mut analytic = self.online.gradient_network();
        q_backprop(&mut self.online, &mut analytic, steps, &indices, &targets)?;
        let mut numeric = self.online.gradient_network();
        let eps = self.config.finite_difference_epsilon;
        finite_difference_q(&mut self.online, &mut numeric, eps, steps, &indices, &targets)?;

        let difference = max_gradient_difference(&analytic, &numeric)?;
        debug!("dqn gradient check: batch {} max difference {:.6}", indices.len(), difference);
        Ok(Some(difference))
    }

    /// Copy the online parameters into the target network.
    pub fn sync_target(&mut self) -> Result<()> {
        self.target.copy_parameters_from(&self.online)?;
        debug!("target network synced after {} updates", self.updates);
        Ok(())
    }

    /// Save the online network under `name`.
    pub fn save(&self, store: &NetworkStore, name: &str) -> Result<()> {
        store.save(name, &self.online)?;
        Ok(())
    }

    /// Load the online network from `name` and sync the target to it.
    pub fn load(&mut self, store: &NetworkStore, name: &str) -> Result<()> {
        store.load(name, &mut self.online)?;
        self.sync_target()
    }
}

/// Checkpointable positions of a [`DqnTrainer`]'s random streams.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DqnRngState {
    pub replay: NetRngState,
    pub explore: NetRngState,
}
