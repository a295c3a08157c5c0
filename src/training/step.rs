//! Recorded transitions and the replay buffer that holds them.
//!
//! Steps are appended in chronological order while an episode runs. Order
//! matters: the successor of a non-terminal `steps[i]` is `steps[i + 1]`.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::core::NetRng;
use crate::error::{NetError, Result};
use crate::matrix::Matrix;
use crate::nn::Network;

/// One transition observed by the agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// State row fed to the network (`1 x input_width`).
    pub state: Matrix,

    /// Index of the action taken.
    pub action: usize,

    /// Reward received for the action.
    pub reward: f32,

    /// Network output for the taken action at recording time
    /// (its Q-value, or its probability for a policy network).
    pub output: f32,

    /// No valid successor follows this step.
    pub terminal: bool,
}

impl Step {
    /// Create a new step from a raw state vector.
    pub fn new(state: Vec<f32>, action: usize, reward: f32, output: f32, terminal: bool) -> Self {
        Self {
            state: Matrix::from_row(state),
            action,
            reward,
            output,
            terminal,
        }
    }

    /// State values as a slice.
    #[must_use]
    pub fn state_slice(&self) -> &[f32] {
        self.state.as_slice()
    }

    /// Check this step can be fed through `net`.
    pub(crate) fn check_against(&self, net: &Network) -> Result<()> {
        if self.state.shape() != (1, net.input_width()) {
            return Err(NetError::shape((1, net.input_width()), self.state.shape()));
        }
        if self.action >= net.output_width() {
            return Err(NetError::ActionOutOfRange {
                action: self.action,
                outputs: net.output_width(),
            });
        }
        Ok(())
    }
}

/// Look up every sampled step, checking it against `net`.
pub(crate) fn sampled_steps<'a>(
    net: &Network,
    steps: &'a [Step],
    indices: &[usize],
) -> Result<Vec<&'a Step>> {
    indices
        .iter()
        .map(|&index| {
            let step = steps.get(index).ok_or(NetError::InvalidStepIndex {
                index,
                len: steps.len(),
            })?;
            step.check_against(net)?;
            Ok(step)
        })
        .collect()
}

/// One target per sampled index.
pub(crate) fn check_targets(indices: &[usize], targets: &[f32]) -> Result<()> {
    if indices.len() != targets.len() {
        return Err(NetError::shape((indices.len(), 1), (targets.len(), 1)));
    }
    Ok(())
}

/// Bounded buffer of recorded steps.
///
/// Uses a FIFO strategy: when full, the oldest step is dropped. A restored
/// snapshot must hold at least one slot and no more steps than its capacity.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "RawStepBuffer")]
pub struct StepBuffer {
    steps: VecDeque<Step>,
    capacity: usize,
}

/// Wire form of a [`StepBuffer`] before its bounds are checked.
#[derive(Deserialize)]
struct RawStepBuffer {
    steps: VecDeque<Step>,
    capacity: usize,
}

impl TryFrom<RawStepBuffer> for StepBuffer {
    type Error = NetError;

    fn try_from(raw: RawStepBuffer) -> Result<Self> {
        if raw.capacity == 0 || raw.steps.len() > raw.capacity {
            return Err(NetError::InvalidBuffer {
                len: raw.steps.len(),
                capacity: raw.capacity,
            });
        }
        Ok(Self {
            steps: raw.steps,
            capacity: raw.capacity,
        })
    }
}

impl StepBuffer {
    /// Create a new buffer holding at most `capacity` steps.
    pub fn new(capacity: usize) -> Self {
        Self {
            steps: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
        }
    }

    /// Add a step, evicting the oldest one if the buffer is full.
    pub fn push(&mut self, step: Step) {
        while self.steps.len() >= self.capacity {
            self.steps.pop_front();
        }
        self.steps.push_back(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every step.
    pub fn clear(&mut self) {
        self.steps.clear();
    }

    /// All steps in chronological order, as one contiguous slice.
    ///
    /// Takes `&mut self` because eviction can leave the ring buffer wrapped.
    pub fn steps(&mut self) -> &[Step] {
        self.steps.make_contiguous()
    }

    pub fn get(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    /// Most recent step, e.g. to mark it terminal once the episode ends.
    pub fn last_mut(&mut self) -> Option<&mut Step> {
        self.steps.back_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter()
    }

    /// True if `steps[index]` can produce a Bellman target: it is terminal
    /// or a successor has already been recorded.
    pub fn is_sampleable(&self, index: usize) -> bool {
        match self.steps.get(index) {
            Some(step) => step.terminal || index + 1 < self.steps.len(),
            None => false,
        }
    }

    /// Draw up to `batch_size` distinct sampleable indices.
    ///
    /// Partial Fisher-Yates over the candidate indices, so every subset of
    /// the requested size is equally likely.
    pub fn sample_indices(&self, batch_size: usize, rng: &mut NetRng) -> Vec<usize> {
        let mut candidates: Vec<usize> = (0..self.steps.len())
            .filter(|&i| self.is_sampleable(i))
            .collect();
        let take = batch_size.min(candidates.len());
        for i in 0..take {
            let j = rng.gen_range_usize(i..candidates.len());
            candidates.swap(i, j);
        }
        candidates.truncate(take);
        candidates
    }

    /// Snapshot the buffer with bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Restore a snapshot written by `to_bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

impl Default for StepBuffer {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl<'a> IntoIterator for &'a StepBuffer {
    type Item = &'a Step;
    type IntoIter = std::collections::vec_deque::Iter<'a, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}
