//! # rust-rlnet
//!
//! A small dense feed-forward network engine for game-playing agents trained
//! with supervised learning, Q-learning or policy gradients.
//!
//! ## Design Principles
//!
//! 1. **Layer Records**: Each layer owns its weights, bias, activation and
//!    output row. Nothing is indexed through parallel arrays.
//!
//! 2. **Borrowed Views**: Row and column slices are `MatrixView`s borrowing
//!    the parent matrix, so a view can never outlive its data.
//!
//! 3. **Explicit Failure**: Every fallible operation returns `Result` with a
//!    `NetError`; nothing silently no-ops or returns a sentinel.
//!
//! ## Architecture
//!
//! - **One Reverse Pass**: Supervised, Q-learning and policy-gradient
//!   backprop differ only in how they seed the output row.
//!
//! - **Gradient Networks**: Gradients accumulate into a second `Network` of
//!   identical shape, checked before every dual-network operation.
//!
//! - **Deterministic**: All randomness flows through a seeded `NetRng`.
//!
//! ## Modules
//!
//! - `core`: RNG and training configuration
//! - `matrix`: Dense matrices, views and row-delimited binary I/O
//! - `nn`: Activations, layers, networks and `.netw` persistence
//! - `training`: Steps, costs, gradient engines, Bellman targets, optimizer
//!   and trainers

pub mod core;
pub mod error;
pub mod matrix;
pub mod nn;
pub mod training;

// Re-export commonly used types
pub use crate::core::{NetRng, NetRngState, TrainingConfig};

pub use crate::error::{NetError, Result};

pub use crate::matrix::{Matrix, MatrixView, MatrixViewMut};

pub use crate::nn::{Activation, Architecture, Layer, Network, NetworkStore};

pub use crate::training::{DqnTrainer, PolicyTrainer, Step, StepBuffer};
