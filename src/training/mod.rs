//! Training infrastructure: recorded steps, gradients and trainers.
//!
//! ## Overview
//!
//! - **Step / StepBuffer**: transitions recorded by the environment
//! - **Costs**: supervised, Q-learning and policy objectives
//! - **Gradients**: finite differences plus three backprop variants on one
//!   reverse pass
//! - **Targets**: Bellman targets from a frozen network
//! - **Optimizer**: gradient descent/ascent
//! - **DqnTrainer / PolicyTrainer**: drivers wiring the pieces together
//!
//! ## Usage
//!
//! ```rust
//! use rust_rlnet::core::TrainingConfig;
//! use rust_rlnet::nn::Activation;
//! use rust_rlnet::training::{DqnTrainer, Step};
//!
//! let config = TrainingConfig::default().with_batch_size(2).with_replay_capacity(100);
//! let mut trainer = DqnTrainer::new(&[2, 8, 2], &[Activation::Relu, Activation::LeakyRelu], config).unwrap();
//! let mut buffer = trainer.new_buffer();
//!
//! // The environment plays...
//! let (action, q) = trainer.select_action(&[0.0, 1.0]).unwrap();
//! buffer.push(Step::new(vec![0.0, 1.0], action, 1.0, q, false));
//! let (action, q) = trainer.select_action(&[1.0, 0.0]).unwrap();
//! buffer.push(Step::new(vec![1.0, 0.0], action, 0.0, q, true));
//!
//! // ...and the agent learns from replay.
//! let loss = trainer.train_step(&mut buffer).unwrap();
//! assert!(loss.is_some());
//! ```

pub mod cost;
pub mod dqn;
pub mod gradient;
pub mod optimizer;
pub mod policy;
pub mod step;
pub mod targets;

// Re-export main types
pub use cost::{live_policy_cost, live_q_cost, policy_cost, q_cost};
pub use dqn::{DqnRngState, DqnTrainer};
pub use gradient::{
    backprop, finite_difference, finite_difference_cost, finite_difference_policy,
    finite_difference_q, max_gradient_difference, policy_backprop, q_backprop,
};
pub use optimizer::{gradient_ascent, gradient_descent};
pub use policy::PolicyTrainer;
pub use step::{Step, StepBuffer};
pub use targets::bellman_targets;
