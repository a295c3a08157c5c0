//! Core engine types: deterministic RNG and training configuration.

pub mod rng;
pub mod config;

pub use rng::{NetRng, NetRngState};
pub use config::TrainingConfig;
