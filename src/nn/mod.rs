//! Dense feed-forward networks.
//!
//! ## Overview
//!
//! - **Activation**: closed set of activation kinds with a fixed dispatch table
//! - **Layer**: weights, bias, activation and output row kept together
//! - **Network**: input row plus layers; forward pass, supervised cost,
//!   parameter copy/clear/randomization
//! - **Persistence**: `.netw` save/load with architecture validation
//!
//! ## Usage
//!
//! ```rust
//! use rust_rlnet::core::NetRng;
//! use rust_rlnet::nn::{Activation, Network};
//!
//! let mut net = Network::new(&[2, 3, 1], &[Activation::Tanh, Activation::Sigmoid]).unwrap();
//! net.xavier_init(&mut NetRng::new(7));
//!
//! let out = net.predict(&[0.0, 1.0]).unwrap();
//! assert_eq!(out.len(), 1);
//! ```

pub mod activation;
pub mod layer;
pub mod network;
pub mod persistence;

// Re-export main types
pub use activation::{softmax, Activation};
pub use layer::Layer;
pub use network::{Architecture, Network};
pub use persistence::{NetworkStore, FILE_EXTENSION, FILE_MAGIC};
