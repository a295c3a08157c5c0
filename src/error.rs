//! Error taxonomy for matrix, network and training operations.

use std::path::PathBuf;

/// Errors that can occur in the network engine.
///
/// Every failure aborts the single call that produced it. Operations that
/// document it leave their destination untouched on error.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("shape mismatch: expected {expected:?}, found {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("invalid architecture: {0}")]
    InvalidArchitecture(String),

    #[error("network file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("corrupt network file {path}: {reason}")]
    CorruptFile { path: PathBuf, reason: String },

    #[error("refusing to overwrite existing file: {0}")]
    FileAlreadyExists(PathBuf),

    #[error("action {action} out of range for {outputs} outputs")]
    ActionOutOfRange { action: usize, outputs: usize },

    #[error("step index {index} invalid for buffer of {len} steps")]
    InvalidStepIndex { index: usize, len: usize },

    #[error("invalid replay buffer: {len} steps with capacity {capacity}")]
    InvalidBuffer { len: usize, capacity: usize },

    #[error("empty batch")]
    EmptyBatch,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

impl NetError {
    /// Shorthand for a shape mismatch between two (rows, cols) pairs.
    pub(crate) fn shape(expected: (usize, usize), actual: (usize, usize)) -> Self {
        Self::ShapeMismatch { expected, actual }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, NetError>;
