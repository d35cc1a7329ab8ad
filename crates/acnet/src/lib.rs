//! # acnet
//!
//! Actor-critic network core for asynchronous reinforcement learning.
//!
//! ## Overview
//!
//! acnet provides:
//! - `GameAcNetwork` - convolutional actor-critic network over 84x84x4 stacked frames
//! - `ActorCriticLoss` - policy-gradient + entropy + value-regression objective
//! - `SyncOp` - parameter copy from a global network into worker copies
//! - `Categorical` - action selection over the policy output
//!
//! Tensors and autodiff come from candle. The training loop, optimizer and
//! environment live with the caller.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use acnet::prelude::*;
//!
//! let device = Device::Cpu;
//! let global = GameAcNetwork::new(6, &device)?;
//! let mut local = GameAcNetwork::new(6, &device)?;
//! local.prepare_loss(0.01)?;
//!
//! let sync = local.sync_from(&global)?;
//! sync.run()?;
//!
//! let state = Tensor::zeros((84, 84, 4), DType::F32, &device)?;
//! let pi = local.run_policy(&state)?;
//! let v = local.run_value(&state)?;
//! ```

pub mod config;
pub mod dump;
pub mod loss;
pub mod network;
pub mod policy;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{DeviceConfig, NetworkConfig};
    pub use crate::loss::{ActorCriticLoss, LossBatch, LossTerms, Transition};
    pub use crate::network::{GameAcNetwork, SyncOp, PARAM_NAMES};
    pub use crate::policy::Categorical;
    pub use crate::{AcError, Result};

    pub use candle_core::{DType, Device, Tensor};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error types for the library
#[derive(Debug, thiserror::Error)]
pub enum AcError {
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Loss has not been prepared; call prepare_loss first")]
    LossNotPrepared,

    #[error("Loss was already prepared for this network")]
    LossAlreadyPrepared,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Config parse error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = core::result::Result<T, AcError>;
