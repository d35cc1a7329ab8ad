//! Actor-critic network.
//!
//! Two convolution stages over 84x84x4 stacked frames feed a shared
//! 256-unit dense layer, which branches into a softmax policy head and a
//! linear value head.

mod init;
mod sync;

pub use sync::SyncOp;

use crate::config::NetworkConfig;
use crate::loss::{ActorCriticLoss, LossBatch, LossTerms};
use crate::policy::Categorical;
use crate::{AcError, Result};
use candle_core::{Device, Tensor, Var, D};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Height of a preprocessed frame
pub const INPUT_HEIGHT: usize = 84;
/// Width of a preprocessed frame
pub const INPUT_WIDTH: usize = 84;
/// Number of stacked frames per state
pub const INPUT_FRAMES: usize = 4;

/// Units in the shared hidden layer
pub const HIDDEN_SIZE: usize = 256;
/// Flattened size of the second convolution output (32 x 9 x 9)
pub const CONV_FLAT_SIZE: usize = 2592;

/// Number of trainable parameter tensors
pub const PARAM_COUNT: usize = 10;

/// Parameter names, in the order returned by [`GameAcNetwork::vars`]
pub const PARAM_NAMES: [&str; PARAM_COUNT] = [
    "W_conv1", "b_conv1", "W_conv2", "b_conv2", "W_fc1", "b_fc1", "W_fc2", "b_fc2", "W_fc3",
    "b_fc3",
];

const CONV1_STRIDE: usize = 4;
const CONV2_STRIDE: usize = 2;

/// Convolutional actor-critic network
///
/// Owns ten trainable variables. They are created once here and change only
/// through gradient updates applied by the caller or through a [`SyncOp`].
pub struct GameAcNetwork {
    action_size: usize,
    device: Device,

    w_conv1: Var,
    b_conv1: Var,
    w_conv2: Var,
    b_conv2: Var,
    w_fc1: Var,
    b_fc1: Var,
    // policy head
    w_fc2: Var,
    b_fc2: Var,
    // value head
    w_fc3: Var,
    b_fc3: Var,

    loss: Option<ActorCriticLoss>,
    actor_loss_scale: f64,
}

impl GameAcNetwork {
    /// Create a network with default initialization on `device`
    pub fn new(action_size: usize, device: &Device) -> Result<Self> {
        let config = NetworkConfig::new(action_size);
        config.validate()?;
        Self::build(&config, device.clone())
    }

    /// Create a network from a config
    pub fn from_config(config: &NetworkConfig) -> Result<Self> {
        config.validate()?;
        let device = config.device.device()?;
        Self::build(config, device)
    }

    fn build(config: &NetworkConfig, device: Device) -> Result<Self> {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let std = config.init_stddev;
        let a = config.action_size;

        let net = Self {
            action_size: a,
            w_conv1: init::weight_variable(&[16, INPUT_FRAMES, 8, 8], std, &mut rng, &device)?,
            b_conv1: init::bias_variable(&[16], &device)?,
            w_conv2: init::weight_variable(&[32, 16, 4, 4], std, &mut rng, &device)?,
            b_conv2: init::bias_variable(&[32], &device)?,
            w_fc1: init::weight_variable(&[CONV_FLAT_SIZE, HIDDEN_SIZE], std, &mut rng, &device)?,
            b_fc1: init::bias_variable(&[HIDDEN_SIZE], &device)?,
            w_fc2: init::weight_variable(&[HIDDEN_SIZE, a], std, &mut rng, &device)?,
            b_fc2: init::bias_variable(&[a], &device)?,
            w_fc3: init::weight_variable(&[HIDDEN_SIZE, 1], std, &mut rng, &device)?,
            b_fc3: init::bias_variable(&[1], &device)?,
            device,
            loss: None,
            actor_loss_scale: config.actor_loss_scale,
        };

        tracing::debug!(
            action_size = a,
            params = net.num_parameters(),
            "Created actor-critic network"
        );
        Ok(net)
    }

    /// Size of the discrete action space
    pub fn action_size(&self) -> usize {
        self.action_size
    }

    /// Device holding the parameters
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// The ten trainable variables in fixed order (see [`PARAM_NAMES`])
    pub fn vars(&self) -> [&Var; PARAM_COUNT] {
        [
            &self.w_conv1,
            &self.b_conv1,
            &self.w_conv2,
            &self.b_conv2,
            &self.w_fc1,
            &self.b_fc1,
            &self.w_fc2,
            &self.b_fc2,
            &self.w_fc3,
            &self.b_fc3,
        ]
    }

    /// Variables paired with their names
    pub fn named_vars(&self) -> [(&'static str, &Var); PARAM_COUNT] {
        let vars = self.vars();
        std::array::from_fn(|i| (PARAM_NAMES[i], vars[i]))
    }

    /// Owned handles to the variables, for handing to an optimizer.
    /// The handles share storage with the network.
    pub fn trainable_vars(&self) -> Vec<Var> {
        self.vars().into_iter().cloned().collect()
    }

    /// Total number of scalar parameters
    pub fn num_parameters(&self) -> usize {
        self.vars().iter().map(|v| v.elem_count()).sum()
    }

    /// Forward pass.
    ///
    /// Accepts a single state `[84, 84, 4]` or a batch `[N, 84, 84, 4]`.
    /// Returns the policy `[N, action_size]` and the value estimate `[N]`.
    pub fn forward(&self, states: &Tensor) -> Result<(Tensor, Tensor)> {
        let s = self.batched(states)?;

        // NHWC -> NCHW for candle's conv2d
        let x = s.permute((0, 3, 1, 2))?.contiguous()?;
        let h_conv1 = conv_relu(&x, &self.w_conv1, &self.b_conv1, CONV1_STRIDE)?;
        let h_conv2 = conv_relu(&h_conv1, &self.w_conv2, &self.b_conv2, CONV2_STRIDE)?;

        let h_conv2_flat = h_conv2.flatten_from(1)?;
        let h_fc1 = h_conv2_flat
            .matmul(&self.w_fc1)?
            .broadcast_add(&self.b_fc1)?
            .relu()?;

        let logits = h_fc1.matmul(&self.w_fc2)?.broadcast_add(&self.b_fc2)?;
        let pi = candle_nn::ops::softmax(&logits, D::Minus1)?;
        let v = h_fc1
            .matmul(&self.w_fc3)?
            .broadcast_add(&self.b_fc3)?
            .squeeze(1)?;

        Ok((pi, v))
    }

    /// Policy probabilities for a single state
    pub fn run_policy(&self, state: &Tensor) -> Result<Vec<f32>> {
        self.check_single(state)?;
        let (pi, _) = self.forward(state)?;
        Ok(pi.get(0)?.to_vec1::<f32>()?)
    }

    /// Value estimate for a single state
    pub fn run_value(&self, state: &Tensor) -> Result<f32> {
        self.check_single(state)?;
        let (_, v) = self.forward(state)?;
        Ok(v.get(0)?.to_scalar::<f32>()?)
    }

    /// Policy for a single state as a sampleable distribution
    pub fn policy(&self, state: &Tensor) -> Result<Categorical> {
        Categorical::new(self.run_policy(state)?)
    }

    /// Attach the actor-critic loss. Allowed once per network.
    pub fn prepare_loss(&mut self, entropy_beta: f64) -> Result<()> {
        if self.loss.is_some() {
            return Err(AcError::LossAlreadyPrepared);
        }
        self.loss = Some(
            ActorCriticLoss::new(self.action_size, entropy_beta)
                .with_actor_scale(self.actor_loss_scale),
        );
        tracing::debug!(entropy_beta, "Prepared actor-critic loss");
        Ok(())
    }

    /// The attached loss, if `prepare_loss` has been called
    pub fn loss_context(&self) -> Option<&ActorCriticLoss> {
        self.loss.as_ref()
    }

    /// Evaluate the loss on a batch. `total` is differentiable w.r.t. [`Self::vars`].
    /// The batch is moved to the network's device first.
    pub fn loss(&self, batch: &LossBatch) -> Result<LossTerms> {
        let loss = self.loss.as_ref().ok_or(AcError::LossNotPrepared)?;
        let batch = batch.to_device(&self.device)?;
        let (pi, v) = self.forward(batch.states())?;
        loss.compute(&pi, &v, &batch)
    }

    /// Build an op that copies every parameter of `src` into this network
    pub fn sync_from(&self, src: &GameAcNetwork) -> Result<SyncOp> {
        SyncOp::new(src, self)
    }

    /// Lift a single state to a batch of one and check the per-sample shape
    fn batched(&self, states: &Tensor) -> Result<Tensor> {
        let sample = [INPUT_HEIGHT, INPUT_WIDTH, INPUT_FRAMES];
        let dims = states.dims();
        let batched = match dims.len() {
            3 => states.unsqueeze(0)?,
            4 => states.clone(),
            _ => {
                return Err(AcError::ShapeMismatch {
                    expected: sample.to_vec(),
                    actual: dims.to_vec(),
                })
            }
        };
        if batched.dims()[1..] != sample {
            return Err(AcError::ShapeMismatch {
                expected: sample.to_vec(),
                actual: dims.to_vec(),
            });
        }
        Ok(batched)
    }

    fn check_single(&self, state: &Tensor) -> Result<()> {
        let expected = [INPUT_HEIGHT, INPUT_WIDTH, INPUT_FRAMES];
        if state.dims() != expected {
            return Err(AcError::ShapeMismatch {
                expected: expected.to_vec(),
                actual: state.dims().to_vec(),
            });
        }
        Ok(())
    }
}

/// VALID convolution with bias and ReLU
fn conv_relu(x: &Tensor, w: &Tensor, b: &Tensor, stride: usize) -> Result<Tensor> {
    let out_channels = b.dim(0)?;
    let h = x
        .conv2d(w, 0, stride, 1, 1)?
        .broadcast_add(&b.reshape((1, out_channels, 1, 1))?)?
        .relu()?;
    Ok(h)
}
