//! Actor-critic objective.
//!
//! `total = policy_loss + value_loss` where
//!
//! ```text
//! entropy     = -sum(pi * log(pi))
//! policy_loss = -scale * (sum(log(pi) * a) * td + entropy * beta)
//! value_loss  = sum((r - v)^2) / 2
//! ```
//!
//! Minimizing `total` by gradient descent ascends the expected return.

use crate::network::{INPUT_FRAMES, INPUT_HEIGHT, INPUT_WIDTH};
use crate::{AcError, Result};
use candle_core::{Device, Tensor, D};

/// Default scale of the policy term (actor rate is half of the critic's)
pub const DEFAULT_ACTOR_SCALE: f64 = 0.5;

/// Lower clamp applied to probabilities before taking the log
const MIN_PROB: f32 = 1e-20;

/// One sampled step used to build a [`LossBatch`]
#[derive(Clone, Debug)]
pub struct Transition {
    /// State `[84, 84, 4]`
    pub state: Tensor,
    /// Index of the action taken
    pub action: usize,
    /// Temporal difference `R - V(s)`
    pub td: f32,
    /// Discounted return `R`
    pub ret: f32,
}

/// Inputs of the loss: states, one-hot actions, td signal and returns
#[derive(Clone, Debug)]
pub struct LossBatch {
    states: Tensor,
    actions: Tensor,
    td: Tensor,
    returns: Tensor,
}

impl LossBatch {
    /// Create a batch from prepared tensors.
    ///
    /// * `states` - `[N, 84, 84, 4]`
    /// * `actions` - one-hot `[N, action_size]`
    /// * `td` - `[N]`
    /// * `returns` - `[N]`
    pub fn new(states: Tensor, actions: Tensor, td: Tensor, returns: Tensor) -> Result<Self> {
        let state_dims = states.dims();
        if state_dims.len() != 4 || state_dims[1..] != [INPUT_HEIGHT, INPUT_WIDTH, INPUT_FRAMES] {
            return Err(AcError::ShapeMismatch {
                expected: vec![INPUT_HEIGHT, INPUT_WIDTH, INPUT_FRAMES],
                actual: state_dims.to_vec(),
            });
        }
        let n = state_dims[0];
        let action_dims = actions.dims();
        if action_dims.len() != 2 || action_dims[0] != n {
            return Err(AcError::ShapeMismatch {
                expected: vec![n, action_dims.last().copied().unwrap_or(0)],
                actual: action_dims.to_vec(),
            });
        }
        expect_dims(&td, &[n])?;
        expect_dims(&returns, &[n])?;

        Ok(Self {
            states,
            actions,
            td,
            returns,
        })
    }

    /// Build a batch from transitions, one-hot encoding the actions
    pub fn from_transitions(
        transitions: &[Transition],
        action_size: usize,
        device: &Device,
    ) -> Result<Self> {
        if transitions.is_empty() {
            return Err(AcError::InvalidConfig("empty transition batch".into()));
        }

        let mut one_hot = vec![0f32; transitions.len() * action_size];
        for (i, t) in transitions.iter().enumerate() {
            if t.action >= action_size {
                return Err(AcError::InvalidAction(format!(
                    "action {} out of range for {} actions",
                    t.action, action_size
                )));
            }
            one_hot[i * action_size + t.action] = 1.0;
        }

        let states: Vec<Tensor> = transitions.iter().map(|t| t.state.clone()).collect();
        let states = Tensor::stack(&states, 0)?.to_device(device)?;
        let actions = Tensor::from_vec(one_hot, (transitions.len(), action_size), device)?;
        let td: Vec<f32> = transitions.iter().map(|t| t.td).collect();
        let returns: Vec<f32> = transitions.iter().map(|t| t.ret).collect();

        Self::new(
            states,
            actions,
            Tensor::new(td, device)?,
            Tensor::new(returns, device)?,
        )
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.td.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn states(&self) -> &Tensor {
        &self.states
    }

    pub fn actions(&self) -> &Tensor {
        &self.actions
    }

    pub fn td(&self) -> &Tensor {
        &self.td
    }

    pub fn returns(&self) -> &Tensor {
        &self.returns
    }

    /// Copy of the batch with every tensor on `device`
    pub fn to_device(&self, device: &Device) -> Result<Self> {
        Ok(Self {
            states: self.states.to_device(device)?,
            actions: self.actions.to_device(device)?,
            td: self.td.to_device(device)?,
            returns: self.returns.to_device(device)?,
        })
    }
}

fn expect_dims(t: &Tensor, expected: &[usize]) -> Result<()> {
    if t.dims() != expected {
        return Err(AcError::ShapeMismatch {
            expected: expected.to_vec(),
            actual: t.dims().to_vec(),
        });
    }
    Ok(())
}

/// Loss terms. All are scalar tensors; `total` carries the graph for backprop.
#[derive(Debug)]
pub struct LossTerms {
    pub total: Tensor,
    pub policy: Tensor,
    pub value: Tensor,
    pub entropy: Tensor,
}

impl LossTerms {
    /// Scalar values as `(total, policy, value, entropy)`
    pub fn scalars(&self) -> Result<(f32, f32, f32, f32)> {
        Ok((
            self.total.to_scalar::<f32>()?,
            self.policy.to_scalar::<f32>()?,
            self.value.to_scalar::<f32>()?,
            self.entropy.to_scalar::<f32>()?,
        ))
    }
}

/// Combined actor-critic loss with entropy regularization
#[derive(Clone, Debug)]
pub struct ActorCriticLoss {
    action_size: usize,
    entropy_beta: f64,
    actor_scale: f64,
}

impl ActorCriticLoss {
    pub fn new(action_size: usize, entropy_beta: f64) -> Self {
        Self {
            action_size,
            entropy_beta,
            actor_scale: DEFAULT_ACTOR_SCALE,
        }
    }

    /// Set the policy term scale
    pub fn with_actor_scale(mut self, scale: f64) -> Self {
        self.actor_scale = scale;
        self
    }

    pub fn entropy_beta(&self) -> f64 {
        self.entropy_beta
    }

    pub fn actor_scale(&self) -> f64 {
        self.actor_scale
    }

    /// Evaluate the loss for policy `pi` `[N, A]` and values `v` `[N]`
    pub fn compute(&self, pi: &Tensor, v: &Tensor, batch: &LossBatch) -> Result<LossTerms> {
        let n = batch.len();
        expect_dims(pi, &[n, self.action_size])?;
        expect_dims(batch.actions(), &[n, self.action_size])?;
        expect_dims(v, &[n])?;

        let log_pi = pi.clamp(MIN_PROB, 1f32)?.log()?;
        let entropy = (pi * &log_pi)?.sum_all()?.neg()?;

        // sum_a log(pi) * a, per sample
        let log_pi_taken = (&log_pi * batch.actions())?.sum(D::Minus1)?;
        let advantage_term = (log_pi_taken * batch.td())?.sum_all()?;
        let policy_loss =
            ((advantage_term + (&entropy * self.entropy_beta)?)? * -self.actor_scale)?;

        let value_loss = ((batch.returns() - v)?.sqr()?.sum_all()? * 0.5)?;
        let total = (&policy_loss + &value_loss)?;

        Ok(LossTerms {
            total,
            policy: policy_loss,
            value: value_loss,
            entropy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;

    fn batch_of(n: usize, actions: Tensor, td: &[f32], ret: &[f32]) -> LossBatch {
        let dev = Device::Cpu;
        LossBatch::new(
            Tensor::zeros((n, 84, 84, 4), DType::F32, &dev).unwrap(),
            actions,
            Tensor::new(td, &dev).unwrap(),
            Tensor::new(ret, &dev).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_loss_known_values() {
        let dev = Device::Cpu;
        let pi = Tensor::new(&[[0.5f32, 0.5]], &dev).unwrap();
        let v = Tensor::new(&[0.5f32], &dev).unwrap();
        let actions = Tensor::new(&[[1f32, 0.0]], &dev).unwrap();
        let batch = batch_of(1, actions, &[2.0], &[1.0]);

        let loss = ActorCriticLoss::new(2, 0.1);
        let (total, policy, value, entropy) =
            loss.compute(&pi, &v, &batch).unwrap().scalars().unwrap();

        let ln2 = std::f32::consts::LN_2;
        assert!((entropy - ln2).abs() < 1e-6);
        let expected_policy = -0.5 * (-ln2 * 2.0 + ln2 * 0.1);
        assert!((policy - expected_policy).abs() < 1e-6);
        assert!((value - 0.125).abs() < 1e-6);
        assert!((total - (expected_policy + 0.125)).abs() < 1e-6);
    }

    #[test]
    fn test_loss_sums_over_batch() {
        let dev = Device::Cpu;
        let pi = Tensor::new(&[[0.5f32, 0.5], [0.25, 0.75]], &dev).unwrap();
        let v = Tensor::new(&[0.5f32, 0.0], &dev).unwrap();
        let actions = Tensor::new(&[[1f32, 0.0], [0.0, 1.0]], &dev).unwrap();
        let batch = batch_of(2, actions, &[2.0, 1.0], &[1.0, 1.0]);

        let (total, policy, value, entropy) = ActorCriticLoss::new(2, 0.1)
            .compute(&pi, &v, &batch)
            .unwrap()
            .scalars()
            .unwrap();

        let h0 = std::f32::consts::LN_2;
        let h1 = -(0.25f32 * 0.25f32.ln() + 0.75 * 0.75f32.ln());
        assert!((entropy - (h0 + h1)).abs() < 1e-5);
        assert!((entropy - 1.2554823).abs() < 1e-5);

        let taken = 0.5f32.ln() * 2.0 + 0.75f32.ln() * 1.0;
        let expected_policy = -0.5 * (taken + (h0 + h1) * 0.1);
        assert!((policy - expected_policy).abs() < 1e-5);
        assert!((policy - 0.7742141).abs() < 1e-5);

        // (1 - 0.5)^2 / 2 + (1 - 0)^2 / 2
        assert!((value - 0.625).abs() < 1e-6);
        assert!((total - (policy + value)).abs() < 1e-6);
    }

    #[test]
    fn test_batch_to_device_keeps_contents() {
        let dev = Device::Cpu;
        let actions = Tensor::new(&[[0f32, 1.0]], &dev).unwrap();
        let batch = batch_of(1, actions, &[0.5], &[2.0]);

        let moved = batch.to_device(&dev).unwrap();
        assert!(moved.states().device().same_device(&dev));
        assert_eq!(moved.states().dims(), &[1, 84, 84, 4]);
        assert_eq!(moved.actions().to_vec2::<f32>().unwrap(), vec![vec![0.0, 1.0]]);
        assert_eq!(moved.td().to_vec1::<f32>().unwrap(), vec![0.5]);
        assert_eq!(moved.returns().to_vec1::<f32>().unwrap(), vec![2.0]);
    }

    #[test]
    fn test_zero_probability_stays_finite() {
        let dev = Device::Cpu;
        let pi = Tensor::new(&[[1f32, 0.0, 0.0]], &dev).unwrap();
        let v = Tensor::new(&[0f32], &dev).unwrap();
        let actions = Tensor::new(&[[0f32, 1.0, 0.0]], &dev).unwrap();
        let batch = batch_of(1, actions, &[1.0], &[0.0]);

        let (total, _, _, entropy) = ActorCriticLoss::new(3, 0.01)
            .compute(&pi, &v, &batch)
            .unwrap()
            .scalars()
            .unwrap();
        assert!(total.is_finite());
        assert!(entropy.abs() < 1e-6);
    }

    #[test]
    fn test_actor_scale() {
        let dev = Device::Cpu;
        let pi = Tensor::new(&[[0.25f32, 0.75]], &dev).unwrap();
        let v = Tensor::new(&[0f32], &dev).unwrap();
        let actions = Tensor::new(&[[0f32, 1.0]], &dev).unwrap();
        let batch = batch_of(1, actions, &[1.0], &[0.0]);

        let half = ActorCriticLoss::new(2, 0.0).compute(&pi, &v, &batch).unwrap();
        let full = ActorCriticLoss::new(2, 0.0)
            .with_actor_scale(1.0)
            .compute(&pi, &v, &batch)
            .unwrap();
        let half = half.policy.to_scalar::<f32>().unwrap();
        let full = full.policy.to_scalar::<f32>().unwrap();
        assert!((full - 2.0 * half).abs() < 1e-6);
        assert!((full - -(0.75f32.ln())).abs() < 1e-6);
    }

    #[test]
    fn test_from_transitions_one_hot() {
        let dev = Device::Cpu;
        let state = Tensor::zeros((84, 84, 4), DType::F32, &dev).unwrap();
        let transitions = vec![
            Transition { state: state.clone(), action: 2, td: 0.5, ret: 1.0 },
            Transition { state, action: 0, td: -0.5, ret: 0.0 },
        ];
        let batch = LossBatch::from_transitions(&transitions, 3, &dev).unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.states().dims(), &[2, 84, 84, 4]);
        assert_eq!(
            batch.actions().to_vec2::<f32>().unwrap(),
            vec![vec![0.0, 0.0, 1.0], vec![1.0, 0.0, 0.0]]
        );
        assert_eq!(batch.td().to_vec1::<f32>().unwrap(), vec![0.5, -0.5]);
    }

    #[test]
    fn test_from_transitions_rejects_bad_action() {
        let dev = Device::Cpu;
        let state = Tensor::zeros((84, 84, 4), DType::F32, &dev).unwrap();
        let transitions = vec![Transition { state, action: 3, td: 0.0, ret: 0.0 }];
        assert!(matches!(
            LossBatch::from_transitions(&transitions, 3, &dev),
            Err(AcError::InvalidAction(_))
        ));
    }

    #[test]
    fn test_batch_shape_validation() {
        let dev = Device::Cpu;
        let result = LossBatch::new(
            Tensor::zeros((2, 84, 84, 4), DType::F32, &dev).unwrap(),
            Tensor::zeros((2, 3), DType::F32, &dev).unwrap(),
            Tensor::zeros(1, DType::F32, &dev).unwrap(),
            Tensor::zeros(2, DType::F32, &dev).unwrap(),
        );
        assert!(matches!(result, Err(AcError::ShapeMismatch { .. })));
    }
}
