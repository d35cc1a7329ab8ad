//! Parameter initializers.

use crate::{AcError, Result};
use candle_core::{DType, Device, Tensor, Var};
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Weight variable drawn from a normal distribution truncated at two standard deviations
pub(crate) fn weight_variable<R: Rng>(
    shape: &[usize],
    stddev: f64,
    rng: &mut R,
    device: &Device,
) -> Result<Var> {
    let normal = Normal::new(0.0f32, stddev as f32)
        .map_err(|e| AcError::InvalidConfig(format!("init_stddev: {e}")))?;
    let bound = 2.0 * stddev as f32;
    let numel = shape.iter().product::<usize>();

    let values: Vec<f32> = (0..numel)
        .map(|_| loop {
            let x = normal.sample(rng);
            if x.abs() <= bound {
                break x;
            }
        })
        .collect();

    let initial = Tensor::from_vec(values, shape, device)?;
    Ok(Var::from_tensor(&initial)?)
}

/// Bias variable initialized to zero
pub(crate) fn bias_variable(shape: &[usize], device: &Device) -> Result<Var> {
    Ok(Var::zeros(shape, DType::F32, device)?)
}
