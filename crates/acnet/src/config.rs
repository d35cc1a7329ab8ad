//! Network configuration.

use crate::{AcError, Result};
use candle_core::Device;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Where the network's parameters live
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceConfig {
    #[default]
    Cpu,
    /// CUDA device ordinal (requires the `cuda` feature)
    Cuda(usize),
}

impl DeviceConfig {
    /// Resolve to a candle device
    pub fn device(&self) -> Result<Device> {
        match self {
            DeviceConfig::Cpu => Ok(Device::Cpu),
            DeviceConfig::Cuda(ordinal) => Ok(Device::new_cuda(*ordinal)?),
        }
    }
}

/// Configuration for the actor-critic network
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Number of discrete actions
    pub action_size: usize,
    /// Entropy regularization coefficient used by `prepare_loss`
    pub entropy_beta: f64,
    /// Scale applied to the policy term of the loss.
    /// 0.5 makes the actor's effective learning rate half of the critic's.
    pub actor_loss_scale: f64,
    /// Standard deviation of the truncated normal weight initializer
    pub init_stddev: f64,
    /// Seed for parameter initialization (OS entropy when unset)
    pub seed: Option<u64>,
    /// Device for parameters and activations
    pub device: DeviceConfig,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            action_size: 3,
            entropy_beta: 0.01,
            actor_loss_scale: 0.5,
            init_stddev: 0.01,
            seed: None,
            device: DeviceConfig::Cpu,
        }
    }
}

impl NetworkConfig {
    /// Create config for the given action space size
    pub fn new(action_size: usize) -> Self {
        Self {
            action_size,
            ..Default::default()
        }
    }

    /// Set entropy coefficient
    pub fn with_entropy_beta(mut self, beta: f64) -> Self {
        self.entropy_beta = beta;
        self
    }

    /// Set actor loss scale
    pub fn with_actor_loss_scale(mut self, scale: f64) -> Self {
        self.actor_loss_scale = scale;
        self
    }

    /// Set initializer standard deviation
    pub fn with_init_stddev(mut self, stddev: f64) -> Self {
        self.init_stddev = stddev;
        self
    }

    /// Set initialization seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set device
    pub fn with_device(mut self, device: DeviceConfig) -> Self {
        self.device = device;
        self
    }

    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the values describe a buildable network
    pub fn validate(&self) -> Result<()> {
        if self.action_size == 0 {
            return Err(AcError::InvalidConfig(
                "action_size must be at least 1".into(),
            ));
        }
        if !(self.init_stddev.is_finite() && self.init_stddev > 0.0) {
            return Err(AcError::InvalidConfig(format!(
                "init_stddev must be positive, got {}",
                self.init_stddev
            )));
        }
        if !self.entropy_beta.is_finite() || !self.actor_loss_scale.is_finite() {
            return Err(AcError::InvalidConfig(
                "loss coefficients must be finite".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = NetworkConfig::default();
        assert_eq!(config.actor_loss_scale, 0.5);
        assert_eq!(config.init_stddev, 0.01);
        assert_eq!(config.device, DeviceConfig::Cpu);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_actions_rejected() {
        let err = NetworkConfig::new(0).validate().unwrap_err();
        assert!(matches!(err, AcError::InvalidConfig(_)));
    }

    #[test]
    fn test_from_json_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"action_size": 6, "seed": 7, "device": "cpu"}}"#).unwrap();

        let config = NetworkConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.action_size, 6);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.entropy_beta, 0.01);
    }

    #[test]
    fn test_cuda_device_serialization() {
        let config = NetworkConfig::new(4).with_device(DeviceConfig::Cuda(1));
        let json = serde_json::to_string(&config).unwrap();
        let restored: NetworkConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.device, DeviceConfig::Cuda(1));
    }
}
