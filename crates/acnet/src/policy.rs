//! Categorical action distribution over the policy head output.

use crate::{AcError, Result};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

/// Probability vector over discrete actions
#[derive(Clone, Debug)]
pub struct Categorical {
    probs: Vec<f32>,
}

impl Categorical {
    /// Wrap a probability vector, as returned by `run_policy`.
    /// Entries must be finite and non-negative with a positive sum.
    pub fn new(probs: Vec<f32>) -> Result<Self> {
        if probs.is_empty() {
            return Err(AcError::InvalidAction("empty probability vector".into()));
        }
        if probs.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(AcError::InvalidAction(format!(
                "invalid probabilities: {:?}",
                probs
            )));
        }
        let total = probs.iter().sum::<f32>();
        if total <= 0.0 {
            return Err(AcError::InvalidAction("probabilities sum to zero".into()));
        }
        if !total.is_finite() {
            return Err(AcError::InvalidAction("probability sum overflows".into()));
        }
        Ok(Self { probs })
    }

    pub fn probs(&self) -> &[f32] {
        &self.probs
    }

    /// Number of actions
    pub fn len(&self) -> usize {
        self.probs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probs.is_empty()
    }

    /// Sample an action index proportionally to its probability
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<usize> {
        let dist = WeightedIndex::new(&self.probs)
            .map_err(|e| AcError::InvalidAction(format!("cannot sample: {}", e)))?;
        Ok(dist.sample(rng))
    }

    /// Most probable action (lowest index on ties)
    pub fn greedy(&self) -> usize {
        self.probs
            .iter()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |(best, best_p), (i, &p)| {
                if p > best_p {
                    (i, p)
                } else {
                    (best, best_p)
                }
            })
            .0
    }

    /// Log probability of `action`
    pub fn log_prob(&self, action: usize) -> Result<f32> {
        self.probs
            .get(action)
            .map(|p| p.ln())
            .ok_or_else(|| AcError::InvalidAction(format!("action {} out of range", action)))
    }

    /// Shannon entropy in nats
    pub fn entropy(&self) -> f32 {
        -self
            .probs
            .iter()
            .filter(|p| **p > 0.0)
            .map(|p| p * p.ln())
            .sum::<f32>()
    }
}
