//! Parameter synchronization between network instances.

use super::{GameAcNetwork, PARAM_COUNT, PARAM_NAMES};
use crate::{AcError, Result};
use candle_core::Var;

/// Copies every parameter of a source network into a destination network.
///
/// Holds handles to both networks' variables, not snapshots: each `run`
/// copies the source values current at that moment. Typically a worker
/// builds one op against the global network and runs it before each rollout.
#[derive(Clone)]
pub struct SyncOp {
    name: String,
    pairs: Vec<(Var, Var)>,
}

impl SyncOp {
    pub(crate) fn new(src: &GameAcNetwork, dst: &GameAcNetwork) -> Result<Self> {
        if src.action_size() != dst.action_size() {
            return Err(AcError::ShapeMismatch {
                expected: vec![dst.action_size()],
                actual: vec![src.action_size()],
            });
        }

        let pairs: Vec<(Var, Var)> = src
            .vars()
            .into_iter()
            .zip(dst.vars())
            .map(|(s, d)| (s.clone(), d.clone()))
            .collect();

        Ok(Self {
            name: "GameAcNetwork".to_string(),
            pairs,
        })
    }

    /// Set the op name used in logs
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of parameter pairs (always ten)
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Overwrite each destination parameter with its source's current value
    pub fn run(&self) -> Result<()> {
        debug_assert_eq!(self.pairs.len(), PARAM_COUNT);
        for (i, (src, dst)) in self.pairs.iter().enumerate() {
            if src.dims() != dst.dims() {
                return Err(AcError::ShapeMismatch {
                    expected: dst.dims().to_vec(),
                    actual: src.dims().to_vec(),
                });
            }
            // Own copy, so the source storage is not read-locked while dst is written
            let value = src.as_tensor().copy()?.to_device(dst.device())?;
            dst.set(&value)?;
            tracing::trace!(op = %self.name, param = PARAM_NAMES[i], "Synced parameter");
        }
        Ok(())
    }
}
