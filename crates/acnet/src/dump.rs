//! Diagnostic parameter dump.
//!
//! Writes one CSV file per parameter, `<prefix>_<name>.csv`, holding a
//! single row with the flattened values.
//!
//! Values are flattened row-major in the network's own layout: conv kernels
//! as `[out, in, kh, kw]`, dense weights as `[in, out]`. `W_fc1` rows follow
//! the channel-major (NCHW) flattening of the second conv output, so its row
//! `c * 81 + y * 9 + x` belongs to channel `c` at position `(y, x)`.

use crate::network::GameAcNetwork;
use crate::Result;
use candle_core::Var;
use csv::WriterBuilder;
use std::path::{Path, PathBuf};

impl GameAcNetwork {
    /// Dump all ten parameters. Returns the written paths in parameter order.
    ///
    /// Conv kernels are written as `[out, in, kh, kw]` and `W_fc1` rows in
    /// NCHW feature order (see the module docs), not in `[kh, kw, in, out]` /
    /// NHWC order.
    pub fn debug_save(&self, prefix: &str) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::with_capacity(self.vars().len());
        for (name, var) in self.named_vars() {
            let path = PathBuf::from(format!("{}_{}.csv", prefix, name));
            save_var(var, &path)?;
            tracing::info!(path = %path.display(), param = name, "Wrote parameter dump");
            paths.push(path);
        }
        Ok(paths)
    }
}

fn save_var(var: &Var, path: &Path) -> Result<()> {
    let values = var.as_tensor().flatten_all()?.to_vec1::<f32>()?;

    let mut writer = WriterBuilder::new().has_headers(false).from_path(path)?;
    writer.write_record(values.iter().map(|v| format!("{:.18e}", v)))?;
    writer.flush()?;
    Ok(())
}
