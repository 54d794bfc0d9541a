//! Target-size metric from a level-set field.
//!
//! Each vertex gets an isotropic size: `inner_size` where `|F| < width`
//! (near the interface) and `outer_size` elsewhere. The size is stored as a
//! symmetric `dim × dim` tensor, packed as `(xx, yy, xy)` in 2D and
//! `(xx, yy, zz, xy, yz, xz)` in 3D.

use crate::mesh_error::MeshBridgeError;
use crate::topology::mesh::AdaptiveMesh;
use serde::{Deserialize, Serialize};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Vertex tag holding the generated metric.
pub const METRIC_TAG: &str = "iso_size_metric";

/// How a size `h` becomes a tensor.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricEncoding {
    /// `I * h`.
    #[default]
    IsoSize,
    /// `I / h²`, the Riemannian form adaptation libraries consume.
    Riemannian,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelSetMetricConfig {
    /// Half-thickness of the band around the interface.
    pub width: f64,
    pub inner_size: f64,
    pub outer_size: f64,
    #[serde(default)]
    pub encoding: MetricEncoding,
}

impl LevelSetMetricConfig {
    pub fn validate(&self) -> Result<(), MeshBridgeError> {
        for (what, v) in [
            ("width", self.width),
            ("inner_size", self.inner_size),
            ("outer_size", self.outer_size),
        ] {
            if !(v.is_finite() && v > 0.0) {
                return Err(MeshBridgeError::InvalidConfig(format!(
                    "level-set {what} must be positive and finite, got {v}"
                )));
            }
        }
        Ok(())
    }

    #[inline]
    pub fn size_for(&self, level_set: f64) -> f64 {
        if level_set.abs() < self.width {
            self.inner_size
        } else {
            self.outer_size
        }
    }
}

/// Number of stored components of a symmetric `dim × dim` tensor.
pub const fn symmetric_ncomps(dim: usize) -> usize {
    dim * (dim + 1) / 2
}

/// Isotropic size for every level-set value.
pub fn iso_sizes(level_set: &[f64], config: &LevelSetMetricConfig) -> Vec<f64> {
    #[cfg(feature = "rayon")]
    {
        level_set.par_iter().map(|&f| config.size_for(f)).collect()
    }
    #[cfg(not(feature = "rayon"))]
    {
        level_set.iter().map(|&f| config.size_for(f)).collect()
    }
}

fn pack(dim: usize, diag: f64, out: &mut [f64]) {
    out[..dim].fill(diag);
    out[dim..].fill(0.0);
}

/// Packed symmetric tensors for a list of sizes.
pub fn iso_metric(sizes: &[f64], dim: usize, encoding: MetricEncoding) -> Vec<f64> {
    let ncomps = symmetric_ncomps(dim);
    let diag = move |h: f64| match encoding {
        MetricEncoding::IsoSize => h,
        MetricEncoding::Riemannian => 1.0 / (h * h),
    };
    let mut out = vec![0.0; sizes.len() * ncomps];
    #[cfg(feature = "rayon")]
    out.par_chunks_mut(ncomps)
        .zip(sizes.par_iter())
        .for_each(|(t, &h)| pack(dim, diag(h), t));
    #[cfg(not(feature = "rayon"))]
    out.chunks_mut(ncomps)
        .zip(sizes)
        .for_each(|(t, &h)| pack(dim, diag(h), t));
    out
}

/// Read the level-set vertex tag and attach [`METRIC_TAG`].
pub fn attach_level_set_metric<M: AdaptiveMesh>(
    mesh: &mut M,
    level_set_tag: &str,
    config: &LevelSetMetricConfig,
) -> Result<Vec<f64>, MeshBridgeError> {
    config.validate()?;
    let dim = mesh.dim();
    let sizes = iso_sizes(mesh.get_array::<f64>(0, level_set_tag)?, config);
    let metric = iso_metric(&sizes, dim, config.encoding);
    mesh.add_tag(0, METRIC_TAG, symmetric_ncomps(dim), metric)?;
    let inner = sizes.iter().filter(|&&h| h == config.inner_size).count();
    log::info!(
        "metric from \"{level_set_tag}\": {inner} of {} vertices inside width {}",
        sizes.len(),
        config.width
    );
    Ok(sizes)
}
