//! Field Transporter: per-vertex values between solver rows and mesh tags.
//!
//! Forward, every flat row with a vertex in the mesh contributes its value;
//! rows whose vertex lives on another rank are skipped. Back, only the
//! update range (internal + boundary rows) is written; ghost rows belong to
//! the solver's own exchange.

use crate::algs::metric::{LevelSetMetricConfig, attach_level_set_metric};
use crate::data::fields::{FieldDescriptor, FieldRole, SolutionStore};
use crate::data::translator::IndexTranslator;
use crate::mesh_error::MeshBridgeError;
use crate::topology::ids::FlatIndex;
use crate::topology::mesh::AdaptiveMesh;
use crate::topology::ownership::ShardDistribution;

/// Counts from one forward transport.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransportSummary {
    /// Tags written to the mesh, in descriptor order.
    pub tags: Vec<String>,
    /// Flat rows without a vertex on this rank (per tag).
    pub skipped_rows: usize,
    /// Rows where the solver had no unknown (left at zero).
    pub missing_unknowns: usize,
}

/// Copy every expanded field tag into a vertex tag of `mesh`.
///
/// When `level_set` is given, the first field with [`FieldRole::LevelSet`]
/// also produces the size metric.
pub fn transport_to_mesh<M, S>(
    mesh: &mut M,
    translator: &IndexTranslator,
    fields: &[FieldDescriptor],
    store: &S,
    level_set: Option<&LevelSetMetricConfig>,
) -> Result<TransportSummary, MeshBridgeError>
where
    M: AdaptiveMesh,
    S: SolutionStore + ?Sized,
{
    let mut summary = TransportSummary::default();
    for field in fields {
        for tag in field.tag_names() {
            let mut values = vec![0.0; mesh.nverts()];
            let mut skipped = 0usize;
            let mut missing = 0usize;
            for row in (0..store.num_rows()).map(FlatIndex) {
                let Some(v) = translator.mesh_vertex(row) else {
                    skipped += 1;
                    continue;
                };
                match store.value(&tag, row) {
                    Some(x) => values[v.idx()] = x,
                    None => missing += 1,
                }
            }
            if skipped > 0 {
                log::debug!("\"{tag}\": {skipped} rows have no vertex on this rank");
            }
            mesh.add_tag(0, &tag, 1, values)?;
            summary.skipped_rows = summary.skipped_rows.max(skipped);
            summary.missing_unknowns += missing;
            summary.tags.push(tag);
        }
    }

    if let Some(config) = level_set {
        match fields.iter().find(|f| f.role == FieldRole::LevelSet) {
            Some(field) => {
                attach_level_set_metric(mesh, &field.name, config)?;
            }
            None => log::warn!("level-set metric requested but no level-set field given"),
        }
    }
    Ok(summary)
}

/// Copy tags back into the store for the update range of `dist`.
///
/// Every update row must have a vertex in the mesh.
pub fn copy_from_mesh<M, S>(
    mesh: &M,
    translator: &IndexTranslator,
    fields: &[FieldDescriptor],
    dist: &ShardDistribution,
    store: &mut S,
) -> Result<usize, MeshBridgeError>
where
    M: AdaptiveMesh,
    S: SolutionStore + ?Sized,
{
    let mut written = 0;
    for field in fields {
        for tag in field.tag_names() {
            let values = mesh.get_array::<f64>(0, &tag)?;
            if values.len() != mesh.nverts() {
                return Err(MeshBridgeError::InvariantViolation(format!(
                    "tag \"{tag}\" holds {} values for {} vertices",
                    values.len(),
                    mesh.nverts()
                )));
            }
            for row in dist.update_range().map(FlatIndex) {
                let v = translator.mesh_vertex(row).ok_or_else(|| {
                    MeshBridgeError::InvariantViolation(format!(
                        "update row {row} has no vertex in the mesh"
                    ))
                })?;
                store.set_value(&tag, row, values[v.idx()])?;
                written += 1;
            }
        }
    }
    Ok(written)
}
