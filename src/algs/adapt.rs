//! Adapt-step driver: one full flat → adaptive → flat cycle.
//!
//! The driver owns the ordering of the bridge stages; the refinement itself
//! is delegated to a [`MeshAdapter`]. After the adapted mesh is written and
//! re-read, solver values come back through a translator built from the
//! re-read shard, so rows follow the new file layout.

use crate::algs::build::{BuiltMesh, build_owned_mesh, build_serial_mesh};
use crate::algs::classify::{ClassificationReport, classify};
use crate::algs::metric::METRIC_TAG;
use crate::algs::serialize::{SerializeOptions, mesh_to_flat, rewrite_shard};
use crate::algs::transport::{TransportSummary, copy_from_mesh, transport_to_mesh};
use crate::config::BridgeConfig;
use crate::data::fields::{FieldDescriptor, SolutionStore, SolverBookkeeping, expand_tag_names};
use crate::data::translator::IndexTranslator;
use crate::io::flat::FlatShard;
use crate::io::{FlatMeshReader, FlatMeshWriter};
use crate::mesh_error::MeshBridgeError;
use crate::topology::mesh::{AdaptiveMesh, MeshConstructor};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Limits and goals handed to the adapter, plus the tags it must carry over.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptationRequest {
    /// Vertex tag holding the target-size metric.
    pub metric_tag: String,
    pub min_length: f64,
    pub max_length: f64,
    pub max_gradation_rate: f64,
    pub max_length_allowed: f64,
    pub max_length_desired: f64,
    pub min_quality_desired: f64,
    pub should_refine: bool,
    pub should_coarsen_slivers: bool,
    pub max_passes: usize,
    /// Vertex tags interpolated linearly onto the adapted mesh.
    pub transfer: Vec<String>,
}

impl Default for AdaptationRequest {
    fn default() -> Self {
        Self {
            metric_tag: METRIC_TAG.to_string(),
            min_length: 1e-6,
            max_length: 0.6,
            max_gradation_rate: 0.3,
            max_length_allowed: 5.0,
            max_length_desired: 1.6,
            min_quality_desired: 0.6,
            should_refine: true,
            should_coarsen_slivers: true,
            max_passes: 1000,
            transfer: Vec::new(),
        }
    }
}

impl AdaptationRequest {
    /// Same limits, transferring every tag of `fields`.
    pub fn with_transfer(mut self, fields: &[FieldDescriptor]) -> Self {
        self.transfer = expand_tag_names(fields);
        self
    }

    pub fn validate(&self) -> Result<(), MeshBridgeError> {
        let positive = [
            ("min_length", self.min_length),
            ("max_length", self.max_length),
            ("max_gradation_rate", self.max_gradation_rate),
            ("max_length_allowed", self.max_length_allowed),
            ("max_length_desired", self.max_length_desired),
        ];
        if let Some((what, v)) = positive.iter().find(|(_, v)| !(v.is_finite() && *v > 0.0)) {
            return Err(MeshBridgeError::InvalidConfig(format!(
                "adaptation {what} must be positive and finite, got {v}"
            )));
        }
        if self.min_length > self.max_length {
            return Err(MeshBridgeError::InvalidConfig(format!(
                "adaptation min_length {} exceeds max_length {}",
                self.min_length, self.max_length
            )));
        }
        if !(self.min_quality_desired > 0.0 && self.min_quality_desired <= 1.0) {
            return Err(MeshBridgeError::InvalidConfig(format!(
                "adaptation min_quality_desired must lie in (0, 1], got {}",
                self.min_quality_desired
            )));
        }
        if self.max_passes == 0 {
            return Err(MeshBridgeError::InvalidConfig(
                "adaptation max_passes must be at least 1".into(),
            ));
        }
        if self.metric_tag.trim().is_empty() {
            return Err(MeshBridgeError::InvalidConfig(
                "adaptation metric_tag is empty".into(),
            ));
        }
        Ok(())
    }
}

/// Adaptation engine working on a classified mesh in place.
///
/// Implementations must keep the classification tags, the `global` tags and
/// every tag named in [`AdaptationRequest::transfer`] valid on the result.
pub trait MeshAdapter<M: AdaptiveMesh> {
    /// Adapt `mesh`, returning the number of passes run.
    fn adapt(&mut self, mesh: &mut M, request: &AdaptationRequest) -> Result<usize, MeshBridgeError>;
}

/// Adapter that checks the request against the mesh and changes nothing.
///
/// Useful as a dry run of the bridge around a real adapter.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassThroughAdapter;

impl<M: AdaptiveMesh> MeshAdapter<M> for PassThroughAdapter {
    fn adapt(&mut self, mesh: &mut M, request: &AdaptationRequest) -> Result<usize, MeshBridgeError> {
        request.validate()?;
        for tag in &request.transfer {
            if !mesh.has_tag(0, tag) {
                return Err(MeshBridgeError::MissingTag {
                    dim: 0,
                    name: tag.clone(),
                });
            }
        }
        if !mesh.has_tag(0, &request.metric_tag) {
            log::debug!("no \"{}\" tag; adaptation would use edge lengths", request.metric_tag);
        }
        Ok(0)
    }
}

/// Collaborators of one adapt step.
pub struct AdaptContext<'a, C, A, W, R> {
    pub constructor: &'a C,
    pub adapter: &'a mut A,
    pub writer: &'a W,
    pub reader: &'a R,
    pub config: &'a BridgeConfig,
}

/// What one adapt step did.
#[derive(Debug)]
pub struct AdaptStepOutcome<M> {
    /// Shard as re-read from disk.
    pub shard: FlatShard,
    /// The adapted mesh.
    pub mesh: M,
    pub classification: ClassificationReport,
    pub transport: TransportSummary,
    pub passes: usize,
    /// Values written back into the solver.
    pub copied: usize,
}

/// Run build, classify, transport, adapt, serialize, rewrite and copy-back.
///
/// `solver` must cover the rows of `shard` on entry; on success its
/// bookkeeping has been rebuilt for the re-read shard and its update range
/// holds the transported values.
pub fn adapt_step<C, A, W, R, S>(
    shard: &FlatShard,
    fields: &[FieldDescriptor],
    path: &Path,
    ctx: AdaptContext<'_, C, A, W, R>,
    solver: &mut S,
) -> Result<AdaptStepOutcome<C::Mesh>, MeshBridgeError>
where
    C: MeshConstructor,
    A: MeshAdapter<C::Mesh>,
    W: FlatMeshWriter,
    R: FlatMeshReader,
    S: SolutionStore + SolverBookkeeping,
{
    let config = ctx.config;
    config.validate()?;

    let BuiltMesh {
        mut mesh,
        translator,
        ..
    } = if shard.dist.num_ranks > 1 {
        build_owned_mesh(shard, ctx.constructor)?
    } else {
        build_serial_mesh(shard, ctx.constructor)?
    };
    let classification = classify(&mut mesh, shard, &translator, &config.classify_options())?;
    let transport = transport_to_mesh(&mut mesh, &translator, fields, &*solver, config.level_set.as_ref())?;

    let request = config.adaptation.clone().with_transfer(fields);
    let passes = ctx.adapter.adapt(&mut mesh, &request)?;
    log::info!(
        "rank {}: adapted in {passes} passes to {} vertices, {} elements",
        shard.dist.rank,
        mesh.nverts(),
        mesh.nelems()
    );

    let options = SerializeOptions {
        title: shard.mesh.title.clone(),
        rank: shard.dist.rank,
        num_ranks: shard.dist.num_ranks,
        id_base: config.id_base,
        classify_with: config.classify_with,
    };
    let adapted = mesh_to_flat(&mesh, &options)?;
    let reread = rewrite_shard(path, &adapted, ctx.writer, ctx.reader, solver)?;

    let translator = IndexTranslator::new(&reread.dist)?.with_mesh(&mesh)?;
    let copied = copy_from_mesh(&mesh, &translator, fields, &reread.dist, solver)?;
    Ok(AdaptStepOutcome {
        shard: reread,
        mesh,
        classification,
        transport,
        passes,
        copied,
    })
}
